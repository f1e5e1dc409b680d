use csv::StringRecord;
use log::warn;

use crate::records::Row;

/// Alias groups for the internal schema, in priority order. The first source
/// column present in a chunk's header wins; a target with no present alias
/// becomes an all-null column. The Portuguese names are what the upstream
/// listing crawler emits.
pub const COLUMN_ALIASES: &[(&str, &[&str])] = &[
    ("Name", &["Name", "name", "Nome"]),
    ("Ticker", &["Símbolo", "symbol", "Ticker"]),
    ("Market", &["Mercado", "Market"]),
    ("LastPrice", &["Último (Preço)", "LastPrice"]),
    ("ChangePercent", &["%", "ChangePercent"]),
    ("Timestamp", &["Data/Hora", "Timestamp"]),
    ("SourceLink", &["Link", "SourceLink"]),
];

/// Resolved source-column index per schema target, in `COLUMN_ALIASES` order.
#[derive(Debug, Clone)]
pub struct ColumnMap {
    indices: [Option<usize>; 7],
}

impl ColumnMap {
    /// Evaluate the alias groups once against a chunk's actual header set.
    pub fn resolve(headers: &StringRecord) -> Self {
        let mut indices = [None; 7];
        for (slot, (_, aliases)) in COLUMN_ALIASES.iter().enumerate() {
            indices[slot] = aliases
                .iter()
                .find_map(|alias| headers.iter().position(|header| header.trim() == *alias));
        }
        Self { indices }
    }

    fn field(&self, record: &StringRecord, slot: usize) -> Option<String> {
        let idx = self.indices[slot]?;
        let value = record.get(idx)?.trim();
        if value.is_empty() {
            None
        } else {
            Some(value.to_string())
        }
    }
}

/// Map one chunk of raw CSV records onto the internal schema.
pub fn map_chunk(headers: &StringRecord, records: &[StringRecord]) -> Vec<Row> {
    let columns = ColumnMap::resolve(headers);
    if columns.indices[1].is_none() {
        warn!("No ticker column found in this chunk; rows will not be enriched");
    }

    records
        .iter()
        .map(|record| Row {
            name: columns.field(record, 0),
            ticker: columns.field(record, 1),
            market: columns.field(record, 2),
            last_price: columns.field(record, 3),
            change_percent: columns.field(record, 4),
            timestamp: columns.field(record, 5),
            source_link: columns.field(record, 6),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(fields: &[&str]) -> StringRecord {
        StringRecord::from(fields.to_vec())
    }

    #[test]
    fn maps_crawler_headers() {
        let headers = record(&["Nome", "Símbolo", "Mercado", "Último (Preço)", "%", "Data/Hora", "Link"]);
        let rows = map_chunk(
            &headers,
            &[record(&[
                "EDP",
                "EDP",
                "XLIS",
                "3,50",
                "+1,2%",
                "2024-05-01 17:35",
                "https://example.com/PTEDP0AM0009-XLIS",
            ])],
        );

        assert_eq!(rows.len(), 1);
        let row = &rows[0];
        assert_eq!(row.name.as_deref(), Some("EDP"));
        assert_eq!(row.ticker.as_deref(), Some("EDP"));
        assert_eq!(row.market.as_deref(), Some("XLIS"));
        assert_eq!(row.last_price.as_deref(), Some("3,50"));
        assert_eq!(row.change_percent.as_deref(), Some("+1,2%"));
        assert_eq!(row.timestamp.as_deref(), Some("2024-05-01 17:35"));
        assert_eq!(
            row.source_link.as_deref(),
            Some("https://example.com/PTEDP0AM0009-XLIS")
        );
    }

    #[test]
    fn first_matching_alias_wins() {
        let headers = record(&["Símbolo", "Ticker"]);
        let rows = map_chunk(&headers, &[record(&["FROM_SIMBOLO", "FROM_TICKER"])]);
        assert_eq!(rows[0].ticker.as_deref(), Some("FROM_SIMBOLO"));
    }

    #[test]
    fn absent_targets_become_null_columns() {
        let headers = record(&["Name", "Ticker"]);
        let rows = map_chunk(&headers, &[record(&["Acme", "ACM"])]);

        let row = &rows[0];
        assert_eq!(row.name.as_deref(), Some("Acme"));
        assert_eq!(row.ticker.as_deref(), Some("ACM"));
        assert!(row.market.is_none());
        assert!(row.last_price.is_none());
        assert!(row.source_link.is_none());
    }

    #[test]
    fn missing_ticker_column_yields_null_tickers() {
        let headers = record(&["Name"]);
        let rows = map_chunk(&headers, &[record(&["Acme"]), record(&["Apex"])]);

        assert_eq!(rows.len(), 2);
        assert!(rows.iter().all(|row| row.ticker.is_none()));
    }

    #[test]
    fn blank_cells_become_none() {
        let headers = record(&["Name", "Ticker"]);
        let rows = map_chunk(&headers, &[record(&["  ", "ACM"])]);
        assert!(rows[0].name.is_none());
    }
}
