use once_cell::sync::Lazy;
use regex::Regex;

static ISIN_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Z]{2}[A-Z0-9]{10}$").unwrap());

static LINK_ISIN_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)/([A-Z]{2}[A-Z0-9]{10})(?:-|$)").unwrap());

/// Canonical form of a raw ticker or ISIN: trimmed, uppercased, with any
/// leading digit run stripped (crawled rows often carry a row-order prefix).
pub fn normalize(raw: &str) -> String {
    let upper = raw.trim().to_uppercase();
    let stripped = upper.trim_start_matches(|c: char| c.is_ascii_digit());
    stripped.to_string()
}

pub fn is_isin(symbol: &str) -> bool {
    ISIN_RE.is_match(symbol)
}

/// Pull an ISIN out of a source-link path segment, if one is embedded.
pub fn isin_from_link(link: &str) -> Option<String> {
    LINK_ISIN_RE
        .captures(link)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_uppercase())
}

/// Short all-alpha strings are presumed to be real tickers; anything else is
/// treated as a market-code-like artifact and eligible for the link fallback.
pub fn looks_like_ticker(symbol: &str) -> bool {
    !symbol.is_empty() && symbol.len() <= 5 && symbol.chars().all(|c| c.is_ascii_alphabetic())
}

/// Decide which symbol, if any, a row should be enriched under.
///
/// The primary ticker wins when it looks like a real ticker; otherwise an
/// ISIN embedded in the source link takes over (only when resolution is
/// enabled). ISIN-shaped symbols are unresolvable with resolution disabled.
pub fn candidate_for_row(
    ticker: Option<&str>,
    source_link: Option<&str>,
    resolve_isin: bool,
) -> Option<String> {
    let mut symbol = ticker.map(normalize).unwrap_or_default();

    if resolve_isin {
        if let Some(link_isin) = source_link.and_then(isin_from_link) {
            if !looks_like_ticker(&symbol) {
                symbol = link_isin;
            }
        }
    }

    if symbol.is_empty() {
        return None;
    }
    if is_isin(&symbol) && !resolve_isin {
        return None;
    }
    Some(symbol)
}
