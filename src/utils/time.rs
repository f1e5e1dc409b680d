use chrono::Utc;

/// Current UTC calendar day in ISO form, used to key the daily request quota.
pub fn utc_day_key() -> String {
    Utc::now().date_naive().to_string()
}
