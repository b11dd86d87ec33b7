use chrono::Utc;

/// Epoch milliseconds; every timestamp column in the store carries this.
pub fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}
