use std::time::{Duration, SystemTime, UNIX_EPOCH};

// Get current timestamp in milliseconds
pub fn get_timestamp() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::from_secs(0))
        .as_millis() as i64
}

// Milliseconds elapsed since an earlier timestamp, never negative
pub fn millis_since(timestamp: i64) -> i64 {
    get_timestamp().saturating_sub(timestamp).max(0)
}
