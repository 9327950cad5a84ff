use chrono::{Local, TimeZone};
use std::time::{SystemTime, UNIX_EPOCH};

/// seconds since `1970-1-1 00:00:00`,named as [UNIX_EPOCH]
pub fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// inode timestamps are 32 bits wide
pub fn now() -> u32 {
    now_secs().min(u32::MAX as u64) as u32
}

/// render a timestamp as local `YYYY-MM-DD HH:MM:SS`
pub fn human_time(secs: u64) -> String {
    match Local.timestamp_opt(secs as i64, 0).single() {
        Some(time) => time.format("%Y-%m-%d %H:%M:%S").to_string(),
        None => String::from("-"),
    }
}
