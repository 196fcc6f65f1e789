/// 获取当前 UTC 时间戳（毫秒）
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// 生成资源 ID (UUID v4)
pub fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Clamp a lifecycle stamp so it never precedes the previous one.
///
/// Wall clocks can step backwards; `billRequestedAt >= openedAt` etc. must
/// still hold, so every later stamp is taken as `max(now, floor)`.
pub fn monotonic_stamp(floor: Option<i64>, now: i64) -> i64 {
    match floor {
        Some(prev) if prev > now => prev,
        _ => now,
    }
}
