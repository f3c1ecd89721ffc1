//! C1: monotonic-enough millisecond timestamps used for `eligible_at`.

use chrono::Utc;

pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}
