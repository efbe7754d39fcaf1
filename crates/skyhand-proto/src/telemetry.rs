use serde::{Deserialize, Serialize};

/// One telemetry sample. Every reading is optional on its own: a failed
/// query leaves that field `None` without invalidating the others.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Telemetry {
    pub ts_unix_ms: i64,
    pub battery_percent: Option<u8>,
    pub temperature_c: Option<i32>,
    pub height_cm: Option<i32>,
    pub flight_time_s: Option<u32>,
}

impl Telemetry {
    pub fn empty_now() -> Self {
        Self { ts_unix_ms: now_unix_ms(), ..Self::default() }
    }
}

pub fn now_unix_ms() -> i64 {
    (time::OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000) as i64
}
