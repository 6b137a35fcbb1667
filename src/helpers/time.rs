use chrono::{DateTime, TimeDelta, Utc};

use crate::utils::constants::SAFETY_MARGIN_SECONDS_DEFAULT;

/// Time source injected into everything that compares against "now".
pub trait Clock: Send + Sync + 'static {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

pub fn get_token_safety_margin(safety_margin_seconds_settings: Option<u64>) -> TimeDelta {
    let seconds = safety_margin_seconds_settings.unwrap_or(SAFETY_MARGIN_SECONDS_DEFAULT);
    TimeDelta::try_seconds(i64::try_from(seconds).unwrap_or(i64::MAX)).unwrap_or(TimeDelta::MAX)
}

pub fn from_unix(ts: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(ts, 0).unwrap_or(DateTime::<Utc>::MIN_UTC)
}
