use crate::model::{Ms, DAY_MS};

pub const MAX_NAME_LEN: usize = 256;
pub const MAX_EMAIL_LEN: usize = 320;

pub const MAX_CAGES: usize = 100_000;
pub const MAX_PETS_PER_OWNER: usize = 1_000;
pub const MAX_WINDOWS_PER_CAGE: usize = 10_000;

/// Longest single availability window or stay.
pub const MAX_WINDOW_DAYS: Ms = 366;
pub const MAX_SPAN_DURATION_MS: Ms = MAX_WINDOW_DAYS * DAY_MS;

/// 1970-01-01T00:00:00Z
pub const MIN_VALID_TIMESTAMP_MS: Ms = 0;
/// 2200-01-01T00:00:00Z
pub const MAX_VALID_TIMESTAMP_MS: Ms = 7_258_118_400_000;
