/// Default look-ahead window for calendar queries.
pub const DEFAULT_HORIZON_DAYS: i64 = 7;

/// Lead time added to actions that are due "now". at(1) cannot reliably
/// run something immediately.
pub const NOW_LEAD_MINUTES: i64 = 1;

/// Job records are kept this long after their event ended.
pub const JOB_RETENTION_DAYS: i64 = 1;

/// Version written into every persisted state record.
pub const STATE_SCHEMA_VERSION: u32 = 1;
