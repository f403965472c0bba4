use std::time::Duration;

/// How often configured autopost times are compared with the local clock.
/// Shorter than a minute so no minute is skipped when a tick is delayed;
/// repeated ticks inside one minute are deduplicated by the runner.
pub const AUTOPOST_CHECK_INTERVAL: Duration = Duration::from_secs(20);

/// The sweep itself runs once per retention horizon; checking hourly bounds
/// how far past the horizon a purge can slip.
pub const RETENTION_CHECK_INTERVAL: Duration = Duration::from_secs(60 * 60);
