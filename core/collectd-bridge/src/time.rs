use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crate::sys::cdtime_t;

const FRACTION_BITS: u32 = 30;
const FRACTION_MASK: u64 = (1 << FRACTION_BITS) - 1;
const NANOS_PER_SEC: u64 = 1_000_000_000;
const MAX_SECS: u64 = u64::MAX >> FRACTION_BITS;

/// Time as the daemon stores it: a fixed-point number of seconds with 30 fractional bits.
///
/// The resolution is 2^-30 s (about 0.93 ns). Converting a [`SystemTime`] or a [`Duration`]
/// rounds to the nearest unit, converting back rounds to the nearest nanosecond, so a round trip
/// is off by at most one nanosecond.
///
/// The same representation is used for instants (seconds since the Unix epoch) and intervals.
/// Zero has a special meaning for the daemon: "now" for a timestamp, "use the default" for an
/// interval.
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct CdTime(pub cdtime_t);

impl CdTime {
    pub const ZERO: CdTime = CdTime(0);

    fn from_parts(secs: u64, nanos: u32) -> CdTime {
        if secs > MAX_SECS {
            return CdTime(u64::MAX);
        }
        let frac = ((u64::from(nanos) << FRACTION_BITS) + NANOS_PER_SEC / 2) / NANOS_PER_SEC;
        CdTime((secs << FRACTION_BITS) | frac)
    }

    fn to_parts(self) -> (u64, u32) {
        let secs = self.0 >> FRACTION_BITS;
        // adding 2^29 rounds to the nearest nanosecond instead of truncating
        let nanos = ((self.0 & FRACTION_MASK) * NANOS_PER_SEC + (1 << (FRACTION_BITS - 1))) >> FRACTION_BITS;
        (secs, nanos as u32)
    }

    pub fn as_duration(self) -> Duration {
        let (secs, nanos) = self.to_parts();
        Duration::new(secs, nanos)
    }

    /// Interprets this value as an instant, i.e. a duration since the Unix epoch.
    pub fn as_system_time(self) -> SystemTime {
        UNIX_EPOCH + self.as_duration()
    }
}

impl From<Duration> for CdTime {
    fn from(value: Duration) -> Self {
        CdTime::from_parts(value.as_secs(), value.subsec_nanos())
    }
}

impl From<SystemTime> for CdTime {
    /// Instants before the Unix epoch cannot be represented and become [`CdTime::ZERO`].
    fn from(value: SystemTime) -> Self {
        match value.duration_since(UNIX_EPOCH) {
            Ok(diff) => CdTime::from(diff),
            Err(_) => CdTime::ZERO,
        }
    }
}

impl From<CdTime> for Duration {
    fn from(value: CdTime) -> Self {
        value.as_duration()
    }
}

impl From<CdTime> for SystemTime {
    fn from(value: CdTime) -> Self {
        value.as_system_time()
    }
}
