/// Pipeline time in nanoseconds.
pub type ClockTime = u64;

pub const SECOND: ClockTime = 1_000_000_000;
pub const MSECOND: ClockTime = 1_000_000;

/// Computes `value * num / denom` without intermediate overflow.
///
/// Rounds down. Returns `None` for a zero denominator or a result that does
/// not fit in 64 bits.
pub fn scale_u64(value: u64, num: u64, denom: u64) -> Option<u64> {
    if denom == 0 {
        return None;
    }
    let scaled = value as u128 * num as u128 / denom as u128;
    u64::try_from(scaled).ok()
}

/// Backend-native rational time: `value / timescale` seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MediaTime {
    pub value: i64,
    pub timescale: i32,
}

impl MediaTime {
    pub const fn new(value: i64, timescale: i32) -> Self {
        Self { value, timescale }
    }

    pub const fn from_nanos(nanos: u64) -> Self {
        Self {
            value: nanos as i64,
            timescale: SECOND as i32,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.timescale > 0 && self.value >= 0
    }

    /// Exact conversion to nanoseconds; `None` if the time is invalid.
    pub fn to_nanos(&self) -> Option<ClockTime> {
        if !self.is_valid() {
            return None;
        }
        scale_u64(self.value as u64, SECOND, self.timescale as u64)
    }
}
