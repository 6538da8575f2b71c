use crate::error::BitrateError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

const NANOS_PER_SEC: u128 = 1_000_000_000;

/// A non-negative rate in bits per second.
///
/// The value is kept within `0..=i64::MAX` so every conversion below can be
/// carried out in 128-bit arithmetic without overflow. A zero rate is a valid
/// value (the proxy reads it as "unlimited") but has no finite transfer time.
#[derive(
    Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(try_from = "i64", into = "u64")]
pub struct Bitrate(u64);

impl Bitrate {
    pub const ZERO: Bitrate = Bitrate(0);

    /// Builds a bitrate from any integer up to 64 bits wide, signed or not.
    ///
    /// Negative values and values above `i64::MAX` are rejected instead of
    /// being wrapped into a large positive rate.
    pub fn new<T: Into<i128>>(bits_per_second: T) -> Result<Self, BitrateError> {
        let value: i128 = bits_per_second.into();
        if value < 0 {
            return Err(BitrateError::Negative(value));
        }
        if value > i128::from(i64::MAX) {
            return Err(BitrateError::OutOfRange(value));
        }
        // 0..=i64::MAX always fits
        Ok(Self(value as u64))
    }

    /// Trusts a value that already went through `new`.
    pub(crate) const fn from_validated(bits_per_second: u64) -> Self {
        Self(bits_per_second)
    }

    pub const fn bits_per_second(self) -> u64 {
        self.0
    }

    pub const fn byte_rate(self) -> u64 {
        self.0 / 8
    }

    pub const fn is_zero(self) -> bool {
        self.0 == 0
    }

    pub fn transfer_bits(self, bits: u64) -> Result<Duration, BitrateError> {
        self.transfer(u128::from(bits))
    }

    pub fn transfer_bytes(self, bytes: u64) -> Result<Duration, BitrateError> {
        self.transfer(u128::from(bytes) * 8)
    }

    pub fn duration_to_bits(self, duration: Duration) -> u64 {
        let rate = u128::from(self.0);
        // split into whole seconds and the sub-second remainder so that
        // neither product can exceed u128
        let whole = rate * u128::from(duration.as_secs());
        let partial = rate * u128::from(duration.subsec_nanos()) / NANOS_PER_SEC;
        u64::try_from(whole + partial).unwrap_or(u64::MAX)
    }

    pub fn duration_to_bytes(self, duration: Duration) -> u64 {
        self.duration_to_bits(duration) / 8
    }

    fn transfer(self, bits: u128) -> Result<Duration, BitrateError> {
        if self.is_zero() {
            return Err(BitrateError::ZeroRate);
        }

        let rate = u128::from(self.0);
        let secs = bits / rate;
        let nanos = (bits % rate) * NANOS_PER_SEC / rate;

        Ok(match u64::try_from(secs) {
            // nanos < NANOS_PER_SEC
            Ok(secs) => Duration::new(secs, nanos as u32),
            Err(_) => Duration::MAX,
        })
    }
}

impl fmt::Display for Bitrate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Bitrate {
    type Err = BitrateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value: i128 = s.trim().parse()?;
        Self::new(value)
    }
}

impl TryFrom<i64> for Bitrate {
    type Error = BitrateError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl TryFrom<u64> for Bitrate {
    type Error = BitrateError;

    fn try_from(value: u64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Bitrate> for u64 {
    fn from(bitrate: Bitrate) -> Self {
        bitrate.0
    }
}
