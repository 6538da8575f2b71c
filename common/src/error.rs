use std::num::ParseIntError;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BitrateError {
    #[error("bitrate must be >= 0, got {0}")]
    Negative(i128),

    #[error("bitrate {0} exceeds the maximum of {max} bps", max = i64::MAX)]
    OutOfRange(i128),

    #[error("bitrate is not an integer: {0}")]
    Parse(#[from] ParseIntError),

    #[error("transfer time is undefined when bitrate = 0")]
    ZeroRate,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ThrottleError {
    #[error("throttled reader cannot be configured with a 0 bps bitrate")]
    ZeroBitrate,

    #[error("chunk size of {0} bytes cannot be used for buffer allocations")]
    ChunkTooLarge(u64),
}
