//! Bandwidth shaping primitives shared by the proxy and its tooling.
//!
//! - [`Bitrate`]: a validated bits-per-second value with exact conversions.
//! - [`ThrottledReader`]: an `AsyncRead` adapter pacing reads to a bitrate.
//! - [`SharedLimit`]: the lock-free cell holding the current global limit.

pub mod bitrate;
pub mod error;
pub mod shared_limit;
pub mod throttled;

pub use bitrate::Bitrate;
pub use error::{BitrateError, ThrottleError};
pub use shared_limit::SharedLimit;
pub use throttled::{CHUNK_WINDOW, ThrottledReader};
