//! HTTP forwarding proxy whose response bodies are paced to a global,
//! runtime-adjustable bitrate.
//!
//! [`ProxyServer`] forwards requests and shapes every response with the limit
//! held in a [`common::SharedLimit`]; [`ControlServer`] reads and replaces that
//! limit over HTTP, and [`ControlClient`] is its remote counterpart.

pub mod cli;
pub mod client;
pub mod config;
pub mod control;
pub mod error;
pub mod forward;
pub mod server;
pub mod telemetry;


pub use client::ControlClient;
pub use config::ProxyConfig;
pub use control::{ControlServer, LimitResponse};
pub use error::{ProxyError, Result};
pub use forward::{Forwarder, MAX_BITRATE_HEADER, ProxyBody, Upstream};
pub use server::ProxyServer;
