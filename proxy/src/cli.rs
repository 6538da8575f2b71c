use crate::config::ProxyConfig;
use clap::{Args, Parser, Subcommand};
use common::Bitrate;

#[derive(Parser, Debug)]
#[command(name = "bandwidth-proxy")]
#[command(version, about = "HTTP proxy with a runtime-adjustable download bitrate cap", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the proxy and its control endpoint
    Serve(ServeArgs),

    /// Change the max bitrate of a running proxy
    SetLimit {
        /// Control endpoint address (host:port or :port)
        #[arg(long, env = "PROXY_CONTROL_ADDR", default_value = ":8081")]
        control_addr: String,

        /// New max bitrate in bits per second, 0 = unlimited
        #[arg(allow_hyphen_values = true)]
        bitrate: i64,
    },

    /// Print the max bitrate of a running proxy
    GetLimit {
        /// Control endpoint address (host:port or :port)
        #[arg(long, env = "PROXY_CONTROL_ADDR", default_value = ":8081")]
        control_addr: String,
    },
}

#[derive(Args, Debug)]
pub struct ServeArgs {
    /// Config file path, defaults apply when omitted
    #[arg(short, long, env = "PROXY_CONFIG")]
    pub config: Option<String>,

    /// Proxy listen address
    #[arg(long, env = "PROXY_LISTEN_ADDR")]
    pub listen_addr: Option<String>,

    /// Control endpoint listen address
    #[arg(long, env = "PROXY_CONTROL_ADDR")]
    pub control_addr: Option<String>,

    /// Initial max bitrate in bits per second, 0 = unlimited
    #[arg(long, env = "PROXY_MAX_BITRATE")]
    pub max_bitrate: Option<Bitrate>,

    /// Send every request to this base URI (reverse-proxy mode)
    #[arg(long, env = "PROXY_UPSTREAM")]
    pub upstream: Option<String>,

    /// Override log level (trace, debug, info, warn, error)
    #[arg(long)]
    pub log_level: Option<String>,

    /// Override log directory
    #[arg(long)]
    pub log_dir: Option<String>,
}

impl ServeArgs {
    /// Overrides file values with the flags that were given.
    pub fn apply(self, config: &mut ProxyConfig) {
        if let Some(listen_addr) = self.listen_addr {
            config.listen_addr = listen_addr;
        }
        if let Some(control_addr) = self.control_addr {
            config.control_addr = control_addr;
        }
        if let Some(max_bitrate) = self.max_bitrate {
            config.max_bitrate = max_bitrate;
        }
        if let Some(upstream) = self.upstream {
            config.upstream = Some(upstream);
        }
        if let Some(log_level) = self.log_level {
            config.log_level = log_level;
        }
        if let Some(log_dir) = self.log_dir {
            config.log_dir = Some(log_dir);
        }
    }
}
