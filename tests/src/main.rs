pub mod mock_target;
pub mod scenarios;

use anyhow::{Result, bail};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "integration-tests")]
#[command(about = "Throughput testing tool for the bandwidth-limiting proxy")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check download times through a running proxy at several limits
    Throughput {
        /// Proxy server address
        #[arg(short, long, default_value = "127.0.0.1:8080")]
        proxy_addr: String,

        /// Proxy control endpoint address
        #[arg(short, long, default_value = "127.0.0.1:8081")]
        control_addr: String,

        /// Base URL of the mock target as seen by the proxy
        #[arg(short, long, default_value = "http://127.0.0.1:9090")]
        target: String,

        /// Expected seconds per download
        #[arg(short, long, default_value = "4")]
        seconds: u64,
    },
    /// Start the mock target server
    MockTarget {
        /// HTTP server port
        #[arg(long, default_value = "9090")]
        http_port: u16,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Throughput {
            proxy_addr,
            control_addr,
            target,
            seconds,
        } => {
            tracing::info!("Running throughput scenarios");
            tracing::info!("Proxy: {}, Control: {}, Target: {}", proxy_addr, control_addr, target);

            let results = scenarios::run_throughput(&proxy_addr, &control_addr, &target, seconds).await?;
            if results.failed > 0 {
                bail!("{} of {} scenarios failed", results.failed, results.total);
            }
        }
        Commands::MockTarget { http_port } => {
            tracing::info!("Starting mock target server on port {}", http_port);
            mock_target::MockHttpServer::new(http_port).run().await?;
        }
    }

    Ok(())
}
