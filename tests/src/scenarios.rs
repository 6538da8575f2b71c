use crate::mock_client::MockHttpClient;
use anyhow::{Result, bail};
use common::Bitrate;
use proxy::{ControlClient, ProxyError};
use std::time::{Duration, Instant};
use tracing::{error, info};

const MEGABIT: u64 = 1024 * 1024;

/// Rates exercised by the throughput run, in bits per second
pub const SCENARIO_RATES: [u64; 3] = [MEGABIT, 3 * MEGABIT, 10 * MEGABIT];

/// Allowed relative deviation from the expected transfer time
pub const TOLERANCE: f64 = 0.10;

pub struct ScenarioResults {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub details: Vec<ScenarioResult>,
}

pub struct ScenarioResult {
    pub name: String,
    pub passed: bool,
    pub error: Option<String>,
    pub duration_ms: u128,
}

impl ScenarioResults {
    fn new() -> Self {
        Self {
            total: 0,
            passed: 0,
            failed: 0,
            details: Vec::new(),
        }
    }

    fn add(&mut self, result: ScenarioResult) {
        self.total += 1;
        if result.passed {
            self.passed += 1;
            info!("PASS {} ({} ms)", result.name, result.duration_ms);
        } else {
            self.failed += 1;
            error!(
                "FAIL {}: {}",
                result.name,
                result.error.as_deref().unwrap_or("unknown error")
            );
        }
        self.details.push(result);
    }
}

/// Payload that takes `seconds` at `bits_per_second`.
pub fn payload_for(bits_per_second: u64, seconds: u64) -> usize {
    (bits_per_second * seconds / 8) as usize
}

/// Whether `actual` is within [`TOLERANCE`] of `expected`.
pub fn within_tolerance(actual: Duration, expected: Duration) -> bool {
    let expected = expected.as_secs_f64();
    (actual.as_secs_f64() - expected).abs() <= expected * TOLERANCE
}

/// Drives a running proxy through its control endpoint and checks measured
/// download times against the configured limits.
pub async fn run_throughput(
    proxy_addr: &str,
    control_addr: &str,
    target_base: &str,
    seconds: u64,
) -> Result<ScenarioResults> {
    info!("=== Starting Throughput Scenarios ===");

    let control = ControlClient::new(control_addr);
    let client = MockHttpClient::new(proxy_addr.to_string());
    let previous = control.get_limit().await?;
    info!("Proxy limit before run: {} bps", previous);

    let mut results = ScenarioResults::new();

    results.add(unlimited(&control, &client, target_base).await);
    for rate in SCENARIO_RATES {
        results.add(limited(&control, &client, target_base, rate, seconds).await);
    }
    results.add(invalid_update(&control).await);

    control.set_limit(previous.bits_per_second() as i64).await?;

    info!("=== Throughput Scenarios Complete ===");
    info!(
        "Total: {}, Passed: {}, Failed: {}",
        results.total, results.passed, results.failed
    );

    Ok(results)
}

async fn unlimited(control: &ControlClient, client: &MockHttpClient, target_base: &str) -> ScenarioResult {
    let start = Instant::now();
    let outcome = async {
        control.set_limit(0).await?;
        let download = client.get(&format!("{target_base}/large")).await?;
        if download.max_bitrate.as_deref() != Some("0") {
            bail!("expected {} header 0, got {:?}", proxy::MAX_BITRATE_HEADER, download.max_bitrate);
        }
        Ok::<(), anyhow::Error>(())
    }
    .await;

    finish("Unlimited pass-through".to_string(), start, outcome)
}

async fn limited(
    control: &ControlClient,
    client: &MockHttpClient,
    target_base: &str,
    rate: u64,
    seconds: u64,
) -> ScenarioResult {
    let start = Instant::now();
    let name = format!("{} bps download", rate);

    let outcome = async {
        let applied = control.set_limit(rate as i64).await?;
        if applied != Bitrate::new(rate)? {
            bail!("proxy applied {} instead of {}", applied, rate);
        }

        let size = payload_for(rate, seconds);
        let download = client.get(&format!("{target_base}/bytes/{size}")).await?;
        let expected = Duration::from_secs(seconds);

        if !download.status.is_success() {
            bail!("status {}", download.status);
        }
        if download.bytes != size {
            bail!("received {} of {} bytes", download.bytes, size);
        }
        if download.max_bitrate.as_deref() != Some(rate.to_string().as_str()) {
            bail!("unexpected header {:?}", download.max_bitrate);
        }
        if !within_tolerance(download.duration, expected) {
            bail!("took {:?}, expected {:?} +- 10%", download.duration, expected);
        }
        Ok::<(), anyhow::Error>(())
    }
    .await;

    finish(name, start, outcome)
}

async fn invalid_update(control: &ControlClient) -> ScenarioResult {
    let start = Instant::now();
    let outcome = async {
        let before = control.get_limit().await?;
        match control.set_limit(-1).await {
            Err(ProxyError::Rejected { .. }) => {}
            other => bail!("negative update was not rejected: {:?}", other),
        }
        let after = control.get_limit().await?;
        if before != after {
            bail!("limit changed from {} to {}", before, after);
        }
        Ok::<(), anyhow::Error>(())
    }
    .await;

    finish("Invalid update is rejected".to_string(), start, outcome)
}

fn finish(name: String, start: Instant, outcome: Result<()>) -> ScenarioResult {
    ScenarioResult {
        name,
        passed: outcome.is_ok(),
        error: outcome.err().map(|e| e.to_string()),
        duration_ms: start.elapsed().as_millis(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_matches_rate() {
        assert_eq!(payload_for(MEGABIT, 4), 512 * 1024);
        assert_eq!(payload_for(10 * MEGABIT, 1), 1_310_720);
    }

    #[test]
    fn tolerance_window() {
        let expected = Duration::from_secs(4);
        assert!(within_tolerance(Duration::from_millis(3700), expected));
        assert!(within_tolerance(Duration::from_millis(4390), expected));
        assert!(!within_tolerance(Duration::from_millis(3500), expected));
        assert!(!within_tolerance(Duration::from_millis(4500), expected));
    }
}
