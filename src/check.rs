use std::time::{Duration, Instant};

use log::warn;

use crate::probe::{Probe, ProbeSuccess};

/// Aggregated outcome of all attempts against one target.
///
/// Exactly one of `error` and `final_status` is set once the retry loop is
/// done: a response of any status ends the loop, so a populated status can
/// never be followed by a failed attempt.
#[derive(Debug, Clone, Default)]
pub struct CheckReport {
    pub up: bool,
    pub final_status: Option<u16>,
    pub final_url: Option<String>,
    pub redirected: bool,
    pub redirect_count: usize,
    pub redirect_chain: Vec<String>,
    pub latency_last_attempt_ms: f64,
    pub latency_total_ms: f64,
    pub error: Option<String>,
}

/// Checks one target, making up to `retries` additional attempts.
///
/// Only transport-level failures are retried. An HTTP response ends the loop
/// whatever its status: a 500 is a down target, not a reason to try again.
/// The report reflects the last attempt made; earlier attempts only count
/// toward `latency_total_ms`.
pub async fn check_target(prober: &impl Probe, url: &str, retries: u32) -> CheckReport {
    let mut report = CheckReport::default();
    let start_total = Instant::now();

    for attempt in 0..=retries {
        match prober.probe(url).await {
            Ok(response) => {
                report.latency_last_attempt_ms = to_millis(response.elapsed);
                apply_response(&mut report, response);
                break;
            }
            Err(failure) => {
                report.latency_last_attempt_ms = to_millis(failure.elapsed);
                report.error = Some(failure.to_string());
                if attempt < retries {
                    warn!("Attempt {} for {url} failed ({failure}), retrying", attempt + 1);
                }
            }
        }
    }

    report.latency_total_ms = to_millis(start_total.elapsed());
    report
}

fn apply_response(report: &mut CheckReport, response: ProbeSuccess) {
    report.final_status = Some(response.status);
    report.final_url = Some(response.final_url);
    report.redirect_count = response.redirect_chain.len();
    report.redirected = report.redirect_count > 0;
    report.redirect_chain = response.redirect_chain;
    report.up = (200..=399).contains(&response.status);
    report.error = None;
}

fn to_millis(elapsed: Duration) -> f64 {
    elapsed.as_secs_f64() * 1000.0
}
