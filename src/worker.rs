use log::{info, warn};

use crate::alert::send_discord_alert;
use crate::check::{CheckReport, check_target};
use crate::config::Config;
use crate::error::Error;
use crate::probe::Prober;

/// Runs one availability pass over every configured target, in order.
///
/// Returns `Ok(true)` when every target was up. Probe and alert failures are
/// absorbed into the per-target reports; the only hard error is the HTTP
/// client failing to build.
pub async fn run_checks(config: &Config) -> Result<bool, Error> {
    let prober = Prober::new(config.config.timeout_secs)?;

    // Initial configuration logging
    info!("Checking {} websites", config.sites.urls.len());
    info!(
        "Timeout: {} seconds, retries: {}",
        config.config.timeout_secs, config.config.retries
    );
    match (
        config.config.webhook_url.is_some(),
        config.config.discord_id.is_some(),
    ) {
        (true, true) => {
            info!("Webhook is set, a notification will be sent on failure");
            info!("Discord ID is set, notifications will be tagged for the user");
        }
        (true, false) => {
            info!("Webhook is set, a notification will be sent on failure");
            warn!("Discord ID is not set, notifications will not tag any user");
        }
        (false, _) => warn!("Webhook is not set, no notifications will be sent"),
    }

    let mut all_up = true;

    for url in &config.sites.urls {
        let report = check_target(&prober, url, config.config.retries).await;
        log_report(url, &report);

        if !report.up {
            all_up = false;

            if let Some(webhook_url) = &config.config.webhook_url {
                let message = down_message(url, &report);
                if !send_discord_alert(webhook_url, &message, config.config.discord_id).await {
                    warn!("Alert for {url} was not delivered");
                }
            }
        }
    }

    Ok(all_up)
}

fn log_report(url: &str, report: &CheckReport) {
    if report.up {
        info!(
            "{url}: UP (status {}, {:.0} ms)",
            report.final_status.unwrap_or_default(),
            report.latency_last_attempt_ms
        );
        if report.redirected {
            info!("{url}: redirected {} times", report.redirect_count);
            for hop in &report.redirect_chain {
                info!("    via {hop}");
            }
            if let Some(final_url) = &report.final_url {
                info!("    landing on {final_url}");
            }
        }
    } else {
        match &report.error {
            Some(error) => warn!(
                "{url}: DOWN (status {}, {:.0} ms total): {error}",
                status_text(report),
                report.latency_total_ms
            ),
            None => warn!(
                "{url}: DOWN (status {}, {:.0} ms total)",
                status_text(report),
                report.latency_total_ms
            ),
        }
    }
}

fn status_text(report: &CheckReport) -> String {
    report
        .final_status
        .map_or_else(|| "N/A".to_string(), |status| status.to_string())
}

fn down_message(url: &str, report: &CheckReport) -> String {
    format!(
        "Alert: {url} is DOWN!\nstatus: {}\nerror: {}\ntotal_ms: {:.0}",
        status_text(report),
        report.error.as_deref().unwrap_or("none"),
        report.latency_total_ms
    )
}
