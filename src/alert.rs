use std::time::Duration;

use log::{info, warn};
use reqwest::Client;
use serde::Serialize;

/// Discord gets this long to answer, independent of the probe timeout.
const ALERT_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Serialize)]
struct DiscordMessage {
    content: String,
}

/// Posts `message` to a Discord webhook, tagging `discord_id` when set.
///
/// Returns whether the webhook accepted the message. Delivery problems are
/// logged and swallowed so a broken webhook can never take the run down
/// with it.
pub async fn send_discord_alert(webhook_url: &str, message: &str, discord_id: Option<u64>) -> bool {
    let client = match Client::builder().timeout(ALERT_TIMEOUT).build() {
        Ok(client) => client,
        Err(e) => {
            warn!("Failed to build the webhook client: {e}");
            return false;
        }
    };

    // If discord_id is None, we don't want to mention anyone
    let tag = discord_id.map_or(String::new(), |id| format!("<@{id}> "));

    let payload = DiscordMessage {
        content: format!("{tag}{message}"),
    };

    match client.post(webhook_url).json(&payload).send().await {
        Ok(response) if response.status().is_success() => {
            info!(
                "Discord alert delivered (status {})",
                response.status().as_u16()
            );
            true
        }
        Ok(response) => {
            warn!(
                "Discord webhook rejected alert (status {})",
                response.status().as_u16()
            );
            false
        }
        Err(e) => {
            warn!("Failed to send Discord alert: {e}");
            false
        }
    }
}
