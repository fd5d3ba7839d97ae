//! Best-effort webhook notifications
//!
//! Every notification runs in its own task. Failures are logged at `warn`
//! and never reach the caller.

use chrono::Utc;
use serde_json::{json, Value};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::fallback::redact_endpoint;

const EMBED_COLOR: u32 = 0x9945FF;
const WEBHOOK_TIMEOUT: Duration = Duration::from_secs(10);

/// Posts Discord-style embeds to an optional webhook
#[derive(Debug, Clone, Default)]
pub struct Notifier {
    target: Option<(reqwest::Client, String)>,
}

impl Notifier {
    /// No-op notifier when `webhook_url` is `None`
    pub fn new(webhook_url: Option<String>) -> Self {
        let target = webhook_url.and_then(|url| {
            match reqwest::Client::builder().timeout(WEBHOOK_TIMEOUT).build() {
                Ok(client) => Some((client, url)),
                Err(e) => {
                    warn!(error = %e, "Failed to build webhook client, notifications disabled");
                    None
                }
            }
        });
        Self { target }
    }

    pub fn is_enabled(&self) -> bool {
        self.target.is_some()
    }

    pub fn notify_session_created(&self, session_id: Uuid, wallet_count: usize) -> Option<JoinHandle<()>> {
        self.send(embed(
            "Bundler Session Created",
            &[
                ("Session", session_id.to_string()),
                ("Wallets Generated", wallet_count.to_string()),
            ],
        ))
    }

    pub fn notify_volume_started(&self, wallet: &str, asset: &str, trade_sol: f64) -> Option<JoinHandle<()>> {
        self.send(embed(
            "Volume Session Started",
            &[
                ("Wallet", wallet.to_string()),
                ("Token", asset.to_string()),
                ("Trade Size", format!("{} SOL", trade_sol)),
            ],
        ))
    }

    fn send(&self, payload: Value) -> Option<JoinHandle<()>> {
        let (client, url) = self.target.clone()?;
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            warn!("No async runtime, notification dropped");
            return None;
        };
        Some(runtime.spawn(async move {
            let endpoint = redact_endpoint(&url);
            match client.post(&url).json(&payload).send().await {
                Ok(response) if response.status().is_success() => {
                    debug!(%endpoint, "Webhook notification delivered");
                }
                Ok(response) => {
                    warn!(%endpoint, status = response.status().as_u16(), "Webhook rejected notification");
                }
                Err(e) => {
                    warn!(%endpoint, error = %e.without_url(), "Webhook notification failed");
                }
            }
        }))
    }
}

fn embed(title: &str, fields: &[(&str, String)]) -> Value {
    let fields: Vec<Value> = fields
        .iter()
        .map(|(name, value)| json!({ "name": name, "value": value, "inline": true }))
        .collect();

    json!({
        "embeds": [{
            "title": title,
            "color": EMBED_COLOR,
            "fields": fields,
            "timestamp": Utc::now().to_rfc3339(),
        }]
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;

    #[tokio::test]
    async fn test_disabled_notifier_is_noop() {
        let notifier = Notifier::new(None);
        assert!(!notifier.is_enabled());
        assert!(notifier.notify_session_created(Uuid::new_v4(), 25).is_none());
    }

    #[tokio::test]
    async fn test_session_created_posts_embed() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/hook")
            .match_body(Matcher::PartialJson(json!({
                "embeds": [{ "title": "Bundler Session Created", "color": EMBED_COLOR }]
            })))
            .with_status(204)
            .create_async()
            .await;

        let notifier = Notifier::new(Some(format!("{}/hook", server.url())));
        let handle = notifier
            .notify_session_created(Uuid::new_v4(), 25)
            .unwrap();
        handle.await.unwrap();
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_failure_is_swallowed() {
        let mut server = mockito::Server::new_async().await;
        let _broken = server
            .mock("POST", "/hook")
            .with_status(500)
            .create_async()
            .await;

        let notifier = Notifier::new(Some(format!("{}/hook", server.url())));
        let handle = notifier
            .notify_volume_started("wallet", "mint", 0.01)
            .unwrap();
        assert!(handle.await.is_ok());
    }
}
