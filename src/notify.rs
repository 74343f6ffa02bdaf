//! Post-import notifications. Delivery is best-effort: the importer logs a
//! failed notification and still reports the import as done.

use anyhow::{anyhow, Result};
use serde::Serialize;
use std::time::Duration;

use crate::model::MediaRecord;

pub trait Notifier: Send + Sync {
    fn notify(&self, record: &MediaRecord) -> Result<()>;
}

pub struct NoopNotifier;

impl Notifier for NoopNotifier {
    fn notify(&self, _record: &MediaRecord) -> Result<()> {
        Ok(())
    }
}

#[derive(Serialize)]
struct ImportedMessage<'a> {
    id: &'a str,
}

/// POSTs `{"id": "<digest>"}` to a URL.
pub struct WebhookNotifier {
    url: String,
    agent: ureq::Agent,
}

impl WebhookNotifier {
    pub fn new(url: &str, timeout: Duration) -> Self {
        Self {
            url: url.to_string(),
            agent: ureq::AgentBuilder::new().timeout(timeout).build(),
        }
    }
}

impl Notifier for WebhookNotifier {
    fn notify(&self, record: &MediaRecord) -> Result<()> {
        self.agent
            .post(&self.url)
            .set("Content-Type", "application/json")
            .send_json(ImportedMessage { id: &record.id })
            .map_err(|e| anyhow!("Webhook request failed: {}", e))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_body() {
        let body = serde_json::to_string(&ImportedMessage { id: "caf73e97" }).unwrap();
        assert_eq!(body, r#"{"id":"caf73e97"}"#);
    }
}
