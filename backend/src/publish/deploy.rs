use crate::publish::DeployTrigger;
use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum DeployTriggerError {
    #[error("deploy request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("deploy provider answered {status}: {body}")]
    Status { status: u16, body: String },
}

/// Render deploy hook: `POST {api_base}/services/{service_id}/deploys`.
pub struct RenderDeployHook {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
}

impl RenderDeployHook {
    pub fn new(
        api_base: &str,
        service_id: &str,
        api_key: String,
        timeout: Duration,
    ) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(RenderDeployHook {
            client,
            endpoint: format!(
                "{}/services/{service_id}/deploys",
                api_base.trim_end_matches('/')
            ),
            api_key,
        })
    }
}

#[async_trait]
impl DeployTrigger for RenderDeployHook {
    async fn trigger(&self) -> Result<String, DeployTriggerError> {
        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&serde_json::json!({}))
            .send()
            .await?;
        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(DeployTriggerError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let id = serde_json::from_str::<Value>(&body)
            .ok()
            .and_then(|v| v.get("id").and_then(Value::as_str).map(str::to_string))
            .unwrap_or_else(|| status.to_string());
        Ok(id)
    }
}
