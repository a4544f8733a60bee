use async_trait::async_trait;
use serde::Serialize;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::debug;

use crate::balance::AssetEntry;
use crate::error::{DefierError, Result};
use crate::interfaces::bridge::{
    BridgeAndExecuteRequest, BridgeProvider, BridgeRequest, TransferRequest,
};

/// HTTP gateway in front of the cross-chain bridge SDK.
///
/// Every operation is a JSON POST under `base_url`. Non-2xx replies that still
/// carry a JSON body are handed back as-is so the drivers can read the
/// provider's own failure message.
#[derive(Clone)]
pub struct HttpBridgeProvider {
    base_url: String,
    http: reqwest::Client,
}

impl HttpBridgeProvider {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| DefierError::Http(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http,
        })
    }

    async fn post<T: Serialize + ?Sized>(&self, path: &str, body: &T) -> Result<Value> {
        let url = format!("{}/{}", self.base_url, path.trim_start_matches('/'));
        let response = self
            .http
            .post(url)
            .json(body)
            .send()
            .await
            .map_err(|e| DefierError::Http(format!("bridge transport failure: {e}")))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| DefierError::Http(format!("bridge read failure: {e}")))?;
        debug!(path = %path, status = %status, "Bridge gateway replied");

        match serde_json::from_str::<Value>(&text) {
            Ok(value) if status.is_success() => Ok(value),
            Ok(value) if value.is_object() => Ok(with_failure_flag(value)),
            Ok(_) | Err(_) if status.is_success() => Err(DefierError::Serialization(format!(
                "bridge {path} returned non-JSON body"
            ))),
            _ => Err(DefierError::Provider(format!("bridge {path} http {status}: {text}"))),
        }
    }
}

fn with_failure_flag(mut value: Value) -> Value {
    if let Some(map) = value.as_object_mut() {
        map.entry("success").or_insert(Value::Bool(false));
    }
    value
}

fn parse_assets(value: Value) -> Result<Vec<AssetEntry>> {
    let assets = match value {
        Value::Array(_) => value,
        Value::Object(mut map) => map
            .remove("assets")
            .or_else(|| map.remove("balances"))
            .unwrap_or(Value::Array(Vec::new())),
        _ => Value::Array(Vec::new()),
    };
    serde_json::from_value(assets)
        .map_err(|e| DefierError::Serialization(format!("bridge balances decode failure: {e}")))
}

#[async_trait]
impl BridgeProvider for HttpBridgeProvider {
    async fn unified_balances(
        &self,
        wallet: &str,
        include_breakdown: bool,
    ) -> Result<Vec<AssetEntry>> {
        let value = self
            .post(
                "balances",
                &json!({"wallet": wallet, "includeBreakdown": include_breakdown}),
            )
            .await?;
        if value.get("success").and_then(|v| v.as_bool()) == Some(false) {
            return Err(DefierError::Provider(format!(
                "bridge balances failed: {}",
                value.get("error").cloned().unwrap_or(Value::Null)
            )));
        }
        parse_assets(value)
    }

    async fn transfer(&self, request: &TransferRequest) -> Result<Value> {
        self.post("transfer", request).await
    }

    async fn bridge(&self, request: &BridgeRequest) -> Result<Value> {
        self.post("bridge", request).await
    }

    async fn bridge_and_execute(&self, request: &BridgeAndExecuteRequest) -> Result<Value> {
        self.post("bridge-and-execute", request).await
    }
}
