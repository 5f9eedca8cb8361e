//! JSON-RPC over `fetch`, for the read-only public endpoint.

use async_trait::async_trait;
use gloo_net::http::Request;
use pf_contract_client::ClientError;
use pf_rpc_client::{RpcErrorObject, RpcTransport};
use serde::Deserialize;
use serde_json::{Value, json};
use std::cell::Cell;

pub struct FetchTransport {
    endpoint: String,
    next_id: Cell<u64>,
}

impl FetchTransport {
    pub fn new(endpoint: &str) -> Self {
        Self {
            endpoint: endpoint.trim_end_matches('/').to_string(),
            next_id: Cell::new(1),
        }
    }
}

#[derive(Debug, Deserialize)]
struct RpcResponse {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<RpcErrorObject>,
}

#[async_trait(?Send)]
impl RpcTransport for FetchTransport {
    async fn request(&self, method: &str, params: Value) -> Result<Value, ClientError> {
        let id = self.next_id.get();
        self.next_id.set(id + 1);
        let body = json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params,
        });

        let response = Request::post(&self.endpoint)
            .json(&body)
            .map_err(|err| ClientError::Transport(format!("{method}: {err}")))?
            .send()
            .await
            .map_err(|err| ClientError::Transport(format!("{method}: {err}")))?;

        if !response.ok() {
            let text = response.text().await.unwrap_or_default();
            return Err(ClientError::Transport(format!(
                "{method} HTTP {}: {text}",
                response.status()
            )));
        }

        let parsed: RpcResponse = response
            .json()
            .await
            .map_err(|err| ClientError::Decode(format!("{method}: {err}")))?;
        if let Some(err) = parsed.error {
            return Err(err.into());
        }
        Ok(parsed.result.unwrap_or(Value::Null))
    }
}
