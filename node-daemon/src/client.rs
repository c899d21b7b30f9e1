//! Typed client for the daemon API

use crate::api::{
    ApiResponse, AwaitData, AwaitRequest, CanData, ExecuteData, OperationRequest, OperationsData, WorkflowData,
};
use crate::error::{DaemonError, Result};
use guard_core::{ConfirmationStatus, Params, TransactionHandle};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;
use tracing::debug;

/// HTTP client for a running daemon
#[derive(Debug, Clone)]
pub struct DaemonClient {
    base_url: String,
    http: reqwest::Client,
}

impl DaemonClient {
    /// Client for `base_url`, e.g. `http://127.0.0.1:8280`
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http: reqwest::Client::new(),
        }
    }

    /// Daemon base URL
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn call<B, T>(&self, verb: &str, target: &str, path: &str, body: Option<&B>) -> Result<ApiResponse<T>>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let url = format!("{}{}", self.base_url, path);
        debug!("{} {}", if body.is_some() { "POST" } else { "GET" }, url);

        let request = match body {
            Some(body) => self.http.post(&url).json(body),
            None => self.http.get(&url),
        };
        let response = request
            .send()
            .await
            .map_err(|e| DaemonError::client(verb, target, e))?;

        // Error responses carry the same envelope, so the body is read whatever the status
        response
            .json::<ApiResponse<T>>()
            .await
            .map_err(|e| DaemonError::client(verb, target, e))
    }

    fn success<T>(verb: &str, target: &str, response: ApiResponse<T>) -> Result<T> {
        if response.is_success() {
            Ok(response.data)
        } else {
            Err(DaemonError::client(verb, target, response.error))
        }
    }

    /// Registered operations and workflows
    pub async fn operations(&self) -> Result<OperationsData> {
        let response = self
            .call::<(), _>("list", "operations", "/api/operations", None)
            .await?;
        Self::success("list", "operations", response)
    }

    /// Evaluate the preconditions of `operation`
    pub async fn can(&self, operation: &str, params: &Params) -> Result<CanData> {
        let body = OperationRequest {
            params: params.clone(),
        };
        let response = self
            .call("check", operation, &format!("/api/{}/can", operation), Some(&body))
            .await?;
        Self::success("check", operation, response)
    }

    /// Evaluate and, if eligible, submit `operation`
    pub async fn execute(&self, operation: &str, params: &Params) -> Result<TransactionHandle> {
        let body = OperationRequest {
            params: params.clone(),
        };
        let response: ApiResponse<ExecuteData> = self
            .call("execute", operation, &format!("/api/{}", operation), Some(&body))
            .await?;
        Self::success("execute", operation, response)?
            .tx_hash
            .ok_or_else(|| DaemonError::client("execute", operation, "no transaction hash in response"))
    }

    /// Wait for `handle`; `None` uses the daemon's configured timeout
    pub async fn await_confirmation(
        &self,
        handle: &TransactionHandle,
        timeout: Option<Duration>,
    ) -> Result<ConfirmationStatus> {
        let target = handle.to_string();
        let body = AwaitRequest {
            timeout_secs: timeout.map(|t| t.as_secs()),
        };
        let response: ApiResponse<AwaitData> = self
            .call("await", &target, &format!("/api/tx/{}/await", handle), Some(&body))
            .await?;
        Self::success("await", &target, response)?
            .confirmation
            .ok_or_else(|| DaemonError::client("await", &target, "no confirmation in response"))
    }

    /// Run workflow `name`
    pub async fn run_workflow(&self, name: &str, params: &Params) -> Result<Vec<TransactionHandle>> {
        let body = OperationRequest {
            params: params.clone(),
        };
        let response: ApiResponse<WorkflowData> = self
            .call("run", name, &format!("/api/workflow/{}", name), Some(&body))
            .await?;

        if response.is_success() {
            return Ok(response.data.tx_hashes);
        }
        match response.data.halted_at {
            Some(step) => Err(DaemonError::WorkflowHalted {
                step,
                completed: response.data.completed,
                tx_hashes: response.data.tx_hashes,
                reason: format!("Could not run {}: {}", name, response.error),
            }),
            None => Err(DaemonError::client("run", name, response.error)),
        }
    }

    /// Prometheus text exposition
    pub async fn metrics(&self) -> Result<String> {
        let url = format!("{}/metrics", self.base_url);
        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| DaemonError::client("fetch", "metrics", e))?;
        response
            .text()
            .await
            .map_err(|e| DaemonError::client("fetch", "metrics", e))
    }
}
