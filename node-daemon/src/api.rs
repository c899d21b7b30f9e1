//! Wire types shared by the daemon and its client
//!
//! Every response is an [`ApiResponse`]: `status` is `"success"` or
//! `"error"`, `error` carries the message (empty on success), and the
//! call-specific fields are flattened alongside.

use guard_core::{ConfirmationStatus, EligibilityResult, Params, TransactionHandle};
use serde::{Deserialize, Serialize};

/// `status` of a successful call
pub const STATUS_SUCCESS: &str = "success";
/// `status` of a failed call
pub const STATUS_ERROR: &str = "error";

/// Response envelope
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    /// `success` or `error`
    pub status: String,
    /// Error message; empty on success
    #[serde(default)]
    pub error: String,
    /// Call-specific fields
    #[serde(flatten)]
    pub data: T,
}

impl<T> ApiResponse<T> {
    /// Successful response
    pub fn success(data: T) -> Self {
        Self {
            status: STATUS_SUCCESS.to_string(),
            error: String::new(),
            data,
        }
    }

    /// Failed response that still carries data
    pub fn failure(error: impl ToString, data: T) -> Self {
        Self {
            status: STATUS_ERROR.to_string(),
            error: error.to_string(),
            data,
        }
    }

    /// True if `status` is `success`
    pub fn is_success(&self) -> bool {
        self.status == STATUS_SUCCESS
    }
}

/// Body of `can`, `execute` and workflow calls
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationRequest {
    /// Caller parameters
    #[serde(default)]
    pub params: Params,
}

/// Body of an await call
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AwaitRequest {
    /// Override the configured confirmation timeout
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

/// `GET /api/operations`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationsData {
    /// Registered operations
    #[serde(default)]
    pub operations: Vec<String>,
    /// Registered workflows
    #[serde(default)]
    pub workflows: Vec<String>,
}

/// One named flag
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlagData {
    /// Flag name
    pub name: String,
    /// Reason shown when blocking
    pub reason: String,
    /// True if the flag blocks the operation
    pub blocking: bool,
}

/// `POST /api/{operation}/can`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CanData {
    /// Composite eligibility
    #[serde(default)]
    pub can: bool,
    /// Every flag in declaration order
    #[serde(default)]
    pub flags: Vec<FlagData>,
    /// Reasons of the blocking flags
    #[serde(default)]
    pub reasons: Vec<String>,
}

impl CanData {
    /// Blocking state of `name`
    pub fn flag(&self, name: &str) -> Option<bool> {
        self.flags.iter().find(|f| f.name == name).map(|f| f.blocking)
    }
}

impl From<&EligibilityResult> for CanData {
    fn from(result: &EligibilityResult) -> Self {
        Self {
            can: result.eligible(),
            flags: result
                .flags()
                .iter()
                .map(|f| FlagData {
                    name: f.name.to_string(),
                    reason: f.reason.to_string(),
                    blocking: f.blocking,
                })
                .collect(),
            reasons: result.blocking_reasons().into_iter().map(str::to_string).collect(),
        }
    }
}

/// `POST /api/{operation}`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecuteData {
    /// Submitted handle
    #[serde(default)]
    pub tx_hash: Option<TransactionHandle>,
    /// Reasons when the operation was refused
    #[serde(default)]
    pub reasons: Vec<String>,
}

/// `POST /api/tx/{hash}/await`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AwaitData {
    /// Terminal status, or the last one seen on timeout
    #[serde(default)]
    pub confirmation: Option<ConfirmationStatus>,
}

/// `POST /api/workflow/{name}`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowData {
    /// Handles of every submitted step
    #[serde(default)]
    pub tx_hashes: Vec<TransactionHandle>,
    /// Steps completed
    #[serde(default)]
    pub completed: usize,
    /// Step that halted the run
    #[serde(default)]
    pub halted_at: Option<usize>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_envelope_shape() {
        let response = ApiResponse::success(CanData {
            can: true,
            ..Default::default()
        });
        let value = serde_json::to_value(&response).unwrap();
        assert_eq!(value["status"], "success");
        assert_eq!(value["error"], "");
        assert_eq!(value["can"], true);

        let failed: ApiResponse<ExecuteData> =
            serde_json::from_str(r#"{"status":"error","error":"Unknown operation: odao.leave"}"#).unwrap();
        assert!(!failed.is_success());
        assert_eq!(failed.data.tx_hash, None);
    }
}
