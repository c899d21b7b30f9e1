//! HTTP boundary
//!
//! Routes:
//!
//! ```text
//! GET  /api/operations              registered operations and workflows
//! POST /api/:operation/can          evaluate preconditions
//! POST /api/:operation              evaluate, then submit if eligible
//! POST /api/tx/:hash/await          wait for a submitted handle
//! POST /api/workflow/:name          run a workflow
//! GET  /metrics                     Prometheus text format
//! ```

use crate::api::{
    ApiResponse, AwaitData, AwaitRequest, CanData, ExecuteData, OperationRequest, OperationsData, WorkflowData,
};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use guard_core::{Error, Guard, Outcome, TransactionHandle};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing::{error, info, info_span, warn, Instrument};

/// Shared handler state
#[derive(Clone)]
pub struct AppState {
    /// Guard serving every call
    pub guard: Arc<Guard>,
}

type Reply<T> = (StatusCode, Json<ApiResponse<T>>);

fn ok<T>(data: T) -> Reply<T> {
    (StatusCode::OK, Json(ApiResponse::success(data)))
}

fn status_for(err: &Error) -> StatusCode {
    match err {
        Error::UnknownOperation(_) => StatusCode::NOT_FOUND,
        Error::InvalidParams(_) => StatusCode::BAD_REQUEST,
        Error::RequirementUnmet { .. } => StatusCode::FORBIDDEN,
        Error::SigningUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        Error::Query(_) => StatusCode::BAD_GATEWAY,
        Error::Submission(_) => StatusCode::BAD_GATEWAY,
        Error::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
        Error::WorkflowHalted(_) => StatusCode::CONFLICT,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn failed<T: Default>(err: &Error) -> Reply<T> {
    (status_for(err), Json(ApiResponse::failure(err, T::default())))
}

async fn list_operations(State(state): State<AppState>) -> Reply<OperationsData> {
    let registry = state.guard.registry();
    ok(OperationsData {
        operations: registry.operation_names().map(str::to_string).collect(),
        workflows: registry.workflow_names().map(str::to_string).collect(),
    })
}

async fn can(
    State(state): State<AppState>,
    Path(operation): Path<String>,
    body: Option<Json<OperationRequest>>,
) -> Reply<CanData> {
    let request = body.map(|Json(r)| r).unwrap_or_default();

    match state.guard.can(&operation, &request.params).await {
        Ok(result) => ok(CanData::from(&result)),
        Err(e) => {
            warn!("can {} failed: {}", operation, e);
            failed(&e)
        }
    }
}

async fn execute(
    State(state): State<AppState>,
    Path(operation): Path<String>,
    body: Option<Json<OperationRequest>>,
) -> Reply<ExecuteData> {
    let request = body.map(|Json(r)| r).unwrap_or_default();

    match state.guard.submit_if_eligible(&operation, &request.params).await {
        Ok(Outcome::Submitted { handle, .. }) => {
            info!("Submitted {} as {}", operation, handle);
            ok(ExecuteData {
                tx_hash: Some(handle),
                reasons: Vec::new(),
            })
        }
        Ok(Outcome::Blocked(result)) => {
            let reasons: Vec<String> = result.blocking_reasons().into_iter().map(str::to_string).collect();
            let message = format!("{} is not eligible: {}", operation, reasons.join("; "));
            (
                StatusCode::CONFLICT,
                Json(ApiResponse::failure(message, ExecuteData { tx_hash: None, reasons })),
            )
        }
        Err(e) => {
            warn!("execute {} failed: {}", operation, e);
            failed(&e)
        }
    }
}

async fn await_tx(
    State(state): State<AppState>,
    Path(hash): Path<String>,
    body: Option<Json<AwaitRequest>>,
) -> Reply<AwaitData> {
    let request = body.map(|Json(r)| r).unwrap_or_default();

    let handle: TransactionHandle = match hash.parse() {
        Ok(handle) => handle,
        Err(e) => return (StatusCode::BAD_REQUEST, Json(ApiResponse::failure(e, AwaitData::default()))),
    };
    let timeout = request.timeout_secs.map(Duration::from_secs);

    match state.guard.await_confirmation(&handle, timeout).await {
        Ok(status) => ok(AwaitData {
            confirmation: Some(status),
        }),
        Err(Error::Timeout { handle, status }) => {
            let err = Error::Timeout {
                handle,
                status: status.clone(),
            };
            (
                status_for(&err),
                Json(ApiResponse::failure(
                    &err,
                    AwaitData {
                        confirmation: Some(status),
                    },
                )),
            )
        }
        Err(e) => failed(&e),
    }
}

async fn run_workflow(
    State(state): State<AppState>,
    Path(name): Path<String>,
    body: Option<Json<OperationRequest>>,
) -> Reply<WorkflowData> {
    let request = body.map(|Json(r)| r).unwrap_or_default();
    let span = info_span!("workflow_request", workflow = %name);

    match state.guard.run_workflow(&name, &request.params).instrument(span).await {
        Ok(handles) => ok(WorkflowData {
            completed: handles.len(),
            tx_hashes: handles,
            halted_at: None,
        }),
        Err(Error::WorkflowHalted(halted)) => {
            error!("{}", halted);
            let data = WorkflowData {
                tx_hashes: halted.handles.clone(),
                completed: halted.completed,
                halted_at: Some(halted.step),
            };
            (StatusCode::CONFLICT, Json(ApiResponse::failure(halted, data)))
        }
        Err(e) => failed(&e),
    }
}

async fn metrics(State(state): State<AppState>) -> Response {
    match state.guard.metrics().render() {
        Ok(body) => body.into_response(),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Failed to export metrics: {}", e),
        )
            .into_response(),
    }
}

/// Build the router
pub fn router(guard: Arc<Guard>) -> Router {
    Router::new()
        .route("/api/operations", get(list_operations))
        .route("/api/tx/:hash/await", post(await_tx))
        .route("/api/workflow/:name", post(run_workflow))
        .route("/api/:operation/can", post(can))
        .route("/api/:operation", post(execute))
        .route("/metrics", get(metrics))
        .with_state(AppState { guard })
}

/// Serve on `listener` until `shutdown` resolves
pub async fn serve(
    listener: TcpListener,
    guard: Arc<Guard>,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> std::io::Result<()> {
    if let Ok(addr) = listener.local_addr() {
        info!("Node daemon listening on {}", addr);
    }
    axum::serve(listener, router(guard))
        .with_graceful_shutdown(shutdown)
        .await
}
