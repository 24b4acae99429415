//! HTTP routes of the evaluation service.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use axum::Json;
use axum::Router;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::post;
use futures_util::FutureExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use xp_core::{EVAL_ROUTE, EvalRequest, EvalResponse};

use crate::error::panic_message;
use crate::evaluator::Evaluator;
use crate::previewer::{ErrorViewModel, EVALUATION_ERROR_TITLE};
use crate::ui::UiHandle;

/// State shared by every request.
#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) evaluator: Arc<dyn Evaluator>,
    pub(crate) ui: UiHandle,
    pub(crate) ui_timeout: Duration,
}

pub(crate) fn router(state: AppState) -> Router {
    Router::new()
        .route(EVAL_ROUTE, post(evaluate))
        .with_state(state)
}

type Reply = (StatusCode, Json<EvalResponse>);

fn failed(status: StatusCode, error: impl Into<String>) -> Reply {
    let response = EvalResponse {
        error: Some(error.into()),
        ..EvalResponse::default()
    };
    (status, Json(response))
}

async fn evaluate(State(state): State<AppState>, body: Bytes) -> Reply {
    let request: EvalRequest = match serde_json::from_slice(&body) {
        Ok(request) => request,
        Err(e) => {
            warn!(error = %e, "Rejected malformed evaluation request");
            return failed(
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("malformed request: {e}"),
            );
        }
    };

    info!(
        class = %request.new_type_name,
        needs_rebuild = request.needs_rebuild,
        "Evaluation requested"
    );

    // Cancelled when this handler returns or is dropped, whichever comes first.
    let cancel = CancellationToken::new();
    let _guard = cancel.clone().drop_guard();

    let result = match AssertUnwindSafe(state.evaluator.evaluate(&request, cancel.clone()))
        .catch_unwind()
        .await
    {
        Ok(result) => result,
        Err(payload) => {
            let message = panic_message(&*payload);
            error!(class = %request.new_type_name, error = %message, "Evaluator panicked");
            return failed(
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("evaluator panicked: {message}"),
            );
        }
    };

    let mut response = EvalResponse::from_result(&result);

    if !result.has_result() {
        debug!(class = %request.new_type_name, "Evaluation produced no result");
        let view = ErrorViewModel::from_result(EVALUATION_ERROR_TITLE, &result);
        if let Err(e) = state.ui.notify_error(view) {
            warn!(error = %e, "Could not show evaluation error");
        }
        return (StatusCode::OK, Json(response));
    }

    match tokio::time::timeout(state.ui_timeout, state.ui.preview(result)).await {
        Ok(Ok(())) => {
            response.preview_applied = true;
            info!(
                class = %request.new_type_name,
                duration_ms = response.duration_ms,
                "Preview applied"
            );
            (StatusCode::OK, Json(response))
        }
        Ok(Err(e)) => {
            error!(class = %request.new_type_name, error = %e, "Preview was not applied");
            response.error = Some(e.to_string());
            (StatusCode::INTERNAL_SERVER_ERROR, Json(response))
        }
        Err(_) => {
            cancel.cancel();
            warn!(
                class = %request.new_type_name,
                timeout = ?state.ui_timeout,
                "UI context did not apply the preview in time"
            );
            response.error = Some(format!(
                "UI context did not respond within {} ms",
                state.ui_timeout.as_millis()
            ));
            (StatusCode::GATEWAY_TIMEOUT, Json(response))
        }
    }
}
