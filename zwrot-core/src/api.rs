//! HTTP API consumed by the wizard front-end.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use serde::Deserialize;
use serde_json::json;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{error, info, warn};

use crate::format;
use crate::helper::{ArtifactSet, HelperApi};
use crate::loader::{InvoiceStore, LoadState};
use crate::wizard::{
    LaunchStatus, MemoryHistory, MergeView, RefreshJobView, TaskStatus, WizardController,
    WizardStep, WizardView,
};

/// Application state shared by all route handlers.
#[derive(Clone)]
pub struct AppState {
    /// Loaded invoice collection
    pub store: Arc<InvoiceStore>,
    /// Wizard step and refresh job owner
    pub wizard: Arc<WizardController>,
    /// History the wizard step token lives in
    pub history: Arc<MemoryHistory>,
    /// Helper process client
    pub helper: Arc<dyn HelperApi>,
}

#[derive(Debug, Deserialize)]
pub struct NavigateRequest {
    pub step: String,
}

/// Health check endpoint.
async fn health_check() -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "service": "zwrot-core",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// Helper health check endpoint.
///
/// Asks the helper process for its status; answers 503 when it cannot
/// be reached.
async fn helper_health_check(State(state): State<AppState>) -> Result<Json<serde_json::Value>, StatusCode> {
    let status = state.helper.status().await.map_err(|e| {
        error!("Helper health check failed: {}", e);
        StatusCode::SERVICE_UNAVAILABLE
    })?;

    Ok(Json(json!({
        "status": "ok",
        "helper": status
    })))
}

/// Invoice data with its statistics.
///
/// 200 with the snapshot when loaded, 202 while loading and 503 after a
/// failed load.
async fn list_invoices(State(state): State<AppState>) -> Response {
    match state.store.state().await {
        LoadState::Ready(snapshot) => (StatusCode::OK, Json(snapshot.as_ref())).into_response(),
        LoadState::Loading => (StatusCode::ACCEPTED, Json(json!({ "status": "loading" }))).into_response(),
        LoadState::Failed(e) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "status": "error", "message": e.to_string() })),
        )
            .into_response(),
    }
}

/// Tab-separated summary for pasting into a spreadsheet.
async fn invoice_summary(State(state): State<AppState>) -> Result<Response, StatusCode> {
    let snapshot = state.store.snapshot().await.ok_or_else(|| {
        warn!("Summary requested before invoice data was loaded");
        StatusCode::SERVICE_UNAVAILABLE
    })?;

    let body = format::summary_tsv(&snapshot.invoices);
    Ok((
        [(header::CONTENT_TYPE, "text/tab-separated-values; charset=utf-8")],
        body,
    )
        .into_response())
}

async fn wizard_view(State(state): State<AppState>) -> Json<WizardView> {
    Json(state.wizard.view().await)
}

async fn navigate(
    State(state): State<AppState>,
    Json(request): Json<NavigateRequest>,
) -> Result<Json<WizardView>, StatusCode> {
    let step = request.step.parse::<WizardStep>().map_err(|e| {
        warn!("Navigation rejected: {}", e);
        StatusCode::BAD_REQUEST
    })?;

    state.wizard.navigate(step).await;
    Ok(Json(state.wizard.view().await))
}

async fn next_step(State(state): State<AppState>) -> Json<WizardView> {
    state.wizard.next().await;
    Json(state.wizard.view().await)
}

async fn previous_step(State(state): State<AppState>) -> Json<WizardView> {
    state.wizard.previous().await;
    Json(state.wizard.view().await)
}

/// Moves the history back one entry, as the browser back button would.
///
/// The wizard picks the change up through its history listener.
async fn history_back(State(state): State<AppState>) -> Json<serde_json::Value> {
    let moved = state.history.back();
    Json(json!({ "moved": moved }))
}

async fn history_forward(State(state): State<AppState>) -> Json<serde_json::Value> {
    let moved = state.history.forward();
    Json(json!({ "moved": moved }))
}

async fn trigger_refresh(State(state): State<AppState>) -> Json<RefreshJobView> {
    info!("Refresh requested");
    Json(state.wizard.trigger_refresh().await)
}

async fn launch_external_action(State(state): State<AppState>) -> Json<serde_json::Value> {
    let status: LaunchStatus = state.wizard.launch_external_action().await;
    Json(json!({ "status": status }))
}

async fn merge_documents(State(state): State<AppState>) -> Json<MergeView> {
    Json(state.wizard.merge_documents().await)
}

async fn delete_artifacts(
    State(state): State<AppState>,
    Path(target): Path<String>,
) -> Result<Json<serde_json::Value>, StatusCode> {
    let set = match target.as_str() {
        "drive" => ArtifactSet::DriveFiles,
        "desktop" => ArtifactSet::DesktopFolder,
        _ => return Err(StatusCode::NOT_FOUND),
    };

    let status: TaskStatus = state.wizard.delete_artifacts(set).await;
    Ok(Json(json!({ "target": set, "status": status })))
}

/// Creates the application router.
///
/// # Arguments
///
/// * `state` - Store, wizard and helper shared by the handlers
///
/// # Returns
///
/// Returns a configured Axum Router.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/health/helper", get(helper_health_check))
        .route("/api/invoices", get(list_invoices))
        .route("/api/invoices/summary.tsv", get(invoice_summary))
        .route("/api/wizard", get(wizard_view))
        .route("/api/wizard/navigate", post(navigate))
        .route("/api/wizard/next", post(next_step))
        .route("/api/wizard/previous", post(previous_step))
        .route("/api/wizard/back", post(history_back))
        .route("/api/wizard/forward", post(history_forward))
        .route("/api/refresh", post(trigger_refresh))
        .route("/api/launch", post(launch_external_action))
        .route("/api/merge", post(merge_documents))
        .route("/api/cleanup/:target", post(delete_artifacts))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::Request;
    use pretty_assertions::assert_eq;
    use serde::de::DeserializeOwned;
    use tower::ServiceExt;

    use crate::error::{HelperError, LoadError};
    use crate::helper::{
        DeleteOutcome, HelperStatus, JobStatus, LaunchOutcome, MergeOutcome, TriggerOutcome,
    };
    use crate::loader::InvoiceSource;
    use crate::models::Invoice;
    use crate::wizard::{History, WizardSettings};

    const INVOICES: &str = r#"[
        {"numer": "FV/1/2024", "liczba_uslug": 4, "data_wystawienia": "2024-01-31",
         "data_wykonania_uslugi": "2024-01-10", "miasto_wykonania": "Kraków",
         "cena_jednostkowa": 37.625, "kwota_faktury": 150.50}
    ]"#;

    struct StaticSource(Result<&'static str, LoadError>);

    #[async_trait]
    impl InvoiceSource for StaticSource {
        async fn fetch(&self) -> Result<Vec<Invoice>, LoadError> {
            let raw = self.0.clone()?;
            serde_json::from_str(raw).map_err(|e| LoadError::Malformed(e.to_string()))
        }
    }

    /// Helper that answers every call successfully, or none when offline.
    struct StubHelper {
        online: bool,
    }

    impl StubHelper {
        fn check(&self) -> Result<(), HelperError> {
            if self.online {
                Ok(())
            } else {
                Err(HelperError::Decode("offline".to_string()))
            }
        }
    }

    #[async_trait]
    impl HelperApi for StubHelper {
        async fn trigger_refresh(&self) -> Result<TriggerOutcome, HelperError> {
            self.check()?;
            Ok(TriggerOutcome::Triggered)
        }

        async fn workflow_status(&self) -> Result<JobStatus, HelperError> {
            self.check()?;
            Ok(JobStatus::Pending)
        }

        async fn launch_external_action(&self) -> Result<LaunchOutcome, HelperError> {
            self.check()?;
            Ok(LaunchOutcome::AlreadyRunning)
        }

        async fn merge_documents(&self) -> Result<MergeOutcome, HelperError> {
            self.check()?;
            Ok(MergeOutcome {
                ok: true,
                path: Some("/tmp/faktury_logopeda.pdf".to_string()),
                pages: Some(3),
                files: Some(1),
                message: None,
            })
        }

        async fn delete_artifacts(&self, _set: ArtifactSet) -> Result<DeleteOutcome, HelperError> {
            self.check()?;
            Ok(DeleteOutcome {
                ok: true,
                deleted: 1,
                message: None,
            })
        }

        async fn status(&self) -> Result<HelperStatus, HelperError> {
            self.check()?;
            Ok(HelperStatus {
                server: "ok".to_string(),
                luxmed_running: true,
            })
        }
    }

    fn test_state(source: Result<&'static str, LoadError>, online: bool) -> AppState {
        let store = Arc::new(InvoiceStore::new(Arc::new(StaticSource(source))));
        let history = Arc::new(MemoryHistory::default());
        let helper: Arc<dyn HelperApi> = Arc::new(StubHelper { online });
        let wizard = Arc::new(WizardController::new(
            history.clone(),
            helper.clone(),
            store.clone(),
            WizardSettings::default(),
        ));
        AppState {
            store,
            wizard,
            history,
            helper,
        }
    }

    async fn loaded_state() -> AppState {
        let state = test_state(Ok(INVOICES), true);
        state.store.refetch().await.expect("Should load");
        state
    }

    async fn read_json<T: DeserializeOwned>(res: axum::http::Response<Body>) -> T {
        let bytes = axum::body::to_bytes(res.into_body(), 1024 * 1024)
            .await
            .expect("read body");
        serde_json::from_slice(&bytes).expect("json")
    }

    fn get_req(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).expect("request")
    }

    fn post_req(uri: &str, body: Option<serde_json::Value>) -> Request<Body> {
        let builder = Request::builder().method("POST").uri(uri);
        match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .expect("request"),
            None => builder.body(Body::empty()).expect("request"),
        }
    }

    #[tokio::test]
    async fn test_health() {
        let app = create_router(test_state(Ok("[]"), true));

        let res = app.oneshot(get_req("/health")).await.expect("response");
        assert_eq!(res.status(), StatusCode::OK);

        let body: serde_json::Value = read_json(res).await;
        assert_eq!(body["service"], "zwrot-core");
    }

    #[tokio::test]
    async fn test_helper_health_reports_unreachable_helper() {
        let app = create_router(test_state(Ok("[]"), false));
        let res = app.oneshot(get_req("/health/helper")).await.expect("response");
        assert_eq!(res.status(), StatusCode::SERVICE_UNAVAILABLE);

        let app = create_router(test_state(Ok("[]"), true));
        let res = app.oneshot(get_req("/health/helper")).await.expect("response");
        assert_eq!(res.status(), StatusCode::OK);
        let body: serde_json::Value = read_json(res).await;
        assert_eq!(body["helper"]["luxmed_running"], true);
    }

    #[tokio::test]
    async fn test_invoices_loading_then_ready() {
        let state = test_state(Ok(INVOICES), true);
        let app = create_router(state.clone());

        let res = app.clone().oneshot(get_req("/api/invoices")).await.expect("response");
        assert_eq!(res.status(), StatusCode::ACCEPTED);

        state.store.refetch().await.expect("Should load");

        let res = app.oneshot(get_req("/api/invoices")).await.expect("response");
        assert_eq!(res.status(), StatusCode::OK);
        let body: serde_json::Value = read_json(res).await;
        assert_eq!(body["invoices"].as_array().map(Vec::len), Some(1));
        assert_eq!(body["stats"]["invoiceCount"], 1);
        assert_eq!(body["stats"]["dateRange"]["from"], "2024-01-10");
        assert_eq!(body["stats"]["monthlyBreakdown"][0]["month"], "styczeń 2024");
    }

    #[tokio::test]
    async fn test_invoices_load_failure_is_503() {
        let state = test_state(Err(LoadError::Unavailable("HTTP 404".to_string())), true);
        let _ = state.store.refetch().await;

        let res = create_router(state)
            .oneshot(get_req("/api/invoices"))
            .await
            .expect("response");
        assert_eq!(res.status(), StatusCode::SERVICE_UNAVAILABLE);

        let body: serde_json::Value = read_json(res).await;
        assert_eq!(body["status"], "error");
    }

    #[tokio::test]
    async fn test_summary_tsv() {
        let app = create_router(loaded_state().await);

        let res = app.oneshot(get_req("/api/invoices/summary.tsv")).await.expect("response");
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(
            res.headers()[header::CONTENT_TYPE],
            "text/tab-separated-values; charset=utf-8"
        );

        let bytes = axum::body::to_bytes(res.into_body(), 1024 * 1024)
            .await
            .expect("read body");
        let text = String::from_utf8(bytes.to_vec()).expect("utf8");
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[1], "=\"FV/1/2024\"\t10.01.2024\t150,50\twysłano\t");
    }

    #[tokio::test]
    async fn test_summary_before_load_is_503() {
        let app = create_router(test_state(Ok("[]"), true));
        let res = app.oneshot(get_req("/api/invoices/summary.tsv")).await.expect("response");
        assert_eq!(res.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_navigate_and_step_buttons() {
        let state = loaded_state().await;
        let app = create_router(state.clone());

        let res = app
            .clone()
            .oneshot(post_req("/api/wizard/navigate", Some(json!({ "step": "step3" }))))
            .await
            .expect("response");
        assert_eq!(res.status(), StatusCode::OK);
        let view: serde_json::Value = read_json(res).await;
        assert_eq!(view["step"], "step3");

        let res = app.clone().oneshot(post_req("/api/wizard/next", None)).await.expect("response");
        let view: serde_json::Value = read_json(res).await;
        assert_eq!(view["step"], "summary");

        let res = app.oneshot(post_req("/api/wizard/previous", None)).await.expect("response");
        let view: serde_json::Value = read_json(res).await;
        assert_eq!(view["step"], "step3");

        assert_eq!(state.history.current_token().as_deref(), Some("step3"));
    }

    #[tokio::test]
    async fn test_navigate_unknown_step_is_400() {
        let app = create_router(loaded_state().await);
        let res = app
            .oneshot(post_req("/api/wizard/navigate", Some(json!({ "step": "finish" }))))
            .await
            .expect("response");
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_history_back_moves_wizard() {
        let state = loaded_state().await;
        state.wizard.navigate(WizardStep::Step1).await;
        state.wizard.navigate(WizardStep::Step2).await;
        let app = create_router(state.clone());

        let res = app.oneshot(post_req("/api/wizard/back", None)).await.expect("response");
        let body: serde_json::Value = read_json(res).await;
        assert_eq!(body["moved"], true);

        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
        assert_eq!(state.wizard.current_step().await, WizardStep::Step1);
    }

    #[tokio::test]
    async fn test_refresh_returns_job_view() {
        let app = create_router(loaded_state().await);

        let res = app.clone().oneshot(post_req("/api/refresh", None)).await.expect("response");
        let job: serde_json::Value = read_json(res).await;
        assert_eq!(job["state"], "polling");
        let run_id = job["run_id"].clone();
        assert!(run_id.is_string());

        let res = app.oneshot(post_req("/api/refresh", None)).await.expect("response");
        let job: serde_json::Value = read_json(res).await;
        assert_eq!(job["run_id"], run_id);
    }

    #[tokio::test]
    async fn test_helper_actions() {
        let app = create_router(loaded_state().await);

        let res = app.clone().oneshot(post_req("/api/launch", None)).await.expect("response");
        let body: serde_json::Value = read_json(res).await;
        assert_eq!(body["status"], "already_running");

        let res = app.clone().oneshot(post_req("/api/merge", None)).await.expect("response");
        let body: serde_json::Value = read_json(res).await;
        assert_eq!(body["status"], "done");
        assert_eq!(body["outcome"]["pages"], 3);

        let res = app
            .clone()
            .oneshot(post_req("/api/cleanup/desktop", None))
            .await
            .expect("response");
        let body: serde_json::Value = read_json(res).await;
        assert_eq!(body["target"], "desktop_folder");
        assert_eq!(body["status"], "done");

        let res = app.oneshot(post_req("/api/cleanup/photos", None)).await.expect("response");
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
    }
}
