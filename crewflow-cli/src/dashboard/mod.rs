//! Browser dashboard.
//!
//! `GET /` renders the form, `POST /research` runs the pipeline and renders
//! its outcome, `GET /api/status` returns the probe report as JSON and
//! `GET /reports/:file` downloads a written report.

mod error;
pub mod view;

use axum::extract::{Form, Path, Query, State};
use axum::http::{header, StatusCode};
use axum::response::{Html, IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use crewflow::errors::ErrorKind;
use crewflow::events::CollectingEventSink;
use crewflow::probe::ProbeReport;
use crewflow::report::REPORT_SUFFIX;
use crewflow::research::{ResearchPipeline, Topic};
use error::{ApiError, ApiResult};
use serde::Deserialize;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use view::{DashboardView, RunOutcome, StageProgress};

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pipeline: Arc<ResearchPipeline>,
}

impl AppState {
    /// Creates state around a pipeline.
    pub const fn new(pipeline: Arc<ResearchPipeline>) -> Self {
        Self { pipeline }
    }
}

/// Builds the dashboard router.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/research", post(start_research))
        .route("/api/status", get(status))
        .route("/reports/:file", get(download_report))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

/// Serves the dashboard until Ctrl-C.
pub async fn serve(state: AppState, addr: SocketAddr) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "Dashboard listening");

    axum::serve(listener, build_router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    info!("Shutting down dashboard");
}

#[derive(Debug, Deserialize)]
struct IndexQuery {
    topic: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ResearchForm {
    #[serde(default)]
    topic: String,
}

async fn index(State(state): State<AppState>, Query(query): Query<IndexQuery>) -> Html<String> {
    let view = DashboardView {
        status: Some(state.pipeline.probe().probe().await),
        ..DashboardView::with_topic(query.topic.unwrap_or_default())
    };
    Html(view::render(&view))
}

async fn start_research(
    State(state): State<AppState>,
    Form(form): Form<ResearchForm>,
) -> (StatusCode, Html<String>) {
    let Ok(topic) = Topic::new(&form.topic) else {
        let view = DashboardView {
            notice: Some("Please enter a research topic.".to_string()),
            ..DashboardView::with_topic(form.topic)
        };
        return (StatusCode::BAD_REQUEST, Html(view::render(&view)));
    };

    let sink = Arc::new(CollectingEventSink::new());
    let result = state.pipeline.run_observed(&topic, sink.clone()).await;
    let progress: Vec<StageProgress> = sink
        .stage_progress()
        .into_iter()
        .map(|(stage, phase)| StageProgress { stage, state: phase })
        .collect();

    let (code, outcome) = match result {
        Ok(result) => {
            let report_file = result
                .report_path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_default();
            info!(run_id = %result.run_id, file = %report_file, "Dashboard run finished");
            (
                StatusCode::OK,
                RunOutcome::Completed {
                    report_file,
                    report: result.research_content,
                    blog_post: result.final_output,
                    progress,
                },
            )
        }
        Err(err) => {
            warn!(topic = %topic, error = %err, "Dashboard run failed");
            let code = match err.kind() {
                ErrorKind::BackendUnavailable => StatusCode::SERVICE_UNAVAILABLE,
                ErrorKind::InvalidInput => StatusCode::BAD_REQUEST,
                ErrorKind::GenerationFailed | ErrorKind::PersistFailed => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            };
            (
                code,
                RunOutcome::Failed {
                    message: err.to_string(),
                    remediation: err.remediation(&state.pipeline.model().name),
                    progress,
                },
            )
        }
    };

    let view = DashboardView {
        outcome: Some(outcome),
        ..DashboardView::with_topic(topic.as_str())
    };
    (code, Html(view::render(&view)))
}

async fn status(State(state): State<AppState>) -> Json<ProbeReport> {
    Json(state.pipeline.probe().probe().await)
}

async fn download_report(
    State(state): State<AppState>,
    Path(file): Path<String>,
) -> ApiResult<Response> {
    if !file.ends_with(REPORT_SUFFIX) || file.contains(['/', '\\']) {
        return Err(ApiError::BadRequest(format!("'{file}' is not a report name")));
    }

    let path = state.pipeline.persister().output_dir().join(&file);
    let body = match tokio::fs::read_to_string(&path).await {
        Ok(body) => body,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Err(ApiError::NotFound),
        Err(err) => return Err(ApiError::Internal(err.to_string())),
    };

    Ok((
        [
            (header::CONTENT_TYPE, "text/markdown; charset=utf-8".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{file}\""),
            ),
        ],
        body,
    )
        .into_response())
}
