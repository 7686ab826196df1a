use axum::{
    Form, Json, Router,
    extract::{Path, State},
    http::{StatusCode, header},
    response::{Html, IntoResponse, Redirect, Response},
    routing::{delete, get, post},
};
use bytes::Bytes;
use parking_lot::Mutex;
use serde_json::json;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use crate::{
    gemini::SchemeGenerator,
    models::GenerateRequest,
    pdf::{generate_pdf, PdfError},
    render::{asset_content_type, RenderError, Renderer, ViewSnapshot, ASSETS},
    session::{run_generation, DesignSession, Outcome, SessionError},
};

#[derive(Clone)]
pub struct AppState {
    pub session: Arc<Mutex<DesignSession>>,
    pub generator: Arc<dyn SchemeGenerator>,
    pub renderer: Arc<Renderer>,
    /// TrueType bytes for PDF export, loaded once at startup.
    pub pdf_font: Option<Arc<[u8]>>,
}

impl AppState {
    fn snapshot(&self) -> ViewSnapshot {
        ViewSnapshot::from(&*self.session.lock())
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/generate", post(generate_form))
        .route("/history/clear", post(clear_history_form))
        .route("/history/:id/select", post(select_history_form))
        .route("/static/*path", get(static_asset))
        .route("/api/state", get(api_state))
        .route("/api/generate", post(api_generate))
        .route("/api/history", delete(api_clear_history))
        .route("/api/history/:id/select", post(api_select_history))
        .route("/api/scheme/pdf", get(export_pdf))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any)
        )
        .with_state(state)
}

#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    NotFound(String),
    Conflict(String),
    BadGateway(String),
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(m) => (StatusCode::BAD_REQUEST, m),
            ApiError::NotFound(m) => (StatusCode::NOT_FOUND, m),
            ApiError::Conflict(m) => (StatusCode::CONFLICT, m),
            ApiError::BadGateway(m) => (StatusCode::BAD_GATEWAY, m),
            ApiError::Internal(m) => (StatusCode::INTERNAL_SERVER_ERROR, m),
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}

impl From<SessionError> for ApiError {
    fn from(e: SessionError) -> Self {
        match e {
            SessionError::BlankPrompt => ApiError::BadRequest(e.to_string()),
            SessionError::InFlight => ApiError::Conflict(e.to_string()),
            SessionError::UnknownEntry(_) => ApiError::NotFound(e.to_string()),
        }
    }
}

impl From<RenderError> for ApiError {
    fn from(e: RenderError) -> Self {
        tracing::error!("❌ Page render failed: {}", e);
        ApiError::Internal("failed to render page".into())
    }
}

impl From<PdfError> for ApiError {
    fn from(e: PdfError) -> Self {
        tracing::error!("❌ PDF export failed: {}", e);
        ApiError::Internal("failed to export PDF".into())
    }
}

// --- HTML surface ---

pub async fn index(State(state): State<AppState>) -> Result<Html<String>, ApiError> {
    let view = state.snapshot();
    Ok(Html(state.renderer.page(&view)?))
}

pub async fn generate_form(State(state): State<AppState>, Form(body): Form<GenerateRequest>) -> Redirect {
    match run_generation(state.session.clone(), state.generator.clone(), Some(body.prompt)).await {
        Ok(Outcome::Succeeded(_)) => tracing::info!("✅ Scheme ready"),
        Ok(Outcome::Failed(_)) => {}
        Err(e) => tracing::info!("⏭️ Generate ignored: {}", e),
    }
    Redirect::to("/")
}

pub async fn select_history_form(Path(id): Path<String>, State(state): State<AppState>) -> Result<Redirect, ApiError> {
    state.session.lock().select_history(&id)?;
    Ok(Redirect::to("/"))
}

pub async fn clear_history_form(State(state): State<AppState>) -> Redirect {
    state.session.lock().clear_history();
    Redirect::to("/")
}

pub async fn static_asset(Path(path): Path<String>) -> Response {
    match ASSETS.get_file(&path) {
        Some(file) => (
            [(header::CONTENT_TYPE, asset_content_type(&path))],
            Bytes::from_static(file.contents()),
        ).into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

// --- JSON surface ---

pub async fn api_state(State(state): State<AppState>) -> Json<ViewSnapshot> {
    Json(state.snapshot())
}

#[axum::debug_handler]
pub async fn api_generate(
    State(state): State<AppState>,
    Json(body): Json<GenerateRequest>,
) -> Result<Json<ViewSnapshot>, ApiError> {
    tracing::info!("🚀 Generating scheme for: {}", body.prompt);
    match run_generation(state.session.clone(), state.generator.clone(), Some(body.prompt)).await? {
        Outcome::Succeeded(_) => Ok(Json(state.snapshot())),
        Outcome::Failed(message) => Err(ApiError::BadGateway(message)),
    }
}

pub async fn api_select_history(Path(id): Path<String>, State(state): State<AppState>) -> Result<Json<ViewSnapshot>, ApiError> {
    let mut session = state.session.lock();
    session.select_history(&id)?;
    Ok(Json(ViewSnapshot::from(&*session)))
}

pub async fn api_clear_history(State(state): State<AppState>) -> Json<ViewSnapshot> {
    let mut session = state.session.lock();
    session.clear_history();
    Json(ViewSnapshot::from(&*session))
}

pub async fn export_pdf(State(state): State<AppState>) -> Result<Response, ApiError> {
    let (prompt, scheme) = {
        let session = state.session.lock();
        let scheme = session.scheme().cloned().ok_or_else(|| ApiError::NotFound("no scheme to export".into()))?;
        (session.prompt().to_string(), scheme)
    };
    let pdf_bytes = generate_pdf(&prompt, &scheme, state.pdf_font.as_deref())?;
    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "application/pdf"),
            (header::CONTENT_DISPOSITION, "attachment; filename=\"design_scheme.pdf\""),
        ],
        Bytes::from(pdf_bytes),
    ).into_response())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        session::{tests::FakeGenerator, GENERATION_FAILED_MESSAGE},
        store::{HistoryStore, MemorySlot},
    };
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use pretty_assertions::assert_eq;
    use serde_json::Value;
    use tower::ServiceExt;

    fn app_with(generator: FakeGenerator) -> (Router, AppState) {
        let state = AppState {
            session: Arc::new(Mutex::new(DesignSession::open(HistoryStore::new(MemorySlot::default())))),
            generator: Arc::new(generator),
            renderer: Arc::new(Renderer::new().unwrap()),
            pdf_font: None,
        };
        (router(state.clone()), state)
    }

    async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Vec<u8>) {
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, body.to_vec())
    }

    fn json_post(uri: &str, body: Value) -> Request<Body> {
        Request::post(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn api_generate_returns_snapshot_with_new_history_entry() {
        let (app, _) = app_with(FakeGenerator::default());
        let (status, body) = send(&app, json_post("/api/generate", json!({ "prompt": "a gear-locking business card holder" }))).await;
        assert_eq!(status, StatusCode::OK);

        let view: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(view["panel"], "result");
        assert_eq!(view["scheme"]["printParamLines"].as_array().unwrap().len(), 3);
        assert_eq!(view["history"][0]["prompt"], "a gear-locking business card holder");
    }

    #[tokio::test]
    async fn api_generate_maps_errors() {
        let (app, _) = app_with(FakeGenerator::failing());
        let (status, body) = send(&app, json_post("/api/generate", json!({ "prompt": "lamp" }))).await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        let error: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(error["error"], GENERATION_FAILED_MESSAGE);

        let (status, _) = send(&app, json_post("/api/generate", json!({ "prompt": "  " }))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn api_generate_rejects_while_in_flight() {
        let (app, state) = app_with(FakeGenerator::default());
        {
            let mut session = state.session.lock();
            session.set_prompt("first");
            session.begin_generation().unwrap();
        }
        let (status, _) = send(&app, json_post("/api/generate", json!({ "prompt": "second" }))).await;
        assert_eq!(status, StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn rejected_form_submit_keeps_current_prompt() {
        let (app, state) = app_with(FakeGenerator::default());
        {
            let mut session = state.session.lock();
            session.set_prompt("first");
            session.begin_generation().unwrap();
        }
        let request = Request::post("/generate")
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from("prompt=second"))
            .unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(state.session.lock().prompt(), "first");
    }

    #[tokio::test]
    async fn select_and_clear_history() {
        let (app, state) = app_with(FakeGenerator::default());
        send(&app, json_post("/api/generate", json!({ "prompt": "hook" }))).await;
        send(&app, json_post("/api/generate", json!({ "prompt": "clip" }))).await;
        let older = state.session.lock().history()[1].id.clone();

        let (status, body) = send(&app, json_post(&format!("/api/history/{older}/select"), json!({}))).await;
        assert_eq!(status, StatusCode::OK);
        let view: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(view["prompt"], "hook");
        assert_eq!(view["history"].as_array().unwrap().len(), 2);

        let (status, _) = send(&app, json_post("/api/history/nope/select", json!({}))).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, body) = send(&app, Request::delete("/api/history").body(Body::empty()).unwrap()).await;
        assert_eq!(status, StatusCode::OK);
        let view: Value = serde_json::from_slice(&body).unwrap();
        assert!(view["history"].as_array().unwrap().is_empty());
        assert_eq!(view["prompt"], "hook");
    }

    #[tokio::test]
    async fn form_submit_redirects_and_page_shows_result() {
        let (app, _) = app_with(FakeGenerator::default());
        let request = Request::post("/generate")
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from("prompt=desk+organizer"))
            .unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(response.headers()[header::LOCATION], "/");

        let (status, body) = send(&app, Request::get("/").body(Body::empty()).unwrap()).await;
        assert_eq!(status, StatusCode::OK);
        let html = String::from_utf8(body).unwrap();
        assert!(html.contains("desk organizer"));
        assert!(html.contains("Print parameters"));
    }

    #[tokio::test]
    async fn pdf_export_requires_a_scheme() {
        let (app, _) = app_with(FakeGenerator::default());
        let (status, _) = send(&app, Request::get("/api/scheme/pdf").body(Body::empty()).unwrap()).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        send(&app, json_post("/api/generate", json!({ "prompt": "planter" }))).await;
        let response = app.clone().oneshot(Request::get("/api/scheme/pdf").body(Body::empty()).unwrap()).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "application/pdf");
    }

    #[tokio::test]
    async fn serves_embedded_stylesheet() {
        let (app, _) = app_with(FakeGenerator::default());
        let (status, body) = send(&app, Request::get("/static/style.css").body(Body::empty()).unwrap()).await;
        assert_eq!(status, StatusCode::OK);
        assert!(String::from_utf8(body).unwrap().contains(".results.dimmed"));

        let (status, _) = send(&app, Request::get("/static/missing.css").body(Body::empty()).unwrap()).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
