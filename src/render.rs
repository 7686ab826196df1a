use chrono::Local;
use include_dir::{include_dir, Dir};
use serde::Serialize;
use serde_with::skip_serializing_none;
use tera::{Context, Tera};
use thiserror::Error;

use crate::{models::DesignScheme, session::DesignSession};

static TEMPLATES: Dir<'_> = include_dir!("$CARGO_MANIFEST_DIR/templates");
pub static ASSETS: Dir<'_> = include_dir!("$CARGO_MANIFEST_DIR/static");

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("template error: {0}")] Template(#[from] tera::Error),
    #[error("template {0} is not valid UTF-8")] NotUtf8(String),
}

/// Which result panel the page shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Panel {
    Empty,
    Loading,
    Result,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SchemeView {
    pub style: String,
    pub dimensions: String,
    pub friendly_design: String,
    pub modeling_keys: String,
    pub print_param_lines: Vec<String>,
    pub failure_risk_lines: Vec<String>,
}

impl From<&DesignScheme> for SchemeView {
    fn from(scheme: &DesignScheme) -> Self {
        Self {
            style: scheme.style.clone(),
            dimensions: scheme.dimensions.clone(),
            friendly_design: scheme.friendly_design.clone(),
            modeling_keys: scheme.modeling_keys.clone(),
            print_param_lines: scheme.print_param_lines().into_iter().map(String::from).collect(),
            failure_risk_lines: scheme.failure_risk_lines().into_iter().map(String::from).collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntryView {
    pub id: String,
    pub prompt: String,
    pub created_at: String,
}

/// Everything needed to draw the page, detached from the session lock.
#[skip_serializing_none]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewSnapshot {
    pub prompt: String,
    pub loading: bool,
    pub can_submit: bool,
    pub panel: Panel,
    pub dimmed: bool,
    pub error: Option<String>,
    pub scheme: Option<SchemeView>,
    pub history: Vec<HistoryEntryView>,
}

impl From<&DesignSession> for ViewSnapshot {
    fn from(session: &DesignSession) -> Self {
        let loading = session.is_generating();
        let panel = match (loading, session.scheme()) {
            (true, _) => Panel::Loading,
            (false, Some(_)) => Panel::Result,
            (false, None) => Panel::Empty,
        };
        Self {
            prompt: session.prompt().to_string(),
            loading,
            can_submit: !loading && !session.prompt().trim().is_empty(),
            panel,
            dimmed: loading,
            error: session.error().map(String::from),
            scheme: session.scheme().map(SchemeView::from),
            history: session.history()
                .iter()
                .map(|item| HistoryEntryView {
                    id: item.id.clone(),
                    prompt: item.prompt.clone(),
                    created_at: item.timestamp.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S").to_string(),
                })
                .collect(),
        }
    }
}

pub struct Renderer {
    tera: Tera,
}

impl Renderer {
    /// Loads every embedded template; names are their paths under `templates/`.
    pub fn new() -> Result<Self, RenderError> {
        let mut tera = Tera::default();
        for file in TEMPLATES.files() {
            let name = file.path().to_string_lossy().into_owned();
            let source = file.contents_utf8().ok_or_else(|| RenderError::NotUtf8(name.clone()))?;
            tera.add_raw_template(&name, source)?;
        }
        Ok(Self { tera })
    }

    pub fn page(&self, view: &ViewSnapshot) -> Result<String, RenderError> {
        let mut context = Context::new();
        context.insert("view", view);
        Ok(self.tera.render("index.html", &context)?)
    }
}

/// Content type for an embedded asset, by extension.
pub fn asset_content_type(path: &str) -> &'static str {
    match path.rsplit('.').next() {
        Some("css") => "text/css; charset=utf-8",
        Some("js") => "text/javascript; charset=utf-8",
        Some("svg") => "image/svg+xml",
        _ => "application/octet-stream",
    }
}
