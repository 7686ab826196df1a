use chrono::Utc;
use parking_lot::Mutex;
use std::sync::Arc;
use thiserror::Error;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::{
    gemini::{GeminiError, SchemeGenerator},
    models::{DesignScheme, HistoryItem},
    store::{insert_capped, HistoryStore},
};

/// The one message users see for any failed generation.
pub const GENERATION_FAILED_MESSAGE: &str =
    "Failed to generate the design scheme. Please check your network connection and try again.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Generating,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Succeeded(DesignScheme),
    Failed(String),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SessionError {
    #[error("prompt is blank")] BlankPrompt,
    #[error("a generation is already in progress")] InFlight,
    #[error("no history entry with id {0}")] UnknownEntry(String),
}

/// Everything the page shows. History is written through to the store on every change.
pub struct DesignSession {
    prompt: String,
    phase: Phase,
    scheme: Option<DesignScheme>,
    error: Option<String>,
    history: Vec<HistoryItem>,
    store: HistoryStore,
}

impl DesignSession {
    pub fn open(store: HistoryStore) -> Self {
        let history = store.load();
        Self { prompt: String::new(), phase: Phase::Idle, scheme: None, error: None, history, store }
    }

    pub fn prompt(&self) -> &str { &self.prompt }
    pub fn phase(&self) -> Phase { self.phase }
    pub fn is_generating(&self) -> bool { self.phase == Phase::Generating }
    pub fn scheme(&self) -> Option<&DesignScheme> { self.scheme.as_ref() }
    pub fn error(&self) -> Option<&str> { self.error.as_deref() }
    pub fn history(&self) -> &[HistoryItem] { &self.history }

    pub fn set_prompt(&mut self, prompt: impl Into<String>) {
        self.prompt = prompt.into();
    }

    /// Checks `prompt` (or the current prompt when `None`) and only then adopts it and moves to
    /// `Generating`. A rejected submit leaves the displayed prompt untouched.
    pub fn submit(&mut self, prompt: Option<String>) -> Result<String, SessionError> {
        if self.phase == Phase::Generating {
            return Err(SessionError::InFlight);
        }
        if let Some(prompt) = prompt {
            if prompt.trim().is_empty() {
                return Err(SessionError::BlankPrompt);
            }
            self.prompt = prompt;
        }
        self.begin_generation()
    }

    /// Moves to `Generating` and hands back the prompt to submit.
    pub fn begin_generation(&mut self) -> Result<String, SessionError> {
        if self.prompt.trim().is_empty() {
            return Err(SessionError::BlankPrompt);
        }
        if self.phase == Phase::Generating {
            return Err(SessionError::InFlight);
        }
        self.phase = Phase::Generating;
        self.error = None;
        Ok(self.prompt.clone())
    }

    /// Applies the generator's result. `submitted` is the prompt returned by `begin_generation`.
    pub fn finish_generation(
        &mut self,
        submitted: String,
        result: Result<DesignScheme, GeminiError>,
    ) -> Outcome {
        self.phase = Phase::Idle;
        match result {
            Ok(scheme) => {
                self.scheme = Some(scheme.clone());
                self.record(submitted, scheme.clone());
                Outcome::Succeeded(scheme)
            }
            Err(e) => {
                error!("❌ Scheme generation failed: {}", e);
                self.error = Some(GENERATION_FAILED_MESSAGE.to_string());
                Outcome::Failed(GENERATION_FAILED_MESSAGE.to_string())
            }
        }
    }

    /// Leaves `Generating` when the generation task died without a result.
    fn abandon_generation(&mut self) -> Outcome {
        self.phase = Phase::Idle;
        self.error = Some(GENERATION_FAILED_MESSAGE.to_string());
        Outcome::Failed(GENERATION_FAILED_MESSAGE.to_string())
    }

    /// Shows a past result without calling the generator or touching history.
    pub fn select_history(&mut self, id: &str) -> Result<(), SessionError> {
        let item = self.history
            .iter()
            .find(|item| item.id == id)
            .ok_or_else(|| SessionError::UnknownEntry(id.to_string()))?;
        self.scheme = Some(item.scheme.clone());
        self.prompt = item.prompt.clone();
        Ok(())
    }

    pub fn clear_history(&mut self) {
        self.history.clear();
        if let Err(e) = self.store.clear() {
            warn!("⚠️ Failed to clear persisted history: {}", e);
        }
        info!("🗑️ History cleared");
    }

    fn record(&mut self, prompt: String, scheme: DesignScheme) {
        let item = HistoryItem {
            id: Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            prompt,
            scheme,
        };
        insert_capped(&mut self.history, item);
        if let Err(e) = self.store.save(&self.history) {
            warn!("⚠️ Failed to persist history: {}", e);
        }
    }
}

/// Runs one generation against `session`. The request and its write-back run on their own task,
/// so dropping the caller (client disconnect, shutdown) never leaves the session in `Generating`.
pub async fn run_generation(
    session: Arc<Mutex<DesignSession>>,
    generator: Arc<dyn SchemeGenerator>,
    prompt: Option<String>,
) -> Result<Outcome, SessionError> {
    let submitted = session.lock().submit(prompt)?;

    let task = {
        let session = session.clone();
        tokio::spawn(async move {
            let result = generator.generate(&submitted).await;
            session.lock().finish_generation(submitted, result)
        })
    };

    match task.await {
        Ok(outcome) => Ok(outcome),
        Err(e) => {
            error!("❌ Generation task failed: {}", e);
            Ok(session.lock().abandon_generation())
        }
    }
}
