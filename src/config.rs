use std::{env, path::PathBuf};

pub const DEFAULT_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_MODEL: &str = "gemini-2.0-flash";
pub const DEFAULT_HISTORY_PATH: &str = "3d_phantasm_history.json";

#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Sent as-is; an empty key only shows up as a failed generation.
    pub api_key: String,
    pub api_base: String,
    pub model: String,
    /// `None` when `HISTORY_PATH` is set but empty: history is kept in memory only.
    pub history_path: Option<PathBuf>,
    /// TrueType font embedded in PDF exports; builtin Helvetica when unset.
    pub pdf_font_path: Option<PathBuf>,
    pub port: u16,
}

impl AppConfig {
    pub fn from_env() -> Self {
        // Load environment variables from .env file
        dotenv::dotenv().ok();
        Self {
            api_key: env::var("GEMINI_API_KEY").unwrap_or_default(),
            api_base: env::var("GEMINI_API_BASE").unwrap_or_else(|_| DEFAULT_API_BASE.to_string()),
            model: env::var("GEMINI_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string()),
            history_path: match env::var("HISTORY_PATH") {
                Ok(path) if path.trim().is_empty() => None,
                Ok(path) => Some(PathBuf::from(path)),
                Err(_) => Some(PathBuf::from(DEFAULT_HISTORY_PATH)),
            },
            pdf_font_path: env::var("PDF_FONT_PATH")
                .ok()
                .filter(|path| !path.trim().is_empty())
                .map(PathBuf::from),
            port: env::var("PORT").ok().and_then(|v| v.parse().ok()).unwrap_or(8080),
        }
    }

    /// Key prefix safe to print at startup.
    pub fn redacted_key(&self) -> String {
        if self.api_key.is_empty() {
            return "<unset>".to_string();
        }
        let shown: String = self.api_key.chars().take(4).collect();
        format!("{shown}***")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_with_key(api_key: &str) -> AppConfig {
        AppConfig {
            api_key: api_key.to_string(),
            api_base: DEFAULT_API_BASE.to_string(),
            model: DEFAULT_MODEL.to_string(),
            history_path: Some(PathBuf::from(DEFAULT_HISTORY_PATH)),
            pdf_font_path: None,
            port: 8080,
        }
    }

    #[test]
    fn redacts_all_but_a_short_prefix() {
        assert_eq!(config_with_key("AIzaSyExampleKey").redacted_key(), "AIza***");
        assert_eq!(config_with_key("").redacted_key(), "<unset>");
    }
}
