//! Backend endpoint configuration
//!
//! All services talk to the same study backend; this holds its base URL and
//! derives the per-endpoint URLs from it.

use serde::{Deserialize, Serialize};

/// Environment variable overriding the backend base URL.
pub const API_BASE_ENV: &str = "FREEWAY_API_BASE";

/// Default backend address (local development server).
pub const DEFAULT_API_BASE: &str = "http://127.0.0.1:3000";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Base URL of the study backend, without a trailing slash.
    pub base_url: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_API_BASE.to_string(),
        }
    }
}

impl ApiConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        let mut base_url = base_url.into();
        while base_url.ends_with('/') {
            base_url.pop();
        }
        Self { base_url }
    }

    /// Resolve the base URL from the environment, falling back to the default.
    pub fn from_env() -> Self {
        match std::env::var(API_BASE_ENV) {
            Ok(value) if !value.trim().is_empty() => Self::new(value.trim()),
            Ok(_) => {
                log::warn!("{} is set but empty, using default", API_BASE_ENV);
                Self::default()
            }
            Err(_) => Self::default(),
        }
    }

    /// Join a server-relative path (e.g. a file's `url` field) onto the base.
    pub fn join(&self, path: &str) -> String {
        if path.starts_with('/') {
            format!("{}{}", self.base_url, path)
        } else {
            format!("{}/{}", self.base_url, path)
        }
    }

    pub fn ask_url(&self) -> String {
        self.join("/ask")
    }

    pub fn files_url(&self) -> String {
        self.join("/files")
    }

    pub fn login_url(&self) -> String {
        self.join("/login")
    }

    pub fn signup_url(&self) -> String {
        self.join("/signup")
    }

    pub fn upload_url(&self) -> String {
        self.join("/upload")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trims_trailing_slashes() {
        let config = ApiConfig::new("http://localhost:3000///");
        assert_eq!(config.base_url, "http://localhost:3000");
        assert_eq!(config.ask_url(), "http://localhost:3000/ask");
    }

    #[test]
    fn joins_relative_and_absolute_paths() {
        let config = ApiConfig::new("http://localhost:3000");
        assert_eq!(config.join("/files/a.pdf"), "http://localhost:3000/files/a.pdf");
        assert_eq!(config.join("files/a.pdf"), "http://localhost:3000/files/a.pdf");
    }
}
