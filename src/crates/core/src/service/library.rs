//! Document library client
//!
//! Lists the backend's study materials and derives download URLs. Course
//! filtering happens client-side, matching the library view's behavior.

use log::debug;
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::config::ApiConfig;
use crate::util::errors::FreewayResult;
use crate::util::http::error_for_status;

/// One entry of the backend's file listing.
#[derive(Debug, Clone, Deserialize)]
pub struct FileEntry {
    pub name: String,
    /// Server-relative download path.
    pub url: String,
    #[serde(default)]
    pub course: Option<String>,

    /// Fields this client does not interpret (ids, sizes, ...).
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl FileEntry {
    /// Course filter: no requested course matches everything; a requested
    /// course matches only entries tagged with it.
    pub fn matches_course(&self, course: Option<&str>) -> bool {
        match course {
            None => true,
            Some(wanted) => self.course.as_deref() == Some(wanted),
        }
    }

    pub fn is_pdf(&self) -> bool {
        self.name.to_lowercase().ends_with(".pdf")
    }

    /// Display title: the file name without its `.pdf` suffix.
    pub fn title(&self) -> &str {
        self.name
            .strip_suffix(".pdf")
            .or_else(|| self.name.strip_suffix(".PDF"))
            .unwrap_or(&self.name)
    }
}

pub struct LibraryService {
    client: reqwest::Client,
    config: ApiConfig,
}

impl LibraryService {
    pub fn new(config: ApiConfig) -> Self {
        Self::with_client(reqwest::Client::new(), config)
    }

    pub fn with_client(client: reqwest::Client, config: ApiConfig) -> Self {
        Self { client, config }
    }

    /// Fetch the full file listing.
    pub async fn list_files(&self) -> FreewayResult<Vec<FileEntry>> {
        let response = self.client.get(self.config.files_url()).send().await?;
        let response = error_for_status(response).await?;
        let files: Vec<FileEntry> = response.json().await?;
        debug!("Fetched {} library files", files.len());
        Ok(files)
    }

    /// Fetch the listing filtered to one course (or all, when `None`).
    pub async fn list_course(&self, course: Option<&str>) -> FreewayResult<Vec<FileEntry>> {
        let files = self.list_files().await?;
        Ok(files
            .into_iter()
            .filter(|file| file.matches_course(course))
            .collect())
    }

    /// Absolute download URL for an entry.
    pub fn download_url(&self, file: &FileEntry) -> String {
        self.config.join(&file.url)
    }
}
