//! Study material upload
//!
//! Authenticated multipart upload of a document tagged with its course.

use std::path::Path;

use log::info;
use reqwest::multipart;
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::config::ApiConfig;
use crate::service::auth::AuthSession;
use crate::util::errors::{FreewayError, FreewayResult};
use crate::util::http::error_for_status;

/// Backend's description of a stored file.
#[derive(Debug, Clone, Deserialize)]
pub struct UploadedFile {
    pub name: String,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

pub struct UploadService {
    client: reqwest::Client,
    config: ApiConfig,
}

impl UploadService {
    pub fn new(config: ApiConfig) -> Self {
        Self::with_client(reqwest::Client::new(), config)
    }

    pub fn with_client(client: reqwest::Client, config: ApiConfig) -> Self {
        Self { client, config }
    }

    /// Upload `path` tagged with `course`, authorized by `session`.
    ///
    /// Validation mirrors the upload form: a file, a course, and a login are
    /// all required before anything is sent.
    pub async fn upload(
        &self,
        session: &AuthSession,
        path: &Path,
        course: &str,
    ) -> FreewayResult<UploadedFile> {
        let course = course.trim();
        if course.is_empty() {
            return Err(FreewayError::Validation(
                "a course must be selected".to_string(),
            ));
        }
        if session.token.is_empty() {
            return Err(FreewayError::Validation(
                "log in before uploading".to_string(),
            ));
        }
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .ok_or_else(|| {
                FreewayError::Validation(format!("not a file path: {}", path.display()))
            })?;

        let bytes = tokio::fs::read(path).await?;
        let part = multipart::Part::bytes(bytes).file_name(file_name.clone());
        let form = multipart::Form::new()
            .part("file", part)
            .text("course", course.to_string());

        let response = self
            .client
            .post(self.config.upload_url())
            .bearer_auth(&session.token)
            .multipart(form)
            .send()
            .await?;
        let response = error_for_status(response).await?;
        let stored: UploadedFile = response.json().await?;
        info!("Uploaded {file_name} as {} (course {course})", stored.name);
        Ok(stored)
    }
}
