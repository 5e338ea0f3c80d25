//! Transport layer
//!
//! The seam between the turn controller and the network: opening a completion
//! request and pulling response bytes chunk by chunk. The controller only
//! sees these traits, so it is testable against scripted streams; the reqwest
//! adapter is the production implementation.

use async_trait::async_trait;
use serde::Serialize;

use crate::config::ApiConfig;
use crate::util::errors::{FreewayError, FreewayResult};
use crate::util::http::error_for_status;

/// Issues one completion request and hands back its byte stream.
#[async_trait]
pub trait CompletionTransport: Send + Sync {
    async fn open(&self, question: &str) -> FreewayResult<Box<dyn CompletionStream>>;
}

/// One open response stream. `Ok(None)` signals clean end-of-stream.
#[async_trait]
pub trait CompletionStream: Send {
    async fn next_chunk(&mut self) -> FreewayResult<Option<Vec<u8>>>;
}

/// Request body for the completion endpoint.
#[derive(Debug, Serialize)]
struct AskRequest<'a> {
    question: &'a str,
}

/// Production transport: `POST {base}/ask` with a JSON body, chunked
/// streaming response.
pub struct HttpCompletionTransport {
    client: reqwest::Client,
    config: ApiConfig,
}

impl HttpCompletionTransport {
    pub fn new(config: ApiConfig) -> Self {
        Self::with_client(reqwest::Client::new(), config)
    }

    pub fn with_client(client: reqwest::Client, config: ApiConfig) -> Self {
        Self { client, config }
    }
}

#[async_trait]
impl CompletionTransport for HttpCompletionTransport {
    async fn open(&self, question: &str) -> FreewayResult<Box<dyn CompletionStream>> {
        let response = self
            .client
            .post(self.config.ask_url())
            .json(&AskRequest { question })
            .send()
            .await
            .map_err(|error| FreewayError::Transport(error.to_string()))?;
        let response = error_for_status(response).await?;
        Ok(Box::new(HttpCompletionStream { response }))
    }
}

struct HttpCompletionStream {
    response: reqwest::Response,
}

#[async_trait]
impl CompletionStream for HttpCompletionStream {
    async fn next_chunk(&mut self) -> FreewayResult<Option<Vec<u8>>> {
        match self.response.chunk().await {
            Ok(Some(bytes)) => Ok(Some(bytes.to_vec())),
            Ok(None) => Ok(None),
            Err(error) => Err(FreewayError::Transport(error.to_string())),
        }
    }
}
