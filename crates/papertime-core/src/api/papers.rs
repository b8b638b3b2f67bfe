//! Typed wrappers over the paper endpoints.

use tracing::debug;

use crate::exam::SubmissionResult;
use crate::models::{Paper, SubmissionRecord, UserProfile};

use super::client::{AuthenticatedClient, Download, TokenPlacement};
use super::ApiError;

/// Paper API. Clone is cheap; clones share the HTTP pool and token manager.
#[derive(Clone)]
pub struct PaperApi {
    client: AuthenticatedClient,
    document_placement: TokenPlacement,
}

impl PaperApi {
    pub fn new(client: AuthenticatedClient) -> Self {
        Self {
            client,
            document_placement: TokenPlacement::HeaderAndQuery,
        }
    }

    /// Choose how the token is sent on document downloads.
    pub fn with_document_placement(mut self, placement: TokenPlacement) -> Self {
        self.document_placement = placement;
        self
    }

    pub fn client(&self) -> &AuthenticatedClient {
        &self.client
    }

    pub async fn fetch_papers(&self) -> Result<Vec<Paper>, ApiError> {
        let papers: Vec<Paper> = self.client.get_json("/papers/").await?;
        debug!(count = papers.len(), "Papers fetched");
        Ok(papers)
    }

    pub async fn fetch_paper(&self, paper_id: i64) -> Result<Paper, ApiError> {
        self.client.get_json(&format!("/papers/{}", paper_id)).await
    }

    pub async fn fetch_paper_document(&self, paper_id: i64) -> Result<Download, ApiError> {
        let download = self
            .client
            .get_bytes(&format!("/papers/{}/pdf", paper_id), self.document_placement)
            .await?;
        debug!(paper_id, bytes = download.bytes.len(), "Paper document fetched");
        Ok(download)
    }

    pub async fn submit(
        &self,
        paper_id: i64,
        submission: &SubmissionResult,
    ) -> Result<SubmissionRecord, ApiError> {
        self.client
            .post_json(&format!("/papers/{}/submit", paper_id), submission)
            .await
    }

    pub async fn fetch_my_submissions(&self) -> Result<Vec<SubmissionRecord>, ApiError> {
        self.client.get_json("/papers/submissions/user").await
    }

    pub async fn fetch_me(&self) -> Result<UserProfile, ApiError> {
        self.client.get_json("/users/me").await
    }
}
