// src/dispatch.rs
//! Fire-and-forget trigger for the CI workflow that refreshes the winners
//! snapshot.

use anyhow::{Context, Result};
use reqwest::{header, Client};

const GITHUB_API: &str = "https://api.github.com";

#[derive(Clone)]
pub struct WorkflowDispatcher {
    client: Client,
    api_base: String,
    token: String,
    repo: String,
    workflow: String,
    git_ref: String,
}

impl WorkflowDispatcher {
    /// Built from `GITHUB_TOKEN`, `GITHUB_REPO` (owner/repo), `GITHUB_WORKFLOW`
    /// and optional `GITHUB_REF` (default `main`). `None` when any required
    /// variable is missing.
    pub fn from_env() -> Option<Self> {
        let token = std::env::var("GITHUB_TOKEN").ok()?;
        let repo = std::env::var("GITHUB_REPO").ok()?;
        let workflow = std::env::var("GITHUB_WORKFLOW").ok()?;
        let git_ref = std::env::var("GITHUB_REF").unwrap_or_else(|_| "main".to_string());
        if token.trim().is_empty() || repo.trim().is_empty() || workflow.trim().is_empty() {
            return None;
        }
        Some(Self::new(Client::new(), token, repo, workflow, git_ref))
    }

    pub fn new(
        client: Client,
        token: impl Into<String>,
        repo: impl Into<String>,
        workflow: impl Into<String>,
        git_ref: impl Into<String>,
    ) -> Self {
        Self {
            client,
            api_base: GITHUB_API.to_string(),
            token: token.into(),
            repo: repo.into(),
            workflow: workflow.into(),
            git_ref: git_ref.into(),
        }
    }

    /// Point at a different API host (GitHub Enterprise, tests).
    pub fn with_api_base(mut self, base: impl Into<String>) -> Self {
        self.api_base = base.into().trim_end_matches('/').to_string();
        self
    }

    pub fn dispatch_url(&self) -> String {
        format!(
            "{}/repos/{}/actions/workflows/{}/dispatches",
            self.api_base, self.repo, self.workflow
        )
    }

    pub async fn dispatch(&self) -> Result<()> {
        let body = serde_json::json!({ "ref": self.git_ref });
        self.client
            .post(self.dispatch_url())
            .bearer_auth(&self.token)
            .header(header::ACCEPT, "application/vnd.github+json")
            .header(header::USER_AGENT, "contest-scout")
            .json(&body)
            .send()
            .await
            .context("workflow dispatch post")?
            .error_for_status()
            .context("workflow dispatch non-2xx")?;
        Ok(())
    }

    /// Detached dispatch: errors are logged, never returned.
    pub fn spawn_dispatch(&self) -> tokio::task::JoinHandle<()> {
        let this = self.clone();
        tokio::spawn(async move {
            match this.dispatch().await {
                Ok(()) => tracing::info!(target: "api", workflow = %this.workflow, "workflow dispatched"),
                Err(e) => tracing::warn!(target: "api", workflow = %this.workflow, "workflow dispatch failed: {e:#}"),
            }
        })
    }
}
