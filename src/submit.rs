// src/submit.rs
//! Submission driver: one contest-form POST per (registrant, record) pair.
//!
//! Each POST runs as a detached task; its failure is logged and counted but
//! never returned. A fixed delay separates consecutive dispatches.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use metrics::counter;
use reqwest::{header, Client};
use serde::{Deserialize, Serialize};
use tokio::task::JoinSet;

use crate::discovery::DiscoveryRecord;

/// One person entered into contests. Field names follow the remote form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Registrant {
    pub gender: String,
    pub firstname: String,
    pub lastname: String,
    pub address: String,
    pub city: String,
    pub postal: String,
    pub phone: String,
    pub email: String,
    pub job: String,
    pub age: String,
}

#[async_trait]
pub trait EntrySubmitter: Send + Sync {
    async fn submit(&self, who: &Registrant, record: &DiscoveryRecord) -> Result<()>;
}

/// URL-encoded form body in the field order the site's own form sends.
pub fn form_body(who: &Registrant, record: &DiscoveryRecord) -> String {
    url::form_urlencoded::Serializer::new(String::new())
        .append_pair("gender", &who.gender)
        .append_pair("firstname", &who.firstname)
        .append_pair("lastname", &who.lastname)
        .append_pair("address", &who.address)
        .append_pair("city", &who.city)
        .append_pair("postal", &who.postal)
        .append_pair("date", &record.date)
        .append_pair("phone", &who.phone)
        .append_pair("email", &who.email)
        .append_pair("job", &who.job)
        .append_pair("age", &who.age)
        .append_pair("gdpr", "on")
        .append_pair("itemTitle", "")
        .append_pair("itemID", &record.id)
        .append_pair("submit", "")
        .finish()
}

#[derive(Clone)]
pub struct HttpSubmitter {
    client: Client,
    endpoint: String,
}

impl HttpSubmitter {
    pub fn new(client: Client, endpoint: impl Into<String>) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
        }
    }

    fn referer(&self, id: &str) -> String {
        let base = self.endpoint.trim_end_matches('/');
        format!("{base}/{id}/")
    }
}

#[async_trait]
impl EntrySubmitter for HttpSubmitter {
    async fn submit(&self, who: &Registrant, record: &DiscoveryRecord) -> Result<()> {
        self.client
            .post(&self.endpoint)
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .header(header::REFERER, self.referer(&record.id))
            .header("upgrade-insecure-requests", "1")
            .body(form_body(who, record))
            .send()
            .await
            .context("contest-form post")?
            .error_for_status()
            .context("contest-form non-2xx")?;
        Ok(())
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SubmissionSummary {
    pub dispatched: usize,
    pub succeeded: usize,
    pub failed: usize,
}

pub struct SubmissionDriver {
    submitter: Arc<dyn EntrySubmitter>,
    delay: Duration,
}

impl SubmissionDriver {
    pub fn new(submitter: Arc<dyn EntrySubmitter>) -> Self {
        Self {
            submitter,
            delay: Duration::from_millis(500),
        }
    }

    pub fn with_delay_ms(mut self, ms: u64) -> Self {
        self.delay = Duration::from_millis(ms);
        self
    }

    /// Registrant-major order: every record for the first person, then the next.
    /// Waits for the spawned POSTs before returning so a CLI does not exit
    /// with requests still in flight.
    pub async fn submit_all(
        &self,
        records: &[DiscoveryRecord],
        roster: &[Registrant],
    ) -> SubmissionSummary {
        let mut summary = SubmissionSummary::default();
        let mut tasks = JoinSet::new();

        for who in roster {
            for record in records {
                let submitter = self.submitter.clone();
                let who = who.clone();
                let record = record.clone();
                tasks.spawn(async move {
                    match submitter.submit(&who, &record).await {
                        Ok(()) => {
                            tracing::info!(target: "submit", lastname = %who.lastname, id = %record.id, date = %record.date, "registered");
                            counter!("submit_sent_total").increment(1);
                            true
                        }
                        Err(e) => {
                            tracing::warn!(target: "submit", lastname = %who.lastname, id = %record.id, error = %format!("{e:#}"), "registration failed");
                            counter!("submit_errors_total").increment(1);
                            false
                        }
                    }
                });
                summary.dispatched += 1;
                if !self.delay.is_zero() {
                    tokio::time::sleep(self.delay).await;
                }
            }
        }

        while let Some(res) = tasks.join_next().await {
            match res {
                Ok(true) => summary.succeeded += 1,
                Ok(false) => summary.failed += 1,
                Err(e) => {
                    tracing::warn!(target: "submit", error = %e, "submission task panicked");
                    summary.failed += 1;
                }
            }
        }
        summary
    }
}

/// Records every call; fails for ids listed in `fail_ids`.
#[derive(Default)]
pub struct RecordingSubmitter {
    pub calls: Mutex<Vec<(String, DiscoveryRecord)>>,
    pub fail_ids: Vec<String>,
}

impl RecordingSubmitter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_on(ids: &[&str]) -> Self {
        Self {
            fail_ids: ids.iter().map(|s| s.to_string()).collect(),
            ..Self::default()
        }
    }
}

#[async_trait]
impl EntrySubmitter for RecordingSubmitter {
    async fn submit(&self, who: &Registrant, record: &DiscoveryRecord) -> Result<()> {
        self.calls
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .push((who.email.clone(), record.clone()));
        if self.fail_ids.contains(&record.id) {
            anyhow::bail!("remote rejected {}", record.id);
        }
        Ok(())
    }
}
