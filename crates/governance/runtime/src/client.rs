//! Bounded platform calls
//!
//! Every call is cut off after the configured timeout and retried a few
//! times. Fact queries that still fail are left unanswered, so their
//! conditions fail closed for this round and are asked again on the next
//! event.

use crate::error::{RuntimeError, RuntimeResult};
use crate::platform::Platform;
use futures::future::join_all;
use governance_engine::ExternalFacts;
use governance_types::ExternalQuery;
use std::collections::BTreeSet;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

/// Platform handle with timeout and retry policy applied
#[derive(Clone)]
pub struct PlatformClient {
    platform: Arc<dyn Platform>,
    timeout: Duration,
    retries: u32,
}

impl PlatformClient {
    pub fn new(platform: Arc<dyn Platform>, timeout: Duration, retries: u32) -> Self {
        Self {
            platform,
            timeout,
            retries,
        }
    }

    /// Answer every query concurrently; failed queries stay unanswered
    pub async fn resolve(&self, queries: BTreeSet<ExternalQuery>) -> ExternalFacts {
        if queries.is_empty() {
            return ExternalFacts::new();
        }
        let answers = join_all(queries.into_iter().map(|query| async move {
            let answer = self.answer(&query).await;
            (query, answer)
        }))
        .await;

        answers
            .into_iter()
            .filter_map(|(query, answer)| match answer {
                Ok(value) => Some((query, value)),
                Err(e) => {
                    tracing::warn!(query = ?query, error = %e, "External check failed closed");
                    None
                }
            })
            .collect()
    }

    async fn answer(&self, query: &ExternalQuery) -> RuntimeResult<bool> {
        match query {
            ExternalQuery::Status { element } => {
                self.bounded(&format!("check_status {element}"), || {
                    self.platform.check_status(element)
                })
                .await
            }
            ExternalQuery::Label { element, label } => {
                self.bounded(&format!("has_label {element} {label}"), || {
                    self.platform.has_label(element, label)
                })
                .await
            }
        }
    }

    pub async fn set_label(&self, element: &str, label: &str) -> RuntimeResult<()> {
        self.bounded(&format!("set_label {element} {label}"), || {
            self.platform.set_label(element, label)
        })
        .await
    }

    pub async fn merge(&self, element: &str) -> RuntimeResult<()> {
        self.bounded(&format!("merge {element}"), || self.platform.merge(element))
            .await
    }

    /// Run `call` under the timeout, retrying failures
    async fn bounded<T, F, Fut>(&self, operation: &str, call: F) -> RuntimeResult<T>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = RuntimeResult<T>>,
    {
        let mut last = RuntimeError::CheckTimeout {
            operation: operation.to_string(),
            timeout_ms: self.timeout.as_millis() as u64,
        };
        for attempt in 0..=self.retries {
            match tokio::time::timeout(self.timeout, call()).await {
                Ok(Ok(value)) => return Ok(value),
                Ok(Err(e)) => last = e,
                Err(_) => {
                    last = RuntimeError::CheckTimeout {
                        operation: operation.to_string(),
                        timeout_ms: self.timeout.as_millis() as u64,
                    }
                }
            }
            tracing::debug!(operation, attempt, error = %last, "Platform call failed");
        }
        Err(last)
    }
}
