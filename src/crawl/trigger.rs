use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::time::MissedTickBehavior;
use tracing::{error, info, warn};

use super::Orchestrator;
use crate::error::AppError;
use crate::models::{CrawlRunResult, ShowSelection};

/// HTTP-style answer to a crawl request.
#[derive(Debug, Clone, Serialize)]
pub struct TriggerResponse {
    pub status: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<CrawlRunResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl TriggerResponse {
    fn ok(result: CrawlRunResult) -> Self {
        Self {
            status: 200,
            result: Some(result),
            error: None,
        }
    }

    fn error(status: u16, message: String) -> Self {
        Self {
            status,
            result: None,
            error: Some(message),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == 200
    }
}

/// Entry point for on-demand and scheduled crawls. Cheap to clone; runs may
/// overlap safely because the store serializes writers per episode.
#[derive(Clone)]
pub struct CrawlTrigger {
    orchestrator: Arc<Orchestrator>,
}

impl CrawlTrigger {
    pub fn new(orchestrator: Arc<Orchestrator>) -> Self {
        Self { orchestrator }
    }

    pub async fn crawl_show(&self, show_id: &str) -> TriggerResponse {
        self.trigger(&ShowSelection::single(show_id)).await
    }

    pub async fn crawl_all(&self) -> TriggerResponse {
        self.trigger(&ShowSelection::All).await
    }

    /// Extractor failures still answer 200; only setup faults map to 404/500.
    pub async fn trigger(&self, selection: &ShowSelection) -> TriggerResponse {
        match self.orchestrator.run_crawl(selection).await {
            Ok(result) => {
                if result.has_failures() {
                    warn!("Crawl completed with {} errors", result.errors().len());
                }
                TriggerResponse::ok(result)
            }
            Err(e @ AppError::UnknownShow(_)) => {
                warn!("Rejected crawl request: {}", e);
                TriggerResponse::error(404, e.to_string())
            }
            Err(e) => {
                error!("Crawl aborted: {}", e);
                TriggerResponse::error(500, e.to_string())
            }
        }
    }

    /// Crawls all shows immediately and then every `every`, until `shutdown`
    /// resolves. Returns the number of runs started.
    pub async fn run_scheduled<F>(&self, every: Duration, shutdown: F) -> usize
    where
        F: Future<Output = ()>,
    {
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        tokio::pin!(shutdown);

        let mut runs = 0;
        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("Scheduler stopping after {} runs", runs);
                    break;
                }
                _ = ticker.tick() => {
                    runs += 1;
                    info!("Scheduled crawl #{}", runs);
                    let response = self.crawl_all().await;
                    if !response.is_success() {
                        warn!("Scheduled crawl answered {}", response.status);
                    }
                }
            }
        }
        runs
    }
}
