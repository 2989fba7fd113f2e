use std::path::Path;
use std::sync::Arc;

use tracing::{info, warn};

use crate::config::Config;
use crate::crawl::{CrawlTrigger, Orchestrator, TriggerResponse};
use crate::db::{Repository, ShowStats};
use crate::error::Result;
use crate::merge::{MergeEngine, ReResolveSummary};
use crate::models::{PendingReview, ReferenceData, ShowSelection};
use crate::normalize::{Normalizer, ReferenceTable};

/// Wires the store, orchestrator and trigger together for the command line.
pub struct App {
    repository: Arc<Repository>,
    trigger: CrawlTrigger,
    fuzzy_threshold: f64,
}

impl App {
    pub async fn new(config: &Config) -> Result<Self> {
        config.validate()?;
        if let Some(parent) = Path::new(&config.db_path).parent() {
            std::fs::create_dir_all(parent)?;
        }

        let repository = Arc::new(Repository::new(&config.db_path).await?);
        let orchestrator = Orchestrator::from_config(config, Arc::clone(&repository))?;

        Ok(Self {
            repository,
            trigger: CrawlTrigger::new(Arc::new(orchestrator)),
            fuzzy_threshold: config.fuzzy_threshold,
        })
    }

    pub fn trigger(&self) -> &CrawlTrigger {
        &self.trigger
    }

    pub async fn crawl(&self, selection: &ShowSelection) -> TriggerResponse {
        self.trigger.trigger(selection).await
    }

    /// Loads parties, areas and politicians from a JSON file into the store.
    pub async fn import_reference(&self, path: &Path) -> Result<usize> {
        let content = std::fs::read_to_string(path)?;
        let data: ReferenceData = serde_json::from_str(&content)?;
        if data.politicians.is_empty() {
            warn!("{:?} contains no politicians", path);
        }
        let count = self.repository.import_reference(data).await?;
        info!("Imported {} politicians from {:?}", count, path);
        Ok(count)
    }

    pub async fn re_resolve_pending(&self) -> Result<ReResolveSummary> {
        let table = ReferenceTable::load(&self.repository).await?;
        let normalizer = Normalizer::new(Arc::new(table), self.fuzzy_threshold);
        MergeEngine::new(Arc::clone(&self.repository))
            .re_resolve_pending(&normalizer)
            .await
    }

    pub async fn pending_reviews(&self) -> Result<Vec<PendingReview>> {
        self.repository.list_pending_reviews().await
    }

    pub async fn stats(&self) -> Result<Vec<ShowStats>> {
        self.repository.stats().await
    }
}
