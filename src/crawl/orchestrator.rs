use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures::stream::{self, StreamExt};
use tracing::{info, warn};

use crate::config::Config;
use crate::db::Repository;
use crate::error::{AppError, ExtractionCause, ExtractionError, Result};
use crate::extract::{ExtractorRegistry, HttpRenderer, SessionPool, SourceExtractor};
use crate::merge::MergeEngine;
use crate::models::{
    CrawlRunResult, RawEpisode, Show, ShowReport, ShowSelection, UnresolvedGuest,
};
use crate::normalize::{Normalizer, ReferenceTable};

#[derive(Debug, Clone, Copy)]
pub struct CrawlSettings {
    pub extractor_timeout: Duration,
    pub max_concurrent_shows: usize,
    pub fuzzy_threshold: f64,
}

impl CrawlSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            extractor_timeout: config.extractor_timeout(),
            max_concurrent_shows: config.max_concurrent_shows,
            fuzzy_threshold: config.fuzzy_threshold,
        }
    }
}

pub struct Orchestrator {
    repo: Arc<Repository>,
    registry: ExtractorRegistry,
    pool: SessionPool,
    shows: Vec<Show>,
    settings: CrawlSettings,
}

impl Orchestrator {
    pub fn new(
        repo: Arc<Repository>,
        registry: ExtractorRegistry,
        pool: SessionPool,
        shows: Vec<Show>,
        settings: CrawlSettings,
    ) -> Self {
        Self {
            repo,
            registry,
            pool,
            shows,
            settings,
        }
    }

    pub fn from_config(config: &Config, repo: Arc<Repository>) -> Result<Self> {
        let renderer = HttpRenderer::new(&config.user_agent, config.extractor_timeout())?;
        let pool = SessionPool::new(Arc::new(renderer), config.max_browser_sessions);
        Ok(Self::new(
            repo,
            ExtractorRegistry::with_defaults(),
            pool,
            config.shows.clone(),
            CrawlSettings::from_config(config),
        ))
    }

    pub fn repository(&self) -> &Arc<Repository> {
        &self.repo
    }

    pub fn settings(&self) -> &CrawlSettings {
        &self.settings
    }

    fn select(&self, selection: &ShowSelection) -> Result<Vec<(Show, Arc<dyn SourceExtractor>)>> {
        if self.shows.is_empty() {
            return Err(AppError::NoShowsConfigured);
        }

        let shows: Vec<&Show> = match selection {
            ShowSelection::All => self.shows.iter().collect(),
            ShowSelection::Only(ids) if ids.is_empty() => return Err(AppError::NoShowsConfigured),
            ShowSelection::Only(ids) => ids
                .iter()
                .map(|id| {
                    self.shows
                        .iter()
                        .find(|s| &s.id == id)
                        .ok_or_else(|| AppError::UnknownShow(id.clone()))
                })
                .collect::<Result<_>>()?,
        };

        shows
            .into_iter()
            .map(|show| {
                self.registry
                    .get(&show.id)
                    .map(|extractor| (show.clone(), extractor))
                    .ok_or_else(|| AppError::UnknownExtractor(show.id.clone()))
            })
            .collect()
    }

    /// Crawls the selected shows concurrently. Per-show and per-episode
    /// failures end up in the returned summary; only setup problems are errors.
    pub async fn run_crawl(&self, selection: &ShowSelection) -> Result<CrawlRunResult> {
        let started_at = Utc::now();
        let targets = self.select(selection)?;

        for (show, _) in &targets {
            self.repo.upsert_show(show.clone()).await?;
        }

        let table = ReferenceTable::load(&self.repo).await?;
        if table.is_empty() {
            warn!("Reference table is empty; every guest will be left for review");
        }
        let normalizer = Normalizer::new(Arc::new(table), self.settings.fuzzy_threshold);
        let engine = MergeEngine::new(Arc::clone(&self.repo));

        info!("Starting crawl of {} shows", targets.len());
        let mut reports: Vec<ShowReport> = stream::iter(targets.iter())
            .map(|(show, extractor)| {
                self.crawl_show(show, extractor.as_ref(), &normalizer, &engine)
            })
            .buffer_unordered(self.settings.max_concurrent_shows.max(1))
            .collect()
            .await;
        reports.sort_by_key(|r| targets.iter().position(|(s, _)| s.id == r.show_id));

        let result = CrawlRunResult {
            started_at,
            finished_at: Utc::now(),
            shows: reports,
        };
        info!(
            "Crawl finished: {} inserted, {} updated, {} unchanged, {} unresolved, {} errors",
            result.inserted(),
            result.updated(),
            result.unchanged(),
            result.unresolved_guests().len(),
            result.errors().len()
        );
        Ok(result)
    }

    /// Waits for a page session, then extracts under the per-show timeout.
    /// Time spent queued behind other shows does not count against it.
    async fn extract_show(
        &self,
        show: &Show,
        extractor: &dyn SourceExtractor,
    ) -> std::result::Result<Vec<RawEpisode>, ExtractionError> {
        let session = self.pool.acquire(&show.id).await?;
        let timeout = self.settings.extractor_timeout;
        match tokio::time::timeout(timeout, extractor.extract(show, &session)).await {
            Ok(extracted) => extracted,
            Err(_) => Err(ExtractionError::new(
                &show.id,
                ExtractionCause::Timeout(timeout),
            )),
        }
    }

    async fn crawl_show(
        &self,
        show: &Show,
        extractor: &dyn SourceExtractor,
        normalizer: &Normalizer,
        engine: &MergeEngine,
    ) -> ShowReport {
        let raws = match self.extract_show(show, extractor).await {
            Ok(raws) => raws,
            Err(e) => {
                warn!("Extraction failed: {}", e);
                return ShowReport::failed(&show.id, e.to_string());
            }
        };

        let mut report = ShowReport::new(&show.id);
        report.episodes_seen = raws.len();

        for episode in normalizer.normalize_listing(&raws) {
            report
                .unresolved
                .extend(episode.unresolved().map(|guest| UnresolvedGuest {
                    show_id: show.id.clone(),
                    air_date: episode.key.air_date,
                    raw_name: guest.raw_name.clone(),
                }));

            match engine.reconcile(&episode).await {
                Ok(outcome) => report.record(outcome),
                Err(e) => {
                    warn!("Failed to store episode {}: {}", episode.key, e);
                    report.record_fault(format!("{}: {}", episode.key, e));
                }
            }
        }

        info!(
            "{}: {} episodes ({} new, {} updated, {} unchanged, {} failed)",
            show.id,
            report.episodes_seen,
            report.inserted,
            report.updated,
            report.unchanged,
            report.failed
        );
        report
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::extract::testing::StaticRenderer;
    use crate::extract::{Lanz, PageRenderer, PageSession};
    use crate::models::{Politician, ReferenceData, ShowStatus};
    use async_trait::async_trait;
    use scraper::Html;
    use tempfile::TempDir;

    pub(crate) const LANZ_URL: &str = "http://localhost/lanz";

    pub(crate) fn lanz_article(date: &str, title: &str, guests: &[&str]) -> String {
        let items: String = guests.iter().map(|g| format!("<li>{g}</li>")).collect();
        format!(
            r#"<article class="episode">
                 <time datetime="{date}T23:15:00+01:00"></time>
                 <h3 class="episode-title">{title}</h3>
                 <ul class="guests">{items}</ul>
               </article>"#
        )
    }

    pub(crate) fn lanz_listing(articles: &[String]) -> String {
        format!(r#"<section class="episode-list">{}</section>"#, articles.concat())
    }

    pub(crate) fn lanz_page(guests: &[&str]) -> String {
        lanz_listing(&[lanz_article("2024-03-05", "Markus Lanz vom 5. März 2024", guests)])
    }

    struct BrokenExtractor;

    #[async_trait]
    impl SourceExtractor for BrokenExtractor {
        fn show_id(&self) -> &'static str {
            "broken"
        }

        fn anchor(&self) -> &'static str {
            ".never"
        }

        fn parse_listing(&self, _show: &Show, _document: &Html) -> Vec<RawEpisode> {
            Vec::new()
        }
    }

    /// Holds its page session for `hold`, then reports an empty listing.
    struct SlowExtractor {
        id: &'static str,
        hold: Duration,
    }

    #[async_trait]
    impl SourceExtractor for SlowExtractor {
        fn show_id(&self) -> &'static str {
            self.id
        }

        fn anchor(&self) -> &'static str {
            "body"
        }

        fn parse_listing(&self, _show: &Show, _document: &Html) -> Vec<RawEpisode> {
            Vec::new()
        }

        async fn extract(
            &self,
            _show: &Show,
            _session: &PageSession,
        ) -> std::result::Result<Vec<RawEpisode>, ExtractionError> {
            tokio::time::sleep(self.hold).await;
            Ok(Vec::new())
        }
    }

    pub(crate) async fn open_repo() -> (TempDir, Arc<Repository>) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("crawl.db");
        let repo = Arc::new(Repository::new(path.to_str().unwrap()).await.unwrap());
        let politicians = ["Markus Söder", "Karl Lauterbach", "Ricarda Lang"]
            .iter()
            .zip(1..)
            .map(|(name, id)| Politician {
                id,
                name: name.to_string(),
                party_id: None,
                political_area_ids: vec![],
                aliases: vec![],
            })
            .collect();
        repo.import_reference(ReferenceData {
            politicians,
            ..Default::default()
        })
        .await
        .unwrap();
        (dir, repo)
    }

    fn settings(extractor_timeout: Duration) -> CrawlSettings {
        CrawlSettings {
            extractor_timeout,
            max_concurrent_shows: 4,
            fuzzy_threshold: 0.88,
        }
    }

    pub(crate) fn orchestrator(
        repo: Arc<Repository>,
        renderer: impl PageRenderer + 'static,
    ) -> Orchestrator {
        let mut registry = ExtractorRegistry::new();
        registry.register(Arc::new(Lanz));
        registry.register(Arc::new(BrokenExtractor));
        registry.register(Arc::new(SlowExtractor {
            id: "hanging",
            hold: Duration::from_secs(60),
        }));
        let shows = vec![
            Show::new("lanz", "Markus Lanz", LANZ_URL),
            Show::new("broken", "Broken Show", "http://localhost/broken"),
            Show::new("hanging", "Hanging Show", "http://localhost/hanging"),
        ];
        Orchestrator::new(
            repo,
            registry,
            SessionPool::new(Arc::new(renderer), 4),
            shows,
            settings(Duration::from_millis(200)),
        )
    }

    fn selection(ids: &[&str]) -> ShowSelection {
        ShowSelection::Only(ids.iter().map(|s| s.to_string()).collect())
    }

    #[tokio::test]
    async fn test_failing_show_does_not_stop_others() {
        let (_dir, repo) = open_repo().await;
        let renderer = StaticRenderer::default()
            .with_page(LANZ_URL, &lanz_page(&["Markus Söder", "Karl Lauterbach"]))
            .with_page("http://localhost/broken", "<html><body>redesign</body></html>");
        let orchestrator = orchestrator(Arc::clone(&repo), renderer);

        let result = orchestrator
            .run_crawl(&selection(&["broken", "lanz"]))
            .await
            .unwrap();

        assert_eq!(result.shows[0].show_id, "broken");
        assert_eq!(result.shows[0].status, ShowStatus::Failure);
        assert!(result.shows[0].errors[0].contains("anchor"));

        let lanz = result.show("lanz").unwrap();
        assert_eq!(lanz.status, ShowStatus::Success);
        assert_eq!(lanz.inserted, 1);
        assert_eq!(repo.count_episodes("lanz").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_timeout_is_isolated_and_releases_session() {
        let (_dir, repo) = open_repo().await;
        let renderer =
            StaticRenderer::default().with_page(LANZ_URL, &lanz_page(&["Markus Söder"]));
        let orchestrator = orchestrator(Arc::clone(&repo), renderer);

        let result = orchestrator
            .run_crawl(&selection(&["hanging", "lanz"]))
            .await
            .unwrap();

        let hanging = result.show("hanging").unwrap();
        assert_eq!(hanging.status, ShowStatus::Failure);
        assert_eq!(hanging.errors, vec!["hanging: timed out after 200ms".to_string()]);
        assert_eq!(result.show("lanz").unwrap().inserted, 1);
        assert_eq!(orchestrator.pool.available(), 4);
    }

    #[tokio::test]
    async fn test_waiting_for_a_session_does_not_count_against_timeout() {
        let (_dir, repo) = open_repo().await;
        let mut registry = ExtractorRegistry::new();
        for id in ["first", "second"] {
            registry.register(Arc::new(SlowExtractor {
                id,
                hold: Duration::from_millis(150),
            }));
        }
        let orchestrator = Orchestrator::new(
            repo,
            registry,
            SessionPool::new(Arc::new(StaticRenderer::default()), 1),
            vec![
                Show::new("first", "First", "http://localhost/first"),
                Show::new("second", "Second", "http://localhost/second"),
            ],
            settings(Duration::from_millis(250)),
        );

        let result = orchestrator.run_crawl(&ShowSelection::All).await.unwrap();

        for report in &result.shows {
            assert_eq!(report.status, ShowStatus::Success, "{:?}", report.errors);
        }
        assert_eq!(orchestrator.pool.available(), 1);
    }

    #[tokio::test]
    async fn test_episode_write_fault_marks_show_partial() {
        let (_dir, repo) = open_repo().await;
        repo.execute_batch(
            r#"CREATE TRIGGER reject_episode BEFORE INSERT ON episodes
               WHEN NEW.title = 'Kaputt'
               BEGIN SELECT RAISE(ABORT, 'write rejected'); END;"#,
        )
        .await
        .unwrap();
        let page = lanz_listing(&[
            lanz_article("2024-03-05", "Montag", &["Markus Söder"]),
            lanz_article("2024-03-06", "Kaputt", &["Karl Lauterbach"]),
            lanz_article("2024-03-07", "Mittwoch", &["Ricarda Lang"]),
        ]);
        let orchestrator = orchestrator(
            Arc::clone(&repo),
            StaticRenderer::default().with_page(LANZ_URL, &page),
        );

        let result = orchestrator.run_crawl(&selection(&["lanz"])).await.unwrap();

        let lanz = result.show("lanz").unwrap();
        assert_eq!(lanz.status, ShowStatus::Partial);
        assert_eq!(lanz.episodes_seen, 3);
        assert_eq!(lanz.inserted, 2);
        assert_eq!(lanz.failed, 1);
        assert_eq!(lanz.errors.len(), 1);
        assert!(lanz.errors[0].starts_with("lanz/2024-03-06"));
        assert_eq!(repo.count_episodes("lanz").await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_repeated_run_is_unchanged() {
        let (_dir, repo) = open_repo().await;
        let renderer =
            StaticRenderer::default().with_page(LANZ_URL, &lanz_page(&["Markus Söder"]));
        let orchestrator = orchestrator(Arc::clone(&repo), renderer);

        let first = orchestrator.run_crawl(&selection(&["lanz"])).await.unwrap();
        let second = orchestrator.run_crawl(&selection(&["lanz"])).await.unwrap();

        assert_eq!(first.inserted(), 1);
        assert_eq!(second.inserted(), 0);
        assert_eq!(second.unchanged(), 1);
    }

    #[tokio::test]
    async fn test_second_run_with_added_guest_updates() {
        let (_dir, repo) = open_repo().await;
        let before = orchestrator(
            Arc::clone(&repo),
            StaticRenderer::default()
                .with_page(LANZ_URL, &lanz_page(&["Markus Söder", "Karl Lauterbach"])),
        );
        let after = orchestrator(
            Arc::clone(&repo),
            StaticRenderer::default().with_page(
                LANZ_URL,
                &lanz_page(&["Markus Söder", "Karl Lauterbach", "Ricarda Lang"]),
            ),
        );

        let first = before.run_crawl(&selection(&["lanz"])).await.unwrap();
        let second = after.run_crawl(&selection(&["lanz"])).await.unwrap();
        assert_eq!(first.inserted(), 1);
        assert_eq!(second.updated(), 1);

        let stats = repo.stats().await.unwrap();
        let lanz = stats.iter().find(|s| s.show_id == "lanz").unwrap();
        assert_eq!(lanz.appearances, 3);
    }

    #[tokio::test]
    async fn test_second_episode_on_known_date_is_not_duplicated() {
        let (_dir, repo) = open_repo().await;
        let one = lanz_listing(&[lanz_article("2024-03-05", "Teil A", &["Markus Söder"])]);
        let two = lanz_listing(&[
            lanz_article("2024-03-05", "Teil A", &["Markus Söder"]),
            lanz_article("2024-03-05", "Teil B", &["Karl Lauterbach"]),
        ]);
        let before = orchestrator(
            Arc::clone(&repo),
            StaticRenderer::default().with_page(LANZ_URL, &one),
        );
        let after = orchestrator(
            Arc::clone(&repo),
            StaticRenderer::default().with_page(LANZ_URL, &two),
        );

        assert_eq!(before.run_crawl(&selection(&["lanz"])).await.unwrap().inserted(), 1);
        let second = after.run_crawl(&selection(&["lanz"])).await.unwrap();
        assert_eq!(second.inserted(), 1);
        assert_eq!(second.updated(), 1);
        assert_eq!(repo.count_episodes("lanz").await.unwrap(), 2);

        let third = after.run_crawl(&selection(&["lanz"])).await.unwrap();
        assert_eq!(third.unchanged(), 2);
        assert_eq!(repo.count_episodes("lanz").await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_unresolved_guest_reported_in_result() {
        let (_dir, repo) = open_repo().await;
        let renderer = StaticRenderer::default()
            .with_page(LANZ_URL, &lanz_page(&["Jöns Müller-X", "Markus Söder"]));
        let orchestrator = orchestrator(Arc::clone(&repo), renderer);

        let result = orchestrator.run_crawl(&selection(&["lanz"])).await.unwrap();

        let unresolved = result.unresolved_guests();
        assert_eq!(unresolved.len(), 1);
        assert_eq!(unresolved[0].raw_name, "Jöns Müller-X");
        assert_eq!(repo.list_pending_reviews().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_setup_errors_are_hard_failures() {
        let (_dir, repo) = open_repo().await;
        let orchestrator = orchestrator(Arc::clone(&repo), StaticRenderer::default());

        let err = orchestrator
            .run_crawl(&selection(&["nonexistent"]))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::UnknownShow(id) if id == "nonexistent"));

        let err = orchestrator.run_crawl(&selection(&[])).await.unwrap_err();
        assert!(matches!(err, AppError::NoShowsConfigured));

        let empty = Orchestrator::new(
            repo,
            ExtractorRegistry::with_defaults(),
            SessionPool::new(Arc::new(StaticRenderer::default()), 1),
            Vec::new(),
            *orchestrator.settings(),
        );
        assert!(matches!(
            empty.run_crawl(&ShowSelection::All).await,
            Err(AppError::NoShowsConfigured)
        ));
    }
}
