mod page;
pub mod shared;
mod shows;

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use scraper::Html;

use crate::error::ExtractionError;
use crate::models::{RawEpisode, Show};

pub use page::{HttpRenderer, PageRenderer, PageSession, SessionPool};
pub use shows::{HartAberFair, Illner, Lanz, Maischberger, PhoenixRunde};

/// One implementation per show; each knows only its site's markup.
#[async_trait]
pub trait SourceExtractor: Send + Sync {
    fn show_id(&self) -> &'static str;

    /// Selector that is present on every intact listing page, even an empty one.
    fn anchor(&self) -> &'static str;

    /// Pulls all recognizable episode blocks out of one listing page.
    fn parse_listing(&self, show: &Show, document: &Html) -> Vec<RawEpisode>;

    /// Loads and parses every listing page through an already acquired session.
    async fn extract(
        &self,
        show: &Show,
        session: &PageSession,
    ) -> Result<Vec<RawEpisode>, ExtractionError> {
        shared::extract_listing(self, show, session).await
    }
}

/// Extractors keyed by show id.
#[derive(Clone, Default)]
pub struct ExtractorRegistry {
    extractors: BTreeMap<String, Arc<dyn SourceExtractor>>,
}

impl ExtractorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(Lanz));
        registry.register(Arc::new(HartAberFair));
        registry.register(Arc::new(PhoenixRunde));
        registry.register(Arc::new(Maischberger));
        registry.register(Arc::new(Illner));
        registry
    }

    pub fn register(&mut self, extractor: Arc<dyn SourceExtractor>) {
        self.extractors
            .insert(extractor.show_id().to_string(), extractor);
    }

    pub fn get(&self, show_id: &str) -> Option<Arc<dyn SourceExtractor>> {
        self.extractors.get(show_id).cloned()
    }

    pub fn show_ids(&self) -> impl Iterator<Item = &str> {
        self.extractors.keys().map(String::as_str)
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::collections::HashMap;

    use async_trait::async_trait;

    use super::PageRenderer;
    use crate::error::ExtractionCause;

    /// Serves canned HTML by URL; unknown URLs answer 404.
    #[derive(Default)]
    pub struct StaticRenderer {
        pages: HashMap<String, String>,
    }

    impl StaticRenderer {
        pub fn with_page(mut self, url: &str, html: &str) -> Self {
            self.pages.insert(url.to_string(), html.to_string());
            self
        }
    }

    #[async_trait]
    impl PageRenderer for StaticRenderer {
        async fn render(&self, url: &str) -> Result<String, ExtractionCause> {
            self.pages
                .get(url)
                .cloned()
                .ok_or_else(|| ExtractionCause::HttpStatus {
                    url: url.to_string(),
                    status: 404,
                })
        }
    }
}
