use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use crate::error::{ExtractionCause, ExtractionError, Result};

/// Produces the rendered HTML of a listing page.
#[async_trait]
pub trait PageRenderer: Send + Sync {
    async fn render(&self, url: &str) -> std::result::Result<String, ExtractionCause>;
}

/// Fetches pages over plain HTTP with browser-like headers.
pub struct HttpRenderer {
    client: Client,
}

impl HttpRenderer {
    pub fn new(user_agent: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(Duration::from_secs(10))
            .user_agent(user_agent)
            .cookie_store(true)
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl PageRenderer for HttpRenderer {
    async fn render(&self, url: &str) -> std::result::Result<String, ExtractionCause> {
        let fetch_error = |e: reqwest::Error| ExtractionCause::Fetch {
            url: url.to_string(),
            message: e.to_string(),
        };

        let response = self
            .client
            .get(url)
            .header(reqwest::header::ACCEPT_LANGUAGE, "de-DE,de;q=0.9")
            .send()
            .await
            .map_err(fetch_error)?;

        if !response.status().is_success() {
            return Err(ExtractionCause::HttpStatus {
                url: url.to_string(),
                status: response.status().as_u16(),
            });
        }

        response.text().await.map_err(fetch_error)
    }
}

/// Bounds how many rendering sessions are open at once.
#[derive(Clone)]
pub struct SessionPool {
    renderer: Arc<dyn PageRenderer>,
    slots: Arc<Semaphore>,
}

impl SessionPool {
    pub fn new(renderer: Arc<dyn PageRenderer>, max_sessions: usize) -> Self {
        Self {
            renderer,
            slots: Arc::new(Semaphore::new(max_sessions.max(1))),
        }
    }

    pub async fn acquire(
        &self,
        show_id: &str,
    ) -> std::result::Result<PageSession, ExtractionError> {
        let permit = Arc::clone(&self.slots).acquire_owned().await.map_err(|_| {
            ExtractionError::new(
                show_id,
                ExtractionCause::Fetch {
                    url: String::new(),
                    message: "session pool closed".to_string(),
                },
            )
        })?;
        tracing::debug!("Opened page session for {}", show_id);
        Ok(PageSession {
            show_id: show_id.to_string(),
            renderer: Arc::clone(&self.renderer),
            _permit: permit,
        })
    }

    pub fn available(&self) -> usize {
        self.slots.available_permits()
    }
}

/// A rendering session; its slot is returned when the session is dropped,
/// including when the owning extraction is cancelled by a timeout.
pub struct PageSession {
    show_id: String,
    renderer: Arc<dyn PageRenderer>,
    _permit: OwnedSemaphorePermit,
}

impl PageSession {
    pub async fn render(&self, url: &str) -> std::result::Result<String, ExtractionCause> {
        tracing::debug!("Rendering {} for {}", url, self.show_id);
        self.renderer.render(url).await
    }
}

impl Drop for PageSession {
    fn drop(&mut self) {
        tracing::debug!("Released page session for {}", self.show_id);
    }
}
