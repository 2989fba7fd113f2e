use serde::{Deserialize, Serialize};

const PAGE_PLACEHOLDER: &str = "{page}";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Show {
    pub id: String,
    pub name: String,
    /// Listing URL; `{page}` is replaced with 1..=max_pages when present.
    pub url_template: String,
    #[serde(default = "default_max_pages")]
    pub max_pages: u32,
}

fn default_max_pages() -> u32 {
    1
}

impl Show {
    pub fn new(id: &str, name: &str, url_template: &str) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            url_template: url_template.to_string(),
            max_pages: default_max_pages(),
        }
    }

    pub fn with_max_pages(mut self, max_pages: u32) -> Self {
        self.max_pages = max_pages;
        self
    }

    pub fn listing_urls(&self) -> Vec<String> {
        if !self.url_template.contains(PAGE_PLACEHOLDER) {
            return vec![self.url_template.clone()];
        }
        (1..=self.max_pages.max(1))
            .map(|page| self.url_template.replace(PAGE_PLACEHOLDER, &page.to_string()))
            .collect()
    }
}

/// Which shows a crawl run should cover.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShowSelection {
    All,
    Only(Vec<String>),
}

impl ShowSelection {
    pub fn single(show_id: &str) -> Self {
        Self::Only(vec![show_id.to_string()])
    }

    /// "all" (case-insensitive) selects every configured show.
    pub fn parse(arg: &str) -> Self {
        if arg.eq_ignore_ascii_case("all") {
            return Self::All;
        }
        Self::Only(
            arg.split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect(),
        )
    }
}
