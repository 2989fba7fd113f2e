use std::sync::LazyLock;

use scraper::{Html, Selector};

use crate::extract::shared::{first_text, parse_german_date, selector, split_guest_list};
use crate::extract::SourceExtractor;
use crate::models::{RawEpisode, Show};

static ITEM: LazyLock<Selector> = LazyLock::new(|| selector("article.b-content-teaser-item"));
static INFO: LazyLock<Selector> = LazyLock::new(|| selector(".teaser-info"));
static TITLE: LazyLock<Selector> = LazyLock::new(|| selector(".teaser-title"));
static TEXT: LazyLock<Selector> = LazyLock::new(|| selector(".teaser-text"));

pub struct Illner;

impl SourceExtractor for Illner {
    fn show_id(&self) -> &'static str {
        "illner"
    }

    fn anchor(&self) -> &'static str {
        ".b-cluster"
    }

    fn parse_listing(&self, show: &Show, document: &Html) -> Vec<RawEpisode> {
        document
            .select(&ITEM)
            .filter_map(|item| {
                let air_date = first_text(item, &INFO).and_then(|t| parse_german_date(&t))?;
                Some(RawEpisode {
                    show_id: show.id.clone(),
                    air_date,
                    title: first_text(item, &TITLE).unwrap_or_default(),
                    guests: first_text(item, &TEXT)
                        .map(|text| split_guest_list(&text))
                        .unwrap_or_default(),
                    source_id: None,
                })
            })
            .collect()
    }
}
