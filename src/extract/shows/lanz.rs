use std::sync::LazyLock;

use scraper::{Html, Selector};

use crate::extract::shared::{element_text, first_attr, first_text, parse_german_date, selector};
use crate::extract::SourceExtractor;
use crate::models::{RawEpisode, Show};

static EPISODE: LazyLock<Selector> = LazyLock::new(|| selector("article.episode"));
static TIME: LazyLock<Selector> = LazyLock::new(|| selector("time"));
static TITLE: LazyLock<Selector> = LazyLock::new(|| selector(".episode-title"));
static GUEST: LazyLock<Selector> = LazyLock::new(|| selector("ul.guests li"));

/// ZDF "Markus Lanz": one `<article>` per episode, guests as list items.
pub struct Lanz;

impl SourceExtractor for Lanz {
    fn show_id(&self) -> &'static str {
        "lanz"
    }

    fn anchor(&self) -> &'static str {
        ".episode-list"
    }

    fn parse_listing(&self, show: &Show, document: &Html) -> Vec<RawEpisode> {
        document
            .select(&EPISODE)
            .filter_map(|episode| {
                let air_date = first_attr(episode, &TIME, "datetime")
                    .or_else(|| first_text(episode, &TIME))
                    .and_then(|text| parse_german_date(&text));
                let Some(air_date) = air_date else {
                    tracing::debug!("lanz: skipping episode block without date");
                    return None;
                };

                Some(RawEpisode {
                    show_id: show.id.clone(),
                    air_date,
                    title: first_text(episode, &TITLE).unwrap_or_default(),
                    guests: episode.select(&GUEST).map(element_text).collect(),
                    source_id: episode.value().attr("data-episode-id").map(str::to_string),
                })
            })
            .collect()
    }
}
