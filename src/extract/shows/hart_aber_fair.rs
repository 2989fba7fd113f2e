use std::sync::LazyLock;

use scraper::{Html, Selector};

use crate::extract::shared::{first_text, parse_german_date, selector, split_guest_list};
use crate::extract::SourceExtractor;
use crate::models::{RawEpisode, Show};

static TEASER: LazyLock<Selector> = LazyLock::new(|| selector("div.teaser"));
static KICKER: LazyLock<Selector> = LazyLock::new(|| selector(".dachzeile"));
static HEADLINE: LazyLock<Selector> = LazyLock::new(|| selector(".headline"));
static TEXT: LazyLock<Selector> = LazyLock::new(|| selector(".teasertext"));

/// WDR "Hart aber fair": teasers with the date in the kicker line and the
/// guests as prose ("Gäste: A, B und C").
pub struct HartAberFair;

impl SourceExtractor for HartAberFair {
    fn show_id(&self) -> &'static str {
        "hart-aber-fair"
    }

    fn anchor(&self) -> &'static str {
        "section.sendungen"
    }

    fn parse_listing(&self, show: &Show, document: &Html) -> Vec<RawEpisode> {
        document
            .select(&TEASER)
            .filter_map(|teaser| {
                let air_date = first_text(teaser, &KICKER).and_then(|t| parse_german_date(&t))?;
                let guests = first_text(teaser, &TEXT)
                    .map(|text| split_guest_list(&text))
                    .unwrap_or_default();

                Some(RawEpisode {
                    show_id: show.id.clone(),
                    air_date,
                    title: first_text(teaser, &HEADLINE).unwrap_or_default(),
                    guests,
                    source_id: None,
                })
            })
            .collect()
    }
}
