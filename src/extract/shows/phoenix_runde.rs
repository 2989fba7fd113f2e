use std::sync::LazyLock;

use scraper::{Html, Selector};

use crate::extract::shared::{element_text, first_text, parse_german_date, selector};
use crate::extract::SourceExtractor;
use crate::models::{RawEpisode, Show};

static BROADCAST: LazyLock<Selector> = LazyLock::new(|| selector("div.sendung"));
static DATE: LazyLock<Selector> = LazyLock::new(|| selector(".sendung__datum"));
static TITLE: LazyLock<Selector> = LazyLock::new(|| selector(".sendung__titel"));
/// Only the bold part of a guest entry is the name; the rest is the role.
static GUEST_NAME: LazyLock<Selector> =
    LazyLock::new(|| selector(".sendung__gaeste .gast strong"));

pub struct PhoenixRunde;

impl SourceExtractor for PhoenixRunde {
    fn show_id(&self) -> &'static str {
        "phoenix-runde"
    }

    fn anchor(&self) -> &'static str {
        ".sendungsliste"
    }

    fn parse_listing(&self, show: &Show, document: &Html) -> Vec<RawEpisode> {
        document
            .select(&BROADCAST)
            .filter_map(|broadcast| {
                let air_date = first_text(broadcast, &DATE).and_then(|t| parse_german_date(&t))?;
                Some(RawEpisode {
                    show_id: show.id.clone(),
                    air_date,
                    title: first_text(broadcast, &TITLE).unwrap_or_default(),
                    guests: broadcast.select(&GUEST_NAME).map(element_text).collect(),
                    source_id: None,
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_phoenix_runde_listing() {
        let html = r#"
            <div class="sendungsliste">
              <div class="sendung">
                <span class="sendung__datum">Dienstag, 5. März 2024</span>
                <a class="sendung__titel" href="/runde-1">Bauernproteste – was nun?</a>
                <div class="sendung__gaeste">
                  <span class="gast"><strong>Cem Özdemir</strong>, Bundeslandwirtschaftsminister</span>
                  <span class="gast"><strong>Ricarda Lang</strong>, Bündnis 90/Die Grünen</span>
                </div>
              </div>
            </div>"#;
        let show = Show::new("phoenix-runde", "Phoenix Runde", "http://localhost/phoenix");
        let episodes = PhoenixRunde.parse_listing(&show, &Html::parse_document(html));

        assert_eq!(episodes.len(), 1);
        assert_eq!(episodes[0].air_date.to_string(), "2024-03-05");
        assert_eq!(episodes[0].title, "Bauernproteste – was nun?");
        assert_eq!(episodes[0].guests, vec!["Cem Özdemir", "Ricarda Lang"]);
    }
}
