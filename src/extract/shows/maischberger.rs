use std::sync::LazyLock;

use scraper::{Html, Selector};

use crate::extract::shared::{element_text, first_text, parse_german_date, selector};
use crate::extract::SourceExtractor;
use crate::models::{RawEpisode, Show};

static ENTRY: LazyLock<Selector> = LazyLock::new(|| selector(".modCon .teaser"));
static DATE: LazyLock<Selector> = LazyLock::new(|| selector("h3.ressort"));
static TITLE: LazyLock<Selector> = LazyLock::new(|| selector("h4.headline a"));
static GUEST: LazyLock<Selector> = LazyLock::new(|| selector("ul.gaeste li .name"));
static LINK: LazyLock<Selector> = LazyLock::new(|| selector("h4.headline a[href]"));

/// ARD "maischberger"; several broadcasts per week, so the episode link is
/// kept as source id.
pub struct Maischberger;

impl SourceExtractor for Maischberger {
    fn show_id(&self) -> &'static str {
        "maischberger"
    }

    fn anchor(&self) -> &'static str {
        ".modCon"
    }

    fn parse_listing(&self, show: &Show, document: &Html) -> Vec<RawEpisode> {
        document
            .select(&ENTRY)
            .filter_map(|entry| {
                let air_date = first_text(entry, &DATE).and_then(|t| parse_german_date(&t))?;
                let source_id = entry
                    .select(&LINK)
                    .next()
                    .and_then(|a| a.value().attr("href"))
                    .and_then(episode_id_from_href);

                Some(RawEpisode {
                    show_id: show.id.clone(),
                    air_date,
                    title: first_text(entry, &TITLE).unwrap_or_default(),
                    guests: entry.select(&GUEST).map(element_text).collect(),
                    source_id,
                })
            })
            .collect()
    }
}

/// ".../sendung/maischberger-am-06-03-2024-100.html" -> "maischberger-am-06-03-2024-100"
fn episode_id_from_href(href: &str) -> Option<String> {
    let file = href.rsplit('/').next()?;
    let id = file.strip_suffix(".html").unwrap_or(file);
    (!id.is_empty()).then(|| id.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_maischberger_listing() {
        let html = r#"
            <div class="modCon">
              <div class="teaser">
                <h3 class="ressort">maischberger am 06.03.2024</h3>
                <h4 class="headline"><a href="/information/talk/maischberger/sendung/maischberger-am-06-03-2024-100.html">Wie weiter in Nahost?</a></h4>
                <ul class="gaeste">
                  <li><span class="name">Friedrich Merz</span> <span class="rolle">CDU-Vorsitzender</span></li>
                  <li><span class="name">Jöns Müller-X</span></li>
                </ul>
              </div>
            </div>"#;
        let show = Show::new("maischberger", "maischberger", "http://localhost/m");
        let episodes = Maischberger.parse_listing(&show, &Html::parse_document(html));

        assert_eq!(episodes.len(), 1);
        assert_eq!(episodes[0].air_date.to_string(), "2024-03-06");
        assert_eq!(episodes[0].guests, vec!["Friedrich Merz", "Jöns Müller-X"]);
        assert_eq!(
            episodes[0].source_id.as_deref(),
            Some("maischberger-am-06-03-2024-100")
        );
    }

    #[test]
    fn test_episode_id_from_href() {
        assert_eq!(episode_id_from_href("/a/b/"), None);
        assert_eq!(episode_id_from_href("x.html").as_deref(), Some("x"));
    }
}
