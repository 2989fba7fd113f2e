//! Extraction helpers shared by every show: the page loop with its anchor
//! check, selector helpers, German date parsing and guest-list splitting.

use std::sync::LazyLock;

use chrono::NaiveDate;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};

use super::page::PageSession;
use super::SourceExtractor;
use crate::error::{ExtractionCause, ExtractionError};
use crate::models::{RawEpisode, Show};

static RE_NUMERIC_DATE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(\d{1,2})\.\s?(\d{1,2})\.\s?(\d{4}|\d{2})\b")
        .expect("invalid regex: numeric date")
});

static RE_LONG_DATE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(\d{1,2})\.\s*([a-zäöü]+)\.?\s+(\d{4})\b")
        .expect("invalid regex: long date")
});

static RE_ISO_DATE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(\d{4})-(\d{2})-(\d{2})").expect("invalid regex: iso date")
});

static RE_GUEST_LABEL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^\s*(?:gäste|gaeste|zu gast|mit den gästen|mit)\s*:?\s+")
        .expect("invalid regex: guest label")
});

static RE_GUEST_SEPARATOR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\s*[,;]\s*|\s+und\s+|\s+sowie\s+").expect("invalid regex: guest separator")
});

pub fn selector(css: &str) -> Selector {
    Selector::parse(css).unwrap_or_else(|e| panic!("invalid selector {css:?}: {e:?}"))
}

/// Raw text of an element, exactly as rendered (no trimming).
pub fn element_text(element: ElementRef) -> String {
    element.text().collect::<String>()
}

pub fn first_text(element: ElementRef, selector: &Selector) -> Option<String> {
    element.select(selector).next().map(element_text)
}

pub fn first_attr(element: ElementRef, selector: &Selector, attr: &str) -> Option<String> {
    element
        .select(selector)
        .find_map(|e| e.value().attr(attr))
        .map(str::to_string)
}

pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn german_month(name: &str) -> Option<u32> {
    let name = name.to_lowercase();
    let month = match name.trim_end_matches('.') {
        "januar" | "jan" | "jänner" => 1,
        "februar" | "feb" => 2,
        "märz" | "maerz" | "mär" | "mrz" => 3,
        "april" | "apr" => 4,
        "mai" => 5,
        "juni" | "jun" => 6,
        "juli" | "jul" => 7,
        "august" | "aug" => 8,
        "september" | "sep" | "sept" => 9,
        "oktober" | "okt" => 10,
        "november" | "nov" => 11,
        "dezember" | "dez" => 12,
        _ => return None,
    };
    Some(month)
}

/// Finds the first date in free text: "05.03.2024", "5.3.24", "5. März 2024" or "2024-03-05".
pub fn parse_german_date(text: &str) -> Option<NaiveDate> {
    if let Some(caps) = RE_ISO_DATE.captures(text) {
        let date = NaiveDate::from_ymd_opt(
            caps[1].parse().ok()?,
            caps[2].parse().ok()?,
            caps[3].parse().ok()?,
        );
        if date.is_some() {
            return date;
        }
    }

    if let Some(caps) = RE_NUMERIC_DATE.captures(text) {
        let day: u32 = caps[1].parse().ok()?;
        let month: u32 = caps[2].parse().ok()?;
        let mut year: i32 = caps[3].parse().ok()?;
        if caps[3].len() == 2 {
            year += 2000;
        }
        return NaiveDate::from_ymd_opt(year, month, day);
    }

    let caps = RE_LONG_DATE.captures(text)?;
    let day: u32 = caps[1].parse().ok()?;
    let month = german_month(&caps[2])?;
    let year: i32 = caps[3].parse().ok()?;
    NaiveDate::from_ymd_opt(year, month, day)
}

/// Splits prose like "Gäste: A, B und C" into the individual (untrimmed) names.
/// Separators inside parentheses or brackets belong to the name's role note.
pub fn split_guest_list(text: &str) -> Vec<String> {
    let body = RE_GUEST_LABEL.replace(text, "");
    let mut names = Vec::new();
    let mut start = 0;
    for separator in RE_GUEST_SEPARATOR.find_iter(&body) {
        if bracket_depth(&body[..separator.start()]) > 0 {
            continue;
        }
        names.push(&body[start..separator.start()]);
        start = separator.end();
    }
    names.push(&body[start..]);

    names
        .into_iter()
        .filter(|part| !part.trim().is_empty())
        .map(str::to_string)
        .collect()
}

fn bracket_depth(text: &str) -> i32 {
    text.chars().fold(0, |depth, c| match c {
        '(' | '[' => depth + 1,
        ')' | ']' => depth - 1,
        _ => depth,
    })
}

/// Loads every listing page of `show` through `session` and hands each
/// parsed document to the extractor.
///
/// A missing anchor on the first page is an error; on later pages it marks
/// the end of the pagination.
pub async fn extract_listing<E>(
    extractor: &E,
    show: &Show,
    session: &PageSession,
) -> Result<Vec<RawEpisode>, ExtractionError>
where
    E: SourceExtractor + ?Sized,
{
    let anchor = selector(extractor.anchor());
    let mut episodes = Vec::new();

    for (page, url) in show.listing_urls().into_iter().enumerate() {
        let html = match session.render(&url).await {
            Ok(html) => html,
            Err(ExtractionCause::HttpStatus { status: 404, .. }) if page > 0 => break,
            Err(cause) => return Err(ExtractionError::new(&show.id, cause)),
        };

        let parsed = {
            let document = Html::parse_document(&html);
            if document.select(&anchor).next().is_none() {
                None
            } else {
                Some(extractor.parse_listing(show, &document))
            }
        };

        match parsed {
            Some(found) => {
                tracing::debug!("{}: {} episodes on {}", show.id, found.len(), url);
                episodes.extend(found);
            }
            None if page > 0 => break,
            None => {
                return Err(ExtractionError::new(
                    &show.id,
                    ExtractionCause::AnchorMissing {
                        url,
                        anchor: extractor.anchor().to_string(),
                    },
                ))
            }
        }
    }

    Ok(episodes)
}
