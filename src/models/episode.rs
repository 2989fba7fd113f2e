use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// One episode as scraped from a listing page, before any identity resolution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawEpisode {
    pub show_id: String,
    pub air_date: NaiveDate,
    pub title: String,
    /// Guest strings exactly as rendered by the source, untrimmed.
    pub guests: Vec<String>,
    pub source_id: Option<String>,
}

/// Identifies a guest within an episode. Two appearances with the same key are the same guest.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum GuestKey {
    Politician(i64),
    /// Canonical form of a name that matched no politician.
    Unresolved(String),
}

impl GuestKey {
    pub fn as_db_key(&self) -> String {
        match self {
            GuestKey::Politician(id) => format!("p:{}", id),
            GuestKey::Unresolved(name) => format!("u:{}", name),
        }
    }

    pub fn from_db_key(key: &str) -> Option<Self> {
        if let Some(id) = key.strip_prefix("p:") {
            return id.parse().ok().map(GuestKey::Politician);
        }
        key.strip_prefix("u:")
            .map(|name| GuestKey::Unresolved(name.to_string()))
    }
}

impl fmt::Display for GuestKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_db_key())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizedGuestAppearance {
    pub politician_id: Option<i64>,
    pub party_id: Option<i64>,
    pub political_area_ids: Vec<i64>,
    pub raw_name: String,
    /// Whitespace/diacritic-folded name used for matching.
    pub canonical_name: String,
}

impl NormalizedGuestAppearance {
    pub fn key(&self) -> GuestKey {
        match self.politician_id {
            Some(id) => GuestKey::Politician(id),
            None => GuestKey::Unresolved(self.canonical_name.clone()),
        }
    }

    pub fn is_resolved(&self) -> bool {
        self.politician_id.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NaturalKey {
    pub show_id: String,
    pub air_date: NaiveDate,
    /// Empty unless the source has an episode id or several episodes share the date.
    pub slug: String,
}

impl fmt::Display for NaturalKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.slug.is_empty() {
            write!(f, "{}/{}", self.show_id, self.air_date)
        } else {
            write!(f, "{}/{}/{}", self.show_id, self.air_date, self.slug)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizedEpisode {
    pub key: NaturalKey,
    pub title: String,
    /// Deduplicated by guest key, in source order.
    pub appearances: Vec<NormalizedGuestAppearance>,
}

impl NormalizedEpisode {
    pub fn unresolved(&self) -> impl Iterator<Item = &NormalizedGuestAppearance> {
        self.appearances.iter().filter(|a| !a.is_resolved())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Episode {
    pub id: i64,
    pub key: NaturalKey,
    pub title: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuestAppearance {
    pub id: i64,
    pub episode_id: i64,
    pub position: i64,
    pub key: GuestKey,
    pub politician_id: Option<i64>,
    pub party_id: Option<i64>,
    pub political_area_ids: Vec<i64>,
    pub raw_name: String,
    pub pending_review: bool,
}

/// An unresolved guest marker joined with its episode, for manual follow-up.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingReview {
    pub appearance_id: i64,
    pub episode_id: i64,
    pub show_id: String,
    pub air_date: NaiveDate,
    pub raw_name: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_guest_key_db_format() {
        assert_eq!(GuestKey::Politician(42).as_db_key(), "p:42");
        assert_eq!(
            GuestKey::from_db_key("u:jons muller-x"),
            Some(GuestKey::Unresolved("jons muller-x".into()))
        );
        assert_eq!(GuestKey::from_db_key("p:7"), Some(GuestKey::Politician(7)));
        assert_eq!(GuestKey::from_db_key("x:7"), None);
    }

    #[test]
    fn test_natural_key_display_omits_empty_slug() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 5).unwrap();
        let key = NaturalKey {
            show_id: "lanz".into(),
            air_date: date,
            slug: String::new(),
        };
        assert_eq!(key.to_string(), "lanz/2024-03-05");
        let key = NaturalKey {
            slug: "spezial".into(),
            ..key
        };
        assert_eq!(key.to_string(), "lanz/2024-03-05/spezial");
    }
}
