//! Guest-name resolution against the politician reference table.
//!
//! Normalization is a pure function of the raw episode and the reference
//! snapshot taken at the start of a run, so re-crawling an unchanged page
//! yields identical output and the merge step can detect no-ops.

mod matching;

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use crate::db::Repository;
use crate::error::Result;
use crate::models::{
    GuestKey, NaturalKey, NormalizedEpisode, NormalizedGuestAppearance, Politician, RawEpisode,
};

pub use matching::{canonical_name, fold_diacritics, similarity, slugify};

/// Scores closer than this are treated as a tie between two politicians.
const TIE_EPSILON: f64 = 1e-9;

/// Immutable snapshot of the politician table, indexed for matching.
#[derive(Debug, Clone, Default)]
pub struct ReferenceTable {
    politicians: Vec<Politician>,
    /// canonical name or alias -> politician indexes
    exact: BTreeMap<String, Vec<usize>>,
    /// (canonical name, politician index), ordered by politician id
    candidates: Vec<(String, usize)>,
}

impl ReferenceTable {
    pub fn new(mut politicians: Vec<Politician>) -> Self {
        politicians.sort_by_key(|p| p.id);

        let mut exact: BTreeMap<String, Vec<usize>> = BTreeMap::new();
        let mut candidates = Vec::new();
        for (idx, politician) in politicians.iter().enumerate() {
            let names = std::iter::once(&politician.name).chain(politician.aliases.iter());
            for name in names {
                let canonical = canonical_name(name);
                if canonical.is_empty() {
                    continue;
                }
                let entry = exact.entry(canonical.clone()).or_default();
                if !entry.contains(&idx) {
                    entry.push(idx);
                    candidates.push((canonical, idx));
                }
            }
        }

        Self {
            politicians,
            exact,
            candidates,
        }
    }

    pub async fn load(repo: &Repository) -> Result<Self> {
        Ok(Self::new(repo.load_politicians().await?))
    }

    pub fn len(&self) -> usize {
        self.politicians.len()
    }

    pub fn is_empty(&self) -> bool {
        self.politicians.is_empty()
    }

    fn exact_match(&self, canonical: &str) -> Option<&Politician> {
        match self.exact.get(canonical).map(Vec::as_slice) {
            Some([idx]) => Some(&self.politicians[*idx]),
            _ => None,
        }
    }

    /// Best fuzzy candidate at or above `threshold`, unless two politicians tie for it.
    fn fuzzy_match(&self, canonical: &str, threshold: f64) -> Option<(&Politician, f64)> {
        let mut best: Option<(usize, f64)> = None;
        let mut tied = false;
        for (name, idx) in &self.candidates {
            let score = similarity(canonical, name);
            match best {
                Some((best_idx, best_score)) if (score - best_score).abs() <= TIE_EPSILON => {
                    if best_idx != *idx {
                        tied = true;
                    }
                }
                Some((_, best_score)) if score < best_score => {}
                _ => {
                    best = Some((*idx, score));
                    tied = false;
                }
            }
        }

        let (idx, score) = best?;
        if tied || score < threshold {
            return None;
        }
        Some((&self.politicians[idx], score))
    }
}

pub struct Normalizer {
    table: Arc<ReferenceTable>,
    threshold: f64,
}

impl Normalizer {
    pub fn new(table: Arc<ReferenceTable>, threshold: f64) -> Self {
        Self { table, threshold }
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Resolves one raw guest string. Returns `None` for strings that are blank once cleaned.
    pub fn resolve_guest(&self, raw_name: &str) -> Option<NormalizedGuestAppearance> {
        let canonical = canonical_name(raw_name);
        if canonical.is_empty() {
            return None;
        }

        let matched = self.table.exact_match(&canonical).or_else(|| {
            self.table
                .fuzzy_match(&canonical, self.threshold)
                .map(|(politician, score)| {
                    tracing::debug!(
                        "Fuzzy matched {:?} to {} (score {:.3})",
                        raw_name.trim(),
                        politician.name,
                        score
                    );
                    politician
                })
        });

        Some(match matched {
            Some(politician) => NormalizedGuestAppearance {
                politician_id: Some(politician.id),
                party_id: politician.party_id,
                political_area_ids: politician.political_area_ids.clone(),
                raw_name: raw_name.trim().to_string(),
                canonical_name: canonical,
            },
            None => NormalizedGuestAppearance {
                politician_id: None,
                party_id: None,
                political_area_ids: Vec::new(),
                raw_name: raw_name.trim().to_string(),
                canonical_name: canonical,
            },
        })
    }

    /// Normalizes one episode. The slug comes from the source episode id, if any.
    pub fn normalize(&self, raw: &RawEpisode) -> NormalizedEpisode {
        let slug = raw.source_id.as_deref().map(slugify).unwrap_or_default();
        self.normalize_with_slug(raw, slug)
    }

    /// Normalizes a whole listing, deriving slugs from titles where several
    /// episodes without a source id share an air date.
    pub fn normalize_listing(&self, raws: &[RawEpisode]) -> Vec<NormalizedEpisode> {
        let mut per_date: HashMap<_, usize> = HashMap::new();
        for raw in raws.iter().filter(|r| r.source_id.is_none()) {
            *per_date.entry(raw.air_date).or_default() += 1;
        }

        raws.iter()
            .map(|raw| {
                let slug = match raw.source_id.as_deref() {
                    Some(id) => slugify(id),
                    None if per_date.get(&raw.air_date).copied().unwrap_or(0) > 1 => {
                        slugify(&raw.title)
                    }
                    None => String::new(),
                };
                self.normalize_with_slug(raw, slug)
            })
            .collect()
    }

    fn normalize_with_slug(&self, raw: &RawEpisode, slug: String) -> NormalizedEpisode {
        let mut seen: Vec<GuestKey> = Vec::new();
        let mut appearances = Vec::new();
        for guest in &raw.guests {
            let Some(appearance) = self.resolve_guest(guest) else {
                continue;
            };
            let key = appearance.key();
            if seen.contains(&key) {
                continue;
            }
            seen.push(key);
            appearances.push(appearance);
        }

        NormalizedEpisode {
            key: NaturalKey {
                show_id: raw.show_id.clone(),
                air_date: raw.air_date,
                slug,
            },
            title: raw.title.split_whitespace().collect::<Vec<_>>().join(" "),
            appearances,
        }
    }
}
