//! Reconciles normalized episodes with the persisted store.
//!
//! Episodes are matched by natural key. Guest appearances are append-only:
//! a guest missing from a later crawl keeps its row.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info};

use crate::db::{EpisodeInsert, PendingResolution, Repository};
use crate::error::{AppError, Result};
use crate::models::{Episode, GuestKey, NormalizedEpisode, PendingReview, ReconcileOutcome};
use crate::normalize::{slugify, Normalizer};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReResolveSummary {
    pub linked: usize,
    pub merged: usize,
    pub still_pending: usize,
}

pub struct MergeEngine {
    repo: Arc<Repository>,
}

impl MergeEngine {
    pub fn new(repo: Arc<Repository>) -> Self {
        Self { repo }
    }

    pub async fn reconcile(&self, episode: &NormalizedEpisode) -> Result<ReconcileOutcome> {
        if let Some((existing, rekeyed)) = self.find_existing(episode).await? {
            let outcome = self.merge_into(existing, episode).await?;
            return Ok(match outcome {
                ReconcileOutcome::Unchanged if rekeyed => ReconcileOutcome::Updated,
                outcome => outcome,
            });
        }

        match self.repo.insert_episode_with_appearances(episode).await? {
            EpisodeInsert::Inserted(_) => {
                debug!(
                    "Inserted episode {} with {} guests",
                    episode.key,
                    episode.appearances.len()
                );
                Ok(ReconcileOutcome::Inserted)
            }
            EpisodeInsert::Conflict => {
                // A concurrent run inserted the same key between lookup and insert.
                debug!("Insert conflict on {}, merging instead", episode.key);
                let existing = self
                    .repo
                    .find_episode_by_natural_key(&episode.key)
                    .await?
                    .ok_or_else(|| {
                        AppError::Other(anyhow::anyhow!(
                            "episode {} vanished after insert conflict",
                            episode.key
                        ))
                    })?;
                self.merge_into(existing, episode).await
            }
        }
    }

    /// Stored row for `episode`, and whether it had to be re-keyed.
    ///
    /// An episode alone on its air date is keyed with an empty slug and one
    /// sharing the date with others by its title slug, so the same episode can
    /// arrive under either form. A same-date row with the same title under the
    /// other form is the same episode.
    async fn find_existing(&self, episode: &NormalizedEpisode) -> Result<Option<(Episode, bool)>> {
        let key = &episode.key;
        if let Some(found) = self.repo.find_episode_by_natural_key(key).await? {
            return Ok(Some((found, false)));
        }

        let title_slug = slugify(&episode.title);
        if title_slug.is_empty() || !(key.slug.is_empty() || key.slug == title_slug) {
            return Ok(None);
        }
        // The other slug form this episode may be stored under.
        let stored_slug = if key.slug.is_empty() { title_slug.as_str() } else { "" };
        let same_title = self
            .repo
            .list_episodes_on(&key.show_id, key.air_date)
            .await?
            .into_iter()
            .find(|e| e.key.slug == stored_slug && slugify(&e.title) == title_slug);
        let Some(stored) = same_title else {
            return Ok(None);
        };
        if key.slug.is_empty() {
            return Ok(Some((stored, false)));
        }

        if self.repo.rekey_episode(stored.id, "", &key.slug).await? {
            debug!("Re-keyed episode {} to slug {}", stored.id, key.slug);
            let rekeyed = Episode {
                key: key.clone(),
                ..stored
            };
            return Ok(Some((rekeyed, true)));
        }
        // Another writer re-keyed it or took the slug first.
        Ok(self
            .repo
            .find_episode_by_natural_key(key)
            .await?
            .map(|found| (found, false)))
    }

    async fn merge_into(
        &self,
        existing: Episode,
        incoming: &NormalizedEpisode,
    ) -> Result<ReconcileOutcome> {
        let persisted = self.repo.list_guest_appearances(existing.id).await?;
        let mut known: HashSet<GuestKey> = persisted.iter().map(|a| a.key.clone()).collect();
        let pending: HashMap<String, PendingReview> = persisted
            .iter()
            .filter_map(|a| match &a.key {
                GuestKey::Unresolved(name) => Some((
                    name.clone(),
                    PendingReview {
                        appearance_id: a.id,
                        episode_id: existing.id,
                        show_id: existing.key.show_id.clone(),
                        air_date: existing.key.air_date,
                        raw_name: a.raw_name.clone(),
                    },
                )),
                GuestKey::Politician(_) => None,
            })
            .collect();
        let mut next_position = persisted
            .iter()
            .map(|a| a.position + 1)
            .max()
            .unwrap_or(0);
        let mut changed = false;

        for appearance in &incoming.appearances {
            let key = appearance.key();
            if known.contains(&key) {
                continue;
            }

            // Same name now resolves: upgrade the stored marker in place.
            if appearance.is_resolved() {
                if let Some(marker) = pending.get(&appearance.canonical_name) {
                    if known.contains(&GuestKey::Unresolved(appearance.canonical_name.clone())) {
                        self.repo.resolve_pending(marker, appearance).await?;
                        known.remove(&GuestKey::Unresolved(appearance.canonical_name.clone()));
                        known.insert(key);
                        changed = true;
                        continue;
                    }
                }
            }

            if self
                .repo
                .insert_guest_appearance(existing.id, next_position, appearance)
                .await?
            {
                next_position += 1;
                changed = true;
            }
            known.insert(key);
        }

        if !incoming.title.is_empty() && incoming.title != existing.title {
            self.repo
                .update_episode_title(existing.id, &incoming.title)
                .await?;
            changed = true;
        }

        if changed {
            self.repo.touch_episode(existing.id).await?;
            debug!("Updated episode {}", incoming.key);
            Ok(ReconcileOutcome::Updated)
        } else {
            Ok(ReconcileOutcome::Unchanged)
        }
    }

    /// Re-runs name resolution over stored pending-review markers, linking
    /// those that the current reference table can now resolve.
    pub async fn re_resolve_pending(&self, normalizer: &Normalizer) -> Result<ReResolveSummary> {
        let mut summary = ReResolveSummary::default();
        for pending in self.repo.list_pending_reviews().await? {
            let resolved = normalizer
                .resolve_guest(&pending.raw_name)
                .filter(|a| a.is_resolved());
            let Some(resolved) = resolved else {
                summary.still_pending += 1;
                continue;
            };
            match self.repo.resolve_pending(&pending, &resolved).await? {
                PendingResolution::Linked => summary.linked += 1,
                PendingResolution::Merged => summary.merged += 1,
            }
        }
        info!(
            "Re-resolved pending guests: {} linked, {} merged, {} still pending",
            summary.linked, summary.merged, summary.still_pending
        );
        Ok(summary)
    }
}
