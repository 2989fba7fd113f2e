use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{params, OptionalExtension, Row};
use serde::Serialize;
use tokio_rusqlite::Connection;

use crate::error::Result;
use crate::models::{
    Episode, GuestAppearance, GuestKey, NaturalKey, NormalizedEpisode, NormalizedGuestAppearance,
    PendingReview, Politician, ReferenceData, Show,
};

use super::schema::SCHEMA;

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Result of an insert guarded by the natural-key constraint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EpisodeInsert {
    Inserted(i64),
    /// Another writer inserted the same natural key first.
    Conflict,
}

/// What happened to a pending-review marker after re-resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PendingResolution {
    Linked,
    /// The politician was already linked to the episode; the marker was removed.
    Merged,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ShowStats {
    pub show_id: String,
    pub episodes: i64,
    pub appearances: i64,
    pub pending_review: i64,
}

pub struct Repository {
    conn: Connection,
}

impl Repository {
    pub async fn new(db_path: &str) -> Result<Self> {
        let conn = Connection::open(db_path).await?;

        conn.call(|conn| {
            conn.execute_batch(SCHEMA)?;
            Ok(())
        })
        .await?;

        Ok(Self { conn })
    }

    // Show operations

    pub async fn upsert_show(&self, show: Show) -> Result<()> {
        self.conn
            .call(move |conn| {
                conn.execute(
                    r#"INSERT INTO shows (id, name, url_template) VALUES (?1, ?2, ?3)
                       ON CONFLICT(id) DO UPDATE SET
                           name = excluded.name,
                           url_template = excluded.url_template,
                           updated_at = datetime('now')"#,
                    params![show.id, show.name, show.url_template],
                )?;
                Ok(())
            })
            .await?;
        Ok(())
    }

    // Reference data operations

    pub async fn import_reference(&self, data: ReferenceData) -> Result<usize> {
        let count = self
            .conn
            .call(move |conn| {
                let tx = conn.transaction()?;
                for party in &data.parties {
                    tx.execute(
                        "INSERT INTO parties (id, name) VALUES (?1, ?2)
                         ON CONFLICT(id) DO UPDATE SET name = excluded.name",
                        params![party.id, party.name],
                    )?;
                }
                for area in &data.political_areas {
                    tx.execute(
                        "INSERT INTO political_areas (id, name, color) VALUES (?1, ?2, ?3)
                         ON CONFLICT(id) DO UPDATE SET name = excluded.name, color = excluded.color",
                        params![area.id, area.name, area.color],
                    )?;
                }
                for politician in &data.politicians {
                    tx.execute(
                        "INSERT INTO politicians (id, name, party_id) VALUES (?1, ?2, ?3)
                         ON CONFLICT(id) DO UPDATE SET name = excluded.name, party_id = excluded.party_id",
                        params![politician.id, politician.name, politician.party_id],
                    )?;
                    tx.execute(
                        "DELETE FROM politician_aliases WHERE politician_id = ?1",
                        params![politician.id],
                    )?;
                    tx.execute(
                        "DELETE FROM politician_areas WHERE politician_id = ?1",
                        params![politician.id],
                    )?;
                    for alias in &politician.aliases {
                        tx.execute(
                            "INSERT OR IGNORE INTO politician_aliases (politician_id, alias) VALUES (?1, ?2)",
                            params![politician.id, alias],
                        )?;
                    }
                    for area_id in &politician.political_area_ids {
                        tx.execute(
                            "INSERT OR IGNORE INTO politician_areas (politician_id, area_id) VALUES (?1, ?2)",
                            params![politician.id, area_id],
                        )?;
                    }
                }
                tx.commit()?;
                Ok(data.politicians.len())
            })
            .await?;
        Ok(count)
    }

    /// Snapshot of every politician with aliases and areas, ordered by id.
    pub async fn load_politicians(&self) -> Result<Vec<Politician>> {
        let politicians = self
            .conn
            .call(|conn| Ok(politicians_from(conn, None)?))
            .await?;
        Ok(politicians)
    }

    /// Exact, case-insensitive lookup by name or alias.
    pub async fn lookup_politician_by_name(&self, candidate: &str) -> Result<Option<Politician>> {
        let candidate = candidate.trim().to_string();
        let politician = self
            .conn
            .call(move |conn| {
                let id: Option<i64> = conn
                    .query_row(
                        r#"SELECT id FROM politicians WHERE name = ?1 COLLATE NOCASE
                           UNION
                           SELECT politician_id FROM politician_aliases
                           WHERE alias = ?1 COLLATE NOCASE
                           ORDER BY 1 LIMIT 1"#,
                        params![candidate],
                        |row| row.get(0),
                    )
                    .optional()?;
                let Some(id) = id else {
                    return Ok(None);
                };
                Ok(politicians_from(conn, Some(id))?.pop())
            })
            .await?;
        Ok(politician)
    }

    pub async fn list_political_area_colors(&self) -> Result<BTreeMap<i64, String>> {
        let colors = self
            .conn
            .call(|conn| {
                let mut stmt = conn.prepare(
                    "SELECT id, color FROM political_areas WHERE color IS NOT NULL ORDER BY id",
                )?;
                let colors = stmt
                    .query_map([], |row| Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?)))?
                    .collect::<std::result::Result<BTreeMap<_, _>, _>>()?;
                Ok(colors)
            })
            .await?;
        Ok(colors)
    }

    // Episode operations

    pub async fn find_episode_by_natural_key(&self, key: &NaturalKey) -> Result<Option<Episode>> {
        let show_id = key.show_id.clone();
        let air_date = key.air_date.format(DATE_FORMAT).to_string();
        let slug = key.slug.clone();
        let episode = self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare(
                    r#"SELECT id, show_id, air_date, slug, title, created_at, updated_at
                       FROM episodes WHERE show_id = ?1 AND air_date = ?2 AND slug = ?3"#,
                )?;
                let episode = stmt
                    .query_row(params![show_id, air_date, slug], episode_from_row)
                    .optional()?;
                Ok(episode)
            })
            .await?;
        Ok(episode)
    }

    pub async fn insert_episode(&self, key: &NaturalKey, title: &str) -> Result<EpisodeInsert> {
        let show_id = key.show_id.clone();
        let air_date = key.air_date.format(DATE_FORMAT).to_string();
        let slug = key.slug.clone();
        let title = title.to_string();
        let outcome = self
            .conn
            .call(move |conn| {
                let changed = conn.execute(
                    r#"INSERT INTO episodes (show_id, air_date, slug, title)
                       VALUES (?1, ?2, ?3, ?4)
                       ON CONFLICT(show_id, air_date, slug) DO NOTHING"#,
                    params![show_id, air_date, slug, title],
                )?;
                if changed == 0 {
                    Ok(EpisodeInsert::Conflict)
                } else {
                    Ok(EpisodeInsert::Inserted(conn.last_insert_rowid()))
                }
            })
            .await?;
        Ok(outcome)
    }

    /// Inserts an episode together with all of its guests in one transaction.
    /// Nothing is written when the natural key is already taken.
    pub async fn insert_episode_with_appearances(
        &self,
        episode: &NormalizedEpisode,
    ) -> Result<EpisodeInsert> {
        let show_id = episode.key.show_id.clone();
        let air_date = episode.key.air_date.format(DATE_FORMAT).to_string();
        let slug = episode.key.slug.clone();
        let title = episode.title.clone();
        let rows = episode
            .appearances
            .iter()
            .map(AppearanceRow::new)
            .collect::<Result<Vec<_>>>()?;
        let outcome = self
            .conn
            .call(move |conn| {
                let tx = conn.transaction()?;
                let changed = tx.execute(
                    r#"INSERT INTO episodes (show_id, air_date, slug, title)
                       VALUES (?1, ?2, ?3, ?4)
                       ON CONFLICT(show_id, air_date, slug) DO NOTHING"#,
                    params![show_id, air_date, slug, title],
                )?;
                if changed == 0 {
                    return Ok(EpisodeInsert::Conflict);
                }
                let episode_id = tx.last_insert_rowid();
                for (position, row) in rows.iter().enumerate() {
                    row.insert(&tx, episode_id, position as i64)?;
                }
                tx.commit()?;
                Ok(EpisodeInsert::Inserted(episode_id))
            })
            .await?;
        Ok(outcome)
    }

    /// All episodes of a show on one air date, whatever their slug.
    pub async fn list_episodes_on(
        &self,
        show_id: &str,
        air_date: NaiveDate,
    ) -> Result<Vec<Episode>> {
        let show_id = show_id.to_string();
        let air_date = air_date.format(DATE_FORMAT).to_string();
        let episodes = self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare(
                    r#"SELECT id, show_id, air_date, slug, title, created_at, updated_at
                       FROM episodes WHERE show_id = ?1 AND air_date = ?2 ORDER BY id"#,
                )?;
                let episodes = stmt
                    .query_map(params![show_id, air_date], episode_from_row)?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                Ok(episodes)
            })
            .await?;
        Ok(episodes)
    }

    /// Moves an episode from slug `from` to slug `to`. Returns false when the
    /// row no longer has slug `from` or `to` is already taken on that date.
    pub async fn rekey_episode(&self, episode_id: i64, from: &str, to: &str) -> Result<bool> {
        let from = from.to_string();
        let to = to.to_string();
        let changed = self
            .conn
            .call(move |conn| {
                let changed = conn.execute(
                    r#"UPDATE OR IGNORE episodes SET slug = ?3, updated_at = datetime('now')
                       WHERE id = ?1 AND slug = ?2"#,
                    params![episode_id, from, to],
                )?;
                Ok(changed)
            })
            .await?;
        Ok(changed > 0)
    }

    pub async fn update_episode_title(&self, episode_id: i64, title: &str) -> Result<()> {
        let title = title.to_string();
        self.conn
            .call(move |conn| {
                conn.execute(
                    "UPDATE episodes SET title = ?1, updated_at = datetime('now') WHERE id = ?2",
                    params![title, episode_id],
                )?;
                Ok(())
            })
            .await?;
        Ok(())
    }

    pub async fn touch_episode(&self, episode_id: i64) -> Result<()> {
        self.conn
            .call(move |conn| {
                conn.execute(
                    "UPDATE episodes SET updated_at = datetime('now') WHERE id = ?1",
                    params![episode_id],
                )?;
                Ok(())
            })
            .await?;
        Ok(())
    }

    pub async fn count_episodes(&self, show_id: &str) -> Result<i64> {
        let show_id = show_id.to_string();
        let count = self
            .conn
            .call(move |conn| {
                let count: i64 = conn.query_row(
                    "SELECT COUNT(*) FROM episodes WHERE show_id = ?1",
                    params![show_id],
                    |row| row.get(0),
                )?;
                Ok(count)
            })
            .await?;
        Ok(count)
    }

    // Guest appearance operations

    /// Returns false when the (episode, guest) pair already exists.
    pub async fn insert_guest_appearance(
        &self,
        episode_id: i64,
        position: i64,
        appearance: &NormalizedGuestAppearance,
    ) -> Result<bool> {
        let row = AppearanceRow::new(appearance)?;
        let inserted = self
            .conn
            .call(move |conn| Ok(row.insert(conn, episode_id, position)?))
            .await?;
        Ok(inserted)
    }

    pub async fn list_guest_appearances(&self, episode_id: i64) -> Result<Vec<GuestAppearance>> {
        let appearances = self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare(
                    r#"SELECT id, episode_id, position, guest_key, politician_id, party_id,
                              political_area_ids, raw_name, pending_review
                       FROM guest_appearances WHERE episode_id = ?1 ORDER BY position, id"#,
                )?;
                let appearances = stmt
                    .query_map(params![episode_id], appearance_from_row)?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                Ok(appearances)
            })
            .await?;
        Ok(appearances)
    }

    pub async fn list_pending_reviews(&self) -> Result<Vec<PendingReview>> {
        let pending = self
            .conn
            .call(|conn| {
                let mut stmt = conn.prepare(
                    r#"SELECT g.id, g.episode_id, e.show_id, e.air_date, g.raw_name
                       FROM guest_appearances g
                       JOIN episodes e ON g.episode_id = e.id
                       WHERE g.pending_review = 1
                       ORDER BY e.air_date DESC, e.show_id, g.position"#,
                )?;
                let pending = stmt
                    .query_map([], |row| {
                        Ok(PendingReview {
                            appearance_id: row.get(0)?,
                            episode_id: row.get(1)?,
                            show_id: row.get(2)?,
                            air_date: parse_date(&row.get::<_, String>(3)?),
                            raw_name: row.get(4)?,
                        })
                    })?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                Ok(pending)
            })
            .await?;
        Ok(pending)
    }

    /// Links a pending-review marker to the politician it now resolves to.
    pub async fn resolve_pending(
        &self,
        pending: &PendingReview,
        resolved: &NormalizedGuestAppearance,
    ) -> Result<PendingResolution> {
        let appearance_id = pending.appearance_id;
        let episode_id = pending.episode_id;
        let guest_key = resolved.key().as_db_key();
        let area_ids = serde_json::to_string(&resolved.political_area_ids)?;
        let politician_id = resolved.politician_id;
        let party_id = resolved.party_id;
        let resolution = self
            .conn
            .call(move |conn| {
                let tx = conn.transaction()?;
                let existing: Option<i64> = tx
                    .query_row(
                        "SELECT id FROM guest_appearances WHERE episode_id = ?1 AND guest_key = ?2",
                        params![episode_id, guest_key],
                        |row| row.get(0),
                    )
                    .optional()?;
                let resolution = if existing.is_some() {
                    tx.execute(
                        "DELETE FROM guest_appearances WHERE id = ?1",
                        params![appearance_id],
                    )?;
                    PendingResolution::Merged
                } else {
                    tx.execute(
                        r#"UPDATE guest_appearances
                           SET guest_key = ?1, politician_id = ?2, party_id = ?3,
                               political_area_ids = ?4, pending_review = 0
                           WHERE id = ?5"#,
                        params![guest_key, politician_id, party_id, area_ids, appearance_id],
                    )?;
                    PendingResolution::Linked
                };
                tx.commit()?;
                Ok(resolution)
            })
            .await?;
        Ok(resolution)
    }

    pub async fn stats(&self) -> Result<Vec<ShowStats>> {
        let stats = self
            .conn
            .call(|conn| {
                let mut stmt = conn.prepare(
                    r#"SELECT s.id,
                              COUNT(DISTINCT e.id),
                              COUNT(g.id),
                              COALESCE(SUM(g.pending_review), 0)
                       FROM shows s
                       LEFT JOIN episodes e ON e.show_id = s.id
                       LEFT JOIN guest_appearances g ON g.episode_id = e.id
                       GROUP BY s.id
                       ORDER BY s.id"#,
                )?;
                let stats = stmt
                    .query_map([], |row| {
                        Ok(ShowStats {
                            show_id: row.get(0)?,
                            episodes: row.get(1)?,
                            appearances: row.get(2)?,
                            pending_review: row.get(3)?,
                        })
                    })?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                Ok(stats)
            })
            .await?;
        Ok(stats)
    }
}

#[cfg(test)]
impl Repository {
    pub(crate) async fn execute_batch(&self, sql: &str) -> Result<()> {
        let sql = sql.to_string();
        self.conn
            .call(move |conn| {
                conn.execute_batch(&sql)?;
                Ok(())
            })
            .await?;
        Ok(())
    }
}

/// A guest appearance prepared for insertion, usable inside a transaction.
struct AppearanceRow {
    guest_key: String,
    area_ids: String,
    appearance: NormalizedGuestAppearance,
}

impl AppearanceRow {
    fn new(appearance: &NormalizedGuestAppearance) -> Result<Self> {
        Ok(Self {
            guest_key: appearance.key().as_db_key(),
            area_ids: serde_json::to_string(&appearance.political_area_ids)?,
            appearance: appearance.clone(),
        })
    }

    /// Returns false when the (episode, guest) pair already exists.
    fn insert(
        &self,
        conn: &rusqlite::Connection,
        episode_id: i64,
        position: i64,
    ) -> rusqlite::Result<bool> {
        let changed = conn.execute(
            r#"INSERT INTO guest_appearances
                   (episode_id, position, guest_key, politician_id, party_id,
                    political_area_ids, raw_name, pending_review)
               VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
               ON CONFLICT(episode_id, guest_key) DO NOTHING"#,
            params![
                episode_id,
                position,
                self.guest_key,
                self.appearance.politician_id,
                self.appearance.party_id,
                self.area_ids,
                self.appearance.raw_name,
                !self.appearance.is_resolved(),
            ],
        )?;
        Ok(changed > 0)
    }
}

/// Politicians with aliases and areas; all of them, or just `only`.
fn politicians_from(
    conn: &rusqlite::Connection,
    only: Option<i64>,
) -> rusqlite::Result<Vec<Politician>> {
    let mut stmt = conn.prepare(
        "SELECT id, name, party_id FROM politicians WHERE ?1 IS NULL OR id = ?1 ORDER BY id",
    )?;
    let mut politicians = stmt
        .query_map(params![only], |row| {
            Ok(Politician {
                id: row.get(0)?,
                name: row.get(1)?,
                party_id: row.get(2)?,
                political_area_ids: Vec::new(),
                aliases: Vec::new(),
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    let index: HashMap<i64, usize> = politicians
        .iter()
        .enumerate()
        .map(|(i, p)| (p.id, i))
        .collect();

    let mut stmt = conn.prepare(
        r#"SELECT politician_id, alias FROM politician_aliases
           WHERE ?1 IS NULL OR politician_id = ?1
           ORDER BY politician_id, alias"#,
    )?;
    let aliases = stmt
        .query_map(params![only], |row| {
            Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?))
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    for (id, alias) in aliases {
        if let Some(&i) = index.get(&id) {
            politicians[i].aliases.push(alias);
        }
    }

    let mut stmt = conn.prepare(
        r#"SELECT politician_id, area_id FROM politician_areas
           WHERE ?1 IS NULL OR politician_id = ?1
           ORDER BY politician_id, area_id"#,
    )?;
    let areas = stmt
        .query_map(params![only], |row| {
            Ok((row.get::<_, i64>(0)?, row.get::<_, i64>(1)?))
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    for (id, area_id) in areas {
        if let Some(&i) = index.get(&id) {
            politicians[i].political_area_ids.push(area_id);
        }
    }

    Ok(politicians)
}

fn parse_datetime(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    // SQLite datetime('now') format
    if let Ok(naive) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
        return Some(naive.and_utc());
    }
    None
}

fn parse_date(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, DATE_FORMAT).unwrap_or_default()
}

fn episode_from_row(row: &Row) -> rusqlite::Result<Episode> {
    Ok(Episode {
        id: row.get(0)?,
        key: NaturalKey {
            show_id: row.get(1)?,
            air_date: parse_date(&row.get::<_, String>(2)?),
            slug: row.get(3)?,
        },
        title: row.get(4)?,
        created_at: row
            .get::<_, String>(5)
            .ok()
            .and_then(|s| parse_datetime(&s))
            .unwrap_or_else(Utc::now),
        updated_at: row
            .get::<_, String>(6)
            .ok()
            .and_then(|s| parse_datetime(&s))
            .unwrap_or_else(Utc::now),
    })
}

fn appearance_from_row(row: &Row) -> rusqlite::Result<GuestAppearance> {
    let raw_name: String = row.get(7)?;
    let key = GuestKey::from_db_key(&row.get::<_, String>(3)?)
        .unwrap_or_else(|| GuestKey::Unresolved(raw_name.clone()));
    Ok(GuestAppearance {
        id: row.get(0)?,
        episode_id: row.get(1)?,
        position: row.get(2)?,
        key,
        politician_id: row.get(4)?,
        party_id: row.get(5)?,
        political_area_ids: row
            .get::<_, String>(6)
            .ok()
            .and_then(|s| serde_json::from_str(&s).ok())
            .unwrap_or_default(),
        raw_name,
        pending_review: row.get::<_, i64>(8)? != 0,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Party, PoliticalArea};
    use tempfile::TempDir;

    async fn open_repo() -> (TempDir, Repository) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.db");
        let repo = Repository::new(path.to_str().unwrap()).await.unwrap();
        (dir, repo)
    }

    fn reference() -> ReferenceData {
        ReferenceData {
            parties: vec![Party {
                id: 1,
                name: "CSU".into(),
            }],
            political_areas: vec![
                PoliticalArea {
                    id: 3,
                    name: "Wirtschaft".into(),
                    color: Some("#ff7f0e".into()),
                },
                PoliticalArea {
                    id: 9,
                    name: "Sonstiges".into(),
                    color: None,
                },
            ],
            politicians: vec![Politician {
                id: 10,
                name: "Markus Söder".into(),
                party_id: Some(1),
                political_area_ids: vec![3],
                aliases: vec!["Söder, Markus".into()],
            }],
        }
    }

    fn key(slug: &str) -> NaturalKey {
        NaturalKey {
            show_id: "lanz".into(),
            air_date: NaiveDate::from_ymd_opt(2024, 3, 5).unwrap(),
            slug: slug.into(),
        }
    }

    #[tokio::test]
    async fn test_import_and_lookup_reference() {
        let (_dir, repo) = open_repo().await;
        assert_eq!(repo.import_reference(reference()).await.unwrap(), 1);
        // re-import replaces aliases instead of duplicating them
        repo.import_reference(reference()).await.unwrap();

        let politicians = repo.load_politicians().await.unwrap();
        assert_eq!(politicians.len(), 1);
        assert_eq!(politicians[0].aliases, vec!["Söder, Markus".to_string()]);
        assert_eq!(politicians[0].political_area_ids, vec![3]);

        let found = repo.lookup_politician_by_name("söder, markus").await.unwrap();
        assert_eq!(found.map(|p| p.id), Some(10));
        assert!(repo.lookup_politician_by_name("Nobody").await.unwrap().is_none());

        let colors = repo.list_political_area_colors().await.unwrap();
        assert_eq!(colors.len(), 1);
        assert_eq!(colors.get(&3).map(String::as_str), Some("#ff7f0e"));
    }

    #[tokio::test]
    async fn test_lookup_returns_only_the_matched_politician() {
        let (_dir, repo) = open_repo().await;
        let mut data = reference();
        data.politicians.push(Politician {
            id: 11,
            name: "Karl Lauterbach".into(),
            party_id: None,
            political_area_ids: vec![9],
            aliases: vec!["Lauterbach".into()],
        });
        repo.import_reference(data).await.unwrap();

        let found = repo.lookup_politician_by_name("LAUTERBACH").await.unwrap().unwrap();
        assert_eq!(found.id, 11);
        assert_eq!(found.name, "Karl Lauterbach");
        assert_eq!(found.political_area_ids, vec![9]);
        assert_eq!(found.aliases, vec!["Lauterbach".to_string()]);
        assert_eq!(found.party_id, None);
    }

    #[tokio::test]
    async fn test_insert_episode_reports_conflict_on_same_natural_key() {
        let (_dir, repo) = open_repo().await;
        repo.upsert_show(Show::new("lanz", "Markus Lanz", "http://x"))
            .await
            .unwrap();

        let first = repo.insert_episode(&key(""), "Talk").await.unwrap();
        assert!(matches!(first, EpisodeInsert::Inserted(_)));
        let second = repo.insert_episode(&key(""), "Talk").await.unwrap();
        assert_eq!(second, EpisodeInsert::Conflict);
        let other_slug = repo.insert_episode(&key("spezial"), "Spezial").await.unwrap();
        assert!(matches!(other_slug, EpisodeInsert::Inserted(_)));

        assert_eq!(repo.count_episodes("lanz").await.unwrap(), 2);
        let found = repo.find_episode_by_natural_key(&key("")).await.unwrap().unwrap();
        assert_eq!(found.title, "Talk");
        assert_eq!(found.key, key(""));
    }

    #[tokio::test]
    async fn test_guest_appearance_unique_per_episode() {
        let (_dir, repo) = open_repo().await;
        repo.import_reference(reference()).await.unwrap();
        repo.upsert_show(Show::new("lanz", "Markus Lanz", "http://x"))
            .await
            .unwrap();
        let EpisodeInsert::Inserted(id) = repo.insert_episode(&key(""), "").await.unwrap() else {
            panic!("expected insert");
        };

        let soeder = NormalizedGuestAppearance {
            politician_id: Some(10),
            party_id: Some(1),
            political_area_ids: vec![3],
            raw_name: "Markus Söder".into(),
            canonical_name: "markus soder".into(),
        };
        assert!(repo.insert_guest_appearance(id, 0, &soeder).await.unwrap());
        assert!(!repo.insert_guest_appearance(id, 1, &soeder).await.unwrap());

        let rows = repo.list_guest_appearances(id).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].key, GuestKey::Politician(10));
        assert_eq!(rows[0].political_area_ids, vec![3]);
        assert!(!rows[0].pending_review);
    }

    #[tokio::test]
    async fn test_resolve_pending_links_or_merges() {
        let (_dir, repo) = open_repo().await;
        repo.import_reference(reference()).await.unwrap();
        repo.upsert_show(Show::new("lanz", "Markus Lanz", "http://x"))
            .await
            .unwrap();
        let EpisodeInsert::Inserted(id) = repo.insert_episode(&key(""), "").await.unwrap() else {
            panic!("expected insert");
        };

        let unresolved = NormalizedGuestAppearance {
            politician_id: None,
            party_id: None,
            political_area_ids: vec![],
            raw_name: "M. Söder".into(),
            canonical_name: "m soder".into(),
        };
        repo.insert_guest_appearance(id, 0, &unresolved).await.unwrap();

        let pending = repo.list_pending_reviews().await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].raw_name, "M. Söder");

        let resolved = NormalizedGuestAppearance {
            politician_id: Some(10),
            party_id: Some(1),
            political_area_ids: vec![3],
            ..unresolved
        };
        let outcome = repo.resolve_pending(&pending[0], &resolved).await.unwrap();
        assert_eq!(outcome, PendingResolution::Linked);
        assert!(repo.list_pending_reviews().await.unwrap().is_empty());

        let stats = repo.stats().await.unwrap();
        assert_eq!(
            stats,
            vec![ShowStats {
                show_id: "lanz".into(),
                episodes: 1,
                appearances: 1,
                pending_review: 0,
            }]
        );
    }
}
