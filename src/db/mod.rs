mod repository;
mod schema;

pub use repository::{EpisodeInsert, PendingResolution, Repository, ShowStats};
