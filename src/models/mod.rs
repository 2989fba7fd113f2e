mod episode;
mod reference;
mod run;
mod show;

pub use episode::{
    Episode, GuestAppearance, GuestKey, NaturalKey, NormalizedEpisode, NormalizedGuestAppearance,
    PendingReview, RawEpisode,
};
pub use reference::{Party, PoliticalArea, Politician, ReferenceData};
pub use run::{CrawlRunResult, ReconcileOutcome, ShowReport, ShowStatus, UnresolvedGuest};
pub use show::{Show, ShowSelection};
