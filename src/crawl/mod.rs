mod orchestrator;
mod trigger;

pub use orchestrator::{CrawlSettings, Orchestrator};
pub use trigger::{CrawlTrigger, TriggerResponse};
