pub mod app;
pub mod config;
pub mod crawl;
pub mod db;
pub mod error;
pub mod extract;
pub mod merge;
pub mod models;
pub mod normalize;
