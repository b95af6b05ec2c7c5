//! Harvests place listings from a map search UI and turns the raw rows into a
//! clean, de-duplicated interchange file.

pub mod chrome;
pub mod config;
pub mod enrich;
pub mod error;
pub mod extractor;
pub mod harvest;
pub mod logging;
pub mod models;
pub mod normalize;
pub mod patterns;
pub mod query;
pub mod scroller;
pub mod selectors;
pub mod session;
pub mod tui;
pub mod upsert;
pub mod utils;
pub mod wait;
