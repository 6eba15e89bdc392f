//! Dio Flix Catalog Viewer
//!
//! Server-rendered page listing the catalog. Each page load fetches the
//! catalog once from the query endpoint and renders a card per video:
//! thumbnail, title and a "Play Video" button that reopens the page with the
//! player for that video. Videos stream straight from their stored locator.
//!
//! An unreachable or failing catalog renders the empty state instead of an
//! error page.

pub mod client;
pub mod config;
pub mod page;

pub use client::{CatalogClient, FetchError, VideoRecord};
pub use config::Config;
pub use page::{create_router, start_server, CatalogPage, ViewerState};
