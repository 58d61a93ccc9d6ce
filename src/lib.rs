//! arenaview library
//!
//! Browsing Are.na channels: a paged loader with retry and cache fallback,
//! a bounded local cache, polling for new content and plain-text rendering.

pub mod app;
pub mod cache;
pub mod channels;
pub mod cli;
pub mod data;
pub mod loader;
pub mod logging;
pub mod refresh;
pub mod render;
