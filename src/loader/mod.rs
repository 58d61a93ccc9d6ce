//! Paged loading of channel contents
//!
//! [`PaginatedLoader`] turns the page-at-a-time Are.na contents endpoint into
//! one growing, ordered block list per channel.

mod paginated;
mod state;

pub use paginated::{LoaderConfig, PageOutcome, PaginatedLoader, UpdateCheck, DEFAULT_PAGE_SIZE};
pub use state::LoadState;
