//! Channel identifier parsing
//!
//! Users can type either a bare channel slug or a full Are.na URL. Both are
//! reduced to a slug here, before anything touches the network.

use reqwest::Url;
use thiserror::Error;

/// Errors for user-supplied channel identifiers
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InputError {
    /// Nothing was entered
    #[error("Please enter a channel slug or URL")]
    Empty,

    /// The input could not be turned into a slug
    #[error("Invalid channel URL or slug: '{0}'")]
    Invalid(String),
}

/// Extracts a channel slug from a slug or an Are.na URL
///
/// # Examples
/// * `it-s-a-vibe` -> `it-s-a-vibe`
/// * `https://www.are.na/kent/interior-2030` -> `interior-2030`
/// * `are.na/kent/words-igfvslsuyr0/` -> `words-igfvslsuyr0`
pub fn extract_channel_slug(input: &str) -> Result<String, InputError> {
    let input = input.trim();
    if input.is_empty() {
        return Err(InputError::Empty);
    }

    let slug = if input.contains("are.na/") {
        let with_scheme = if input.starts_with("http://") || input.starts_with("https://") {
            input.to_string()
        } else {
            format!("https://{}", input)
        };
        let url = Url::parse(&with_scheme).map_err(|_| InputError::Invalid(input.to_string()))?;
        url.path_segments()
            .and_then(|mut segments| segments.rfind(|s| !s.is_empty()))
            .map(str::to_string)
            .ok_or_else(|| InputError::Invalid(input.to_string()))?
    } else {
        input.to_string()
    };

    if is_valid_slug(&slug) {
        Ok(slug)
    } else {
        Err(InputError::Invalid(input.to_string()))
    }
}

fn is_valid_slug(slug: &str) -> bool {
    !slug.is_empty()
        && slug
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}
