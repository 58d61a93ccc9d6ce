//! Featured channel catalog and the channel picker
//!
//! The catalog is a static list shipped with the binary. It backs the
//! channel picker search and stands in for live metadata when the API is
//! unreachable.

use futures::future::join_all;
use tracing::{debug, warn};

use crate::data::{extract_channel_slug, ArenaClient, Channel, ChannelOwner};

/// A channel listed in the catalog
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeaturedChannel {
    pub title: &'static str,
    pub slug: &'static str,
    pub description: &'static str,
}

impl FeaturedChannel {
    /// Catalog data in the shape of an API response
    pub fn to_channel(&self) -> Channel {
        Channel {
            title: self.title.to_string(),
            slug: self.slug.to_string(),
            description: Some(self.description.to_string()),
            length: 0,
            user: Some(ChannelOwner {
                full_name: CATALOG_OWNER.to_string(),
            }),
            metadata: None,
        }
    }
}

/// Owner shown for catalog entries when live metadata is unavailable
pub const CATALOG_OWNER: &str = "Kent";

/// Channel opened when none is given
pub const DEFAULT_CHANNEL: &str = "it-s-a-vibe";

/// Static catalog of featured channels, in display order
pub static FEATURED_CHANNELS: [FeaturedChannel; 21] = [
    FeaturedChannel {
        title: "It's a Vibe",
        slug: "it-s-a-vibe",
        description: "Collection of vibes and aesthetic inspirations.",
    },
    FeaturedChannel {
        title: "Accidental Baroque",
        slug: "accidental-baroque",
        description: "a collection of accidental baroque",
    },
    FeaturedChannel {
        title: "Interior 2030",
        slug: "interior-2030",
        description: "What I think is good living in a house",
    },
    FeaturedChannel {
        title: "Business Cards",
        slug: "business-cards-gk-eigsa-4s",
        description: "Collection of business card designs and inspiration.",
    },
    FeaturedChannel {
        title: "Photography",
        slug: "photography-o9r85qh8qv8",
        description: "Curated collection of inspiring photography.",
    },
    FeaturedChannel {
        title: "Football is Life",
        slug: "football-is-life-5gfzfkrbvgq",
        description: "The beautiful game and its impact on life and culture.",
    },
    FeaturedChannel {
        title: "Words",
        slug: "words-igfvslsuyr0",
        description: "A collection of meaningful words and phrases.",
    },
    FeaturedChannel {
        title: "Graphic",
        slug: "graphic-03cnlqdnkyy",
        description: "Graphic design inspiration and visual concepts.",
    },
    FeaturedChannel {
        title: "Sustainable UX",
        slug: "sustainable-ux",
        description: "Exploring sustainable practices in user experience design.",
    },
    FeaturedChannel {
        title: "Human and Their Computer",
        slug: "human-and-their-computer",
        description: "The relationship between humans and technology.",
    },
    FeaturedChannel {
        title: "The Good Software",
        slug: "the-good-software",
        description: "Examples and principles of well-designed software.",
    },
    FeaturedChannel {
        title: "Photography Campaign",
        slug: "photography-campaign-gbdhtdhgmhc",
        description: "Visual storytelling through photography campaigns.",
    },
    FeaturedChannel {
        title: "Mind of the Machine",
        slug: "mind-of-the-machine",
        description: "Exploring artificial intelligence and machine learning concepts.",
    },
    FeaturedChannel {
        title: "Artificial Complexity",
        slug: "artificial-complexity",
        description: "A collection exploring artificial complexity in design and technology.",
    },
    FeaturedChannel {
        title: "Time and the Future",
        slug: "time-and-the-future",
        description: "Explorations of time, futurism, and temporal concepts.",
    },
    FeaturedChannel {
        title: "Community Through the Lens",
        slug: "community-through-the-lens",
        description: "Visual explorations of community and connection.",
    },
    FeaturedChannel {
        title: "Tennis is Life",
        slug: "tennis-is-life",
        description: "The philosophy, aesthetics, and culture of tennis.",
    },
    FeaturedChannel {
        title: "Spatial Interfaces",
        slug: "spatial-interfaces",
        description: "Innovative approaches to spatial interface design.",
    },
    FeaturedChannel {
        title: "The Good Days",
        slug: "the-good-days",
        description: "Moments and memories of good days.",
    },
    FeaturedChannel {
        title: "Interface Metaphors",
        slug: "interface-metaphors",
        description: "Exploring metaphors in interface design.",
    },
    FeaturedChannel {
        title: "Book Design",
        slug: "book-design-90mbcfgysb4",
        description: "Inspirational book design and typography.",
    },
];

/// Look up a catalog entry by slug
pub fn featured_by_slug(slug: &str) -> Option<&'static FeaturedChannel> {
    FEATURED_CHANNELS.iter().find(|c| c.slug == slug)
}

/// One row in the channel picker
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchResult {
    /// A catalog entry matching the query
    Featured(&'static FeaturedChannel),
    /// A pasted Are.na URL, resolved to its slug
    GoTo(String),
}

impl SearchResult {
    /// Slug to open when the row is picked
    pub fn slug(&self) -> &str {
        match self {
            SearchResult::Featured(c) => c.slug,
            SearchResult::GoTo(slug) => slug,
        }
    }

    pub fn label(&self) -> String {
        match self {
            SearchResult::Featured(c) => c.title.to_string(),
            SearchResult::GoTo(slug) => format!("Go to channel: {}", slug),
        }
    }
}

/// Channel picker results for `query`
///
/// An empty query lists the whole catalog. A pasted Are.na URL yields a
/// single jump to that channel. Anything else matches titles and slugs
/// case-insensitively.
pub fn search(query: &str) -> Vec<SearchResult> {
    let query = query.trim();
    if query.is_empty() {
        return FEATURED_CHANNELS.iter().map(SearchResult::Featured).collect();
    }

    if query.contains("are.na/") {
        return match extract_channel_slug(query) {
            Ok(slug) => vec![SearchResult::GoTo(slug)],
            Err(e) => {
                debug!(query, error = %e, "no channel in pasted URL");
                Vec::new()
            }
        };
    }

    let needle = query.to_lowercase();
    FEATURED_CHANNELS
        .iter()
        .filter(|c| {
            c.title.to_lowercase().contains(&needle) || c.slug.to_lowercase().contains(&needle)
        })
        .map(SearchResult::Featured)
        .collect()
}

/// Fetches live metadata for every catalog channel concurrently
///
/// Channels that fail to load are left out. If none load, the static
/// catalog data is returned instead.
pub async fn load_featured(client: &ArenaClient) -> Vec<Channel> {
    let results = join_all(FEATURED_CHANNELS.iter().map(|c| client.channel(c.slug))).await;

    let channels: Vec<Channel> = results
        .into_iter()
        .zip(FEATURED_CHANNELS.iter())
        .filter_map(|(result, featured)| match result {
            Ok(channel) => Some(channel),
            Err(e) => {
                debug!(slug = featured.slug, error = %e, "featured channel failed to load");
                None
            }
        })
        .collect();

    if channels.is_empty() {
        warn!("no featured channels could be loaded, using catalog data");
        return FEATURED_CHANNELS.iter().map(FeaturedChannel::to_channel).collect();
    }
    channels
}
