//! Core data models for the Are.na viewer
//!
//! This module contains the channel and block types exchanged with the Are.na
//! API, plus the HTTP client pieces used to fetch them.

pub mod arena;
pub mod http;
#[cfg(any(test, feature = "test-util"))]
pub mod mock;
pub mod retry;
pub mod slug;

pub use arena::{ArenaClient, ArenaError, SortKey};
pub use http::{HttpResponse, RateLimit, ReqwestTransport, Transport, TransportError};
pub use retry::{RetryAfterUnit, RetryPolicy};
pub use slug::{extract_channel_slug, InputError};

use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use reqwest::Url;
use serde::{Deserialize, Serialize};

/// Identifier of a block within a channel
///
/// Are.na hands out integer ids, but string ids are accepted as well so that
/// cached snapshots from other sources still load.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BlockId {
    Number(u64),
    Text(String),
}

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BlockId::Number(n) => write!(f, "{}", n),
            BlockId::Text(s) => f.write_str(s),
        }
    }
}

impl From<u64> for BlockId {
    fn from(n: u64) -> Self {
        BlockId::Number(n)
    }
}

/// One unit of channel content
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Block {
    /// Unique identifier within the channel
    pub id: BlockId,
    /// Optional user-supplied title
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Optional user-supplied description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// When the block was connected to the channel (ordering key)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connected_at: Option<DateTime<Utc>>,
    /// Kind-specific payload, discriminated by the API's `class` field
    #[serde(flatten)]
    pub kind: BlockKind,
}

/// Content kinds, tagged by the `class` field of the API payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "class")]
pub enum BlockKind {
    Image {
        #[serde(default)]
        image: Option<ImageVersions>,
    },
    Text {
        #[serde(default)]
        content: Option<String>,
    },
    Link {
        #[serde(default)]
        source: Option<Source>,
        #[serde(default)]
        image: Option<ImageVersions>,
    },
    Media {
        #[serde(default)]
        source: Option<Source>,
        #[serde(default)]
        image: Option<ImageVersions>,
    },
    Attachment {
        #[serde(default)]
        attachment: Option<AttachmentFile>,
        #[serde(default)]
        image: Option<ImageVersions>,
    },
    /// Any class this viewer does not render (nested channels, etc.)
    #[serde(other)]
    Unsupported,
}

/// The image renditions Are.na generates for a block
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageVersions {
    #[serde(default)]
    pub display: Option<ImageUrl>,
    #[serde(default)]
    pub original: Option<ImageUrl>,
    #[serde(default)]
    pub thumb: Option<ImageUrl>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageUrl {
    pub url: String,
}

/// Where a link or media block points
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Source {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
}

/// An uploaded file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttachmentFile {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub file_name: Option<String>,
    #[serde(default)]
    pub content_type: Option<String>,
}

impl Block {
    /// Short label for the block kind
    pub fn kind_label(&self) -> &'static str {
        match self.kind {
            BlockKind::Image { .. } => "image",
            BlockKind::Text { .. } => "text",
            BlockKind::Link { .. } => "link",
            BlockKind::Media { .. } => "media",
            BlockKind::Attachment { .. } => "attachment",
            BlockKind::Unsupported => "other",
        }
    }

    /// URL of the image to show for this block, if any
    pub fn preview_url(&self) -> Option<&str> {
        let image = match &self.kind {
            BlockKind::Image { image }
            | BlockKind::Link { image, .. }
            | BlockKind::Media { image, .. }
            | BlockKind::Attachment { image, .. } => image.as_ref()?,
            BlockKind::Text { .. } | BlockKind::Unsupported => return None,
        };
        image
            .display
            .as_ref()
            .or(image.original.as_ref())
            .or(image.thumb.as_ref())
            .map(|u| u.url.as_str())
    }

    /// Source URL for link and media blocks
    pub fn source_url(&self) -> Option<&str> {
        match &self.kind {
            BlockKind::Link { source, .. } | BlockKind::Media { source, .. } => {
                source.as_ref()?.url.as_deref()
            }
            BlockKind::Attachment { attachment, .. } => attachment.as_ref()?.url.as_deref(),
            _ => None,
        }
    }

    /// YouTube video id for link and media blocks pointing at YouTube
    pub fn youtube_id(&self) -> Option<String> {
        youtube_video_id(self.source_url()?)
    }

    /// Calendar day the block was connected, used for the diary layout
    pub fn connected_date(&self) -> Option<NaiveDate> {
        self.connected_at.map(|t| t.date_naive())
    }
}

/// Extracts a YouTube video id from the common URL shapes
///
/// Handles `youtu.be/<id>`, `youtube.com/watch?v=<id>`, `youtube.com/embed/<id>`
/// and `youtube.com/shorts/<id>`.
pub fn youtube_video_id(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return None;
    }
    let host = parsed.host_str()?;
    let mut segments = parsed.path_segments()?.filter(|s| !s.is_empty());

    let id = match host {
        "youtu.be" => segments.next().map(str::to_string),
        "youtube.com" | "www.youtube.com" => match segments.next()? {
            "watch" => parsed
                .query_pairs()
                .find(|(k, _)| k == "v")
                .map(|(_, v)| v.into_owned()),
            "embed" | "shorts" => segments.next().map(str::to_string),
            _ => None,
        },
        _ => None,
    }?;

    if id.is_empty() {
        None
    } else {
        Some(id)
    }
}

/// Channel metadata from `GET /channels/{slug}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Channel {
    pub title: String,
    pub slug: String,
    #[serde(default)]
    pub description: Option<String>,
    /// Number of blocks in the channel
    #[serde(default)]
    pub length: u32,
    #[serde(default)]
    pub user: Option<ChannelOwner>,
    #[serde(default)]
    pub metadata: Option<ChannelMetadata>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelOwner {
    pub full_name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelMetadata {
    #[serde(default)]
    pub description: Option<String>,
}

impl Channel {
    /// Description from the top-level field or the metadata block
    pub fn description(&self) -> Option<&str> {
        self.description
            .as_deref()
            .filter(|d| !d.is_empty())
            .or_else(|| self.metadata.as_ref()?.description.as_deref())
            .filter(|d| !d.is_empty())
    }
}
