//! Plain-text rendering of channel contents
//!
//! Two layouts: a grid (one line per block, in channel order) and a diary
//! (blocks grouped under the day they were connected).

use std::fmt::Write;

use chrono::NaiveDate;

use crate::data::{Block, BlockKind, Channel};

/// Longest excerpt shown for a block, in characters
const EXCERPT_CHARS: usize = 60;

/// Cuts `text` to `max` characters on one line, adding an ellipsis when cut
fn excerpt(text: &str, max: usize) -> String {
    let flat = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.chars().count() <= max {
        return flat;
    }
    let cut: String = flat.chars().take(max.saturating_sub(1)).collect();
    format!("{}…", cut.trim_end())
}

/// What a block shows as its headline: the title, else its text
fn headline(block: &Block) -> String {
    let text = block
        .title
        .as_deref()
        .filter(|t| !t.trim().is_empty())
        .or(match &block.kind {
            BlockKind::Text { content } => content.as_deref(),
            BlockKind::Link { source, .. } | BlockKind::Media { source, .. } => {
                source.as_ref().and_then(|s| s.title.as_deref())
            }
            BlockKind::Attachment { attachment, .. } => {
                attachment.as_ref().and_then(|a| a.file_name.as_deref())
            }
            _ => None,
        })
        .or(block.description.as_deref())
        .unwrap_or("Untitled");
    excerpt(text, EXCERPT_CHARS)
}

/// The URL most useful to open for a block
fn link(block: &Block) -> Option<String> {
    if let Some(id) = block.youtube_id() {
        return Some(format!("https://youtu.be/{}", id));
    }
    block
        .source_url()
        .or_else(|| block.preview_url())
        .map(str::to_string)
}

fn block_line(block: &Block) -> String {
    let mut line = format!("[{:<10}] {}", block.kind_label(), headline(block));
    if let Some(url) = link(block) {
        let _ = write!(line, "  {}", url);
    }
    line
}

/// Channel title, owner and description
pub fn render_header(channel: &Channel) -> String {
    let mut out = channel.title.clone();
    if let Some(owner) = &channel.user {
        let _ = write!(out, " by {}", owner.full_name);
    }
    let _ = write!(out, " ({} blocks)", channel.length);
    if let Some(description) = channel.description() {
        let _ = write!(out, "\n{}", excerpt(description, 100));
    }
    out.push('\n');
    out
}

/// One line per block in the order given
pub fn render_grid(blocks: &[Block]) -> String {
    let mut out = String::new();
    for block in blocks {
        out.push_str(&block_line(block));
        out.push('\n');
    }
    out
}

/// Groups blocks by the day they were connected
///
/// Days are newest first and so are blocks within a day. Blocks without a
/// connection time come last under `None`, in their original order.
pub fn group_by_date(blocks: &[Block]) -> Vec<(Option<NaiveDate>, Vec<&Block>)> {
    let mut dated: Vec<&Block> = blocks.iter().filter(|b| b.connected_at.is_some()).collect();
    dated.sort_by(|a, b| b.connected_at.cmp(&a.connected_at));

    let mut groups: Vec<(Option<NaiveDate>, Vec<&Block>)> = Vec::new();
    for block in dated {
        let date = block.connected_date();
        match groups.last_mut() {
            Some((last, items)) if *last == date => items.push(block),
            _ => groups.push((date, vec![block])),
        }
    }

    let undated: Vec<&Block> = blocks.iter().filter(|b| b.connected_at.is_none()).collect();
    if !undated.is_empty() {
        groups.push((None, undated));
    }
    groups
}

/// Blocks under a heading per day
pub fn render_diary(blocks: &[Block]) -> String {
    let mut out = String::new();
    for (date, items) in group_by_date(blocks) {
        match date {
            Some(date) => {
                let _ = writeln!(out, "{}", date.format("%A, %B %-d, %Y"));
            }
            None => out.push_str("Undated\n"),
        }
        for block in items {
            let _ = writeln!(out, "  {}", block_line(block));
        }
    }
    out
}
