// Message records, derived statistics and content rules

use crate::board::error::ValidationError;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;

/// Longest message accepted, in characters.
pub const MAX_CONTENT_CHARS: usize = 140;

/// Length of generated message ids
pub const ID_LEN: usize = 8;

/// A posted message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Short unique id
    pub id: String,
    /// Message text, 1..=140 characters
    pub content: String,
    /// RFC 3339 UTC timestamp with fixed microsecond precision
    pub created_at: String,
    /// Character length of `content`
    pub char_count: usize,
}

impl Message {
    /// Build a message from already validated content.
    pub(crate) fn new(id: String, content: String, created_at: DateTime<Utc>) -> Self {
        let char_count = content.chars().count();

        Self {
            id,
            content,
            created_at: format_timestamp(created_at),
            char_count,
        }
    }

    /// Check the invariants a loaded record must hold.
    pub(crate) fn check_consistency(&self) -> Result<(), String> {
        let actual = self.content.chars().count();
        if actual != self.char_count {
            return Err(format!(
                "message {} has char_count {} but content has {} characters",
                self.id, self.char_count, actual
            ));
        }
        validate_content(&self.content)
            .map_err(|e| format!("message {}: {}", self.id, e))?;
        Ok(())
    }
}

/// Check that content is non-empty and at most [`MAX_CONTENT_CHARS`] characters.
///
/// Returns the character count on success.
pub fn validate_content(content: &str) -> Result<usize, ValidationError> {
    let length = content.chars().count();

    if length == 0 {
        return Err(ValidationError::Empty);
    }
    if length > MAX_CONTENT_CHARS {
        return Err(ValidationError::TooLong {
            length,
            max: MAX_CONTENT_CHARS,
        });
    }

    Ok(length)
}

/// Generate a candidate message id (8 lowercase hex characters).
pub fn generate_id() -> String {
    let mut id = Uuid::new_v4().simple().to_string();
    id.truncate(ID_LEN);
    id
}

/// Render a timestamp so that string order equals chronological order.
pub fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, false)
}

/// Ordering of list results by creation time
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    /// Oldest first
    Asc,
    /// Newest first
    #[default]
    Desc,
}

impl FromStr for SortOrder {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "asc" => Ok(SortOrder::Asc),
            "desc" => Ok(SortOrder::Desc),
            other => Err(ValidationError::UnknownSort(other.to_string())),
        }
    }
}

impl std::fmt::Display for SortOrder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SortOrder::Asc => write!(f, "asc"),
            SortOrder::Desc => write!(f, "desc"),
        }
    }
}

/// Aggregate statistics over the message table
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Stats {
    pub total_messages: usize,
    pub total_characters: usize,
    pub avg_message_length: f64,
    pub shortest_message: usize,
    pub longest_message: usize,
}

impl Stats {
    /// Compute statistics from per-message character counts.
    ///
    /// An empty input yields all-zero fields.
    pub fn from_char_counts<I>(counts: I) -> Self
    where
        I: IntoIterator<Item = usize>,
    {
        let mut stats = Stats::default();
        let mut shortest = usize::MAX;

        for count in counts {
            stats.total_messages += 1;
            stats.total_characters += count;
            shortest = shortest.min(count);
            stats.longest_message = stats.longest_message.max(count);
        }

        if stats.total_messages > 0 {
            stats.shortest_message = shortest;
            stats.avg_message_length =
                stats.total_characters as f64 / stats.total_messages as f64;
        }

        stats
    }
}
