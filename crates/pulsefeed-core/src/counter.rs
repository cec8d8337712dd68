// Denormalized counter keys and snapshots.
//
// Counters live in a fast key-value store as hashes keyed by
// `{EntityKind}:{id}:counter`, mutated only through atomic increments.
// They are a best-effort cache of a derivable quantity and may diverge
// transiently from the primary store.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityKind {
    Post,
    Comment,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Post => "Post",
            EntityKind::Comment => "Comment",
        }
    }
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CounterKind {
    Likes,
    Comments,
}

impl CounterKind {
    /// Field name inside the counter hash.
    pub fn field(&self) -> &'static str {
        match self {
            CounterKind::Likes => "likesCount",
            CounterKind::Comments => "commentsCount",
        }
    }
}

/// Hash key for one entity's counters.
pub fn counter_hash_key(entity: EntityKind, id: &str) -> String {
    format!("{entity}:{id}:counter")
}

/// Parsed counter hash. Missing or malformed fields degrade to zero rather
/// than failing the read.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CounterSnapshot {
    pub likes_count: i64,
    pub comments_count: i64,
}

impl CounterSnapshot {
    pub fn from_fields(fields: &HashMap<String, String>) -> Self {
        Self {
            likes_count: parse_count(fields.get(CounterKind::Likes.field())),
            comments_count: parse_count(fields.get(CounterKind::Comments.field())),
        }
    }
}

fn parse_count(raw: Option<&String>) -> i64 {
    raw.and_then(|v| v.parse().ok()).unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_key_layout() {
        assert_eq!(counter_hash_key(EntityKind::Post, "p1"), "Post:p1:counter");
        assert_eq!(
            counter_hash_key(EntityKind::Comment, "c2"),
            "Comment:c2:counter"
        );
    }

    #[test]
    fn snapshot_degrades_to_zero() {
        let empty = HashMap::new();
        assert_eq!(CounterSnapshot::from_fields(&empty), CounterSnapshot::default());

        let mut garbage = HashMap::new();
        garbage.insert("likesCount".to_string(), "not-a-number".to_string());
        garbage.insert("commentsCount".to_string(), "3".to_string());
        let snapshot = CounterSnapshot::from_fields(&garbage);
        assert_eq!(snapshot.likes_count, 0);
        assert_eq!(snapshot.comments_count, 3);
    }
}
