// Primary document store interface and in-memory implementation.
//
// The pipeline requires unordered bulk-insert semantics: individual
// failures (uniqueness violations) are reported per record and never abort
// the rest of the batch. A driver that stops at the first error is not
// usable behind this trait.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use parking_lot::Mutex;

use pulsefeed_core::{CommentRecord, LikeRecord, NotificationRecord, PostRef};

use crate::error::StoreError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InsertFailureReason {
    /// A uniqueness constraint rejected the record (e.g. duplicate like).
    DuplicateKey,
    Other(String),
}

/// Per-record failure inside an unordered bulk insert. `index` points into
/// the input batch.
#[derive(Debug, Clone)]
pub struct InsertFailure {
    pub index: usize,
    pub reason: InsertFailureReason,
}

/// Outcome of an unordered bulk insert: the records that were durably
/// written plus per-record failures. Downstream effects must be computed
/// from `inserted` only.
#[derive(Debug)]
pub struct BulkInsertOutcome<T> {
    pub inserted: Vec<T>,
    pub failed: Vec<InsertFailure>,
}

impl<T> BulkInsertOutcome<T> {
    pub fn duplicates(&self) -> usize {
        self.failed
            .iter()
            .filter(|f| f.reason == InsertFailureReason::DuplicateKey)
            .count()
    }
}

#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Posts that exist and are not soft-deleted, with their authors.
    async fn live_posts(&self, ids: &[String]) -> Result<Vec<PostRef>, StoreError>;

    async fn insert_likes(
        &self,
        records: Vec<LikeRecord>,
    ) -> Result<BulkInsertOutcome<LikeRecord>, StoreError>;

    async fn insert_comments(
        &self,
        records: Vec<CommentRecord>,
    ) -> Result<BulkInsertOutcome<CommentRecord>, StoreError>;

    async fn insert_notifications(
        &self,
        records: Vec<NotificationRecord>,
    ) -> Result<BulkInsertOutcome<NotificationRecord>, StoreError>;

    /// Mark the recipient's notifications as read; returns how many were
    /// newly marked. Unknown ids are ignored.
    async fn mark_notifications_read(
        &self,
        recipient: &str,
        ids: &[String],
    ) -> Result<usize, StoreError>;
}

#[derive(Debug, Clone)]
struct StoredPost {
    author: String,
    soft_deleted: bool,
}

#[derive(Default)]
struct DocState {
    posts: HashMap<String, StoredPost>,
    likes: Vec<LikeRecord>,
    like_keys: HashSet<String>,
    comments: Vec<CommentRecord>,
    notifications: Vec<NotificationRecord>,
}

/// In-memory document store with a uniqueness index on likes.
#[derive(Default)]
pub struct MemoryDocumentStore {
    state: Mutex<DocState>,
}

fn like_unique_key(record: &LikeRecord) -> String {
    format!(
        "{:?}:{}:{}:{}",
        record.target,
        record.post,
        record.comment.as_deref().unwrap_or("-"),
        record.liker
    )
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seed_post(&self, id: &str, author: &str) {
        self.state.lock().posts.insert(
            id.to_string(),
            StoredPost {
                author: author.to_string(),
                soft_deleted: false,
            },
        );
    }

    pub fn soft_delete_post(&self, id: &str) {
        if let Some(post) = self.state.lock().posts.get_mut(id) {
            post.soft_deleted = true;
        }
    }

    pub fn likes(&self) -> Vec<LikeRecord> {
        self.state.lock().likes.clone()
    }

    pub fn comments(&self) -> Vec<CommentRecord> {
        self.state.lock().comments.clone()
    }

    pub fn notifications(&self) -> Vec<NotificationRecord> {
        self.state.lock().notifications.clone()
    }
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn live_posts(&self, ids: &[String]) -> Result<Vec<PostRef>, StoreError> {
        let state = self.state.lock();
        let mut seen = HashSet::new();
        let mut refs = Vec::new();

        for id in ids {
            if !seen.insert(id.as_str()) {
                continue;
            }
            if let Some(post) = state.posts.get(id) {
                if !post.soft_deleted {
                    refs.push(PostRef {
                        id: id.clone(),
                        author: post.author.clone(),
                    });
                }
            }
        }

        Ok(refs)
    }

    async fn insert_likes(
        &self,
        records: Vec<LikeRecord>,
    ) -> Result<BulkInsertOutcome<LikeRecord>, StoreError> {
        let mut state = self.state.lock();
        let mut inserted = Vec::new();
        let mut failed = Vec::new();

        for (index, record) in records.into_iter().enumerate() {
            let key = like_unique_key(&record);
            if state.like_keys.contains(&key) {
                failed.push(InsertFailure {
                    index,
                    reason: InsertFailureReason::DuplicateKey,
                });
                continue;
            }
            state.like_keys.insert(key);
            state.likes.push(record.clone());
            inserted.push(record);
        }

        Ok(BulkInsertOutcome { inserted, failed })
    }

    async fn insert_comments(
        &self,
        records: Vec<CommentRecord>,
    ) -> Result<BulkInsertOutcome<CommentRecord>, StoreError> {
        let mut state = self.state.lock();
        state.comments.extend(records.iter().cloned());

        Ok(BulkInsertOutcome {
            inserted: records,
            failed: Vec::new(),
        })
    }

    async fn insert_notifications(
        &self,
        records: Vec<NotificationRecord>,
    ) -> Result<BulkInsertOutcome<NotificationRecord>, StoreError> {
        let mut state = self.state.lock();
        state.notifications.extend(records.iter().cloned());

        Ok(BulkInsertOutcome {
            inserted: records,
            failed: Vec::new(),
        })
    }

    async fn mark_notifications_read(
        &self,
        recipient: &str,
        ids: &[String],
    ) -> Result<usize, StoreError> {
        let wanted: HashSet<&str> = ids.iter().map(String::as_str).collect();
        let mut state = self.state.lock();
        let mut marked = 0;

        for notification in state.notifications.iter_mut() {
            if notification.recipient == recipient
                && !notification.read
                && wanted.contains(notification.id.as_str())
            {
                notification.read = true;
                marked += 1;
            }
        }

        Ok(marked)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pulsefeed_core::{LikeJob, LikeTarget};

    fn like_record(post: &str, liker: &str) -> LikeRecord {
        LikeRecord::from_job(&LikeJob {
            target: LikeTarget::Post,
            post: post.into(),
            comment: None,
            liker: liker.into(),
        })
    }

    #[tokio::test]
    async fn soft_deleted_posts_are_not_live() {
        let store = MemoryDocumentStore::new();
        store.seed_post("p1", "author1");
        store.seed_post("p2", "author2");
        store.soft_delete_post("p2");

        let live = store
            .live_posts(&["p1".into(), "p2".into(), "p3".into()])
            .await
            .unwrap();
        assert_eq!(live.len(), 1);
        assert_eq!(live[0].id, "p1");
        assert_eq!(live[0].author, "author1");
    }

    #[tokio::test]
    async fn duplicate_likes_fail_without_aborting_the_batch() {
        let store = MemoryDocumentStore::new();

        let first = store
            .insert_likes(vec![like_record("p1", "u1"), like_record("p1", "u2")])
            .await
            .unwrap();
        assert_eq!(first.inserted.len(), 2);

        // u1 likes p1 again in a later batch; u3 is new.
        let second = store
            .insert_likes(vec![like_record("p1", "u1"), like_record("p1", "u3")])
            .await
            .unwrap();
        assert_eq!(second.inserted.len(), 1);
        assert_eq!(second.inserted[0].liker, "u3");
        assert_eq!(second.duplicates(), 1);
        assert_eq!(second.failed[0].index, 0);
        assert_eq!(store.likes().len(), 3);
    }

    #[tokio::test]
    async fn mark_read_ignores_unknown_ids_and_other_recipients() {
        let store = MemoryDocumentStore::new();
        let mut record = NotificationRecord {
            id: "n1".into(),
            recipient: "u1".into(),
            sender: "u2".into(),
            kind: pulsefeed_core::NotificationKind::LikeOnPost,
            post: Some("p1".into()),
            comment: None,
            read: false,
            created_at: chrono::Utc::now(),
        };
        store
            .insert_notifications(vec![record.clone()])
            .await
            .unwrap();

        record.id = "n2".into();
        record.recipient = "u9".into();
        store.insert_notifications(vec![record]).await.unwrap();

        let marked = store
            .mark_notifications_read("u1", &["n1".into(), "n2".into(), "nope".into()])
            .await
            .unwrap();
        assert_eq!(marked, 1);

        // Second application is a no-op.
        let again = store
            .mark_notifications_read("u1", &["n1".into()])
            .await
            .unwrap();
        assert_eq!(again, 0);
    }
}
