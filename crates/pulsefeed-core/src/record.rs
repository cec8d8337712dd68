// Primary-store documents produced by the bulk appliers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::job::{
    CommentId, CommentJob, LikeJob, LikeTarget, NotificationId, NotificationJob, NotificationKind,
    PostId, UserId,
};

/// A live (not soft-deleted) post and its author, as resolved during a
/// flush for orphan filtering and notification recipient lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostRef {
    pub id: PostId,
    pub author: UserId,
}

/// One like document. The primary store enforces uniqueness over
/// (target, post, comment, liker); duplicate inserts surface as per-record
/// failures, not batch aborts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LikeRecord {
    pub id: String,
    pub target: LikeTarget,
    pub post: PostId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<CommentId>,
    pub liker: UserId,
    pub created_at: DateTime<Utc>,
}

impl LikeRecord {
    pub fn from_job(job: &LikeJob) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            target: job.target,
            post: job.post.clone(),
            comment: job.comment.clone(),
            liker: job.liker.clone(),
            created_at: Utc::now(),
        }
    }
}

/// One comment document. `post_author` is denormalized at flush time from
/// the resolved parent so later deletes can authorize without a join.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommentRecord {
    pub id: String,
    pub post: PostId,
    pub post_author: UserId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_comment: Option<CommentId>,
    pub author: UserId,
    pub text: String,
    pub created_at: DateTime<Utc>,
}

impl CommentRecord {
    pub fn from_job(job: &CommentJob, post_author: &str) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            post: job.post.clone(),
            post_author: post_author.to_string(),
            parent_comment: job.parent_comment.clone(),
            author: job.author.clone(),
            text: job.text.clone(),
            created_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationRecord {
    pub id: NotificationId,
    pub recipient: UserId,
    pub sender: UserId,
    pub kind: NotificationKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub post: Option<PostId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<CommentId>,
    pub read: bool,
    pub created_at: DateTime<Utc>,
}

impl NotificationRecord {
    pub fn from_job(job: &NotificationJob) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            recipient: job.recipient.clone(),
            sender: job.sender.clone(),
            kind: job.kind,
            post: job.post.clone(),
            comment: job.comment.clone(),
            read: false,
            created_at: Utc::now(),
        }
    }
}
