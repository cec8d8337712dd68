// Job kinds carried on the durable queue.
//
// Each queue category has a closed enum of job kinds so consumers dispatch
// with an exhaustive match: adding a kind is a compile-time-checked change,
// not a new magic string.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub type UserId = String;
pub type PostId = String;
pub type CommentId = String;
pub type NotificationId = String;

/// What a like points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LikeTarget {
    Post,
    Comment,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LikeJob {
    pub target: LikeTarget,
    pub post: PostId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<CommentId>,
    pub liker: UserId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommentJob {
    pub post: PostId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_comment: Option<CommentId>,
    pub author: UserId,
    pub text: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NotificationKind {
    LikeOnPost,
    LikeOnComment,
    Comment,
    Reply,
    AddFriend,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationJob {
    pub recipient: UserId,
    pub sender: UserId,
    pub kind: NotificationKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub post: Option<PostId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<CommentId>,
}

/// Marks a recipient's notifications as read. Ids are deduplicated at apply
/// time, so redelivery of the same job is harmless.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarkReadJob {
    pub recipient: UserId,
    pub notifications: Vec<NotificationId>,
}

/// Job kinds accepted on the like queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "name", content = "data", rename_all = "kebab-case")]
pub enum LikeQueueJob {
    LikePost(LikeJob),
}

/// Job kinds accepted on the comment queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "name", content = "data", rename_all = "kebab-case")]
pub enum CommentQueueJob {
    CommentOnPost(CommentJob),
}

/// Job kinds accepted on the notification queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "name", content = "data", rename_all = "kebab-case")]
pub enum NotificationQueueJob {
    AddNotification(NotificationJob),
    MarkNotificationsRead(MarkReadJob),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueueCategory {
    Like,
    Comment,
    Notification,
}

impl std::fmt::Display for QueueCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            QueueCategory::Like => write!(f, "like"),
            QueueCategory::Comment => write!(f, "comment"),
            QueueCategory::Notification => write!(f, "notification"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "queue", content = "job", rename_all = "lowercase")]
pub enum JobPayload {
    Like(LikeQueueJob),
    Comment(CommentQueueJob),
    Notification(NotificationQueueJob),
}

impl JobPayload {
    pub fn category(&self) -> QueueCategory {
        match self {
            JobPayload::Like(_) => QueueCategory::Like,
            JobPayload::Comment(_) => QueueCategory::Comment,
            JobPayload::Notification(_) => QueueCategory::Notification,
        }
    }

    /// Stable job name used in logs and metrics labels.
    pub fn name(&self) -> &'static str {
        match self {
            JobPayload::Like(LikeQueueJob::LikePost(_)) => "like-post",
            JobPayload::Comment(CommentQueueJob::CommentOnPost(_)) => "comment-on-post",
            JobPayload::Notification(NotificationQueueJob::AddNotification(_)) => {
                "add-notification"
            }
            JobPayload::Notification(NotificationQueueJob::MarkNotificationsRead(_)) => {
                "mark-notifications-read"
            }
        }
    }
}

/// Envelope for one unit of deferred work on the durable queue.
///
/// Immutable once enqueued; the queue may redeliver it (at-least-once).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueJob {
    pub payload: JobPayload,
    pub enqueued_at: DateTime<Utc>,
}

impl QueueJob {
    pub fn new(payload: JobPayload) -> Self {
        Self {
            payload,
            enqueued_at: Utc::now(),
        }
    }

    pub fn like(job: LikeJob) -> Self {
        Self::new(JobPayload::Like(LikeQueueJob::LikePost(job)))
    }

    pub fn comment(job: CommentJob) -> Self {
        Self::new(JobPayload::Comment(CommentQueueJob::CommentOnPost(job)))
    }

    pub fn notification(job: NotificationJob) -> Self {
        Self::new(JobPayload::Notification(
            NotificationQueueJob::AddNotification(job),
        ))
    }

    pub fn mark_read(job: MarkReadJob) -> Self {
        Self::new(JobPayload::Notification(
            NotificationQueueJob::MarkNotificationsRead(job),
        ))
    }

    pub fn category(&self) -> QueueCategory {
        self.payload.category()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_category_matches_constructor() {
        let like = QueueJob::like(LikeJob {
            target: LikeTarget::Post,
            post: "p1".into(),
            comment: None,
            liker: "u1".into(),
        });
        assert_eq!(like.category(), QueueCategory::Like);
        assert_eq!(like.payload.name(), "like-post");

        let read = QueueJob::mark_read(MarkReadJob {
            recipient: "u1".into(),
            notifications: vec!["n1".into()],
        });
        assert_eq!(read.category(), QueueCategory::Notification);
        assert_eq!(read.payload.name(), "mark-notifications-read");
    }

    #[test]
    fn payload_round_trips_through_serde() {
        let job = QueueJob::comment(CommentJob {
            post: "p1".into(),
            parent_comment: None,
            author: "u2".into(),
            text: "nice".into(),
        });

        let encoded = serde_json::to_string(&job).unwrap();
        let decoded: QueueJob = serde_json::from_str(&encoded).unwrap();
        assert_eq!(decoded, job);
    }
}
