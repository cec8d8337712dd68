// Bulk appliers: turn a drained batch into durable state plus side effects.
//
// The insert path tolerates partial failure: a duplicate like or a parent
// deleted between enqueue and flush drops that record, never the batch.
// Every downstream effect (counter increments, cache purge, notification
// fan-out) is computed from the subset the store actually persisted, and
// each effect fails softly on its own - a counter outage must not roll
// back an insert, and vice versa.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tracing::{debug, warn};

use pulsefeed_core::{
    ApplyReport, CacheKeySpec, CommentJob, CommentRecord, CounterKind, EntityKind, LikeJob,
    LikeRecord, LikeTarget, MarkReadJob, NotificationJob, NotificationKind, NotificationRecord,
    SideEffect,
};
use pulsefeed_store::{CounterStore, DocumentStore, StoreError};

use crate::cache::ResponseCache;
use crate::fanout::NotificationFanout;

#[derive(Clone)]
pub struct BulkApplier {
    documents: Arc<dyn DocumentStore>,
    counters: Arc<dyn CounterStore>,
    cache: ResponseCache,
    fanout: NotificationFanout,
}

impl BulkApplier {
    pub fn new(
        documents: Arc<dyn DocumentStore>,
        counters: Arc<dyn CounterStore>,
        cache: ResponseCache,
        fanout: NotificationFanout,
    ) -> Self {
        Self {
            documents,
            counters,
            cache,
            fanout,
        }
    }

    /// Apply a drained batch of like jobs.
    ///
    /// Errors only on an all-or-nothing infrastructure failure (parent
    /// resolution or the insert round trip itself).
    pub async fn apply_likes(&self, mut jobs: Vec<LikeJob>) -> Result<ApplyReport, StoreError> {
        let mut report = ApplyReport::default();

        // Only post likes are batched; the comment-like path is not wired
        // into the enqueue surface.
        jobs.retain(|job| match job.target {
            LikeTarget::Post => true,
            LikeTarget::Comment => {
                debug!(post = %job.post, "dropping comment-target like");
                false
            }
        });
        if jobs.is_empty() {
            return Ok(report);
        }

        let parent_ids: Vec<String> = jobs.iter().map(|job| job.post.clone()).collect();
        let authors = self.resolve_post_authors(&parent_ids).await?;

        let mut records = Vec::with_capacity(jobs.len());
        for job in &jobs {
            if authors.contains_key(&job.post) {
                records.push(LikeRecord::from_job(job));
            } else {
                report.dropped_missing_parent += 1;
            }
        }
        if records.is_empty() {
            return Ok(report);
        }

        let outcome = self.documents.insert_likes(records).await?;
        report.duplicates = outcome.duplicates();
        report.applied = outcome.inserted.len();
        if outcome.inserted.is_empty() {
            return Ok(report);
        }

        // One increment per persisted like, batched into a single round trip.
        let post_ids: Vec<String> = outcome
            .inserted
            .iter()
            .map(|like| like.post.clone())
            .collect();
        if let Err(err) = self
            .counters
            .increment_many(EntityKind::Post, CounterKind::Likes, &post_ids, 1)
            .await
        {
            warn!(error = %err, "like counter increment failed");
            report.record_soft_failure(SideEffect::CounterIncrement, err);
        }

        let mut specs: Vec<CacheKeySpec> = distinct(post_ids.iter())
            .into_iter()
            .map(|post| CacheKeySpec::new("/v1/like").param("postId", post))
            .collect();
        specs.extend(
            distinct(outcome.inserted.iter().map(|like| &like.liker))
                .into_iter()
                .map(|liker| CacheKeySpec::new("/v1/like").user(liker)),
        );
        if let Err(err) = self.cache.invalidate(&specs).await {
            warn!(error = %err, "like cache invalidation failed");
            report.record_soft_failure(SideEffect::CacheInvalidation, err);
        }

        let notifications: Vec<NotificationJob> = outcome
            .inserted
            .iter()
            .filter_map(|like| {
                let author = authors.get(&like.post)?;
                if *author == like.liker {
                    return None;
                }
                Some(NotificationJob {
                    recipient: author.clone(),
                    sender: like.liker.clone(),
                    kind: NotificationKind::LikeOnPost,
                    post: Some(like.post.clone()),
                    comment: None,
                })
            })
            .collect();
        if let Err(err) = self.fanout.enqueue(notifications).await {
            warn!(error = %err, "like notification fan-out failed");
            report.record_soft_failure(SideEffect::NotificationEnqueue, err);
        }

        Ok(report)
    }

    /// Apply a drained batch of comment jobs.
    pub async fn apply_comments(&self, jobs: Vec<CommentJob>) -> Result<ApplyReport, StoreError> {
        let mut report = ApplyReport::default();
        if jobs.is_empty() {
            return Ok(report);
        }

        let parent_ids: Vec<String> = jobs.iter().map(|job| job.post.clone()).collect();
        let authors = self.resolve_post_authors(&parent_ids).await?;

        let mut records = Vec::with_capacity(jobs.len());
        for job in &jobs {
            match authors.get(&job.post) {
                Some(author) => records.push(CommentRecord::from_job(job, author)),
                None => report.dropped_missing_parent += 1,
            }
        }
        if records.is_empty() {
            return Ok(report);
        }

        let outcome = self.documents.insert_comments(records).await?;
        report.duplicates = outcome.duplicates();
        report.applied = outcome.inserted.len();
        if outcome.inserted.is_empty() {
            return Ok(report);
        }

        let post_ids: Vec<String> = outcome
            .inserted
            .iter()
            .map(|comment| comment.post.clone())
            .collect();
        if let Err(err) = self
            .counters
            .increment_many(EntityKind::Post, CounterKind::Comments, &post_ids, 1)
            .await
        {
            warn!(error = %err, "comment counter increment failed");
            report.record_soft_failure(SideEffect::CounterIncrement, err);
        }

        let specs: Vec<CacheKeySpec> = distinct(post_ids.iter())
            .into_iter()
            .map(|post| CacheKeySpec::new("/v1/comment").param("postId", post))
            .collect();
        if let Err(err) = self.cache.invalidate(&specs).await {
            warn!(error = %err, "comment cache invalidation failed");
            report.record_soft_failure(SideEffect::CacheInvalidation, err);
        }

        let notifications: Vec<NotificationJob> = outcome
            .inserted
            .iter()
            .filter(|comment| comment.post_author != comment.author)
            .map(|comment| NotificationJob {
                recipient: comment.post_author.clone(),
                sender: comment.author.clone(),
                kind: NotificationKind::Comment,
                post: Some(comment.post.clone()),
                comment: Some(comment.id.clone()),
            })
            .collect();
        if let Err(err) = self.fanout.enqueue(notifications).await {
            warn!(error = %err, "comment notification fan-out failed");
            report.record_soft_failure(SideEffect::NotificationEnqueue, err);
        }

        Ok(report)
    }

    /// Persist fanned-out notification jobs.
    pub async fn apply_notifications(
        &self,
        jobs: Vec<NotificationJob>,
    ) -> Result<ApplyReport, StoreError> {
        let mut report = ApplyReport::default();
        if jobs.is_empty() {
            return Ok(report);
        }

        let records: Vec<NotificationRecord> =
            jobs.iter().map(NotificationRecord::from_job).collect();
        let outcome = self.documents.insert_notifications(records).await?;
        report.duplicates = outcome.duplicates();
        report.applied = outcome.inserted.len();
        if outcome.inserted.is_empty() {
            return Ok(report);
        }

        let specs: Vec<CacheKeySpec> =
            distinct(outcome.inserted.iter().map(|n| &n.recipient))
                .into_iter()
                .map(|recipient| CacheKeySpec::new("/v1/notification").user(recipient))
                .collect();
        if let Err(err) = self.cache.invalidate(&specs).await {
            warn!(error = %err, "notification cache invalidation failed");
            report.record_soft_failure(SideEffect::CacheInvalidation, err);
        }

        Ok(report)
    }

    /// Mark notifications read, deduplicated per recipient so redelivered
    /// jobs are harmless.
    pub async fn apply_mark_read(
        &self,
        jobs: Vec<MarkReadJob>,
    ) -> Result<ApplyReport, StoreError> {
        let mut report = ApplyReport::default();
        if jobs.is_empty() {
            return Ok(report);
        }

        let mut per_recipient: HashMap<String, HashSet<String>> = HashMap::new();
        for job in jobs {
            per_recipient
                .entry(job.recipient)
                .or_default()
                .extend(job.notifications);
        }

        let mut specs = Vec::with_capacity(per_recipient.len());
        for (recipient, ids) in per_recipient {
            let ids: Vec<String> = ids.into_iter().collect();
            report.applied += self
                .documents
                .mark_notifications_read(&recipient, &ids)
                .await?;
            specs.push(CacheKeySpec::new("/v1/notification").user(recipient));
        }

        if let Err(err) = self.cache.invalidate(&specs).await {
            warn!(error = %err, "notification cache invalidation failed");
            report.record_soft_failure(SideEffect::CacheInvalidation, err);
        }

        Ok(report)
    }

    async fn resolve_post_authors(
        &self,
        ids: &[String],
    ) -> Result<HashMap<String, String>, StoreError> {
        let live = self.documents.live_posts(ids).await?;
        Ok(live.into_iter().map(|post| (post.id, post.author)).collect())
    }
}

/// First-occurrence-ordered distinct values.
fn distinct<'a>(values: impl Iterator<Item = &'a String>) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for value in values {
        if seen.insert(value.as_str()) {
            out.push(value.clone());
        }
    }
    out
}
