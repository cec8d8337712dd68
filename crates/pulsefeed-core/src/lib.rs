// pulsefeed-core - Pure domain logic for the write-aggregation pipeline
//
// Job kinds, batch accumulation, counter keys, cache-key derivation and the
// apply report types. No async, no I/O - everything here is directly unit
// testable without a runtime.

pub mod batch;
pub mod cache_key;
pub mod counter;
pub mod job;
pub mod record;
pub mod report;

pub use batch::{BatchPolicy, JobBatch};
pub use cache_key::{api_cache_key, CacheKeySpec};
pub use counter::{counter_hash_key, CounterKind, CounterSnapshot, EntityKind};
pub use job::{
    CommentJob, CommentQueueJob, JobPayload, LikeJob, LikeQueueJob, LikeTarget, MarkReadJob,
    NotificationJob, NotificationKind, NotificationQueueJob, QueueCategory, QueueJob,
};
pub use record::{CommentRecord, LikeRecord, NotificationRecord, PostRef};
pub use report::{ApplyReport, SideEffect, SoftFailure};
