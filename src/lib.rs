//! Talkwalker harvester
//!
//! Pulls social-listening records from the Talkwalker search API over
//! a bounded date range, re-hydrates Twitter-flagged records through
//! the batch lookup API, and persists the merged stream as partitioned
//! line-delimited JSON.
//!
//! - Hourly time windows tile the date range; each window paginates to
//!   exhaustion with paced requests and bounded timeout retries
//! - Flagged records reconcile in batches of 100, with a fixed
//!   cooldown between lookup rounds; unresolved records are emitted
//!   annotated, never dropped
//! - Credit estimation gates the crawl before the first search request
//! - Output lands in S3 under a partition key derived from the stable
//!   query parameters

pub mod article;
pub mod config;
pub mod counters;
pub mod credits;
pub mod driver;
pub mod error;
pub mod hash;
pub mod normalize;
pub mod paginate;
pub mod reconcile;
pub mod request;
pub mod retry;
pub mod schemas;
pub mod sink;
pub mod sources;
pub mod storage;
pub mod windows;
