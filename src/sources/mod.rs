//! Upstream data sources
//!
//! The search API that yields listening records, and the Twitter batch
//! lookup used to re-hydrate flagged records.

pub mod talkwalker;
pub mod twitter;

pub use talkwalker::{SearchPage, TalkwalkerClient};
pub use twitter::{HttpTwitterSource, TweetLookup, TweetLookupResult};
