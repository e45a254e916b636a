pub mod config;
pub mod error;
pub mod extract;
pub mod themes;
pub mod types;

pub use config::Config;
pub use error::TweetGraphError;
pub use types::{
    BookmarkItem, FetchMethod, MergeOutcome, StoredTweet, SyncMode, SyncReport, SyncWatermark,
    MAX_URLS_PER_ITEM, SEEN_IDS_CAPACITY,
};
