pub mod client;
pub mod migrate;
pub mod reconcile;
pub mod writer;

pub use client::GraphClient;
pub use neo4rs::query;
pub use reconcile::{reconcile, MergeAction};
pub use writer::{GraphStats, GraphWriter};
