//! Feed aggregation.
//!
//! Feeds are named, independently sorted and filtered views over the pool
//! of analyzed items. Their configuration is persisted through a
//! [`store::FeedRepository`] after every change.

pub mod aggregator;
pub mod store;
pub mod view;

pub use aggregator::FeedAggregator;
#[cfg(test)]
pub use store::MemoryRepository;
pub use store::{JsonFileRepository, StoreError};
