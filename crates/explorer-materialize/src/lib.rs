//! explorer-materialize: Turns search and expansion fragments into full
//! entities, fetching each id's details at most once at a time and caching
//! the outcome for a bounded time.

pub mod error;
pub mod materialize;
pub mod query_cache;

pub use error::{FetchError, FetchResult, MaterializationError};
pub use materialize::{EntityCache, MaterializationCache, Materialized};
pub use query_cache::{QueryCache, QueryKey};
