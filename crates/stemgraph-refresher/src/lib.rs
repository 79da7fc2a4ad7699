//! Background refresh of the graph read model

pub mod refresher;

pub use refresher::{DEFAULT_REFRESH_INTERVAL, MIN_REFRESH_INTERVAL, ReadModelCache, Refresher};
