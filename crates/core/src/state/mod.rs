pub mod db;
pub mod insights;
pub mod sink;

pub use db::QuorumDb;
pub use insights::{Insight, InsightMeta, InsightStore};
pub use sink::{SnapshotSink, SqliteSink};
