//! Query engine and statistics cache behind the scan-report tracker.
//!
//! The data endpoint turns a DataTables-style query string into a
//! [`QueryPlan`] and runs it against a [`RecordStore`]; the page endpoint
//! reads aggregate counts through the [`StatsCache`].

mod error;
pub mod memory;
mod model;
pub mod params;
pub mod plan;
mod service;
pub mod stats;
mod store;

pub use error::Error;
pub use memory::MemoryStore;
pub use model::*;
pub use params::{ParamNode, ParamTree, ParamValue};
pub use plan::{translate, Column, Direction, QueryPlan};
pub use service::{data_url, DataResponse, PageContext, Tracker};
pub use stats::StatsCache;
pub use store::{resolve, Ingest, RecordStore};

pub const fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
