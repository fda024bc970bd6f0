mod ingest;
mod insert;
mod open;
mod query;
mod schema;

pub use ingest::{latest_result_date, result_file, DirIngester};
pub use open::Db;
