//! Ingestion and query services over the trace store.

pub mod ingest;
pub mod query;
pub mod runs;

mod convert;
mod error;

pub use error::Error;
pub use ingest::IngestResponse;
pub use query::{QueryRequest, QueryResponse, StepMatch};
pub use runs::{ListRunsRequest, ListRunsResponse, Pagination, RunSummary};

use xray_config::Config;
use xray_storage::db::Db;

pub type Result<T, E = Error> = std::result::Result<T, E>;

pub struct XrayService {
	pub cfg: Config,
	pub db: Db,
}
impl XrayService {
	pub fn new(cfg: Config, db: Db) -> Self {
		Self { cfg, db }
	}
}
