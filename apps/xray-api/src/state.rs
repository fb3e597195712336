use std::sync::Arc;

use xray_service::XrayService;
use xray_storage::db::Db;

#[derive(Clone)]
pub struct AppState {
	pub service: Arc<XrayService>,
}
impl AppState {
	/// Connects to Postgres and bootstraps the schema. Failure here is fatal to the server.
	pub async fn new(config: xray_config::Config) -> color_eyre::Result<Self> {
		let db = Db::connect(&config.storage.postgres).await?;

		db.ensure_schema().await?;

		Ok(Self::from_service(XrayService::new(config, db)))
	}

	pub fn from_service(service: XrayService) -> Self {
		Self { service: Arc::new(service) }
	}
}
