use std::{sync::Arc, time::Duration as StdDuration};

use reqwest::Client;
use tokio::runtime::Handle;

use crate::{BoxFuture, Result};
use xray_domain::Run;

/// Delivers a finished run to the ingestion service.
pub trait Transport
where
	Self: Send + Sync,
{
	fn deliver<'a>(&'a self, run: &'a Run) -> BoxFuture<'a, Result<()>>;
}

pub struct HttpTransport {
	client: Client,
	url: String,
}
impl HttpTransport {
	pub fn new(cfg: &xray_config::Tracer) -> Result<Self> {
		let client = Client::builder().timeout(StdDuration::from_millis(cfg.timeout_ms)).build()?;
		let url = format!("{}/runs", cfg.endpoint.trim_end_matches('/'));

		Ok(Self { client, url })
	}

	pub fn url(&self) -> &str {
		&self.url
	}

	async fn post(&self, run: &Run) -> Result<()> {
		self.client.post(&self.url).json(run).send().await?.error_for_status()?;

		Ok(())
	}
}

impl Transport for HttpTransport {
	fn deliver<'a>(&'a self, run: &'a Run) -> BoxFuture<'a, Result<()>> {
		Box::pin(self.post(run))
	}
}

/// Hands `run` to `transport` on a detached task and returns immediately.
///
/// Delivery failures are logged and dropped; they never reach the caller. Without a Tokio
/// runtime on the current thread the run is discarded.
pub fn dispatch(transport: Arc<dyn Transport>, run: Run) {
	let Ok(handle) = Handle::try_current() else {
		tracing::warn!(run_id = %run.id, "No Tokio runtime available. Dropping run trace.");

		return;
	};

	handle.spawn(async move {
		match transport.deliver(&run).await {
			Ok(()) => tracing::debug!(run_id = %run.id, "Run trace delivered."),
			Err(err) => tracing::warn!(
				run_id = %run.id,
				pipeline = %run.pipeline_name,
				error = %err,
				"Failed to deliver run trace."
			),
		}
	});
}
