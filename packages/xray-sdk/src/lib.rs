pub mod tracer;
pub mod transport;

mod error;

pub use error::{Error, Result};
pub use tracer::{RunTrace, StepTrace, Tracer};
pub use transport::{HttpTransport, Transport, dispatch};
pub use xray_domain::{CandidateInput, CandidateStatus, Metadata, Run, RunStatus, StepType};

use std::{future::Future, pin::Pin};

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;
