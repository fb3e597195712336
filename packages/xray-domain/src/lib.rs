pub mod model;
pub mod sampling;
pub mod rfc3339;

pub use model::{
	Candidate, CandidateStatus, FilterApplication, Metadata, Run, RunStatus, Step, StepType,
	elimination_rate, merge_metadata,
};
pub use sampling::{CandidateInput, partition_by_key, rejected_sample_size, sample_candidates};
