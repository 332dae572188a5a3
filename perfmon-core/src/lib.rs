pub mod analysis;
pub mod collector;
pub mod counter_log;
pub mod descriptor;
pub mod orchestrator;

pub use counter_log::{QdiscSample, RawLog, RawSample};
pub use descriptor::{ExperimentDescriptor, HostSpec, TestEndpoint, TestEntry};
