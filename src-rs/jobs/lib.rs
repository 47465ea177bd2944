pub mod menu_analysis;
pub mod registry;
pub mod runner;
pub mod types;

pub use registry::JobRegistry;
pub use runner::JobRunner;
pub use types::{JobEntry, JobFuture, JobHandler, ProgressReporter};
