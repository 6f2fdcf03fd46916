pub mod csv_io;
pub mod pipelines;
pub mod workflow;

pub use workflow::{Workflow, WorkflowReport};
