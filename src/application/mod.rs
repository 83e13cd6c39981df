//! Application Layer - Use cases wiring ports to the analysis components

pub mod dataset;
pub mod simulate;
pub mod submission;

pub use dataset::{DatasetBuild, DatasetBuilder};
pub use simulate::{PriceSimulator, SimulationParams};
pub use submission::{Submission, SubmissionDetail};
