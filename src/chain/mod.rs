//! Chain Engine: DAG-structured tool orchestration layered on top of the
//! [`crate::executor::Executor`] boundary.

pub mod context;
pub mod engine;
pub mod step;

pub use context::{
    Chain, ChainContextHandle, ChainErrorEntry, ChainErrorKind, ChainProgressEvent, ChainResult, ChainStatus, ProgressCallback,
    StepResult,
};
pub use engine::ChainEngine;
pub use step::{Step, StepBody, StepId, StepKind};
