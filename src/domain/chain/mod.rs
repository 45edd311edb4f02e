//! Chain domain - declarative step graphs, validation and execution

mod cancellation;
mod entity;
mod error;
mod executor;
mod namespace;
mod options;
mod result;
mod validator;

pub use cancellation::{cancellation_pair, CancellationHandle, CancellationSignal};
pub use entity::{Chain, ChainEntry, ParallelGroup, ReferenceKind, RetryConfig, StepSpec};
pub use error::{ConfigError, StepError, Violation};
pub use executor::{ChainExecutor, DRY_RUN_SCHEME};
pub use namespace::{token_roots, InterpolationError, Namespace, INPUT_KEY};
pub use options::{ExecutionMode, ExecutionOptions, ExecutorConfig, FailurePolicy};
pub use result::{ChainResult, StepResult, StepStatus, RESULT_SCHEMA_VERSION};
pub use validator::ChainValidator;
