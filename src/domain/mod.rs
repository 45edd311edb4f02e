//! Domain layer - Core pipeline logic and entities

pub mod chain;
pub mod error;
pub mod generator;
pub mod model;
pub mod stream;

pub use chain::{
    Chain, ChainEntry, ChainExecutor, ChainResult, ChainValidator, ConfigError, ExecutionMode,
    ExecutionOptions, ExecutorConfig, FailurePolicy, RetryConfig, StepError, StepResult, StepSpec,
    StepStatus,
};
pub use error::DomainError;
pub use generator::{
    GenerationOutput, GenerationRequest, Generator, GeneratorBinding, GeneratorError,
    GeneratorResolver,
};
pub use model::{ModelDefinition, ModelRegistry, RegistryError};
pub use stream::{EventKind, NullStreamEmitter, PipelineEvent, StreamEmitter};
