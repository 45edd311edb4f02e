//! Generator domain - the contract between the executor and external generative services

mod entity;
mod error;
mod traits;
mod resolver;

pub use entity::{GenerationOutput, GenerationRequest, GeneratorBinding};
pub use error::GeneratorError;
pub use traits::Generator;
pub use resolver::{GeneratorResolver, StaticGeneratorResolver};

#[cfg(test)]
pub use traits::mock::{Invocation, MockGenerator};
