//! Chain entity and related types

use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::namespace::token_roots;
use super::namespace::INPUT_KEY;

/// Retry configuration for generator invocations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Maximum number of retry attempts after the first invocation
    pub max_retries: u32,
    /// Initial delay before first retry
    pub initial_delay_ms: u64,
    /// Maximum delay between retries
    pub max_delay_ms: u64,
    /// Multiplier for exponential backoff
    pub backoff_multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay_ms: 500,
            max_delay_ms: 10_000,
            backoff_multiplier: 2.0,
        }
    }
}

impl RetryConfig {
    pub fn new(max_retries: u32) -> Self {
        Self {
            max_retries,
            ..Default::default()
        }
    }

    /// No retries at all
    pub fn disabled() -> Self {
        Self::new(0)
    }

    pub fn with_initial_delay(mut self, ms: u64) -> Self {
        self.initial_delay_ms = ms;
        self
    }

    pub fn with_max_delay(mut self, ms: u64) -> Self {
        self.max_delay_ms = ms;
        self
    }

    pub fn with_backoff_multiplier(mut self, multiplier: f64) -> Self {
        self.backoff_multiplier = multiplier;
        self
    }

    /// Total invocations allowed, including the first one
    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    /// Calculate delay for a given retry number (0-indexed)
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::from_millis(self.initial_delay_ms.min(self.max_delay_ms));
        }

        let delay = self.initial_delay_ms as f64 * self.backoff_multiplier.powi(attempt as i32);
        let delay_ms = delay.min(self.max_delay_ms as f64) as u64;

        Duration::from_millis(delay_ms)
    }
}

fn default_true() -> bool {
    true
}

/// How a step refers to another step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReferenceKind {
    InputFrom,
    Token,
}

impl std::fmt::Display for ReferenceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InputFrom => write!(f, "input_from"),
            Self::Token => write!(f, "interpolation token"),
        }
    }
}

/// A single step in a chain
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepSpec {
    /// Unique name within the chain; generated from the type when omitted
    #[serde(default)]
    name: String,

    /// Capability tag, matched against registry categories
    #[serde(rename = "type")]
    step_type: String,

    /// Registry key; unset means the registry picks a model for the type
    #[serde(default, skip_serializing_if = "Option::is_none")]
    model: Option<String>,

    /// Generator parameters; strings may contain `{{...}}` tokens
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    parameters: BTreeMap<String, Value>,

    /// Earlier step whose output is passed as the `input` parameter
    #[serde(default, skip_serializing_if = "Option::is_none")]
    input_from: Option<String>,

    #[serde(default = "default_true")]
    enabled: bool,

    /// Per-step invocation timeout, overriding the executor default
    #[serde(default, skip_serializing_if = "Option::is_none")]
    timeout_ms: Option<u64>,

    /// Per-step retry policy, overriding the executor default
    #[serde(default, skip_serializing_if = "Option::is_none")]
    retry: Option<RetryConfig>,
}

impl StepSpec {
    /// Create a new step for a capability tag
    pub fn new(name: impl Into<String>, step_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            step_type: step_type.into(),
            model: None,
            parameters: BTreeMap::new(),
            input_from: None,
            enabled: true,
            timeout_ms: None,
            retry: None,
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_parameter(mut self, key: impl Into<String>, value: Value) -> Self {
        self.parameters.insert(key.into(), value);
        self
    }

    pub fn with_parameters(mut self, parameters: BTreeMap<String, Value>) -> Self {
        self.parameters = parameters;
        self
    }

    pub fn with_input_from(mut self, step: impl Into<String>) -> Self {
        self.input_from = Some(step.into());
        self
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = Some(timeout_ms);
        self
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = Some(retry);
        self
    }

    // Getters

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn step_type(&self) -> &str {
        &self.step_type
    }

    pub fn model(&self) -> Option<&str> {
        self.model.as_deref()
    }

    pub fn parameters(&self) -> &BTreeMap<String, Value> {
        &self.parameters
    }

    pub fn input_from(&self) -> Option<&str> {
        self.input_from.as_deref()
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn timeout_ms(&self) -> Option<u64> {
        self.timeout_ms
    }

    pub fn retry(&self) -> Option<&RetryConfig> {
        self.retry.as_ref()
    }

    /// Step names this step reads from, with how it reads them
    ///
    /// `input_from` comes first, then token roots in parameter order. The
    /// initial input is not a step and is never listed.
    pub fn references(&self) -> Vec<(String, ReferenceKind)> {
        let mut references = Vec::new();

        if let Some(source) = &self.input_from {
            references.push((source.clone(), ReferenceKind::InputFrom));
        }

        for value in self.parameters.values() {
            for root in token_roots(value) {
                if root != INPUT_KEY {
                    references.push((root, ReferenceKind::Token));
                }
            }
        }

        references
    }

    /// Distinct step names this step depends on
    pub fn dependencies(&self) -> BTreeSet<String> {
        self.references().into_iter().map(|(name, _)| name).collect()
    }
}

/// Steps executed concurrently, occupying one slot of the chain
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParallelGroup {
    parallel: Vec<StepSpec>,
}

impl ParallelGroup {
    pub fn new(steps: Vec<StepSpec>) -> Self {
        Self { parallel: steps }
    }

    pub fn steps(&self) -> &[StepSpec] {
        &self.parallel
    }

    pub fn is_empty(&self) -> bool {
        self.parallel.is_empty()
    }
}

/// One sequential slot of a chain
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ChainEntry {
    Parallel(ParallelGroup),
    Step(StepSpec),
}

impl ChainEntry {
    /// Steps in this slot, in declaration order
    pub fn steps(&self) -> &[StepSpec] {
        match self {
            Self::Parallel(group) => group.steps(),
            Self::Step(step) => std::slice::from_ref(step),
        }
    }

    fn steps_mut(&mut self) -> &mut [StepSpec] {
        match self {
            Self::Parallel(group) => &mut group.parallel,
            Self::Step(step) => std::slice::from_mut(step),
        }
    }

    pub fn is_parallel(&self) -> bool {
        matches!(self, Self::Parallel(_))
    }
}

/// Serialized form of a chain, before step names are filled in
#[derive(Debug, Clone, Deserialize)]
struct ChainDocument {
    name: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    steps: Vec<ChainEntry>,
}

impl From<ChainDocument> for Chain {
    fn from(document: ChainDocument) -> Self {
        let mut chain = Self {
            name: document.name,
            description: document.description,
            steps: document.steps,
        };
        chain.assign_missing_names();
        chain
    }
}

/// Declarative pipeline: an ordered sequence of steps and parallel groups
///
/// A chain is immutable once handed to the executor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "ChainDocument")]
pub struct Chain {
    name: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<String>,

    steps: Vec<ChainEntry>,
}

impl Chain {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            steps: Vec::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_step(mut self, step: StepSpec) -> Self {
        self.steps.push(ChainEntry::Step(step));
        self.assign_missing_names();
        self
    }

    pub fn with_parallel(mut self, steps: Vec<StepSpec>) -> Self {
        self.steps.push(ChainEntry::Parallel(ParallelGroup::new(steps)));
        self.assign_missing_names();
        self
    }

    // Getters

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn entries(&self) -> &[ChainEntry] {
        &self.steps
    }

    /// Every step, flattened in declaration order
    pub fn steps(&self) -> impl Iterator<Item = &StepSpec> {
        self.steps.iter().flat_map(|entry| entry.steps().iter())
    }

    pub fn step_count(&self) -> usize {
        self.steps().count()
    }

    pub fn enabled_step_count(&self) -> usize {
        self.steps().filter(|s| s.is_enabled()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Get a step by name
    pub fn get_step(&self, name: &str) -> Option<&StepSpec> {
        self.steps().find(|s| s.name() == name)
    }

    /// Index of the entry holding the named step
    pub fn entry_index_of(&self, name: &str) -> Option<usize> {
        self.steps
            .iter()
            .position(|entry| entry.steps().iter().any(|s| s.name() == name))
    }

    /// Name unnamed steps `<type>_<n>`, n being the 1-based flattened position
    fn assign_missing_names(&mut self) {
        let mut position = 0;

        for entry in &mut self.steps {
            for step in entry.steps_mut() {
                position += 1;

                if step.name.trim().is_empty() {
                    step.name = format!("{}_{}", step.step_type, position);
                }
            }
        }
    }
}
