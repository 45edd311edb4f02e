//! Chain executor - runs a validated chain step by step
//!
//! Sequential entries are awaited inline by the driving task. Parallel groups are
//! forked onto tasks gated by a semaphore and joined before the next entry starts.
//! Only the driver mutates the namespace; group workers receive owned parameters
//! resolved against the namespace as it was when the group started.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use futures::stream::{FuturesUnordered, StreamExt};
use serde_json::Value;
use tokio::sync::Semaphore;
use tokio::task::{AbortHandle, JoinError, JoinHandle};
use tokio::time::{sleep_until, timeout, Instant};
use tracing::{debug, info, warn};

use super::cancellation::CancellationSignal;
use super::entity::{Chain, ChainEntry, RetryConfig, StepSpec};
use super::error::{ConfigError, StepError};
use super::namespace::{Namespace, INPUT_KEY};
use super::options::{ExecutionMode, ExecutionOptions, ExecutorConfig, FailurePolicy};
use super::result::{ChainResult, StepResult, StepStatus, RESULT_SCHEMA_VERSION};
use super::validator::ChainValidator;
use crate::domain::generator::{GenerationOutput, GenerationRequest, Generator, GeneratorResolver};
use crate::domain::model::{ModelDefinition, ModelRegistry};
use crate::domain::stream::{EventKind, NullStreamEmitter, PipelineEvent, StreamEmitter};

/// Scheme of the synthetic output locators produced by dry runs
pub const DRY_RUN_SCHEME: &str = "mock://";

/// How long aborted group workers get to unwind before they are abandoned
const ABORT_SETTLE: Duration = Duration::from_millis(50);

/// A step ready to be handed to a generator
#[derive(Debug, Clone)]
struct StepJob {
    index: usize,
    step_name: String,
    step_type: String,
    model: ModelDefinition,
    parameters: BTreeMap<String, Value>,
    timeout_ms: u64,
    retry: RetryConfig,
}

/// What a group worker was running, kept by the driver in case the worker is lost
#[derive(Debug, Clone)]
struct JobLabel {
    index: usize,
    step_name: String,
    step_type: String,
    model: String,
}

impl StepJob {
    fn label(&self) -> JobLabel {
        JobLabel {
            index: self.index,
            step_name: self.step_name.clone(),
            step_type: self.step_type.clone(),
            model: self.model.key().to_string(),
        }
    }
}

/// A step after dependency checks, model selection and interpolation
///
/// Nothing has been emitted yet; see `ChainExecutor::announce` and `ChainExecutor::settle`.
enum Prepared {
    Ready(StepJob),
    Skipped {
        index: usize,
        dependency: String,
        result: StepResult,
    },
    /// Failed before reaching a generator
    Failed { index: usize, result: StepResult },
}

/// Chain executor
#[derive(Debug)]
pub struct ChainExecutor {
    registry: Arc<ModelRegistry>,
    resolver: Arc<dyn GeneratorResolver>,
    emitter: Arc<dyn StreamEmitter>,
    config: ExecutorConfig,
}

impl ChainExecutor {
    pub fn new(
        registry: Arc<ModelRegistry>,
        resolver: Arc<dyn GeneratorResolver>,
        config: ExecutorConfig,
    ) -> Self {
        Self {
            registry,
            resolver,
            emitter: Arc::new(NullStreamEmitter),
            config,
        }
    }

    pub fn with_emitter(mut self, emitter: Arc<dyn StreamEmitter>) -> Self {
        self.emitter = emitter;
        self
    }

    pub fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    pub fn registry(&self) -> &ModelRegistry {
        &self.registry
    }

    pub fn validate(&self, chain: &Chain) -> Result<(), ConfigError> {
        ChainValidator::new(&self.registry).validate(chain)
    }

    /// Run a chain to completion
    ///
    /// Fails only when validation fails, before anything runs. Step failures,
    /// cancellation and dry runs all produce a complete `ChainResult`.
    pub async fn execute(
        &self,
        chain: &Chain,
        initial_input: Value,
        options: ExecutionOptions,
    ) -> Result<ChainResult, ConfigError> {
        self.validate(chain)?;

        let cancel = options
            .cancellation
            .clone()
            .unwrap_or_else(CancellationSignal::never);

        let runner = StepRunner {
            resolver: self.resolver.clone(),
            emitter: self.emitter.clone(),
            mode: options.mode,
            cancel: cancel.clone(),
        };

        info!(
            chain = %chain.name(),
            steps = chain.enabled_step_count(),
            mode = %options.mode,
            "Starting chain execution"
        );

        self.emit(EventKind::PipelineStart {
            chain: chain.name().to_string(),
            step_count: chain.enabled_step_count(),
            mode: options.mode,
        });

        let mut namespace = Namespace::new(initial_input);
        let mut unavailable: HashSet<String> = HashSet::new();
        let mut step_results: Vec<StepResult> = Vec::new();
        let mut total_cost = 0.0;
        let mut total_elapsed_ms = 0;
        let mut cancelled = false;
        let mut position = 0;

        for entry in chain.entries() {
            let first_index = position;
            position += entry.steps().len();

            if cancel.is_cancelled() {
                cancelled = true;
                break;
            }

            let steps: Vec<(usize, &StepSpec)> = entry
                .steps()
                .iter()
                .enumerate()
                .map(|(offset, step)| (first_index + offset, step))
                .filter(|(_, step)| step.is_enabled())
                .collect();

            if steps.is_empty() {
                continue;
            }

            let results = match entry {
                ChainEntry::Step(_) => {
                    let mut results = Vec::with_capacity(1);
                    for (index, step) in steps {
                        results.push(self.run_step(&runner, index, step, &namespace, &unavailable).await);
                    }
                    results
                }
                ChainEntry::Parallel(_) => {
                    self.run_group(&runner, steps, &namespace, &unavailable)
                        .await
                }
            };

            let mut entry_elapsed_ms = 0;
            let mut entry_failed = false;

            for result in &results {
                total_cost += result.cost;
                entry_elapsed_ms = entry_elapsed_ms.max(result.elapsed_ms);

                if result.success() {
                    if let Some(output) = &result.output {
                        namespace.insert(result.step_name.clone(), Value::String(output.clone()));
                    }
                    continue;
                }

                unavailable.insert(result.step_name.clone());

                match result.status {
                    StepStatus::Failed => entry_failed = true,
                    StepStatus::Cancelled => cancelled = true,
                    StepStatus::Skipped | StepStatus::Succeeded => {}
                }
            }

            total_elapsed_ms += entry_elapsed_ms;
            step_results.extend(results);

            if cancelled || cancel.is_cancelled() {
                cancelled = true;
                break;
            }

            if entry_failed && options.failure_policy == FailurePolicy::FailFast {
                warn!(chain = %chain.name(), "Step failed, halting chain");
                break;
            }
        }

        if cancelled {
            warn!(chain = %chain.name(), "Chain execution cancelled");
        }

        let success = !cancelled && step_results.iter().all(StepResult::success);

        info!(
            chain = %chain.name(),
            success,
            steps = step_results.len(),
            total_cost,
            total_elapsed_ms,
            "Chain execution finished"
        );

        self.emit(EventKind::PipelineComplete {
            success,
            cancelled,
            total_cost,
            total_duration_ms: total_elapsed_ms,
            step_results: step_results.len(),
        });

        Ok(ChainResult {
            schema_version: RESULT_SCHEMA_VERSION,
            chain: chain.name().to_string(),
            mode: options.mode,
            success,
            cancelled,
            step_results,
            total_cost,
            total_elapsed_ms,
            namespace: namespace.into_map(),
        })
    }

    async fn run_step(
        &self,
        runner: &StepRunner,
        index: usize,
        step: &StepSpec,
        namespace: &Namespace,
        unavailable: &HashSet<String>,
    ) -> StepResult {
        let prepared = self.prepare(index, step, namespace, unavailable);
        self.announce(&prepared);

        match self.settle(prepared) {
            Ok(job) => runner.run_job(job).await,
            Err(result) => result,
        }
    }

    /// Fork every member onto the worker pool and join them in declaration order
    async fn run_group(
        &self,
        runner: &StepRunner,
        steps: Vec<(usize, &StepSpec)>,
        namespace: &Namespace,
        unavailable: &HashSet<String>,
    ) -> Vec<StepResult> {
        let prepared: Vec<Prepared> = steps
            .into_iter()
            .map(|(index, step)| self.prepare(index, step, namespace, unavailable))
            .collect();

        // Every start precedes any completion within the group
        prepared.iter().for_each(|p| self.announce(p));

        let mut slots: Vec<Option<StepResult>> = vec![None; prepared.len()];
        let mut jobs = Vec::with_capacity(prepared.len());

        for (slot, prepared) in prepared.into_iter().enumerate() {
            match self.settle(prepared) {
                Ok(job) => jobs.push((slot, job)),
                Err(result) => slots[slot] = Some(result),
            }
        }

        debug!(
            members = jobs.len(),
            max_parallel = self.config.max_parallel,
            "Dispatching parallel group"
        );

        let semaphore = Arc::new(Semaphore::new(self.config.max_parallel.max(1)));
        let mut labels = Vec::with_capacity(jobs.len());
        let mut handles = Vec::with_capacity(jobs.len());

        for (slot, job) in jobs {
            labels.push((slot, job.label()));

            let runner = runner.clone();
            let semaphore = semaphore.clone();

            handles.push(tokio::spawn(async move {
                let _permit = semaphore.acquire_owned().await.ok();
                runner.run_job(job).await
            }));
        }

        let outcomes = self.join_workers(handles, &runner.cancel).await;

        for ((slot, label), outcome) in labels.into_iter().zip(outcomes) {
            let result = match outcome {
                Some(Ok(result)) => result,
                Some(Err(error)) => runner.worker_lost(&label, Some(&error)),
                None => runner.worker_lost(&label, None),
            };
            slots[slot] = Some(result);
        }

        slots.into_iter().flatten().collect()
    }

    /// Collect group workers in declaration order
    ///
    /// After cancellation the workers get `cancel_grace_ms` to finish, then they are
    /// aborted. Workers still running `ABORT_SETTLE` after the abort are abandoned
    /// and come back as `None`.
    async fn join_workers(
        &self,
        handles: Vec<JoinHandle<StepResult>>,
        cancel: &CancellationSignal,
    ) -> Vec<Option<Result<StepResult, JoinError>>> {
        let aborts: Vec<AbortHandle> = handles.iter().map(JoinHandle::abort_handle).collect();
        let mut outcomes: Vec<Option<Result<StepResult, JoinError>>> =
            aborts.iter().map(|_| None).collect();

        let mut pending: FuturesUnordered<_> = handles
            .into_iter()
            .enumerate()
            .map(|(position, handle)| async move { (position, handle.await) })
            .collect();

        let mut deadline: Option<Instant> = None;
        let mut aborted = false;

        loop {
            let wake_at = deadline;

            tokio::select! {
                biased;
                next = pending.next() => match next {
                    Some((position, outcome)) => outcomes[position] = Some(outcome),
                    None => break,
                },
                _ = cancel.cancelled(), if deadline.is_none() => {
                    deadline = Some(Instant::now() + Duration::from_millis(self.config.cancel_grace_ms));
                }
                _ = async move {
                    match wake_at {
                        Some(at) => sleep_until(at).await,
                        None => std::future::pending::<()>().await,
                    }
                } => {
                    if aborted {
                        warn!(workers = pending.len(), "Abandoning group workers that ignored abort");
                        break;
                    }

                    warn!(
                        workers = pending.len(),
                        grace_ms = self.config.cancel_grace_ms,
                        "Aborting group workers after cancellation grace period"
                    );
                    aborts.iter().for_each(AbortHandle::abort);
                    aborted = true;
                    deadline = Some(Instant::now() + ABORT_SETTLE);
                }
            }
        }

        outcomes
    }

    fn prepare(
        &self,
        index: usize,
        step: &StepSpec,
        namespace: &Namespace,
        unavailable: &HashSet<String>,
    ) -> Prepared {
        if let Some(dependency) = step
            .dependencies()
            .into_iter()
            .find(|d| unavailable.contains(d))
        {
            return Prepared::Skipped {
                index,
                result: StepResult::skipped(
                    step.name(),
                    step.step_type(),
                    step.model().map(str::to_string),
                    dependency.clone(),
                ),
                dependency,
            };
        }

        let model = match self.select_model(step) {
            Ok(model) => model,
            Err(error) => {
                return Prepared::Failed {
                    index,
                    result: StepResult::failed(step.name(), step.step_type(), None, error, 0),
                };
            }
        };

        match resolve_parameters(step, &model, namespace) {
            Ok(parameters) => Prepared::Ready(StepJob {
                index,
                step_name: step.name().to_string(),
                step_type: step.step_type().to_string(),
                timeout_ms: step.timeout_ms().unwrap_or(self.config.step_timeout_ms),
                retry: step
                    .retry()
                    .cloned()
                    .unwrap_or_else(|| self.config.retry.clone()),
                model,
                parameters,
            }),
            Err(error) => Prepared::Failed {
                index,
                result: StepResult::failed(
                    step.name(),
                    step.step_type(),
                    Some(model.key().to_string()),
                    error,
                    0,
                ),
            },
        }
    }

    /// Explicit model, or the registry's default for the step type
    fn select_model(&self, step: &StepSpec) -> Result<ModelDefinition, StepError> {
        match step.model() {
            Some(key) => self.registry.get(key).cloned().map_err(StepError::from),
            None => self
                .registry
                .default_for_category(step.step_type())
                .cloned()
                .ok_or_else(|| {
                    StepError::fatal(format!(
                        "No model registered for step type '{}'",
                        step.step_type()
                    ))
                }),
        }
    }

    /// Emit `step_start` for steps that count as started
    fn announce(&self, prepared: &Prepared) {
        let (index, step, step_type, model) = match prepared {
            Prepared::Ready(job) => {
                debug!(step = %job.step_name, model = %job.model.key(), "Starting step");
                (
                    job.index,
                    &job.step_name,
                    &job.step_type,
                    Some(job.model.key().to_string()),
                )
            }
            Prepared::Failed { index, result } => {
                (*index, &result.step_name, &result.step_type, result.model.clone())
            }
            Prepared::Skipped { .. } => return,
        };

        self.emit(EventKind::StepStart {
            index,
            step: step.clone(),
            step_type: step_type.clone(),
            model,
        });
    }

    /// Hand back the job to run, or emit the outcome of a step that never reaches a generator
    fn settle(&self, prepared: Prepared) -> Result<StepJob, StepResult> {
        match prepared {
            Prepared::Ready(job) => Ok(job),
            Prepared::Skipped {
                index,
                dependency,
                result,
            } => {
                debug!(step = %result.step_name, dependency = %dependency, "Skipping step with failed dependency");

                self.emit(EventKind::StepSkipped {
                    index,
                    step: result.step_name.clone(),
                    reason: format!("dependency '{}' did not succeed", dependency),
                });
                Err(result)
            }
            Prepared::Failed { index, result } => {
                if let Some(error) = &result.error {
                    warn!(step = %result.step_name, error = %error, "Step failed before invocation");

                    self.emit(EventKind::StepError {
                        index,
                        step: result.step_name.clone(),
                        step_type: result.step_type.clone(),
                        message: error.to_string(),
                        kind: error.kind().to_string(),
                    });
                }
                Err(result)
            }
        }
    }

    fn emit(&self, kind: EventKind) {
        self.emitter.emit(PipelineEvent::new(kind));
    }
}

/// Model defaults, overlaid by interpolated parameters, plus the `input_from` output
fn resolve_parameters(
    step: &StepSpec,
    model: &ModelDefinition,
    namespace: &Namespace,
) -> Result<BTreeMap<String, Value>, StepError> {
    let mut parameters = model.defaults().clone();

    for (key, value) in step.parameters() {
        let resolved = namespace
            .interpolate(value)
            .map_err(|e| StepError::fatal(e.to_string()))?;
        parameters.insert(key.clone(), resolved);
    }

    if let Some(source) = step.input_from() {
        if !step.parameters().contains_key(INPUT_KEY) {
            let output = namespace.get(source).ok_or_else(|| {
                StepError::fatal(format!(
                    "Unresolved reference input_from '{}': no output recorded",
                    source
                ))
            })?;
            parameters.insert(INPUT_KEY.to_string(), output.clone());
        }
    }

    Ok(parameters)
}

fn elapsed_ms(started: Instant) -> u64 {
    started.elapsed().as_millis() as u64
}

/// Everything a worker needs to run one job, cheap to clone into tasks
#[derive(Debug, Clone)]
struct StepRunner {
    resolver: Arc<dyn GeneratorResolver>,
    emitter: Arc<dyn StreamEmitter>,
    mode: ExecutionMode,
    cancel: CancellationSignal,
}

impl StepRunner {
    async fn run_job(&self, job: StepJob) -> StepResult {
        let result = match self.mode {
            ExecutionMode::DryRun => self.dry_run(&job),
            ExecutionMode::Live => self.invoke(&job).await,
        };

        match &result.error {
            None => {
                debug!(
                    step = %job.step_name,
                    model = %job.model.key(),
                    cost = result.cost,
                    elapsed_ms = result.elapsed_ms,
                    attempts = result.attempts,
                    "Step completed"
                );

                self.emit(EventKind::StepComplete {
                    index: job.index,
                    step: job.step_name.clone(),
                    cost: result.cost,
                    output: result.output.clone().unwrap_or_default(),
                    duration_ms: result.elapsed_ms,
                });
            }
            Some(error) => {
                warn!(step = %job.step_name, attempts = result.attempts, error = %error, "Step failed");
                self.emit_error(job.index, &job.step_name, &job.step_type, error);
            }
        }

        result
    }

    /// Registry estimates instead of an invocation
    fn dry_run(&self, job: &StepJob) -> StepResult {
        StepResult::succeeded(
            &job.step_name,
            &job.step_type,
            job.model.key(),
            format!("{}{}/{}", DRY_RUN_SCHEME, job.step_name, job.model.key()),
            job.model.cost_estimate(),
            job.model.processing_time_estimate_ms(),
        )
    }

    /// Invoke with retry: only retryable errors are retried, with exponential backoff
    async fn invoke(&self, job: &StepJob) -> StepResult {
        let started = Instant::now();
        let model = job.model.key().to_string();

        let generator = match self.resolver.resolve(&job.step_type, &model).await {
            Ok(generator) => generator,
            Err(e) => {
                return StepResult::failed(
                    &job.step_name,
                    &job.step_type,
                    Some(model),
                    StepError::fatal(e.to_string()),
                    elapsed_ms(started),
                );
            }
        };

        let max_attempts = job.retry.max_attempts();
        let mut attempts = 0;
        let mut delays_ms = Vec::new();

        let outcome = loop {
            attempts += 1;

            match self.attempt(generator.as_ref(), job).await {
                Ok(output) => break Ok(output),
                Err(StepError::Retryable { message }) if attempts < max_attempts => {
                    let delay = job.retry.delay_for_attempt(attempts - 1);

                    warn!(
                        step = %job.step_name,
                        generator = %generator.name(),
                        attempt = attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %message,
                        "Retrying step"
                    );
                    delays_ms.push(delay.as_millis() as u64);

                    tokio::select! {
                        biased;
                        _ = self.cancel.cancelled() => {
                            break Err(StepError::cancelled("chain cancelled during retry backoff"));
                        }
                        _ = tokio::time::sleep(delay) => {}
                    }
                }
                Err(StepError::Retryable { message }) => {
                    break Err(StepError::fatal(format!(
                        "retries exhausted after {} attempt(s): {}",
                        attempts, message
                    )));
                }
                Err(error) => break Err(error),
            }
        };

        let measured_ms = elapsed_ms(started);

        let result = match outcome {
            Ok(output) => StepResult::succeeded(
                &job.step_name,
                &job.step_type,
                model,
                output.output,
                output.cost,
                output.elapsed_ms.unwrap_or(measured_ms),
            ),
            Err(error) => {
                StepResult::failed(&job.step_name, &job.step_type, Some(model), error, measured_ms)
            }
        };

        result.with_attempts(attempts, delays_ms)
    }

    /// One invocation bounded by the step timeout and the cancellation signal
    async fn attempt(
        &self,
        generator: &dyn Generator,
        job: &StepJob,
    ) -> Result<GenerationOutput, StepError> {
        let request = GenerationRequest::new(
            job.step_name.clone(),
            job.step_type.clone(),
            job.model.clone(),
            job.parameters.clone(),
        );

        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(StepError::cancelled("chain cancelled")),
            outcome = timeout(Duration::from_millis(job.timeout_ms), generator.invoke(request)) => {
                match outcome {
                    Ok(result) => result.map_err(StepError::from),
                    Err(_) => Err(StepError::timeout(job.timeout_ms)),
                }
            }
        }
    }

    /// Result for a worker that panicked, was aborted or was abandoned (`None`)
    fn worker_lost(&self, label: &JobLabel, error: Option<&JoinError>) -> StepResult {
        let error = match error {
            None => StepError::cancelled("abandoned after cancellation grace period"),
            Some(e) if e.is_cancelled() => {
                StepError::cancelled("aborted after cancellation grace period")
            }
            Some(e) => StepError::fatal(format!("worker panicked: {}", e)),
        };

        self.emit_error(label.index, &label.step_name, &label.step_type, &error);

        StepResult::failed(
            &label.step_name,
            &label.step_type,
            Some(label.model.clone()),
            error,
            0,
        )
    }

    fn emit_error(&self, index: usize, step: &str, step_type: &str, error: &StepError) {
        self.emit(EventKind::StepError {
            index,
            step: step.to_string(),
            step_type: step_type.to_string(),
            message: error.to_string(),
            kind: error.kind().to_string(),
        });
    }

    fn emit(&self, kind: EventKind) {
        self.emitter.emit(PipelineEvent::new(kind));
    }
}
