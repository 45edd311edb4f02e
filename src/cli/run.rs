//! Run and estimate commands

use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Args;
use tokio::io::AsyncWrite;
use tokio::signal;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use super::{parse_input, AppContext};
use crate::config::AppConfig;
use crate::domain::chain::{
    cancellation_pair, ChainExecutor, ChainResult, ExecutionOptions, FailurePolicy, StepStatus,
};
use crate::domain::generator::GeneratorResolver;
use crate::domain::stream::{NullStreamEmitter, StreamEmitter};
use crate::infrastructure::generator::{GeneratorTable, HttpGenerator};
use crate::infrastructure::observability::{init_metrics, MetricsConfig, MetricsStreamEmitter};
use crate::infrastructure::stream::JsonlStreamEmitter;

type EventWriter = Box<dyn AsyncWrite + Unpin + Send>;

/// Arguments for the run command
#[derive(Args, Debug, Clone)]
pub struct RunArgs {
    /// Chain document (.json or .toml)
    #[arg(long)]
    pub chain: PathBuf,

    /// Initial input; parsed as JSON when possible
    #[arg(long)]
    pub input: Option<String>,

    /// Use registry estimates instead of invoking generators
    #[arg(long)]
    pub dry_run: bool,

    /// Skip dependents of failed steps instead of stopping
    #[arg(long)]
    pub continue_on_error: bool,

    /// Worker limit for parallel groups (overrides config)
    #[arg(long)]
    pub max_parallel: Option<usize>,

    /// Write JSON Lines progress events (to `stream.path` or standard error)
    #[arg(long)]
    pub stream: bool,

    /// Print Prometheus metrics to standard error when done
    #[arg(long)]
    pub metrics: bool,
}

/// Arguments for the estimate command
#[derive(Args, Debug, Clone)]
pub struct EstimateArgs {
    /// Chain document (.json or .toml)
    #[arg(long)]
    pub chain: PathBuf,

    /// Initial input; parsed as JSON when possible
    #[arg(long)]
    pub input: Option<String>,

    /// Print the full result as JSON instead of a summary
    #[arg(long)]
    pub json: bool,
}

/// Run a chain and print its result as JSON
pub async fn run(ctx: AppContext, args: RunArgs) -> anyhow::Result<()> {
    let chain = ctx.load_chain(&args.chain)?;
    let input = parse_input(args.input.as_deref());

    let mut executor_config = ctx.config.executor.clone();
    if let Some(max_parallel) = args.max_parallel {
        executor_config = executor_config.with_max_parallel(max_parallel);
    }

    let metrics_config = if args.metrics {
        MetricsConfig::enabled()
    } else {
        ctx.config.metrics.clone()
    };
    let metrics = init_metrics(&metrics_config);

    let (mut emitter, writer) = if args.stream || ctx.config.stream.enabled {
        let (emitter, writer) = open_stream(&ctx.config).await?;
        (Arc::new(emitter) as Arc<dyn StreamEmitter>, Some(writer))
    } else {
        (Arc::new(NullStreamEmitter) as Arc<dyn StreamEmitter>, None)
    };

    if metrics.is_some() {
        emitter = Arc::new(MetricsStreamEmitter::new(emitter));
    }

    let executor = ChainExecutor::new(ctx.registry.clone(), build_resolver(&ctx.config)?, executor_config)
        .with_emitter(emitter);

    let mut options = if args.dry_run {
        ExecutionOptions::dry_run()
    } else {
        ExecutionOptions::new()
    };
    if args.continue_on_error {
        options = options.with_failure_policy(FailurePolicy::ContinueOnError);
    }

    let (cancel, signal) = cancellation_pair();
    options = options.with_cancellation(signal);

    let ctrl_c = tokio::spawn(async move {
        if signal::ctrl_c().await.is_ok() {
            warn!("Received Ctrl+C, cancelling chain");
            cancel.cancel();
        }
    });

    let result = executor.execute(&chain, input, options).await;
    ctrl_c.abort();

    // Closes the event channel so the writer task can finish
    drop(executor);

    if let Some(writer) = writer {
        match writer.await {
            Ok(Ok(_)) => {}
            Ok(Err(e)) => warn!("Failed to write event stream: {}", e),
            Err(e) => warn!("Event stream writer failed: {}", e),
        }
    }

    let result = result?;
    println!("{}", serde_json::to_string_pretty(&result)?);

    if let Some(metrics) = metrics {
        eprintln!("{}", metrics.render());
    }

    if result.success {
        Ok(())
    } else if result.cancelled {
        anyhow::bail!("Chain '{}' was cancelled", result.chain)
    } else {
        anyhow::bail!("Chain '{}' failed", result.chain)
    }
}

/// Dry-run a chain and print the cost and time estimate
pub async fn estimate(ctx: AppContext, args: EstimateArgs) -> anyhow::Result<()> {
    let chain = ctx.load_chain(&args.chain)?;
    let input = parse_input(args.input.as_deref());

    let executor = ChainExecutor::new(
        ctx.registry.clone(),
        Arc::new(GeneratorTable::new()),
        ctx.config.executor.clone(),
    );

    let result = executor
        .execute(&chain, input, ExecutionOptions::dry_run())
        .await?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        print!("{}", format_estimate(&result));
    }

    Ok(())
}

fn format_estimate(result: &ChainResult) -> String {
    let mut out = format!("Chain '{}'\n", result.chain);

    for step in &result.step_results {
        let line = match step.status {
            StepStatus::Succeeded => format!(
                "  {:<24} {:<20} ${:>8.4} {:>10}\n",
                step.step_name,
                step.model.as_deref().unwrap_or("-"),
                step.cost,
                format_duration(Duration::from_millis(step.elapsed_ms)),
            ),
            _ => format!(
                "  {:<24} {}\n",
                step.step_name,
                step.error_message().unwrap_or_else(|| "not run".to_string())
            ),
        };
        out.push_str(&line);
    }

    out.push_str(&format!(
        "  {:<24} {:<20} ${:>8.4} {:>10}\n",
        "total",
        "",
        result.total_cost,
        format_duration(Duration::from_millis(result.total_elapsed_ms)),
    ));
    out
}

fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();

    if secs >= 60 {
        format!("{}m{:02}s", secs / 60, secs % 60)
    } else {
        format!("{:.1}s", duration.as_secs_f64())
    }
}

fn build_resolver(config: &AppConfig) -> anyhow::Result<Arc<dyn GeneratorResolver>> {
    let mut generator = HttpGenerator::with_timeout(
        "http",
        Duration::from_millis(config.generator.request_timeout_ms),
    )?;

    if let Some(base_url) = &config.generator.base_url {
        generator = generator.with_base_url(base_url);
    }
    if let Some(api_key) = &config.generator.api_key {
        generator = generator.with_api_key(api_key);
    }

    let table = GeneratorTable::new().with_generator(Arc::new(generator))?;
    Ok(Arc::new(table))
}

async fn open_stream(
    config: &AppConfig,
) -> anyhow::Result<(JsonlStreamEmitter, JoinHandle<io::Result<EventWriter>>)> {
    let writer: EventWriter = match &config.stream.path {
        Some(path) => {
            info!(path = %path, "Writing progress events");
            Box::new(tokio::fs::File::create(path).await?)
        }
        None => Box::new(tokio::io::stderr()),
    };

    Ok(JsonlStreamEmitter::spawn(writer))
}
