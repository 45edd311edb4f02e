//! Validate command

use std::path::PathBuf;

use clap::Args;

use super::AppContext;
use crate::domain::chain::ChainValidator;

/// Arguments for the validate command
#[derive(Args, Debug, Clone)]
pub struct ValidateArgs {
    /// Chain document (.json or .toml)
    #[arg(long)]
    pub chain: PathBuf,
}

pub async fn run(ctx: AppContext, args: ValidateArgs) -> anyhow::Result<()> {
    let chain = ctx.load_chain(&args.chain)?;

    match ChainValidator::new(&ctx.registry).validate(&chain) {
        Ok(()) => {
            println!(
                "Chain '{}' is valid ({} steps, {} enabled)",
                chain.name(),
                chain.step_count(),
                chain.enabled_step_count()
            );
            Ok(())
        }
        Err(error) => {
            println!("Chain '{}' is invalid:", chain.name());
            for violation in error.violations() {
                println!("  - {}", violation);
            }
            anyhow::bail!("{} violation(s) found", error.violations().len())
        }
    }
}
