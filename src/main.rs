use clap::Parser;
use genai_pipeline::cli::{self, AppContext, Cli, Command};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let ctx = AppContext::init(cli.catalog.as_deref())?;

    match cli.command {
        Command::Run(args) => cli::run::run(ctx, args).await,
        Command::Estimate(args) => cli::run::estimate(ctx, args).await,
        Command::Validate(args) => cli::validate::run(ctx, args).await,
        Command::Models(command) => cli::models::run(ctx, command).await,
    }
}
