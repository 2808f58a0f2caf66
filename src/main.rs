//! opsmedic - Main entry point.

use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use opsmedic::agent::{run_control, AgentEvent, Controller, EventSender};
use opsmedic::cli::{Cli, Command, RunArgs};
use opsmedic::config::AgentConfig;
use opsmedic::context::ProblemContext;
use opsmedic::error::Error;
use opsmedic::llm::AnthropicProvider;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Run(args) => {
            let exit_code = run(args).await?;
            std::process::exit(exit_code);
        }
    }
}

async fn run(args: RunArgs) -> anyhow::Result<i32> {
    let config = AgentConfig::from_env()?;

    let working_dir = match args.working_dir {
        Some(dir) => dir,
        None => std::env::current_dir().map_err(Error::Io)?,
    };

    let mut context = ProblemContext::new(&args.environment, working_dir, &args.error)
        .with_operation(&args.operation);
    if let Some(profile) = args.profile {
        context = context.with_profile(profile);
    }
    if let Some(region) = args.region {
        context = context.with_region(region);
    }

    let provider = Arc::new(AnthropicProvider::new(config.llm.clone())?);
    let max_iterations = args.max_iterations.unwrap_or(config.max_iterations);

    let (control, watcher) = run_control();
    let (events, mut event_rx) = EventSender::channel();

    // First Ctrl-C requests cancellation; the loop honors it at the next
    // checkpoint or kills the running command.
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("interrupt received, cancelling run");
            control.cancel();
        }
    });

    let printer = tokio::spawn(async move {
        while let Some(event) = event_rx.recv().await {
            match event {
                AgentEvent::RunStarted {
                    max_iterations, ..
                } => {
                    println!("starting run (up to {max_iterations} iterations)");
                }
                AgentEvent::IterationStarted { number, thought } => {
                    println!("[{number}] {thought}");
                }
                AgentEvent::IterationCompleted {
                    number, status, ..
                } => {
                    println!("[{number}] {status}");
                }
                AgentEvent::RunFinished { .. } => {}
            }
        }
    });

    let controller = Controller::new(context, provider, max_iterations, events, watcher);
    let (_run, outcome) = controller.run().await;
    printer.await.ok();

    println!("{}: {}", outcome, outcome.summary());
    Ok(outcome.exit_code())
}
