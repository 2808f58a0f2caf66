//! Command-line surface.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(
    name = "opsmedic",
    about = "Autonomous infrastructure troubleshooting agent",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run a troubleshooting session against a deployment error.
    Run(RunArgs),
}

#[derive(Debug, clap::Args)]
pub struct RunArgs {
    /// Target environment name (selects env/<name> for change actions).
    #[arg(short, long)]
    pub environment: String,

    /// The deployment error to troubleshoot.
    #[arg(short = 'E', long)]
    pub error: String,

    /// The operation that failed.
    #[arg(long, default_value = "troubleshooting")]
    pub operation: String,

    /// Iteration ceiling; overrides OPSMEDIC_MAX_ITERATIONS.
    #[arg(long)]
    pub max_iterations: Option<u32>,

    /// Cloud credential profile injected into spawned commands.
    #[arg(long, env = "AWS_PROFILE")]
    pub profile: Option<String>,

    /// Cloud region injected into spawned commands.
    #[arg(long, env = "AWS_REGION")]
    pub region: Option<String>,

    /// Working root; defaults to the current directory.
    #[arg(long)]
    pub working_dir: Option<PathBuf>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_args_parse() {
        let cli = Cli::parse_from([
            "opsmedic",
            "run",
            "--environment",
            "dev",
            "--error",
            "ECS deploy failed",
            "--max-iterations",
            "5",
        ]);
        let Command::Run(args) = cli.command;
        assert_eq!(args.environment, "dev");
        assert_eq!(args.error, "ECS deploy failed");
        assert_eq!(args.operation, "troubleshooting");
        assert_eq!(args.max_iterations, Some(5));
    }

    #[test]
    fn verify_cli() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
