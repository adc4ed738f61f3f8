use crate::demo::{run_calculate, run_demo, CalculateArgs, DemoArgs};
use crate::server;
use clap::{Args, Parser, Subcommand};
use common_charges::error::AppError;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "Common Charges",
    about = "Calculate and serve building common charges from the command line",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the HTTP service (default command)
    Serve(ServeArgs),
    /// Calculate charges for one building and period
    Charges {
        #[command(subcommand)]
        command: ChargesCommand,
    },
    /// Walk through the sample buildings and notice templates
    Demo(DemoArgs),
}

#[derive(Subcommand, Debug)]
enum ChargesCommand {
    /// Print the per-apartment statement for a billing period
    Calculate(CalculateArgs),
}

#[derive(Args, Debug, Default)]
pub(crate) struct ServeArgs {
    /// Override the configured host for the HTTP server
    #[arg(long)]
    pub(crate) host: Option<String>,
    /// Override the configured port for the HTTP server
    #[arg(long)]
    pub(crate) port: Option<u16>,
    /// Override the CSV snapshot directory loaded at startup
    #[arg(long)]
    pub(crate) data_dir: Option<PathBuf>,
}

pub(crate) async fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    let command = cli
        .command
        .unwrap_or_else(|| Command::Serve(ServeArgs::default()));

    match command {
        Command::Serve(args) => server::run(args).await,
        Command::Charges {
            command: ChargesCommand::Calculate(args),
        } => run_calculate(args),
        Command::Demo(args) => run_demo(args),
    }
}
