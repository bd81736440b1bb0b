//! `marshald`: the compute-node daemon around the Governor (spec.md §2).
//!
//! Subcommands:
//! - `run` — start the Governor loop, its HTTP adapter and any configured
//!   broker sidecars.
//! - `submit` — a one-shot admission client against a running node's HTTP
//!   adapter (§6).
//! - `status` — poll a single task's status.
//! - `worker` — the re-exec'd isolated-processor entrypoint (§4.2); never
//!   invoked directly by an operator.

mod run;
mod status;
mod submit;
mod worker;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "marshald", version, about = "Distributed compute-node Governor daemon")]
struct Cli {
    /// Path to an optional TOML config file layered under defaults and
    /// `MARSHAL_`-prefixed environment variables (spec.md §6).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the Governor, its HTTP adapter, and configured sidecars.
    Run,
    /// Submit a task to a running node and print the admission response.
    Submit(submit::SubmitArgs),
    /// Poll a task's status on a running node.
    Status(status::StatusArgs),
    /// Internal: run a single task in isolation. Invoked by the Governor
    /// via re-exec; reads one `WorkerRequest` JSON line from stdin.
    #[command(hide = true)]
    Worker,
}

#[tokio::main]
async fn main() -> eyre::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::Run => run::run(cli.config).await,
        Command::Submit(args) => submit::run(args).await,
        Command::Status(args) => status::run(args).await,
        Command::Worker => worker::run().await,
    }
}
