//! A thin demo binary wiring a handful of peernetic actors onto either
//! the deterministic simulator or a real tokio [`ActorHost`], matching
//! the teacher's `clap::Parser` + subcommand shape
//! (`crates/apps/rns-tools/src/bin/rnx.rs`). Runs the end-to-end
//! scenarios of spec §8 for manual smoke-testing.

mod config;
mod scenarios;

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

#[derive(Parser, Debug)]
#[command(name = "peernetic")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Runs one of the deterministic-simulator scenarios from spec §8.
    Sim {
        #[arg(value_enum)]
        scenario: Scenario,
    },
    /// Wires two real tokio-backed actor hosts from a TOML config file
    /// and runs the echo scenario over them.
    Run {
        #[arg(long)]
        config: PathBuf,
    },
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum Scenario {
    Echo,
    Timer,
    Resend,
    Chord,
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();
    if let Err(err) = run(cli) {
        eprintln!("peernetic error: {err}");
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Command::Sim { scenario } => match scenario {
            Scenario::Echo => scenarios::run_echo(),
            Scenario::Timer => scenarios::run_timer(),
            Scenario::Resend => scenarios::run_resend(),
            Scenario::Chord => scenarios::run_chord(),
        },
        Command::Run { config } => {
            let cfg = config::EchoConfig::load(&config)?;
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(scenarios::run_config_echo(cfg))
        }
    }
}
