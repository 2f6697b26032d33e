#![forbid(unsafe_code)]

use clap::{Args, Parser, Subcommand};
use tickflow::EventLoop;
use tracing_subscriber::EnvFilter;
use web_time::Duration;

use crate::demo::{ManualScript, interval_demo, manual_demo};
use crate::error::{PlaygroundError, Result};

#[derive(Debug, Parser)]
#[command(
    name = "tickflow-playground",
    about = "Run the tickflow interval and manual-stream demos",
    version
)]
pub struct Cli {
    /// Drive timers from a lab clock instead of waiting in real time.
    #[arg(long, global = true, env = "TICKFLOW_LAB")]
    pub lab: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// interval -> map(x * 2) -> filter(x % 10 != 0), cancelled after N outputs.
    Interval(IntervalArgs),

    /// Scripted manual source: two values, then an error (or completion).
    Manual(ManualArgs),
}

#[derive(Debug, Args)]
pub struct IntervalArgs {
    /// Tick period in milliseconds.
    #[arg(
        long,
        env = "TICKFLOW_PERIOD_MS",
        default_value_t = 1000,
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    pub period_ms: u64,

    /// Number of filtered outputs to print before cancelling.
    #[arg(
        long,
        env = "TICKFLOW_OUTPUTS",
        default_value_t = 5,
        value_parser = clap::value_parser!(u32).range(1..)
    )]
    pub outputs: u32,
}

#[derive(Debug, Args)]
pub struct ManualArgs {
    /// Divide every scripted delay by this factor.
    #[arg(long, env = "TICKFLOW_SPEEDUP", default_value_t = 1.0)]
    pub speedup: f64,

    /// End the script with completion instead of an error.
    #[arg(long)]
    pub complete: bool,
}

pub fn run_from_env() -> Result<()> {
    init_logging()?;
    let cli = Cli::parse();
    run(cli)
}

pub fn run(cli: Cli) -> Result<()> {
    let event_loop = if cli.lab {
        EventLoop::lab()
    } else {
        EventLoop::new()
    };
    match cli.command {
        Commands::Interval(args) => {
            let period = Duration::from_millis(args.period_ms);
            for value in interval_demo(&event_loop, period, args.outputs as usize)? {
                println!("{value}");
            }
            Ok(())
        }
        Commands::Manual(args) => {
            let script = if args.complete {
                ManualScript::Complete
            } else {
                ManualScript::Error
            };
            for line in manual_demo(&event_loop, script, args.speedup)? {
                println!("{line}");
            }
            Ok(())
        }
    }
}

fn init_logging() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| PlaygroundError::Logging {
            message: e.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn interval_defaults() {
        let cli = Cli::try_parse_from(["tickflow-playground", "interval"]).unwrap();
        match cli.command {
            Commands::Interval(args) => {
                assert_eq!(args.period_ms, 1000);
                assert_eq!(args.outputs, 5);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn zero_period_is_rejected_by_parser() {
        let err = Cli::try_parse_from(["tickflow-playground", "interval", "--period-ms", "0"]);
        assert!(err.is_err());
    }

    #[test]
    fn lab_flag_is_global() {
        let cli =
            Cli::try_parse_from(["tickflow-playground", "manual", "--lab", "--complete"]).unwrap();
        assert!(cli.lab);
        assert!(matches!(cli.command, Commands::Manual(ManualArgs { complete: true, .. })));
    }

    #[test]
    fn run_manual_on_lab_clock() {
        let cli = Cli::try_parse_from(["tickflow-playground", "--lab", "manual"]).unwrap();
        run(cli).unwrap();
    }
}
