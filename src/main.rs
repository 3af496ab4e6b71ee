use anyhow::{Context, Result};
use clap::{ArgAction, Parser, Subcommand};
use hydronet::engine::config::{NetworkSpec, SimulationConfig};
use hydronet::engine::io::{ForcingTable, LogSink};
use hydronet::engine::simulation::{RunFailure, RunStatus};
use hydronet::engine::state::State;
use hydronet::engine::timeseries::Time;
use log::info;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

/// Simulate networks of coupled hydrological process models
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Log more detail: once for every step, twice for integrator sub-steps
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run a network over the time axis of a configuration
    Run {
        /// Network description (TOML)
        network: PathBuf,
        /// Simulation configuration (TOML)
        config: PathBuf,
        /// Forcing table (TOML)
        #[arg(short, long)]
        forcing: Option<PathBuf>,
        /// Print the final states as JSON
        #[arg(long)]
        json: bool,
    },
    /// Validate a network and print its evaluation order
    Check {
        network: PathBuf,
    },
    /// Print a network in Graphviz DOT format
    Dot {
        network: PathBuf,
    },
    /// List the available process models
    Models,
}

/// Final result of a run as written with `--json`
#[derive(Serialize)]
struct Report {
    status: String,
    failure: Option<RunFailure>,
    time: Time,
    steps: usize,
    states: BTreeMap<String, State>,
}

fn read(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("could not read {}", path.display()))
}

fn load_network(path: &Path) -> Result<NetworkSpec> {
    NetworkSpec::from_toml_str(&read(path)?)
        .with_context(|| format!("could not load network from {}", path.display()))
}

fn run(network: &Path, config: &Path, forcing: Option<&Path>, json: bool) -> Result<ExitCode> {
    let spec = load_network(network)?;
    let config = SimulationConfig::from_toml_str(&read(config)?)
        .with_context(|| format!("could not load configuration from {}", config.display()))?;

    let mut run = hydronet::prepare(spec, &config)?.with_sink(Box::new(LogSink::default()));
    if let Some(path) = forcing {
        let table = ForcingTable::from_toml_str(&read(path)?)
            .with_context(|| format!("could not load forcing from {}", path.display()))?;
        run = run.with_input_source(Box::new(table));
    }

    let status = run.run();
    info!("{} at t = {} after {} steps", status, run.current_time(), run.step_index());

    if json {
        let failure = match &status {
            RunStatus::Failed(failure) => Some(failure.clone()),
            _ => None,
        };
        let report = Report {
            status: status.to_string(),
            failure,
            time: run.current_time(),
            steps: run.step_index(),
            states: run.snapshot(),
        };
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("{}", status);
        for (name, state) in run.states() {
            println!("{}: {:?}", name, state.values());
        }
    }

    Ok(match status {
        RunStatus::Completed => ExitCode::SUCCESS,
        RunStatus::Failed(_) => ExitCode::from(1),
        RunStatus::Cancelled => ExitCode::from(2),
    })
}

fn check(network: &Path) -> Result<ExitCode> {
    let network = load_network(network)?.into_network()?;

    let order: Vec<&str> = network
        .evaluation_order()
        .into_iter()
        .map(|element| element.name())
        .collect();
    println!("{} elements, evaluation order: {}", network.len(), order.join(", "));
    for (i, layer) in network.layers().iter().enumerate() {
        let names: Vec<&str> = layer
            .iter()
            .map(|index| network.node(*index).name())
            .collect();
        println!("layer {}: {}", i, names.join(", "));
    }
    Ok(ExitCode::SUCCESS)
}

fn cli() -> Result<ExitCode> {
    let args = Args::parse();
    hydronet::logging::init(args.verbose);

    match args.command {
        Command::Run {
            network,
            config,
            forcing,
            json,
        } => run(&network, &config, forcing.as_deref(), json),
        Command::Check { network } => check(&network),
        Command::Dot { network } => {
            println!("{}", load_network(&network)?.into_network()?.as_dot());
            Ok(ExitCode::SUCCESS)
        }
        Command::Models => {
            for name in hydronet::available_models() {
                println!("{}", name);
            }
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn main() -> ExitCode {
    match cli() {
        Ok(code) => code,
        Err(err) => {
            eprintln!("error: {:#}", err);
            ExitCode::from(3)
        }
    }
}
