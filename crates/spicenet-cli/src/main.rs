//! spicenet command-line interface.

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use env_logger::Env;
use spicenet_core::{AnalysisCommand, Circuit, WaveformSet};
use spicenet_parser::{CircuitBuilder, Resolver};
use spicenet_sim::{NgspiceConfig, NgspiceSimulator};

#[derive(Parser)]
#[command(name = "spicenet")]
#[command(about = "Parse SPICE netlists into circuit graphs", long_about = None)]
#[command(version)]
struct Cli {
    /// Input netlist file
    #[arg(value_name = "FILE")]
    input: PathBuf,

    /// Node to treat as ground in addition to 0
    #[arg(short, long, value_name = "NODE")]
    ground: Option<String>,

    /// Directory library references are resolved against
    #[arg(short, long, value_name = "DIR")]
    lib: Option<PathBuf>,

    /// Expand subcircuit instances into the top level
    #[arg(long)]
    flatten: bool,

    /// Print the circuit (or simulation results) as JSON
    #[arg(long, conflicts_with = "netlist")]
    json: bool,

    /// Print the circuit as SPICE netlist text
    #[arg(long)]
    netlist: bool,

    /// Run the netlist's analyses through ngspice
    #[arg(long)]
    simulate: bool,

    /// ngspice executable
    #[arg(long, default_value = "ngspice")]
    ngspice: String,

    /// Circuit temperature in °C for simulation
    #[arg(long, requires = "simulate")]
    temp: Option<f64>,

    /// Verbose output (-v info, -vv debug)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => "error",
        1 => "info",
        _ => "debug",
    };
    env_logger::Builder::from_env(Env::default().default_filter_or(level)).init();

    let circuit = load(&cli)?;

    if cli.simulate {
        return simulate(&circuit, &cli);
    }

    if cli.json {
        let json = serde_json::to_string_pretty(&circuit).context("Failed to serialize circuit")?;
        println!("{}", json);
    } else if cli.netlist {
        print!("{}", circuit);
    } else {
        print_summary(&circuit);
    }
    Ok(())
}

fn load(cli: &Cli) -> Result<Circuit> {
    let text = fs::read_to_string(&cli.input)
        .with_context(|| format!("Failed to read netlist: {}", cli.input.display()))?;

    let resolver = match &cli.lib {
        Some(dir) => Resolver::new(dir),
        None => Resolver::default(),
    };
    let mut builder = CircuitBuilder::new(&resolver).file(&cli.input);
    if let Some(ground) = &cli.ground {
        builder = builder.ground(ground.as_str());
    }

    let (circuit, warnings) = builder
        .build_with_warnings(&text)
        .with_context(|| format!("Failed to parse {}", cli.input.display()))?;
    for warning in &warnings {
        eprintln!("warning: {}", warning);
    }
    log::info!(
        "loaded {} libraries for {}",
        resolver.cached(),
        cli.input.display()
    );

    if cli.flatten {
        return circuit.flatten().context("Failed to flatten circuit");
    }
    Ok(circuit)
}

fn print_summary(circuit: &Circuit) {
    println!("Circuit: {}", circuit.title().unwrap_or("(untitled)"));
    println!("Nodes: {}", circuit.node_count());
    println!("Elements: {}", circuit.element_count());

    let templates = circuit.subcircuits();
    if !templates.is_empty() {
        println!("Subcircuits:");
        for template in templates.iter() {
            let origin = template
                .source
                .as_ref()
                .map(|p| format!(" ({})", p.display()))
                .unwrap_or_default();
            println!(
                "  {} [{}]{}",
                template.name,
                template.ports.join(" "),
                origin
            );
        }
    }

    let models: Vec<&str> = circuit.models().map(|m| m.name.as_str()).collect();
    if !models.is_empty() {
        println!("Models: {}", models.join(", "));
    }

    let analyses = circuit.analyses();
    println!(
        "Analysis commands: {}",
        if analyses.is_empty() {
            "none".to_string()
        } else {
            analyses
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(", ")
        }
    );

    if !circuit.opaque_directives().is_empty() {
        println!("Unrecognized directives: {}", circuit.opaque_directives().len());
    }
}

fn simulate(circuit: &Circuit, cli: &Cli) -> Result<()> {
    let mut simulator = NgspiceSimulator::new(NgspiceConfig {
        executable: cli.ngspice.clone(),
        ..Default::default()
    });
    if let Some(temp) = cli.temp {
        simulator = simulator.temperature(temp);
    }

    let analyses = match circuit.analyses() {
        [] => vec![AnalysisCommand::Op],
        analyses => analyses.to_vec(),
    };

    let mut results = Vec::with_capacity(analyses.len());
    for analysis in &analyses {
        let waves = circuit
            .simulate(&simulator, analysis)
            .with_context(|| format!("Simulation failed: {}", analysis))?;
        results.push(waves);
    }

    if cli.json {
        let json =
            serde_json::to_string_pretty(&results).context("Failed to serialize results")?;
        println!("{}", json);
    } else {
        for (analysis, waves) in analyses.iter().zip(&results) {
            println!("{}", analysis);
            print_waveforms(waves);
            println!();
        }
    }
    Ok(())
}

fn print_waveforms(waves: &WaveformSet) {
    let columns: Vec<_> = waves
        .sweep
        .iter()
        .chain(waves.voltages.values())
        .chain(waves.currents.values())
        .collect();

    for column in &columns {
        print!("{:>14}", column.name);
    }
    println!();
    println!("{}", "-".repeat(14 * columns.len()));

    for row in 0..waves.len() {
        for column in &columns {
            match column.real.get(row) {
                Some(value) => print!("{:>14.6e}", value),
                None => print!("{:>14}", ""),
            }
        }
        println!();
    }
}
