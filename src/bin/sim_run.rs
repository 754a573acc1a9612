//! Demo run: a small two-processor machine on the local reference engine,
//! with optional checkpoint, restore, and live processor switchover.

use std::path::PathBuf;

use clap::Parser;

use hwsim_rs::config::{ComponentFamily, ComponentGraph, NodeIndex, ParamValue};
use hwsim_rs::engine::LocalEngine;
use hwsim_rs::run::{LifeError, RunContext, instantiate};

#[derive(Debug, Parser)]
#[command(name = "sim-run", about = "Run the demo machine on the local engine")]
struct Args {
    /// Run output directory (receives graph.ini)
    #[arg(long, default_value = "sim_out")]
    outdir: PathBuf,

    /// Ticks to simulate before any checkpoint or switchover
    #[arg(long, default_value_t = 200)]
    ticks: u64,

    /// Write a checkpoint to this directory at the end of the run
    #[arg(long)]
    checkpoint: Option<PathBuf>,

    /// Restore state from this checkpoint before simulating
    #[arg(long)]
    restore: Option<PathBuf>,

    /// Switch cpu0 over to the spare processor mid-run
    #[arg(long)]
    switch_spare: bool,
}

struct Demo {
    cpu0: NodeIndex,
    cpu1: NodeIndex,
    spare: NodeIndex,
}

fn add_cpu(
    graph: &mut ComponentGraph,
    bus: NodeIndex,
    name: &str,
    width: i64,
    out: bool,
) -> Result<NodeIndex, LifeError> {
    let idx = graph.add_child(graph.root(), name, ComponentFamily::Processor)?;
    graph.set_param(idx, "width", ParamValue::Int(width));
    graph.set_param(idx, "program", ParamValue::Int(2_000));
    if out {
        graph.set_param(idx, "switched_out", ParamValue::Bool(true));
    }
    graph.add_port(idx, "mem");
    graph.add_port(bus, name);
    graph.bind_port(idx, "mem", bus, name)?;
    Ok(idx)
}

/// Two active processors, a spare kept switched out, a store with buffered
/// writes, and a bus everything hangs off.
fn demo_graph() -> Result<(ComponentGraph, Demo), LifeError> {
    let mut graph = ComponentGraph::new();
    let root = graph.root();
    graph.set_param(root, "clock", ParamValue::Int(1_000_000));

    let bus = graph.add_child(root, "bus", ComponentFamily::Bus)?;
    let store = graph.add_child(root, "store", ComponentFamily::MemoryController)?;
    graph.set_param(store, "pending", ParamValue::Int(8));
    graph.add_port(store, "bus_side");
    graph.add_port(bus, "mem");
    graph.bind_port(bus, "mem", store, "bus_side")?;

    let cpu0 = add_cpu(&mut graph, bus, "cpu0", 1, false)?;
    let cpu1 = add_cpu(&mut graph, bus, "cpu1", 2, false)?;
    let spare = add_cpu(&mut graph, bus, "spare", 1, true)?;

    Ok((graph, Demo { cpu0, cpu1, spare }))
}

fn run(args: &Args) -> Result<(), LifeError> {
    let (graph, demo) = demo_graph()?;
    let ctx = RunContext::new(&args.outdir);
    let mut running = instantiate(graph, LocalEngine::new(), ctx)?;

    if let Some(dir) = &args.restore {
        running.restore_checkpoint(dir)?;
        println!("restored from {}", dir.display());
    }

    let exit = running.simulate(Some(args.ticks))?;
    println!("simulated to tick {} ({})", exit.tick, exit.cause);

    if args.switch_spare {
        running.switch_components(&[(demo.cpu0, demo.spare)])?;
        println!("switched cpu0 -> spare at tick {}", running.cur_tick());
        let exit = running.simulate(Some(args.ticks))?;
        println!("simulated to tick {} ({})", exit.tick, exit.cause);
    }

    if let Some(dir) = &args.checkpoint {
        running.checkpoint(dir)?;
        println!("checkpoint written to {}", dir.display());
    }

    for (name, idx) in [
        ("cpu0", demo.cpu0),
        ("cpu1", demo.cpu1),
        ("spare", demo.spare),
    ] {
        if let Some(state) = running.engine().component_state(running.handle(idx)) {
            println!("{name} counter={}", state["counter"]);
        }
    }
    Ok(())
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(true)
        .init();

    let args = Args::parse();
    if let Err(e) = run(&args) {
        eprintln!("fatal: {e}");
        std::process::exit(1);
    }
}
