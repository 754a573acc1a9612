//! The instantiation pipeline: config graph in, running engine-backed
//! graph out.

use std::fs;

use tracing::{debug, info};

use crate::config::{ComponentGraph, ConfigError, NodeIndex, ParamValue, render_description};
use crate::engine::{Engine, ExitEvent, NativeHandle, TimingMode};

use super::context::RunContext;
use super::error::LifeError;

/// Whole-graph execution state, as tracked by the coordinator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Running,
    Drained,
}

/// A fully instantiated graph bound to its engine.
///
/// Owns the graph, the engine, and the dense node-index -> native-handle
/// map for the lifetime of the run; dropping it releases the engine, so no
/// process-wide exit hook is needed.
pub struct RunningGraph<E: Engine> {
    pub(crate) graph: ComponentGraph,
    pub(crate) engine: E,
    pub(crate) ctx: RunContext,
    pub(crate) handles: Vec<NativeHandle>,
    pub(crate) description: String,
    pub(crate) ticks_per_sec: f64,
    pub(crate) state: RunState,
}

impl<E: Engine> std::fmt::Debug for RunningGraph<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunningGraph")
            .field("ctx", &self.ctx)
            .field("handles", &self.handles)
            .field("ticks_per_sec", &self.ticks_per_sec)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

/// Materialize the graph against the engine.
///
/// Steps, in order: validate the graph, derive the global timing reference
/// from the root clock, render and persist the description text, load it
/// into the engine, create every native object, connect every port
/// (two-phase: all objects exist before any port is wired), then run the
/// engine's finalization pass.
///
/// Consumes the graph, the engine, and the context, so a second
/// instantiation of the same run cannot be expressed. Any failure aborts
/// with nothing handed back; there are no partial or rollback semantics.
pub fn instantiate<E: Engine>(
    graph: ComponentGraph,
    mut engine: E,
    ctx: RunContext,
) -> Result<RunningGraph<E>, LifeError> {
    graph.validate()?;
    let ticks_per_sec = root_clock(&graph)?;

    let description = render_description(&graph);
    fs::create_dir_all(ctx.out_dir())?;
    fs::write(ctx.out_dir().join("graph.ini"), &description)?;
    engine.set_output_dir(ctx.out_dir())?;
    engine.load_description(&description, &|path| graph.resolve(path))?;

    let mut handles = Vec::with_capacity(graph.len());
    for (idx, node) in graph.iter() {
        handles.push(engine.create_object(idx, node, graph.path(idx))?);
    }
    for (idx, node) in graph.iter() {
        for (port, target) in node.bound_ports() {
            engine.connect_port(
                handles[idx.0],
                port,
                handles[target.node.0],
                &target.port,
            )?;
        }
    }
    engine.final_init()?;

    info!(
        components = graph.len(),
        ticks_per_sec,
        out_dir = %ctx.out_dir().display(),
        "graph instantiated"
    );
    Ok(RunningGraph {
        graph,
        engine,
        ctx,
        handles,
        description,
        ticks_per_sec,
        state: RunState::Running,
    })
}

fn root_clock(graph: &ComponentGraph) -> Result<f64, ConfigError> {
    let bad = |got: String| ConfigError::BadClock { got };
    match graph.node(graph.root()).param("clock") {
        Some(ParamValue::Int(v)) if *v > 0 => Ok(*v as f64),
        Some(ParamValue::Float(v)) if *v > 0.0 => Ok(*v),
        Some(other) => Err(bad(format!("{other:?}"))),
        // Unreachable after validate(), which requires the root clock.
        None => Err(bad("nothing".to_string())),
    }
}

impl<E: Engine> RunningGraph<E> {
    pub fn graph(&self) -> &ComponentGraph {
        &self.graph
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    pub fn ticks_per_sec(&self) -> f64 {
        self.ticks_per_sec
    }

    /// Native handle bound to a config node.
    pub fn handle(&self, idx: NodeIndex) -> NativeHandle {
        self.handles[idx.0]
    }

    pub fn cur_tick(&self) -> u64 {
        self.engine.cur_tick()
    }

    /// Advance the engine's event loop outside of any drain protocol.
    pub fn simulate(&mut self, max_ticks: Option<u64>) -> Result<ExitEvent, LifeError> {
        debug!(?max_ticks, "simulate");
        Ok(self.engine.simulate(max_ticks)?)
    }

    /// Drain, switch the memory system's timing mode, resume.
    pub fn change_timing(&mut self, mode: TimingMode) -> Result<(), LifeError> {
        self.do_drain()?;
        info!(?mode, "changing memory timing mode");
        self.engine.change_timing(mode)?;
        self.resume()
    }
}
