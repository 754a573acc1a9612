//! Shared test support: a scripted engine that logs every boundary call,
//! plus small graph builders and temp-dir helpers.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::config::{ComponentFamily, ComponentGraph, ConfigNode, NodeIndex, ParamValue};
use crate::engine::{
    BarrierHandle, Engine, EngineError, ExitCause, ExitEvent, NativeHandle, PathResolver,
    TimingMode,
};
use crate::run::RunContext;

/// One engine call, as recorded by [`FakeEngine`].
#[derive(Debug, Clone, PartialEq)]
pub enum Op {
    SetOutputDir(PathBuf),
    LoadDescription,
    Create(usize),
    Connect {
        from: usize,
        port: String,
        to: usize,
        peer_port: String,
    },
    FinalInit,
    Simulate(Option<u64>),
    CreateBarrier(usize),
    SetBarrierCount(usize, u64),
    CleanupBarrier(usize),
    StartDrain {
        target: usize,
        recursive: bool,
    },
    Resume {
        target: usize,
        recursive: bool,
    },
    SwitchOut(usize),
    TakeOverFrom {
        new: usize,
        old: usize,
    },
    ChangeTiming(TimingMode),
    SerializeAll(PathBuf),
    UnserializeAll(PathBuf),
}

/// Shared, cloneable view of the engine's call log; survives the engine
/// being moved into `instantiate`.
#[derive(Debug, Clone, Default)]
pub struct OpLog(Arc<Mutex<Vec<Op>>>);

impl OpLog {
    fn push(&self, op: Op) {
        self.0.lock().expect("op log").push(op);
    }

    pub fn snapshot(&self) -> Vec<Op> {
        self.0.lock().expect("op log").clone()
    }

    pub fn len(&self) -> usize {
        self.0.lock().expect("op log").len()
    }

    pub fn count(&self, pred: impl Fn(&Op) -> bool) -> usize {
        self.0.lock().expect("op log").iter().filter(|op| pred(op)).count()
    }
}

/// What one scripted `simulate` call does to the active barrier.
#[derive(Debug, Clone)]
pub enum SimStep {
    /// Barrier drops to zero; exits with `DrainComplete`.
    Satisfy,
    /// Barrier decremented by the given amount; exits with `TickLimit`.
    Partial(u64),
    /// Exit for an unrelated reason, barrier untouched.
    Exit(ExitCause),
}

/// Scripted engine: drain counts and simulate outcomes come from queues,
/// everything observable goes into the op log.
pub struct FakeEngine {
    pub log: OpLog,
    pub drain_counts: VecDeque<u64>,
    pub default_drain_count: u64,
    pub sim_script: VecDeque<SimStep>,
    pub create_fail_at: Option<usize>,
    pub resolver_probe: Vec<Option<NodeIndex>>,
    tick: u64,
    barriers: Vec<Option<u64>>,
    active: Option<BarrierHandle>,
    next_handle: usize,
}

impl FakeEngine {
    pub fn new() -> Self {
        Self {
            log: OpLog::default(),
            drain_counts: VecDeque::new(),
            default_drain_count: 0,
            sim_script: VecDeque::new(),
            create_fail_at: None,
            resolver_probe: Vec::new(),
            tick: 0,
            barriers: Vec::new(),
            active: None,
            next_handle: 0,
        }
    }

    pub fn with_drain_counts(counts: &[u64]) -> Self {
        let mut engine = Self::new();
        engine.drain_counts = counts.iter().copied().collect();
        engine
    }
}

impl Engine for FakeEngine {
    fn set_output_dir(&mut self, dir: &Path) -> Result<(), EngineError> {
        self.log.push(Op::SetOutputDir(dir.to_path_buf()));
        Ok(())
    }

    fn load_description(
        &mut self,
        _text: &str,
        resolver: &PathResolver<'_>,
    ) -> Result<(), EngineError> {
        self.resolver_probe.push(resolver("root"));
        self.resolver_probe.push(resolver("root.__absent__"));
        self.log.push(Op::LoadDescription);
        Ok(())
    }

    fn create_object(
        &mut self,
        idx: NodeIndex,
        _node: &ConfigNode,
        path: &str,
    ) -> Result<NativeHandle, EngineError> {
        if self.create_fail_at == Some(idx.0) {
            return Err(EngineError::Create {
                path: path.to_string(),
                reason: "scripted failure".to_string(),
            });
        }
        self.log.push(Op::Create(idx.0));
        let handle = NativeHandle(self.next_handle);
        self.next_handle += 1;
        Ok(handle)
    }

    fn connect_port(
        &mut self,
        from: NativeHandle,
        port: &str,
        to: NativeHandle,
        peer_port: &str,
    ) -> Result<(), EngineError> {
        self.log.push(Op::Connect {
            from: from.0,
            port: port.to_string(),
            to: to.0,
            peer_port: peer_port.to_string(),
        });
        Ok(())
    }

    fn final_init(&mut self) -> Result<(), EngineError> {
        self.log.push(Op::FinalInit);
        Ok(())
    }

    fn simulate(&mut self, max_ticks: Option<u64>) -> Result<ExitEvent, EngineError> {
        self.log.push(Op::Simulate(max_ticks));
        self.tick += max_ticks.unwrap_or(1_000);
        let cause = match self.sim_script.pop_front().unwrap_or(SimStep::Satisfy) {
            SimStep::Satisfy => {
                if let Some(b) = self.active {
                    self.barriers[b.0] = Some(0);
                }
                ExitCause::DrainComplete
            }
            SimStep::Partial(n) => {
                if let Some(b) = self.active {
                    if let Some(count) = self.barriers[b.0].as_mut() {
                        *count = count.saturating_sub(n);
                    }
                }
                ExitCause::TickLimit
            }
            SimStep::Exit(cause) => cause,
        };
        Ok(ExitEvent {
            cause,
            tick: self.tick,
        })
    }

    fn cur_tick(&self) -> u64 {
        self.tick
    }

    fn create_drain_barrier(&mut self) -> BarrierHandle {
        self.barriers.push(Some(0));
        let handle = BarrierHandle(self.barriers.len() - 1);
        self.log.push(Op::CreateBarrier(handle.0));
        handle
    }

    fn set_barrier_count(&mut self, barrier: BarrierHandle, count: u64) {
        self.log.push(Op::SetBarrierCount(barrier.0, count));
        self.barriers[barrier.0] = Some(count);
        self.active = Some(barrier);
    }

    fn barrier_count(&self, barrier: BarrierHandle) -> u64 {
        self.barriers.get(barrier.0).copied().flatten().unwrap_or(0)
    }

    fn cleanup_drain_barrier(&mut self, barrier: BarrierHandle) {
        self.log.push(Op::CleanupBarrier(barrier.0));
        if let Some(slot) = self.barriers.get_mut(barrier.0) {
            *slot = None;
        }
        if self.active == Some(barrier) {
            self.active = None;
        }
    }

    fn start_drain(
        &mut self,
        target: NativeHandle,
        _barrier: BarrierHandle,
        recursive: bool,
    ) -> Result<u64, EngineError> {
        self.log.push(Op::StartDrain {
            target: target.0,
            recursive,
        });
        Ok(self
            .drain_counts
            .pop_front()
            .unwrap_or(self.default_drain_count))
    }

    fn resume(&mut self, target: NativeHandle, recursive: bool) -> Result<(), EngineError> {
        self.log.push(Op::Resume {
            target: target.0,
            recursive,
        });
        Ok(())
    }

    fn switch_out(&mut self, target: NativeHandle) -> Result<(), EngineError> {
        self.log.push(Op::SwitchOut(target.0));
        Ok(())
    }

    fn take_over_from(
        &mut self,
        new: NativeHandle,
        old: NativeHandle,
    ) -> Result<(), EngineError> {
        self.log.push(Op::TakeOverFrom {
            new: new.0,
            old: old.0,
        });
        Ok(())
    }

    fn change_timing(&mut self, mode: TimingMode) -> Result<(), EngineError> {
        self.log.push(Op::ChangeTiming(mode));
        Ok(())
    }

    fn serialize_all(&mut self, dir: &Path) -> Result<(), EngineError> {
        self.log.push(Op::SerializeAll(dir.to_path_buf()));
        Ok(())
    }

    fn unserialize_all(&mut self, dir: &Path) -> Result<(), EngineError> {
        self.log.push(Op::UnserializeAll(dir.to_path_buf()));
        Ok(())
    }
}

pub fn unique_temp_dir(prefix: &str) -> PathBuf {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("time went backwards")
        .as_nanos();
    let dir = std::env::temp_dir().join(format!(
        "hwsim-rs-{prefix}-{}-{nanos}",
        std::process::id()
    ));
    std::fs::create_dir_all(&dir).expect("create temp dir");
    dir
}

pub fn test_ctx(prefix: &str) -> RunContext {
    RunContext::new(unique_temp_dir(prefix))
}

/// Root with its clock set; nothing else.
pub fn root_only_graph() -> ComponentGraph {
    let mut graph = ComponentGraph::new();
    graph.set_param(graph.root(), "clock", ParamValue::Int(1_000_000));
    graph
}

/// Root plus two processor components.
pub fn two_cpu_graph() -> (ComponentGraph, NodeIndex, NodeIndex) {
    let mut graph = root_only_graph();
    let cpu0 = graph
        .add_child(graph.root(), "cpu0", ComponentFamily::Processor)
        .expect("add cpu0");
    let cpu1 = graph
        .add_child(graph.root(), "cpu1", ComponentFamily::Processor)
        .expect("add cpu1");
    (graph, cpu0, cpu1)
}
