//! In-process reference engine.
//!
//! Small enough to read in one sitting, but faithful to the boundary: it
//! materializes components from config nodes, advances them tick by tick,
//! honors counted drain barriers, serializes per-component state to JSON
//! files, and supports switch-out / take-over. The demo binary and the
//! test suite run against it.

use std::collections::VecDeque;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, trace};

use crate::config::{ComponentFamily, ConfigNode, NodeIndex, ParamValue};

use super::api::{Engine, EngineError, PathResolver, TimingMode};
use super::exit::{ExitCause, ExitEvent};
use super::handle::{BarrierHandle, NativeHandle};

/// A component modeled by the local engine.
pub trait SimComponent: Send {
    fn family(&self) -> ComponentFamily;

    /// Advance one tick. Returns how many outstanding operations retired.
    fn tick(&mut self) -> u64;

    /// Whether the component still has runnable or outstanding work.
    fn busy(&self) -> bool;

    /// Enter the draining state. Returns the number of outstanding
    /// operations that must retire before the component is quiescent
    /// (zero means it quiesced synchronously).
    fn start_drain(&mut self) -> u64;

    fn resume(&mut self);

    fn save_state(&self) -> Result<Value, EngineError>;
    fn load_state(&mut self, state: &Value) -> Result<(), EngineError>;
}

#[derive(Debug, Serialize, Deserialize)]
struct WorkerState {
    counter: u64,
    inflight: Vec<u64>,
}

/// Processor-family component: retires `width` units of progress per tick
/// until its program length is reached, issuing an outstanding operation
/// every `issue_period` ticks. Outstanding operations are what keep it from
/// quiescing synchronously on drain.
struct Worker {
    width: u64,
    program: u64,
    issue_period: u64,
    counter: u64,
    ticks_run: u64,
    inflight: VecDeque<u64>,
    draining: bool,
}

impl SimComponent for Worker {
    fn family(&self) -> ComponentFamily {
        ComponentFamily::Processor
    }

    fn tick(&mut self) -> u64 {
        if self.draining {
            // No new work; retire one outstanding operation per tick.
            return u64::from(self.inflight.pop_front().is_some());
        }
        if self.counter < self.program {
            self.counter = self.counter.saturating_add(self.width);
            self.ticks_run += 1;
            if self.issue_period > 0 && self.ticks_run % self.issue_period == 0 {
                self.inflight.push_back(self.counter);
            }
        }
        let drain_down = self.counter >= self.program || self.inflight.len() > 2;
        if drain_down && self.inflight.pop_front().is_some() {
            1
        } else {
            0
        }
    }

    fn busy(&self) -> bool {
        if self.draining {
            !self.inflight.is_empty()
        } else {
            self.counter < self.program || !self.inflight.is_empty()
        }
    }

    fn start_drain(&mut self) -> u64 {
        self.draining = true;
        self.inflight.len() as u64
    }

    fn resume(&mut self) {
        self.draining = false;
    }

    fn save_state(&self) -> Result<Value, EngineError> {
        Ok(serde_json::to_value(WorkerState {
            counter: self.counter,
            inflight: self.inflight.iter().copied().collect(),
        })?)
    }

    fn load_state(&mut self, state: &Value) -> Result<(), EngineError> {
        let s: WorkerState = serde_json::from_value(state.clone())?;
        self.counter = s.counter;
        self.inflight = s.inflight.into();
        Ok(())
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct StoreState {
    flushed: u64,
    buffer: Vec<u64>,
}

/// Memory-controller-family component: a write buffer that flushes one
/// entry per tick. Quiescent once the buffer is empty.
struct Store {
    buffer: VecDeque<u64>,
    flushed: u64,
}

impl SimComponent for Store {
    fn family(&self) -> ComponentFamily {
        ComponentFamily::MemoryController
    }

    fn tick(&mut self) -> u64 {
        if self.buffer.pop_front().is_some() {
            self.flushed += 1;
            1
        } else {
            0
        }
    }

    fn busy(&self) -> bool {
        !self.buffer.is_empty()
    }

    fn start_drain(&mut self) -> u64 {
        self.buffer.len() as u64
    }

    fn resume(&mut self) {}

    fn save_state(&self) -> Result<Value, EngineError> {
        Ok(serde_json::to_value(StoreState {
            flushed: self.flushed,
            buffer: self.buffer.iter().copied().collect(),
        })?)
    }

    fn load_state(&mut self, state: &Value) -> Result<(), EngineError> {
        let s: StoreState = serde_json::from_value(state.clone())?;
        self.flushed = s.flushed;
        self.buffer = s.buffer.into();
        Ok(())
    }
}

/// Stateless placeholder for families the local engine does not model
/// (root, buses, caches, devices). Always quiescent.
struct Stub {
    family: ComponentFamily,
}

impl SimComponent for Stub {
    fn family(&self) -> ComponentFamily {
        self.family
    }

    fn tick(&mut self) -> u64 {
        0
    }

    fn busy(&self) -> bool {
        false
    }

    fn start_drain(&mut self) -> u64 {
        0
    }

    fn resume(&mut self) {}

    fn save_state(&self) -> Result<Value, EngineError> {
        Ok(serde_json::json!({}))
    }

    fn load_state(&mut self, _state: &Value) -> Result<(), EngineError> {
        Ok(())
    }
}

#[derive(Default)]
pub struct LocalEngine {
    tick: u64,
    timing: Option<TimingMode>,
    out_dir: Option<PathBuf>,
    description_loaded: bool,
    comps: Vec<Option<Box<dyn SimComponent>>>,
    paths: Vec<String>,
    switched_out: Vec<bool>,
    drain_pending: Vec<u64>,
    barriers: Vec<Option<u64>>,
    active_barrier: Option<BarrierHandle>,
}

impl LocalEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serialized state of one component; inspection hook for the demo
    /// binary and tests.
    pub fn component_state(&self, handle: NativeHandle) -> Option<Value> {
        self.comps
            .get(handle.0)?
            .as_ref()
            .and_then(|c| c.save_state().ok())
    }

    pub fn is_switched_out(&self, handle: NativeHandle) -> bool {
        self.switched_out.get(handle.0).copied().unwrap_or(false)
    }

    pub fn timing_mode(&self) -> Option<TimingMode> {
        self.timing
    }

    pub fn output_dir(&self) -> Option<&Path> {
        self.out_dir.as_deref()
    }

    fn check(&self, handle: NativeHandle) -> Result<usize, EngineError> {
        if handle.0 < self.comps.len() {
            Ok(handle.0)
        } else {
            Err(EngineError::StaleHandle(handle))
        }
    }

    /// Indices of `target` plus, when recursive, every component whose path
    /// lies under it.
    fn subtree(&self, target: usize, recursive: bool) -> Vec<usize> {
        if !recursive {
            return vec![target];
        }
        let prefix = format!("{}.", self.paths[target]);
        (0..self.comps.len())
            .filter(|&i| i == target || self.paths[i].starts_with(&prefix))
            .collect()
    }

    fn any_busy(&self) -> bool {
        self.comps
            .iter()
            .enumerate()
            .any(|(i, c)| !self.switched_out[i] && c.as_ref().is_some_and(|c| c.busy()))
    }

    fn step(&mut self) {
        self.tick += 1;
        for i in 0..self.comps.len() {
            if self.switched_out[i] {
                continue;
            }
            // Take the component out so it can call back into the engine's
            // bookkeeping without overlapping borrows.
            let Some(mut comp) = self.comps[i].take() else {
                continue;
            };
            let retired = comp.tick();
            self.comps[i] = Some(comp);
            if retired > 0 && self.drain_pending[i] > 0 {
                let d = retired.min(self.drain_pending[i]);
                self.drain_pending[i] -= d;
                if let Some(BarrierHandle(b)) = self.active_barrier {
                    if let Some(count) = self.barriers[b].as_mut() {
                        *count = count.saturating_sub(d);
                    }
                }
            }
        }
    }

    fn int_param(
        node: &ConfigNode,
        name: &str,
        default: i64,
        path: &str,
    ) -> Result<u64, EngineError> {
        let v = match node.param(name) {
            None => default,
            Some(ParamValue::Int(v)) => *v,
            Some(_) => {
                return Err(EngineError::Create {
                    path: path.to_string(),
                    reason: format!("parameter {name:?} must be an integer"),
                });
            }
        };
        u64::try_from(v).map_err(|_| EngineError::Create {
            path: path.to_string(),
            reason: format!("parameter {name:?} must be non-negative"),
        })
    }
}

impl Engine for LocalEngine {
    fn set_output_dir(&mut self, dir: &Path) -> Result<(), EngineError> {
        self.out_dir = Some(dir.to_path_buf());
        Ok(())
    }

    fn load_description(
        &mut self,
        text: &str,
        resolver: &PathResolver<'_>,
    ) -> Result<(), EngineError> {
        for line in text.lines() {
            let line = line.trim();
            if let Some(path) = line.strip_prefix('[').and_then(|l| l.strip_suffix(']')) {
                if resolver(path).is_none() {
                    return Err(EngineError::Description(format!(
                        "unknown component path {path:?}"
                    )));
                }
            }
        }
        self.description_loaded = true;
        Ok(())
    }

    fn create_object(
        &mut self,
        idx: NodeIndex,
        node: &ConfigNode,
        path: &str,
    ) -> Result<NativeHandle, EngineError> {
        if !self.description_loaded {
            return Err(EngineError::Description(
                "create_object before load_description".to_string(),
            ));
        }
        let comp: Box<dyn SimComponent> = match node.family() {
            ComponentFamily::Processor => {
                let width = Self::int_param(node, "width", 1, path)?;
                if width == 0 {
                    return Err(EngineError::Create {
                        path: path.to_string(),
                        reason: "width must be at least 1".to_string(),
                    });
                }
                Box::new(Worker {
                    width,
                    program: Self::int_param(node, "program", 0, path)?,
                    issue_period: Self::int_param(node, "issue_period", 4, path)?,
                    counter: 0,
                    ticks_run: 0,
                    inflight: VecDeque::new(),
                    draining: false,
                })
            }
            ComponentFamily::MemoryController => {
                let pending = Self::int_param(node, "pending", 0, path)?;
                Box::new(Store {
                    buffer: (1..=pending).collect(),
                    flushed: 0,
                })
            }
            family => Box::new(Stub { family }),
        };
        let start_out = node
            .param("switched_out")
            .and_then(ParamValue::as_bool)
            .unwrap_or(false);
        let handle = NativeHandle(self.comps.len());
        self.comps.push(Some(comp));
        self.paths.push(path.to_string());
        self.switched_out.push(start_out);
        self.drain_pending.push(0);
        trace!(path, idx = idx.0, handle = handle.0, "created native object");
        Ok(handle)
    }

    fn connect_port(
        &mut self,
        from: NativeHandle,
        port: &str,
        to: NativeHandle,
        peer_port: &str,
    ) -> Result<(), EngineError> {
        let from = self.check(from)?;
        let to = self.check(to)?;
        // The local engine models no port traffic; wiring is validated and
        // recorded in the trace only.
        trace!(
            from = %self.paths[from],
            port,
            to = %self.paths[to],
            peer_port,
            "connected port"
        );
        Ok(())
    }

    fn final_init(&mut self) -> Result<(), EngineError> {
        debug!(components = self.comps.len(), "final init");
        Ok(())
    }

    fn simulate(&mut self, max_ticks: Option<u64>) -> Result<ExitEvent, EngineError> {
        let mut remaining = max_ticks;
        loop {
            if let Some(b) = self.active_barrier {
                if self.barrier_count(b) == 0 {
                    return Ok(ExitEvent {
                        cause: ExitCause::DrainComplete,
                        tick: self.tick,
                    });
                }
            }
            if !self.any_busy() {
                return Ok(ExitEvent {
                    cause: ExitCause::Idle,
                    tick: self.tick,
                });
            }
            if let Some(r) = remaining.as_mut() {
                if *r == 0 {
                    return Ok(ExitEvent {
                        cause: ExitCause::TickLimit,
                        tick: self.tick,
                    });
                }
                *r -= 1;
            }
            self.step();
        }
    }

    fn cur_tick(&self) -> u64 {
        self.tick
    }

    fn create_drain_barrier(&mut self) -> BarrierHandle {
        self.barriers.push(Some(0));
        BarrierHandle(self.barriers.len() - 1)
    }

    fn set_barrier_count(&mut self, barrier: BarrierHandle, count: u64) {
        if let Some(slot) = self.barriers.get_mut(barrier.0) {
            *slot = Some(count);
            self.active_barrier = Some(barrier);
        }
    }

    fn barrier_count(&self, barrier: BarrierHandle) -> u64 {
        self.barriers.get(barrier.0).copied().flatten().unwrap_or(0)
    }

    fn cleanup_drain_barrier(&mut self, barrier: BarrierHandle) {
        if let Some(slot) = self.barriers.get_mut(barrier.0) {
            *slot = None;
        }
        if self.active_barrier == Some(barrier) {
            self.active_barrier = None;
        }
        for pending in &mut self.drain_pending {
            *pending = 0;
        }
    }

    fn start_drain(
        &mut self,
        target: NativeHandle,
        _barrier: BarrierHandle,
        recursive: bool,
    ) -> Result<u64, EngineError> {
        let target = self.check(target)?;
        let mut unready = 0;
        for i in self.subtree(target, recursive) {
            if self.switched_out[i] {
                continue;
            }
            let Some(mut comp) = self.comps[i].take() else {
                continue;
            };
            let n = comp.start_drain();
            self.comps[i] = Some(comp);
            self.drain_pending[i] = n;
            unready += n;
        }
        Ok(unready)
    }

    fn resume(&mut self, target: NativeHandle, recursive: bool) -> Result<(), EngineError> {
        let target = self.check(target)?;
        for i in self.subtree(target, recursive) {
            // A recursive resume never pulls a switched-out component back
            // in; only an explicit resume on that component does.
            if recursive && self.switched_out[i] {
                continue;
            }
            self.switched_out[i] = false;
            if let Some(comp) = self.comps[i].as_mut() {
                comp.resume();
            }
            self.drain_pending[i] = 0;
        }
        Ok(())
    }

    fn switch_out(&mut self, target: NativeHandle) -> Result<(), EngineError> {
        let target = self.check(target)?;
        self.switched_out[target] = true;
        debug!(path = %self.paths[target], "switched out");
        Ok(())
    }

    fn take_over_from(
        &mut self,
        new: NativeHandle,
        old: NativeHandle,
    ) -> Result<(), EngineError> {
        let new = self.check(new)?;
        let old = self.check(old)?;
        let state = match self.comps[old].as_ref() {
            Some(comp) => comp.save_state()?,
            None => return Err(EngineError::StaleHandle(NativeHandle(old))),
        };
        match self.comps[new].as_mut() {
            Some(comp) => comp.load_state(&state)?,
            None => return Err(EngineError::StaleHandle(NativeHandle(new))),
        }
        debug!(old = %self.paths[old], new = %self.paths[new], "took over state");
        Ok(())
    }

    fn change_timing(&mut self, mode: TimingMode) -> Result<(), EngineError> {
        self.timing = Some(mode);
        Ok(())
    }

    fn serialize_all(&mut self, dir: &Path) -> Result<(), EngineError> {
        fs::create_dir_all(dir)?;
        for i in 0..self.comps.len() {
            let state = match self.comps[i].as_ref() {
                Some(comp) => comp.save_state()?,
                None => return Err(EngineError::StaleHandle(NativeHandle(i))),
            };
            let file = dir.join(format!("{}.json", self.paths[i]));
            fs::write(file, serde_json::to_string_pretty(&state)?)?;
        }
        let meta = serde_json::json!({
            "tick": self.tick,
            "switched_out": self.switched_out,
        });
        fs::write(dir.join("engine.json"), serde_json::to_string_pretty(&meta)?)?;
        Ok(())
    }

    fn unserialize_all(&mut self, dir: &Path) -> Result<(), EngineError> {
        let meta: Value = serde_json::from_str(&fs::read_to_string(dir.join("engine.json"))?)?;
        self.tick = meta["tick"].as_u64().ok_or_else(|| {
            EngineError::Description("checkpoint meta is missing the tick".to_string())
        })?;
        if let Some(flags) = meta["switched_out"].as_array() {
            for (i, flag) in flags.iter().enumerate() {
                if i < self.switched_out.len() {
                    self.switched_out[i] = flag.as_bool().unwrap_or(false);
                }
            }
        }
        for i in 0..self.comps.len() {
            let text = fs::read_to_string(dir.join(format!("{}.json", self.paths[i])))?;
            let state: Value = serde_json::from_str(&text)?;
            match self.comps[i].as_mut() {
                Some(comp) => comp.load_state(&state)?,
                None => return Err(EngineError::StaleHandle(NativeHandle(i))),
            }
        }
        Ok(())
    }
}
