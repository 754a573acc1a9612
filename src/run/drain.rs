//! The drain coordinator: brings the whole graph to a quiescent point.

use tracing::{debug, info, trace};

use crate::engine::{BarrierHandle, Engine, ExitCause};

use super::error::LifeError;
use super::instantiate::{RunState, RunningGraph};

impl<E: Engine> RunningGraph<E> {
    /// Drain the whole graph.
    ///
    /// Runs drain passes until one settles on its first query. The loop is
    /// required because quiescence is not monotonic across a single pass: a
    /// component reaching its quiescent point can push work at a previously
    /// quiescent one. Passes are bounded by the drain policy; exceeding the
    /// bound reports the graph as stalled instead of looping forever.
    ///
    /// Returns the number of passes taken.
    #[tracing::instrument(skip(self))]
    pub fn do_drain(&mut self) -> Result<usize, LifeError> {
        let max_passes = self.ctx.drain_policy().max_passes;
        for pass in 1..=max_passes {
            trace!(pass, "drain pass");
            if self.drain_pass()? {
                self.state = RunState::Drained;
                info!(passes = pass, tick = self.engine.cur_tick(), "graph drained");
                return Ok(pass);
            }
        }
        Err(LifeError::DrainStalled { passes: max_passes })
    }

    /// Resume the whole graph: Drained -> Running.
    pub fn resume(&mut self) -> Result<(), LifeError> {
        self.engine.resume(self.handles[0], true)?;
        self.state = RunState::Running;
        Ok(())
    }

    /// One drain cycle. Returns true when every component reported
    /// quiescent without further execution.
    fn drain_pass(&mut self) -> Result<bool, LifeError> {
        let barrier = self.engine.create_drain_barrier();
        let unready = match self.engine.start_drain(self.handles[0], barrier, true) {
            Ok(n) => n,
            Err(e) => {
                self.engine.cleanup_drain_barrier(barrier);
                return Err(e.into());
            }
        };
        if unready == 0 {
            self.engine.cleanup_drain_barrier(barrier);
            return Ok(true);
        }
        debug!(unready, "draining asynchronous components");
        self.engine.set_barrier_count(barrier, unready);
        let waited = self.wait_for_barrier(barrier);
        self.engine.cleanup_drain_barrier(barrier);
        waited?;
        Ok(false)
    }

    /// Advance the engine until the barrier reaches zero, in slices, with
    /// the cancel token and the deadline checked between slices.
    pub(crate) fn wait_for_barrier(&mut self, barrier: BarrierHandle) -> Result<(), LifeError> {
        let policy = self.ctx.drain_policy();
        let cancel = self.ctx.cancel_token();
        let start = self.engine.cur_tick();
        loop {
            if cancel.is_cancelled() {
                return Err(LifeError::DrainCancelled {
                    tick: self.engine.cur_tick(),
                });
            }
            let budget = match policy.deadline_ticks {
                Some(deadline) => {
                    let used = self.engine.cur_tick().saturating_sub(start);
                    if used >= deadline {
                        return Err(LifeError::DrainDeadline {
                            deadline,
                            remaining: self.engine.barrier_count(barrier),
                        });
                    }
                    policy.slice_ticks.min(deadline - used)
                }
                None => policy.slice_ticks,
            };
            let exit = self.engine.simulate(Some(budget))?;
            if self.engine.barrier_count(barrier) == 0 {
                trace!(tick = exit.tick, "drain barrier satisfied");
                return Ok(());
            }
            match exit.cause {
                // Slice exhausted; re-check cancellation and deadline.
                ExitCause::TickLimit => {}
                cause => {
                    return Err(LifeError::DrainInterrupted {
                        cause,
                        tick: exit.tick,
                    });
                }
            }
        }
    }
}
