//! Live component substitution: drain the old instances, hand their state
//! to the replacements, resume.

use tracing::{debug, info};

use crate::config::{ComponentFamily, ConfigError, NodeIndex};
use crate::engine::Engine;

use super::error::LifeError;
use super::instantiate::RunningGraph;

impl<E: Engine> RunningGraph<E> {
    /// Replace each `old` component with its paired `new` one while
    /// preserving execution state.
    ///
    /// Every pair must share a component family; pairs are rejected before
    /// any engine operation is issued. The old components are drained
    /// together under a scoped (non-recursive) barrier, switched out, and
    /// then each replacement takes over its predecessor's state and resumes,
    /// in listed order. There is no rollback if a take-over fails partway.
    #[tracing::instrument(skip(self, pairs), fields(pairs = pairs.len()))]
    pub fn switch_components(
        &mut self,
        pairs: &[(NodeIndex, NodeIndex)],
    ) -> Result<(), LifeError> {
        for &(old, new) in pairs {
            let old_family = self.graph.node(old).family();
            let new_family = self.graph.node(new).family();
            if old_family == ComponentFamily::Root || new_family == ComponentFamily::Root {
                let root = if old_family == ComponentFamily::Root { old } else { new };
                return Err(ConfigError::NotSwitchable {
                    path: self.graph.path(root).to_string(),
                }
                .into());
            }
            if old_family != new_family {
                return Err(ConfigError::FamilyMismatch {
                    old: self.graph.path(old).to_string(),
                    new: self.graph.path(new).to_string(),
                    old_family,
                    new_family,
                }
                .into());
            }
        }

        // Scoped drain: only the listed old components and their own
        // outstanding activities are quiesced, not the whole graph.
        let barrier = self.engine.create_drain_barrier();
        let mut unready = 0;
        for &(old, _) in pairs {
            match self.engine.start_drain(self.handles[old.0], barrier, false) {
                Ok(n) => unready += n,
                Err(e) => {
                    self.engine.cleanup_drain_barrier(barrier);
                    return Err(e.into());
                }
            }
        }
        if unready > 0 {
            debug!(unready, "draining components to be switched out");
            self.engine.set_barrier_count(barrier, unready);
            if let Err(e) = self.wait_for_barrier(barrier) {
                self.engine.cleanup_drain_barrier(barrier);
                return Err(e);
            }
        }
        self.engine.cleanup_drain_barrier(barrier);

        for &(old, _) in pairs {
            self.engine.switch_out(self.handles[old.0])?;
        }
        info!(pairs = pairs.len(), "switching components");
        for &(old, new) in pairs {
            self.engine
                .take_over_from(self.handles[new.0], self.handles[old.0])?;
            self.engine.resume(self.handles[new.0], false)?;
        }
        Ok(())
    }
}
