//! Checkpoint and restore on top of a drained graph.

use std::fs;
use std::path::Path;

use tracing::info;

use crate::engine::Engine;

use super::error::LifeError;
use super::instantiate::RunningGraph;

impl<E: Engine> RunningGraph<E> {
    /// Persist the full simulation state under `dir` and resume.
    ///
    /// The graph is drained first; serializing a non-quiescent component is
    /// undefined. The directory receives the instantiation-time description
    /// text alongside the engine's per-component state files, so a restore
    /// can verify it is being applied to the same topology.
    pub fn checkpoint(&mut self, dir: &Path) -> Result<(), LifeError> {
        self.do_drain()?;
        info!(dir = %dir.display(), tick = self.engine.cur_tick(), "writing checkpoint");
        fs::create_dir_all(dir)?;
        fs::write(dir.join("graph.ini"), &self.description)?;
        self.engine.serialize_all(dir)?;
        self.resume()
    }

    /// Load component state from a checkpoint into this already
    /// instantiated graph and resume.
    ///
    /// Does not recreate components: the topology must match the one the
    /// checkpoint was taken from, verified against the stored description.
    pub fn restore_checkpoint(&mut self, dir: &Path) -> Result<(), LifeError> {
        let stored = fs::read_to_string(dir.join("graph.ini"))?;
        if stored != self.description {
            return Err(LifeError::TopologyMismatch {
                dir: dir.to_path_buf(),
            });
        }
        info!(dir = %dir.display(), "restoring from checkpoint");
        self.engine.unserialize_all(dir)?;
        self.resume()
    }
}
