//! Synthetic namespace activity under the anchor directory.
//!
//! Runs beside the placement controller so relocations can be observed
//! under load. Shares nothing with the controller except the shutdown
//! receiver and the anchor path.

use std::io;
use std::path::PathBuf;
use std::time::Duration;

use tokio::sync::watch;
use tracing::{debug, info, warn};

use mantle_core::LoadgenMode;

pub struct LoadGenerator {
    dir: PathBuf,
    mode: LoadgenMode,
    interval: Duration,
    iterations: u64,
}

impl LoadGenerator {
    pub fn new(dir: impl Into<PathBuf>, mode: LoadgenMode, interval: Duration) -> Self {
        Self {
            dir: dir.into(),
            mode,
            interval,
            iterations: 0,
        }
    }

    /// Loop until shutdown. Returns the number of iterations attempted.
    ///
    /// A failed iteration is logged and the loop carries on.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) -> u64 {
        info!(dir = %self.dir.display(), mode = ?self.mode, "load generator started");

        loop {
            if *shutdown.borrow_and_update() {
                break;
            }

            if let Err(e) = self.step().await {
                warn!(dir = %self.dir.display(), mode = ?self.mode, error = %e, "load iteration failed");
            }

            tokio::select! {
                _ = tokio::time::sleep(self.interval) => {}
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }

        info!(iterations = self.iterations, "load generator stopped");
        self.iterations
    }

    /// One unit of work.
    pub async fn step(&mut self) -> io::Result<()> {
        self.iterations += 1;
        match self.mode {
            LoadgenMode::CreateDelete => {
                let file = self
                    .dir
                    .join(format!(".mantle-load-{}-{}", std::process::id(), self.iterations));
                tokio::fs::write(&file, b"mantle").await?;
                tokio::fs::remove_file(&file).await?;
                debug!(file = %file.display(), "created and removed");
            }
            LoadgenMode::Read => {
                let mut entries = tokio::fs::read_dir(&self.dir).await?;
                let mut count = 0usize;
                while entries.next_entry().await?.is_some() {
                    count += 1;
                }
                debug!(dir = %self.dir.display(), entries = count, "listed");
            }
        }
        Ok(())
    }
}
