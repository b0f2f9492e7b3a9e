//! Background task scheduler
//!
//! Runs the flush and compaction jobs on their own threads at fixed
//! intervals. Each worker blocks on a zero-capacity shutdown channel with a
//! timeout: a timeout is a tick, a disconnect is the stop signal. Suspension
//! points are only at tick boundaries, never mid-operation.

use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam::channel::{bounded, Receiver, RecvTimeoutError, Sender};

use crate::config::Config;
use crate::error::Result;

use super::Compactor;

/// Handle to the running background workers
pub struct Scheduler {
    shutdown: Sender<()>,
    handles: Vec<JoinHandle<()>>,
}

impl Scheduler {
    /// Spawn the flush and compaction workers
    pub fn start(compactor: Arc<Compactor>, config: &Config) -> Result<Self> {
        let (shutdown, rx) = bounded::<()>(0);

        let flush_compactor = Arc::clone(&compactor);
        let handles = vec![
            spawn_periodic("flush", config.flush_interval, rx.clone(), move || {
                flush_compactor.flush_once()
            })?,
            spawn_periodic("compaction", config.compaction_interval, rx, move || {
                compactor.compact_once()
            })?,
        ];

        Ok(Self { shutdown, handles })
    }

    /// Stop both workers and wait for them to finish their current tick
    pub fn stop(self) {
        let Self { shutdown, handles } = self;
        drop(shutdown);

        for handle in handles {
            if handle.join().is_err() {
                tracing::error!("background worker panicked");
            }
        }
    }
}

fn spawn_periodic(
    name: &'static str,
    interval: Duration,
    shutdown: Receiver<()>,
    tick: impl Fn() -> Result<()> + Send + 'static,
) -> Result<JoinHandle<()>> {
    let handle = thread::Builder::new()
        .name(format!("stratakv-{name}"))
        .spawn(move || loop {
            match shutdown.recv_timeout(interval) {
                Err(RecvTimeoutError::Timeout) => {
                    if let Err(e) = tick() {
                        tracing::error!(task = name, error = %e, "background tick failed");
                    }
                }
                Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
            }
        })?;

    Ok(handle)
}
