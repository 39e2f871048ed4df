//! Background load task. Exactly one load may run at a time; the task is
//! the sole owner of the grid while it runs and hands the populated world
//! back in one piece when it joins, so readers never observe partial state.

use crate::error::WorldError;
use crate::grid::TileGrid;
use crate::reader::{WorldContents, WorldFileReader};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use stratum_catalog::TileCatalog;
use stratum_logger::{log, LogSeverity};
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// A fully loaded world: the grid plus everything read alongside it.
#[derive(Debug)]
pub struct LoadedWorld {
    pub grid: TileGrid,
    pub contents: WorldContents,
}

/// The one-load-at-a-time gate. File and network loads share a gate so a
/// second load request of either kind is refused while one is in flight.
#[derive(Clone, Default)]
pub struct LoadGate {
    busy: Arc<AtomicBool>,
}

impl LoadGate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    /// Claims the gate, or returns `None` while another load holds it.
    pub fn try_acquire(&self) -> Option<LoadGuard> {
        if self
            .busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
        {
            Some(LoadGuard {
                busy: Arc::clone(&self.busy),
            })
        } else {
            None
        }
    }
}

/// Held by the active load task; releases the gate when dropped.
pub struct LoadGuard {
    busy: Arc<AtomicBool>,
}

impl Drop for LoadGuard {
    fn drop(&mut self) {
        self.busy.store(false, Ordering::Release);
    }
}

pub struct WorldLoader {
    catalog: Arc<TileCatalog>,
    gate: LoadGate,
}

impl WorldLoader {
    pub fn new(catalog: Arc<TileCatalog>) -> Self {
        Self::with_gate(catalog, LoadGate::new())
    }

    /// Shares an external gate, letting the network client and this loader
    /// exclude each other.
    pub fn with_gate(catalog: Arc<TileCatalog>, gate: LoadGate) -> Self {
        Self { catalog, gate }
    }

    pub fn gate(&self) -> &LoadGate {
        &self.gate
    }

    pub fn is_busy(&self) -> bool {
        self.gate.is_busy()
    }

    /// Starts decoding `bytes` into `grid` on a blocking task. The grid
    /// moves into the task; it comes back inside the `LoadedWorld` when the
    /// task joins. Fails fast with `LoadInProgress` while another load owns
    /// the busy flag.
    pub fn begin_file_load(
        &self,
        grid: TileGrid,
        bytes: Vec<u8>,
    ) -> Result<LoadTask, WorldError> {
        let guard = match self.gate.try_acquire() {
            Some(guard) => guard,
            None => return Err(WorldError::LoadInProgress),
        };

        let (progress_tx, progress_rx) = watch::channel(0.0f32);
        let catalog = Arc::clone(&self.catalog);

        let handle = tokio::task::spawn_blocking(move || {
            let _guard = guard;
            let mut grid = grid;
            let reader = WorldFileReader::new(&catalog);
            let result = reader.read(&mut grid, bytes, &mut |fraction| {
                let _ = progress_tx.send(fraction);
            });
            match result {
                Ok(contents) => {
                    if let Some(warning) = &contents.warning {
                        log(format!("world loaded with warning: {}", warning), LogSeverity::Warning);
                    } else {
                        log(
                            format!("world \"{}\" loaded", contents.meta.title),
                            LogSeverity::Info,
                        );
                    }
                    Ok(LoadedWorld { grid, contents })
                }
                Err(err) => {
                    log(format!("world load failed: {}", err), LogSeverity::Error);
                    Err(err)
                }
            }
        });

        Ok(LoadTask {
            progress: progress_rx,
            handle,
        })
    }
}

#[derive(Debug)]
pub struct LoadTask {
    progress: watch::Receiver<f32>,
    handle: JoinHandle<Result<LoadedWorld, WorldError>>,
}

impl LoadTask {
    /// Fractional progress, 0.0 to 1.0, updated per decoded column.
    pub fn progress(&self) -> watch::Receiver<f32> {
        self.progress.clone()
    }

    /// Waits for the load to finish and takes ownership of the result.
    /// This join is the commit point: no world is observable before it.
    pub async fn join(self) -> Result<LoadedWorld, WorldError> {
        match self.handle.await {
            Ok(result) => result,
            Err(join_err) => Err(WorldError::Truncated(std::io::Error::new(
                std::io::ErrorKind::Other,
                format!("load task failed: {}", join_err),
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn tiny_world_bytes() -> Vec<u8> {
        use stratum_common::WireCursor;
        let mut cur = WireCursor::new();
        cur.write_u32(38);
        cur.write_string("Loader Fixture");
        cur.write_bytes(&[0u8; 20]);
        cur.write_i32(1); // high
        cur.write_i32(1); // wide
        cur.write_i32(0);
        cur.write_i32(0);
        cur.write_f64(0.0);
        cur.write_f64(0.0);
        cur.write_f64(0.0);
        cur.write_bool(true);
        cur.write_i32(0);
        cur.write_bool(false);
        cur.write_i32(0);
        cur.write_i32(0);
        for _ in 0..3 {
            cur.write_bool(false);
        }
        for _ in 0..6 {
            cur.write_bool(false); // saved/killed flags at v38
        }
        cur.write_bool(false);
        cur.write_bool(false);
        cur.write_u8(0);
        cur.write_i32(0);
        cur.write_bool(false);
        cur.write_i32(0);
        cur.write_i32(0);
        cur.write_i32(0);
        cur.write_f64(0.0);
        // one empty cell
        cur.write_bool(false);
        cur.write_bool(false);
        cur.write_bool(false);
        cur.write_bool(false); // wire
        cur.write_u16(0);
        for _ in 0..2000 {
            cur.write_bool(false);
        }
        cur.write_bool(false);
        for _ in 0..10 {
            cur.write_string("");
        }
        cur.into_bytes()
    }

    #[tokio::test]
    async fn test_busy_flag_gates_second_load() {
        let loader = WorldLoader::new(TileCatalog::shared());
        let task = loader
            .begin_file_load(TileGrid::with_capacity(4, 4), tiny_world_bytes())
            .unwrap();
        // The gate may already have reopened if the task finished; only a
        // still-busy loader must refuse.
        if loader.is_busy() {
            assert_matches!(
                loader.begin_file_load(TileGrid::with_capacity(4, 4), tiny_world_bytes()),
                Err(WorldError::LoadInProgress)
            );
        }
        let world = task.join().await.unwrap();
        assert_eq!(world.contents.meta.title, "Loader Fixture");
        assert!(!loader.is_busy());

        // A fresh load is accepted once the first completes.
        let task = loader
            .begin_file_load(world.grid, tiny_world_bytes())
            .unwrap();
        task.join().await.unwrap();
    }

    #[tokio::test]
    async fn test_failed_load_reports_and_clears_busy() {
        let loader = WorldLoader::new(TileCatalog::shared());
        let mut bytes = tiny_world_bytes();
        bytes.truncate(40);
        let task = loader
            .begin_file_load(TileGrid::with_capacity(4, 4), bytes)
            .unwrap();
        assert_matches!(task.join().await, Err(WorldError::Truncated(_)));
        assert!(!loader.is_busy());
    }

    #[tokio::test]
    async fn test_progress_reaches_completion() {
        let loader = WorldLoader::new(TileCatalog::shared());
        let task = loader
            .begin_file_load(TileGrid::with_capacity(4, 4), tiny_world_bytes())
            .unwrap();
        let progress = task.progress();
        task.join().await.unwrap();
        assert_eq!(*progress.borrow(), 1.0);
    }
}
