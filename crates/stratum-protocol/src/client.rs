//! The tokio TCP driver. A dedicated read-loop task owns the socket's read
//! half and feeds raw chunks through an ordered channel; this side pumps
//! frames out of them and walks the session state machine, writing its
//! outgoing messages back to the socket. One outstanding read at a time,
//! no timeouts: a stalled peer holds the sync until the socket errors.

use crate::error::NetError;
use crate::frame::FramePump;
use crate::session::{Disconnection, SessionEvent, SyncOptions, SyncSession};
use bytes::{Bytes, BytesMut};
use std::io;
use std::sync::Arc;
use stratum_catalog::TileCatalog;
use stratum_common::WireCursor;
use stratum_logger::{log, LogSeverity};
use stratum_world::{LoadGate, LoadedWorld, TileGrid};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

/// How a sync ended when the connection itself did not fail.
#[derive(Debug)]
pub enum SyncOutcome {
    /// Every section arrived; here is the world.
    Complete(LoadedWorld),
    /// Policy refusal of an oversized world. The grid comes back unused.
    RefusedTooLarge {
        width: i32,
        height: i32,
        grid: TileGrid,
    },
}

pub struct SyncClient {
    catalog: Arc<TileCatalog>,
    gate: LoadGate,
}

impl SyncClient {
    pub fn new(catalog: Arc<TileCatalog>, gate: LoadGate) -> Self {
        Self { catalog, gate }
    }

    /// Connects and syncs the remote world into `grid` on a background
    /// task. Refused with `Busy` while any other load holds the gate.
    pub fn begin_sync(
        &self,
        addr: String,
        options: SyncOptions,
        grid: TileGrid,
    ) -> Result<SyncTask, NetError> {
        let guard = self.gate.try_acquire().ok_or(NetError::Busy)?;
        let (progress_tx, progress_rx) = watch::channel(0.0f32);
        let catalog = Arc::clone(&self.catalog);

        let handle = tokio::spawn(async move {
            let _guard = guard;
            let result = drive(catalog, addr, options, grid, progress_tx).await;
            match &result {
                Ok(SyncOutcome::Complete(_)) => {
                    log("map complete, disconnected".to_owned(), LogSeverity::Info)
                }
                Ok(SyncOutcome::RefusedTooLarge { width, height, .. }) => log(
                    format!("world too large to sync ({}x{})", width, height),
                    LogSeverity::Warning,
                ),
                Err(err) => log(format!("sync failed: {}", err), LogSeverity::Error),
            }
            result
        });

        Ok(SyncTask {
            progress: progress_rx,
            handle,
        })
    }
}

#[derive(Debug)]
pub struct SyncTask {
    progress: watch::Receiver<f32>,
    handle: JoinHandle<Result<SyncOutcome, NetError>>,
}

impl SyncTask {
    /// Fraction of sections received so far.
    pub fn progress(&self) -> watch::Receiver<f32> {
        self.progress.clone()
    }

    pub async fn join(self) -> Result<SyncOutcome, NetError> {
        match self.handle.await {
            Ok(result) => result,
            Err(join_err) => Err(NetError::Connection(io::Error::new(
                io::ErrorKind::Other,
                format!("sync task failed: {}", join_err),
            ))),
        }
    }
}

async fn drive(
    catalog: Arc<TileCatalog>,
    addr: String,
    options: SyncOptions,
    grid: TileGrid,
    progress: watch::Sender<f32>,
) -> Result<SyncOutcome, NetError> {
    let stream = TcpStream::connect(&addr).await?;
    let (mut read_half, mut write_half) = stream.into_split();

    // The read loop keeps exactly one read outstanding and re-arms it after
    // each completion; everything downstream is driven by these chunks in
    // arrival order.
    let (chunk_tx, mut chunk_rx) = mpsc::channel::<Bytes>(32);
    let mut reader = tokio::spawn(async move {
        let mut staging = BytesMut::with_capacity(8192);
        loop {
            match read_half.read_buf(&mut staging).await {
                Ok(0) => return Ok(()),
                Ok(_) => {
                    if chunk_tx.send(staging.split().freeze()).await.is_err() {
                        return Ok(());
                    }
                }
                Err(err) => return Err(err),
            }
        }
    });

    let mut session = SyncSession::new(catalog, options, grid);
    let mut scratch = WireCursor::new();
    let mut pump = FramePump::new();

    for outgoing in session.greet() {
        write_half.write_all(&outgoing.encode(&mut scratch)).await?;
    }

    loop {
        // `None` means the reader dropped its sender: EOF or socket error.
        // Buffered chunks drain first, so no frame is lost to the race.
        let Some(chunk) = chunk_rx.recv().await else {
            return Err(match (&mut reader).await {
                Ok(Err(err)) => NetError::Connection(err),
                _ => NetError::Connection(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "server closed the connection mid-sync",
                )),
            });
        };

        for frame in pump.feed(&chunk)? {
            match session.handle(frame)? {
                SessionEvent::Continue(actions) => {
                    for outgoing in actions {
                        write_half.write_all(&outgoing.encode(&mut scratch)).await?;
                    }
                }
                SessionEvent::Finished { actions, reason } => {
                    for outgoing in actions {
                        write_half.write_all(&outgoing.encode(&mut scratch)).await?;
                    }
                    let _ = write_half.shutdown().await;
                    reader.abort();
                    let _ = progress.send(session.progress());
                    return Ok(match reason {
                        Disconnection::MapComplete => SyncOutcome::Complete(session.into_world()),
                        Disconnection::WorldTooLarge { width, height } => {
                            SyncOutcome::RefusedTooLarge {
                                width,
                                height,
                                grid: session.into_grid(),
                            }
                        }
                    });
                }
            }
        }
        let _ = progress.send(session.progress());
    }
}
