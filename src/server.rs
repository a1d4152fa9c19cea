//! The TCP accept loop and per-connection handler.

use crate::aof::{self, Aof};
use crate::cmd;
use crate::config::{config_aof_flush_interval_secs_or_default, config_cleanup_interval_secs_or_default};
use crate::context::CommandContext;
use crate::db::{Db, DbDropGuard};
use crate::shutdown::Shutdown;
use crate::Connection;
use std::future::Future;
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{broadcast, mpsc, Semaphore};
use tokio::time::{self, Duration};
use tracing::{debug, error, info};

const MAX_CONNECTIONS: usize = 4096;

struct Listener {
    db_holder: DbDropGuard,
    aof: Option<Aof>,
    listener: TcpListener,
    limit_connections: Arc<Semaphore>,
    notify_shutdown: broadcast::Sender<()>,
    shutdown_complete_rx: mpsc::Receiver<()>,
    shutdown_complete_tx: mpsc::Sender<()>,
}

struct Handler {
    ctx: CommandContext,
    connection: Connection,
    shutdown: Shutdown,
    _shutdown_complete: mpsc::Sender<()>,
}

/// Replays `path` into a fresh store before the server starts accepting
/// connections, then opens it for ongoing appends.
async fn recover(path: &str, db: &Db) -> crate::Result<Aof> {
    let commands = Aof::replay(path).await?;
    let mut ctx = CommandContext::for_replay(db.clone());
    for entry in commands {
        cmd::dispatch(&mut ctx, &entry.name, entry.args).await;
    }
    info!(path, "append-only file replay complete");
    Ok(Aof::open(path).await?)
}

/// Accepts connections from `listener` until `shutdown` resolves, then
/// drains in-flight connections and flushes the append-only log.
pub async fn run(listener: TcpListener, aof_path: String, shutdown: impl Future) {
    let (notify_shutdown, _) = broadcast::channel(1);
    let (shutdown_complete_tx, shutdown_complete_rx) = mpsc::channel(1);

    let db_holder = DbDropGuard::new(Duration::from_secs(config_cleanup_interval_secs_or_default()));

    let aof = match recover(&aof_path, &db_holder.db()).await {
        Ok(aof) => Some(aof),
        Err(e) => {
            error!(error = %e, "failed to open append-only file, continuing without persistence");
            None
        }
    };
    let flush_stop = aof
        .clone()
        .map(|a| aof::spawn_flush_task(a, Duration::from_secs(config_aof_flush_interval_secs_or_default())));

    let mut server = Listener {
        listener,
        db_holder,
        aof,
        limit_connections: Arc::new(Semaphore::new(MAX_CONNECTIONS)),
        notify_shutdown,
        shutdown_complete_tx,
        shutdown_complete_rx,
    };

    tokio::select! {
        res = server.run() => {
            if let Err(err) = res {
                error!(error = %err, "failed to accept");
            }
        }
        _ = shutdown => {
            info!("shutting down");
        }
    }

    let Listener {
        mut shutdown_complete_rx,
        shutdown_complete_tx,
        notify_shutdown,
        aof,
        ..
    } = server;

    drop(notify_shutdown);
    drop(shutdown_complete_tx);

    let _ = shutdown_complete_rx.recv().await;

    if let Some(stop) = flush_stop {
        let _ = stop.send(());
    }
    if let Some(aof) = aof {
        if let Err(e) = aof.flush().await {
            error!(error = %e, "final append-only file flush failed");
        }
    }
}

impl Listener {
    async fn run(&mut self) -> crate::Result<()> {
        info!("accepting inbound connections");

        loop {
            let permit = self
                .limit_connections
                .clone()
                .acquire_owned()
                .await
                .expect("semaphore is never closed");

            let socket = self.accept().await?;

            let mut handler = Handler {
                ctx: CommandContext::new(self.db_holder.db(), self.aof.clone()),
                connection: Connection::new(socket),
                shutdown: Shutdown::new(self.notify_shutdown.subscribe()),
                _shutdown_complete: self.shutdown_complete_tx.clone(),
            };

            tokio::spawn(async move {
                if let Err(err) = handler.run().await {
                    error!(error = %err, "connection error");
                }
                drop(permit);
            });
        }
    }

    /// Exponential backoff: 1s, 2s, 4s, ... giving up after the wait would
    /// exceed 64s.
    async fn accept(&mut self) -> crate::Result<TcpStream> {
        let mut backoff = 1;

        loop {
            match self.listener.accept().await {
                Ok((socket, _)) => return Ok(socket),
                Err(err) => {
                    if backoff > 64 {
                        return Err(err.into());
                    }
                }
            }

            time::sleep(Duration::from_secs(backoff)).await;
            backoff *= 2;
        }
    }
}

impl Handler {
    /// Reads and dispatches one command at a time until the peer disconnects
    /// or shutdown is signalled. No pipelining: a reply is always written
    /// before the next frame is read.
    async fn run(&mut self) -> crate::Result<()> {
        while !self.shutdown.is_shutdown() {
            let maybe_frame = tokio::select! {
                res = self.connection.read_frame() => res,
                _ = self.shutdown.recv() => return Ok(()),
            };

            let frame = match maybe_frame {
                Ok(Some(frame)) => frame,
                Ok(None) => return Ok(()),
                Err(e) => {
                    debug!(error = %e, "malformed frame");
                    self.connection
                        .write_frame(&crate::frame::Frame::Error("ERR invalid command".to_string()))
                        .await?;
                    return Ok(());
                }
            };

            let (name, args) = match frame.parse_command() {
                Ok(parsed) => parsed,
                Err(e) => {
                    debug!(error = %e, "malformed command");
                    self.connection
                        .write_frame(&crate::frame::Frame::Error("ERR invalid command".to_string()))
                        .await?;
                    continue;
                }
            };

            debug!(command = %name, "handling request");
            let response = cmd::dispatch(&mut self.ctx, &name, args).await;
            self.connection.write_frame(&response).await?;
        }

        Ok(())
    }
}
