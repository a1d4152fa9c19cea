//! Append-only command log: buffered append, periodic flush, startup replay.

use crate::frame::Frame;
use crate::shutdown::Shutdown;
use bytes::Bytes;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncReadExt, AsyncWriteExt, BufWriter};
use tokio::sync::{broadcast, Mutex};
use tokio::time::{self, Duration, MissedTickBehavior};
use tracing::{debug, warn};

#[derive(thiserror::Error, Debug)]
pub enum AofError {
    #[error("failed to open append-only file at {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("append-only file I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("append-only file contains a truncated record")]
    Truncated,
}

/// One write command, as recorded in (or replayed from) the log.
#[derive(Clone, Debug)]
pub struct LoggedCommand {
    pub name: String,
    pub args: Vec<Bytes>,
}

impl LoggedCommand {
    fn to_frame(&self) -> Frame {
        let mut frame = Frame::array();
        frame.push_bulk(Bytes::from(self.name.clone().into_bytes()));
        for arg in &self.args {
            frame.push_bulk(arg.clone());
        }
        frame
    }
}

struct Inner {
    writer: BufWriter<File>,
    dirty: bool,
}

/// Handle to the append-only log; cheaply cloneable, shared across
/// connections and the background flush task.
#[derive(Clone)]
pub struct Aof {
    path: PathBuf,
    inner: Arc<Mutex<Inner>>,
}

impl Aof {
    pub async fn open(path: impl AsRef<Path>) -> Result<Aof, AofError> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await
            .map_err(|source| AofError::Open {
                path: path.clone(),
                source,
            })?;
        Ok(Aof {
            path,
            inner: Arc::new(Mutex::new(Inner {
                writer: BufWriter::new(file),
                dirty: false,
            })),
        })
    }

    /// Serializes `(name, args)` as a RESP array and buffers it for the next
    /// flush. Does not itself hit the disk.
    pub async fn append(&self, name: &str, args: &[Bytes]) -> Result<(), AofError> {
        let cmd = LoggedCommand {
            name: name.to_string(),
            args: args.to_vec(),
        };
        let bytes = cmd.to_frame().serialize();
        let mut inner = self.inner.lock().await;
        inner.writer.write_all(&bytes).await?;
        inner.dirty = true;
        Ok(())
    }

    pub async fn flush(&self) -> Result<(), AofError> {
        let mut inner = self.inner.lock().await;
        if !inner.dirty {
            return Ok(());
        }
        inner.writer.flush().await?;
        inner.writer.get_ref().sync_all().await?;
        inner.dirty = false;
        Ok(())
    }

    /// Reads every record from the start of the file, in order. Used once at
    /// startup before the server accepts connections.
    pub async fn replay(path: impl AsRef<Path>) -> Result<Vec<LoggedCommand>, AofError> {
        let path = path.as_ref();
        let mut file = match File::open(path).await {
            Ok(f) => f,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(vec![]),
            Err(source) => {
                return Err(AofError::Open {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };

        let mut buf = Vec::new();
        file.read_to_end(&mut buf).await?;

        let mut commands = Vec::new();
        let mut cursor = Cursor::new(&buf[..]);
        loop {
            if cursor.position() as usize >= buf.len() {
                break;
            }
            let start = cursor.position();
            let check_cursor = &mut Cursor::new(&buf[start as usize..]);
            match Frame::check(check_cursor) {
                Ok(()) => {
                    let end = start as usize + check_cursor.position() as usize;
                    let mut parse_cursor = Cursor::new(&buf[start as usize..end]);
                    let frame = Frame::parse(&mut parse_cursor)
                        .map_err(|_| AofError::Truncated)?;
                    let (name, args) = frame.parse_command().map_err(|_| AofError::Truncated)?;
                    commands.push(LoggedCommand { name, args });
                    cursor.set_position(end as u64);
                }
                Err(_) => return Err(AofError::Truncated),
            }
        }
        debug!(count = commands.len(), "replayed append-only log");
        Ok(commands)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Background task flushing the log on a fixed interval until shutdown.
pub async fn flush_task(aof: Aof, interval: Duration, mut shutdown: Shutdown) {
    let mut ticker = time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    while !shutdown.is_shutdown() {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = shutdown.recv() => break,
        }
        if let Err(e) = aof.flush().await {
            warn!(error = %e, "append-only file flush failed");
        }
    }
    if let Err(e) = aof.flush().await {
        warn!(error = %e, "final append-only file flush failed");
    }
}

/// Starts the periodic flush task, returning a sender that stops it.
pub fn spawn_flush_task(aof: Aof, interval: Duration) -> broadcast::Sender<()> {
    let (tx, rx) = broadcast::channel(1);
    tokio::spawn(flush_task(aof, interval, Shutdown::new(rx)));
    tx
}
