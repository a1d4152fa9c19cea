//! Per-connection state handed to every command handler.

use crate::aof::Aof;
use crate::db::Db;
use bytes::Bytes;

/// One queued command awaiting `EXEC`, stored as plain data rather than a
/// boxed closure so the queue stays owned and `'static`.
#[derive(Clone)]
pub struct QueuedCommand {
    pub name: String,
    pub args: Vec<Bytes>,
}

pub struct CommandContext {
    db: Db,
    aof: Option<Aof>,
    in_multi: bool,
    queued: Vec<QueuedCommand>,
    /// Set while replaying the append-only log at startup: suppresses
    /// re-appending and transaction queueing so replayed writes apply
    /// unconditionally.
    replaying: bool,
}

impl CommandContext {
    pub fn new(db: Db, aof: Option<Aof>) -> CommandContext {
        CommandContext {
            db,
            aof,
            in_multi: false,
            queued: Vec::new(),
            replaying: false,
        }
    }

    pub fn for_replay(db: Db) -> CommandContext {
        CommandContext {
            db,
            aof: None,
            in_multi: false,
            queued: Vec::new(),
            replaying: true,
        }
    }

    pub fn db(&self) -> &Db {
        &self.db
    }

    pub fn aof(&self) -> Option<&Aof> {
        self.aof.as_ref()
    }

    pub fn is_replaying(&self) -> bool {
        self.replaying
    }

    pub fn in_multi(&self) -> bool {
        self.in_multi
    }

    pub fn begin_multi(&mut self) {
        self.in_multi = true;
        self.queued.clear();
    }

    pub fn discard_multi(&mut self) {
        self.in_multi = false;
        self.queued.clear();
    }

    pub fn queue(&mut self, name: String, args: Vec<Bytes>) {
        self.queued.push(QueuedCommand { name, args });
    }

    /// Ends the transaction, handing back the queued commands for the
    /// dispatcher to replay in order.
    pub fn take_queued(&mut self) -> Vec<QueuedCommand> {
        self.in_multi = false;
        std::mem::take(&mut self.queued)
    }
}
