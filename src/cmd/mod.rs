//! Command registry and dispatcher.
//!
//! Each command is a descriptor `(name, arity, is_write, handler)` in a
//! process-wide table built once at startup. Dispatching a command means:
//! arity check, AOF append (writes, outside replay), transaction queueing
//! (if the connection is mid-`MULTI`), then the handler itself.

mod cmdtype;
mod decr;
mod decrby;
mod del;
mod discard;
mod echo;
mod exec;
mod exists;
mod expire;
mod flushdb;
mod get;
mod hget;
mod hgetall;
mod hset;
mod incr;
mod incrby;
mod keys;
mod llen;
mod lpop;
mod lpush;
mod lrange;
mod multi;
mod pexpire;
mod ping;
mod pttl;
mod rpop;
mod rpush;
mod sadd;
mod set;
mod sismember;
mod smembers;
mod srem;
mod string_append;
mod ttl;

use crate::context::CommandContext;
use crate::frame::Frame;
use crate::utils::resp_err;
use bytes::Bytes;
use futures::future::BoxFuture;
use lazy_static::lazy_static;
use std::collections::HashMap;
use tracing::{debug, warn};

pub type Handler = for<'a> fn(&'a mut CommandContext, Vec<Bytes>) -> BoxFuture<'a, Frame>;

pub struct CommandSpec {
    pub name: &'static str,
    pub arity: i32,
    pub is_write: bool,
    pub handler: Handler,
}

macro_rules! spec {
    ($name:expr, $arity:expr, $is_write:expr, $module:ident) => {
        CommandSpec {
            name: $name,
            arity: $arity,
            is_write: $is_write,
            handler: |ctx, args| Box::pin($module::apply(ctx, args)),
        }
    };
}

lazy_static! {
    static ref REGISTRY: HashMap<&'static str, CommandSpec> = {
        let specs = vec![
            spec!("PING", 0, false, ping),
            spec!("ECHO", 1, false, echo),
            spec!("SET", 2, true, set),
            spec!("GET", 1, false, get),
            spec!("DEL", -1, true, del),
            spec!("EXISTS", -1, false, exists),
            spec!("TYPE", 1, false, cmdtype),
            spec!("KEYS", 1, false, keys),
            spec!("FLUSHDB", 0, true, flushdb),
            spec!("EXPIRE", 2, true, expire),
            spec!("PEXPIRE", 2, true, pexpire),
            spec!("TTL", 1, false, ttl),
            spec!("PTTL", 1, false, pttl),
            spec!("INCR", 1, true, incr),
            spec!("DECR", 1, true, decr),
            spec!("INCRBY", 2, true, incrby),
            spec!("DECRBY", 2, true, decrby),
            spec!("APPEND", 2, true, string_append),
            spec!("LPUSH", -2, true, lpush),
            spec!("RPUSH", -2, true, rpush),
            spec!("LPOP", 1, true, lpop),
            spec!("RPOP", 1, true, rpop),
            spec!("LLEN", 1, false, llen),
            spec!("LRANGE", 3, false, lrange),
            spec!("SADD", -2, true, sadd),
            spec!("SREM", -2, true, srem),
            spec!("SMEMBERS", 1, false, smembers),
            spec!("SISMEMBER", 2, false, sismember),
            spec!("HSET", 3, true, hset),
            spec!("HGET", 2, false, hget),
            spec!("HGETALL", 1, false, hgetall),
            spec!("MULTI", 0, false, multi),
            spec!("EXEC", 0, false, exec),
            spec!("DISCARD", 0, false, discard),
        ];
        let mut map = HashMap::new();
        for s in specs {
            if map.insert(s.name, s).is_some() {
                panic!("duplicate command registered: a bug in the registry table");
            }
        }
        map
    };
}

fn arity_ok(arity: i32, given: usize) -> bool {
    if arity >= 0 {
        given as i32 == arity
    } else {
        given as i32 >= -arity
    }
}

/// Looks up, validates arity, routes through the AOF/transaction machinery,
/// and runs the handler against `ctx`.
pub async fn dispatch(ctx: &mut CommandContext, name: &str, args: Vec<Bytes>) -> Frame {
    let upper = name.to_uppercase();

    let spec = match REGISTRY.get(upper.as_str()) {
        Some(s) => s,
        None => return resp_err("ERR command not found"),
    };

    if !arity_ok(spec.arity, args.len()) {
        return resp_err(&format!(
            "ERR wrong number of arguments for '{}' command",
            name.to_lowercase()
        ));
    }

    if ctx.in_multi() && !matches!(upper.as_str(), "MULTI" | "EXEC" | "DISCARD") {
        ctx.queue(upper, args);
        return Frame::Simple("QUEUED".to_string());
    }

    if spec.is_write && !ctx.is_replaying() {
        if let Some(aof) = ctx.aof().cloned() {
            if let Err(e) = aof.append(&upper, &args).await {
                warn!(error = %e, command = %upper, "append-only file write failed");
            }
        }
    }

    debug!(command = %upper, "dispatching");
    (spec.handler)(ctx, args).await
}

/// Rewraps a handler's raw argument vector as a `Parse` cursor, for commands
/// that need typed field extraction rather than raw bytes.
pub(crate) fn parse_args(args: Vec<Bytes>) -> crate::parse::Parse {
    let frame = Frame::Array(args.into_iter().map(Frame::Bulk).collect());
    crate::parse::Parse::new(frame).expect("an array of bulk frames always parses")
}
