use crate::cmd::parse_args;
use crate::context::CommandContext;
use crate::frame::Frame;
use crate::utils::resp_err;
use bytes::Bytes;

pub(super) async fn apply(ctx: &mut CommandContext, args: Vec<Bytes>) -> Frame {
    let mut parse = parse_args(args);
    let key = parse.next_key().expect("arity already checked");

    match ctx.db().incr(&key, -1).await {
        Ok(v) => Frame::Integer(v),
        Err(e) => resp_err(&e.to_string()),
    }
}
