use crate::cmd::parse_args;
use crate::context::CommandContext;
use crate::frame::Frame;
use bytes::Bytes;

pub(super) async fn apply(ctx: &mut CommandContext, args: Vec<Bytes>) -> Frame {
    let mut parse = parse_args(args);
    let key = parse.next_key().expect("arity already checked");
    let millis = parse.next_int().expect("arity already checked");

    let existed = ctx.db().set_expire(&key, millis).await;
    Frame::Integer(existed as i64)
}
