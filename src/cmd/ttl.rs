use crate::cmd::parse_args;
use crate::context::CommandContext;
use crate::frame::Frame;
use bytes::Bytes;

pub(super) async fn apply(ctx: &mut CommandContext, args: Vec<Bytes>) -> Frame {
    let mut parse = parse_args(args);
    let key = parse.next_key().expect("arity already checked");

    let millis = ctx.db().ttl_millis(&key).await;
    let seconds = if millis < 0 {
        millis
    } else {
        (millis + 999) / 1000
    };
    Frame::Integer(seconds)
}
