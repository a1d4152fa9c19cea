use crate::context::CommandContext;
use crate::frame::Frame;
use crate::utils::resp_err;
use bytes::Bytes;

pub(super) async fn apply(ctx: &mut CommandContext, _args: Vec<Bytes>) -> Frame {
    if !ctx.in_multi() {
        return resp_err("ERR EXEC without MULTI");
    }

    let queued = ctx.take_queued();
    let mut replies = Frame::array();
    for cmd in queued {
        let reply = Box::pin(crate::cmd::dispatch(ctx, &cmd.name, cmd.args)).await;
        replies.push_frame(reply);
    }
    replies
}
