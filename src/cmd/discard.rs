use crate::context::CommandContext;
use crate::frame::Frame;
use crate::utils::{resp_err, resp_ok};
use bytes::Bytes;

pub(super) async fn apply(ctx: &mut CommandContext, _args: Vec<Bytes>) -> Frame {
    if !ctx.in_multi() {
        return resp_err("ERR DISCARD without MULTI");
    }
    ctx.discard_multi();
    resp_ok()
}
