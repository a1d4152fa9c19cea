use crate::context::CommandContext;
use crate::frame::Frame;
use crate::utils::resp_ok;
use bytes::Bytes;

pub(super) async fn apply(ctx: &mut CommandContext, _args: Vec<Bytes>) -> Frame {
    ctx.db().flushdb().await;
    resp_ok()
}
