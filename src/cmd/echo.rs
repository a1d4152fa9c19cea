use crate::context::CommandContext;
use crate::frame::Frame;
use bytes::Bytes;

pub(super) async fn apply(_ctx: &mut CommandContext, args: Vec<Bytes>) -> Frame {
    Frame::Bulk(args[0].clone())
}
