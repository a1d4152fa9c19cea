use crate::context::CommandContext;
use crate::frame::Frame;
use bytes::Bytes;

pub(super) async fn apply(_ctx: &mut CommandContext, _args: Vec<Bytes>) -> Frame {
    Frame::Simple("PONG".to_string())
}
