use crate::cmd::parse_args;
use crate::context::CommandContext;
use crate::frame::Frame;
use crate::utils::resp_err;
use bytes::Bytes;

pub(super) async fn apply(ctx: &mut CommandContext, args: Vec<Bytes>) -> Frame {
    let mut parse = parse_args(args);
    let pattern = parse.next_key().expect("arity already checked");

    match ctx.db().keys(&pattern).await {
        Ok(keys) => {
            let mut frame = Frame::array();
            for key in keys {
                frame.push_bulk(Bytes::from(key.into_bytes()));
            }
            frame
        }
        Err(e) => resp_err(&e.to_string()),
    }
}
