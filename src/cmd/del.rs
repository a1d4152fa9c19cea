use crate::cmd::parse_args;
use crate::context::CommandContext;
use crate::frame::Frame;
use crate::parse::ParseError;
use bytes::Bytes;

pub(super) async fn apply(ctx: &mut CommandContext, args: Vec<Bytes>) -> Frame {
    let mut parse = parse_args(args);
    let mut keys = Vec::new();
    loop {
        match parse.next_key() {
            Ok(key) => keys.push(key),
            Err(ParseError::EndOfStream) => break,
            Err(_) => unreachable!("arity already checked"),
        }
    }

    let count = ctx.db().delete(&keys).await;
    Frame::Integer(count)
}
