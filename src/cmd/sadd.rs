use crate::cmd::parse_args;
use crate::context::CommandContext;
use crate::frame::Frame;
use crate::parse::ParseError;
use crate::utils::resp_err;
use bytes::Bytes;

pub(super) async fn apply(ctx: &mut CommandContext, args: Vec<Bytes>) -> Frame {
    let mut parse = parse_args(args);
    let key = parse.next_key().expect("arity already checked");
    let mut members = Vec::new();
    loop {
        match parse.next_bytes() {
            Ok(v) => members.push(v),
            Err(ParseError::EndOfStream) => break,
            Err(_) => unreachable!("arity already checked"),
        }
    }

    match ctx.db().sadd(&key, &members).await {
        Ok(added) => Frame::Integer(added),
        Err(e) => resp_err(&e.to_string()),
    }
}
