use bytes::Bytes;
use ferrokv::cmd::dispatch;
use ferrokv::context::CommandContext;
use ferrokv::db::Db;
use ferrokv::frame::Frame;

fn bytes_args(values: &[&str]) -> Vec<Bytes> {
    values.iter().map(|v| Bytes::from(v.to_string())).collect()
}

fn ctx() -> CommandContext {
    CommandContext::new(Db::new(), None)
}

#[tokio::test]
async fn ping_and_echo() {
    let mut ctx = ctx();
    assert_eq!(
        dispatch(&mut ctx, "PING", vec![]).await,
        Frame::Simple("PONG".to_string())
    );
    assert_eq!(
        dispatch(&mut ctx, "ECHO", bytes_args(&["hello"])).await,
        Frame::Bulk(Bytes::from("hello"))
    );
}

#[tokio::test]
async fn set_get_roundtrip() {
    let mut ctx = ctx();
    dispatch(&mut ctx, "SET", bytes_args(&["greeting", "hi"])).await;
    assert_eq!(
        dispatch(&mut ctx, "GET", bytes_args(&["greeting"])).await,
        Frame::Bulk(Bytes::from("hi"))
    );
    assert_eq!(
        dispatch(&mut ctx, "GET", bytes_args(&["missing"])).await,
        Frame::Null
    );
}

#[tokio::test]
async fn get_against_a_list_is_wrongtype() {
    let mut ctx = ctx();
    dispatch(&mut ctx, "RPUSH", bytes_args(&["mylist", "a"])).await;
    match dispatch(&mut ctx, "GET", bytes_args(&["mylist"])).await {
        Frame::Error(e) => assert!(e.starts_with("WRONGTYPE")),
        other => panic!("expected WRONGTYPE error, got {other:?}"),
    }
}

#[tokio::test]
async fn incr_sequence() {
    let mut ctx = ctx();
    assert_eq!(
        dispatch(&mut ctx, "INCR", bytes_args(&["counter"])).await,
        Frame::Integer(1)
    );
    assert_eq!(
        dispatch(&mut ctx, "INCRBY", bytes_args(&["counter", "41"])).await,
        Frame::Integer(42)
    );
    assert_eq!(
        dispatch(&mut ctx, "DECRBY", bytes_args(&["counter", "2"])).await,
        Frame::Integer(40)
    );
    assert_eq!(
        dispatch(&mut ctx, "DECR", bytes_args(&["counter"])).await,
        Frame::Integer(39)
    );
}

#[tokio::test]
async fn incr_on_non_integer_string_errors() {
    let mut ctx = ctx();
    dispatch(&mut ctx, "SET", bytes_args(&["name", "not-a-number"])).await;
    match dispatch(&mut ctx, "INCR", bytes_args(&["name"])).await {
        Frame::Error(e) => assert!(e.contains("not an integer")),
        other => panic!("expected integer parse error, got {other:?}"),
    }
}

#[tokio::test]
async fn list_push_pop_and_range() {
    let mut ctx = ctx();
    dispatch(&mut ctx, "RPUSH", bytes_args(&["queue", "a", "b", "c"])).await;
    assert_eq!(
        dispatch(&mut ctx, "LRANGE", bytes_args(&["queue", "0", "-1"])).await,
        Frame::Array(vec![
            Frame::Bulk(Bytes::from("a")),
            Frame::Bulk(Bytes::from("b")),
            Frame::Bulk(Bytes::from("c")),
        ])
    );
    assert_eq!(
        dispatch(&mut ctx, "LPOP", bytes_args(&["queue"])).await,
        Frame::Bulk(Bytes::from("a"))
    );
    assert_eq!(
        dispatch(&mut ctx, "LLEN", bytes_args(&["queue"])).await,
        Frame::Integer(2)
    );
}

#[tokio::test]
async fn set_members_and_membership() {
    let mut ctx = ctx();
    dispatch(&mut ctx, "SADD", bytes_args(&["tags", "rust", "kv", "rust"])).await;
    assert_eq!(
        dispatch(&mut ctx, "SISMEMBER", bytes_args(&["tags", "kv"])).await,
        Frame::Integer(1)
    );
    assert_eq!(
        dispatch(&mut ctx, "SISMEMBER", bytes_args(&["tags", "go"])).await,
        Frame::Integer(0)
    );
}

#[tokio::test]
async fn hash_field_roundtrip() {
    let mut ctx = ctx();
    dispatch(&mut ctx, "HSET", bytes_args(&["user:1", "name", "ada"])).await;
    assert_eq!(
        dispatch(&mut ctx, "HGET", bytes_args(&["user:1", "name"])).await,
        Frame::Bulk(Bytes::from("ada"))
    );
}

#[tokio::test]
async fn expire_and_ttl() {
    let mut ctx = ctx();
    dispatch(&mut ctx, "SET", bytes_args(&["session", "token"])).await;
    assert_eq!(
        dispatch(&mut ctx, "EXPIRE", bytes_args(&["session", "100"])).await,
        Frame::Integer(1)
    );
    match dispatch(&mut ctx, "TTL", bytes_args(&["session"])).await {
        Frame::Integer(secs) => assert!(secs > 0 && secs <= 100),
        other => panic!("expected a positive ttl, got {other:?}"),
    }
}

#[tokio::test]
async fn wrong_arity_is_rejected() {
    let mut ctx = ctx();
    match dispatch(&mut ctx, "GET", vec![]).await {
        Frame::Error(e) => assert!(e.contains("wrong number of arguments")),
        other => panic!("expected arity error, got {other:?}"),
    }
}

#[tokio::test]
async fn unknown_command_is_rejected() {
    let mut ctx = ctx();
    match dispatch(&mut ctx, "FROBNICATE", vec![]).await {
        Frame::Error(e) => assert_eq!(e, "ERR command not found"),
        other => panic!("expected unknown-command error, got {other:?}"),
    }
}

#[tokio::test]
async fn multi_exec_runs_queued_commands_in_order() {
    let mut ctx = ctx();
    assert_eq!(dispatch(&mut ctx, "MULTI", vec![]).await, Frame::Simple("OK".to_string()));
    assert_eq!(
        dispatch(&mut ctx, "SET", bytes_args(&["a", "1"])).await,
        Frame::Simple("QUEUED".to_string())
    );
    assert_eq!(
        dispatch(&mut ctx, "INCR", bytes_args(&["a"])).await,
        Frame::Simple("QUEUED".to_string())
    );

    // Not visible yet: queued commands haven't run.
    assert_eq!(dispatch(&mut ctx, "GET", bytes_args(&["a"])).await, Frame::Null);

    assert_eq!(
        dispatch(&mut ctx, "EXEC", vec![]).await,
        Frame::Array(vec![Frame::Simple("OK".to_string()), Frame::Integer(2)])
    );
    assert_eq!(
        dispatch(&mut ctx, "GET", bytes_args(&["a"])).await,
        Frame::Bulk(Bytes::from("2"))
    );
}

#[tokio::test]
async fn multi_cannot_nest_and_discard_clears_queue() {
    let mut ctx = ctx();
    dispatch(&mut ctx, "MULTI", vec![]).await;
    match dispatch(&mut ctx, "MULTI", vec![]).await {
        Frame::Error(e) => assert!(e.contains("nested")),
        other => panic!("expected nested-MULTI error, got {other:?}"),
    }

    dispatch(&mut ctx, "SET", bytes_args(&["a", "1"])).await;
    assert_eq!(dispatch(&mut ctx, "DISCARD", vec![]).await, Frame::Simple("OK".to_string()));

    // EXEC with nothing queued (because MULTI was never re-entered) is an error again.
    match dispatch(&mut ctx, "EXEC", vec![]).await {
        Frame::Error(e) => assert!(e.contains("without MULTI")),
        other => panic!("expected EXEC-without-MULTI error, got {other:?}"),
    }
    assert_eq!(dispatch(&mut ctx, "GET", bytes_args(&["a"])).await, Frame::Null);
}

#[tokio::test]
async fn non_utf8_key_does_not_panic_the_connection() {
    let mut ctx = ctx();
    let key = Bytes::from_static(&[0xff, 0xfe, b'k']);
    let value = Bytes::from_static(b"v");
    assert_eq!(dispatch(&mut ctx, "SET", vec![key.clone(), value]).await, Frame::Simple("OK".to_string()));
    assert_eq!(dispatch(&mut ctx, "GET", vec![key]).await, Frame::Bulk(Bytes::from("v")));
}

#[tokio::test]
async fn flushdb_clears_every_type() {
    let mut ctx = ctx();
    dispatch(&mut ctx, "SET", bytes_args(&["s", "v"])).await;
    dispatch(&mut ctx, "RPUSH", bytes_args(&["l", "v"])).await;
    dispatch(&mut ctx, "SADD", bytes_args(&["st", "v"])).await;
    dispatch(&mut ctx, "FLUSHDB", vec![]).await;
    assert_eq!(
        dispatch(&mut ctx, "EXISTS", bytes_args(&["s", "l", "st"])).await,
        Frame::Integer(0)
    );
}
