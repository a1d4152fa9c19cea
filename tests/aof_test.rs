use bytes::Bytes;
use ferrokv::aof::Aof;
use ferrokv::cmd::dispatch;
use ferrokv::context::CommandContext;
use ferrokv::db::Db;
use ferrokv::frame::Frame;
use std::path::PathBuf;

fn bytes_args(values: &[&str]) -> Vec<Bytes> {
    values.iter().map(|v| Bytes::from(v.to_string())).collect()
}

fn scratch_path(name: &str) -> PathBuf {
    let mut path = std::env::temp_dir();
    path.push(format!("ferrokv-aof-test-{name}-{:?}.aof", std::thread::current().id()));
    let _ = std::fs::remove_file(&path);
    path
}

#[tokio::test]
async fn writes_are_appended_and_replay_reconstructs_state() {
    let path = scratch_path("replay");

    {
        let aof = Aof::open(&path).await.unwrap();
        let db = Db::new();
        let mut ctx = CommandContext::new(db, Some(aof.clone()));

        dispatch(&mut ctx, "SET", bytes_args(&["a", "1"])).await;
        dispatch(&mut ctx, "RPUSH", bytes_args(&["list", "x", "y"])).await;
        dispatch(&mut ctx, "INCR", bytes_args(&["a"])).await;
        // Reads must not be logged.
        dispatch(&mut ctx, "GET", bytes_args(&["a"])).await;

        aof.flush().await.unwrap();
    }

    let recovered = Aof::replay(&path).await.unwrap();
    assert_eq!(recovered.len(), 3);
    assert_eq!(recovered[0].name, "SET");
    assert_eq!(recovered[2].name, "INCR");

    let fresh_db = Db::new();
    let mut replay_ctx = CommandContext::for_replay(fresh_db);
    for entry in recovered {
        dispatch(&mut replay_ctx, &entry.name, entry.args).await;
    }

    assert_eq!(
        dispatch(&mut replay_ctx, "GET", bytes_args(&["a"])).await,
        Frame::Bulk(Bytes::from("2"))
    );
    assert_eq!(
        dispatch(&mut replay_ctx, "LRANGE", bytes_args(&["list", "0", "-1"])).await,
        Frame::Array(vec![Frame::Bulk(Bytes::from("x")), Frame::Bulk(Bytes::from("y"))])
    );

    let _ = std::fs::remove_file(&path);
}

#[tokio::test]
async fn replaying_does_not_append_to_the_log() {
    let path = scratch_path("no-reappend");
    {
        let aof = Aof::open(&path).await.unwrap();
        aof.append("SET", &bytes_args(&["k", "v"])).await.unwrap();
        aof.flush().await.unwrap();
    }

    let before = std::fs::metadata(&path).unwrap().len();

    let commands = Aof::replay(&path).await.unwrap();
    let mut ctx = CommandContext::for_replay(Db::new());
    for entry in commands {
        dispatch(&mut ctx, &entry.name, entry.args).await;
    }

    let after = std::fs::metadata(&path).unwrap().len();
    assert_eq!(before, after);

    let _ = std::fs::remove_file(&path);
}
