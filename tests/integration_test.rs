//! End-to-end tests that speak raw RESP over a real TCP socket, covering
//! the literal wire-byte scenarios a client driving this server actually
//! sees.

use std::path::PathBuf;
use std::sync::Arc;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

use rustis_server::config::Config;
use rustis_server::connection;
use rustis_server::dispatcher::SharedState;
use rustis_server::models::{ReplicationInfo, Role};
use rustis_server::rdb;

async fn spawn_server(config: Config) -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    let config = Arc::new(config);
    let state = Arc::new(SharedState::new(config.clone(), ReplicationInfo::new(Role::Master)));
    if let Some(path) = config.rdb_path() {
        rdb::load(&path, &state.keyspace).unwrap();
    }

    tokio::spawn(async move {
        loop {
            let (stream, _) = listener.accept().await.unwrap();
            let state = state.clone();
            tokio::spawn(connection::handle(stream, state));
        }
    });

    port
}

fn default_config() -> Config {
    Config { dir: None, dbfilename: None, port: 0, replicaof: None }
}

async fn roundtrip(port: u16, request: &[u8]) -> Vec<u8> {
    let mut stream = TcpStream::connect(("127.0.0.1", port)).await.unwrap();
    stream.write_all(request).await.unwrap();

    let mut buf = vec![0u8; 4096];
    let n = tokio::time::timeout(std::time::Duration::from_secs(1), stream.read(&mut buf)).await.unwrap().unwrap();
    buf.truncate(n);
    buf
}

#[tokio::test]
async fn ping_replies_pong() {
    let port = spawn_server(default_config()).await;
    let reply = roundtrip(port, b"*1\r\n$4\r\nPING\r\n").await;
    assert_eq!(reply, b"+PONG\r\n");
}

#[tokio::test]
async fn echo_replies_with_its_argument() {
    let port = spawn_server(default_config()).await;
    let reply = roundtrip(port, b"*2\r\n$4\r\nECHO\r\n$5\r\nhello\r\n").await;
    assert_eq!(reply, b"$5\r\nhello\r\n");
}

#[tokio::test]
async fn set_then_get_round_trips_over_the_wire() {
    let port = spawn_server(default_config()).await;
    let mut stream = TcpStream::connect(("127.0.0.1", port)).await.unwrap();

    stream.write_all(b"*3\r\n$3\r\nSET\r\n$3\r\nfoo\r\n$3\r\nbar\r\n").await.unwrap();
    let mut buf = vec![0u8; 64];
    let n = stream.read(&mut buf).await.unwrap();
    assert_eq!(&buf[..n], b"+OK\r\n");

    stream.write_all(b"*2\r\n$3\r\nGET\r\n$3\r\nfoo\r\n").await.unwrap();
    let n = stream.read(&mut buf).await.unwrap();
    assert_eq!(&buf[..n], b"$3\r\nbar\r\n");
}

#[tokio::test]
async fn set_with_px_expires_the_key() {
    let port = spawn_server(default_config()).await;
    let mut stream = TcpStream::connect(("127.0.0.1", port)).await.unwrap();

    stream.write_all(b"*5\r\n$3\r\nSET\r\n$3\r\nfoo\r\n$3\r\nbar\r\n$2\r\nPX\r\n$1\r\n1\r\n").await.unwrap();
    let mut buf = vec![0u8; 64];
    stream.read(&mut buf).await.unwrap();

    tokio::time::sleep(std::time::Duration::from_millis(20)).await;

    stream.write_all(b"*2\r\n$3\r\nGET\r\n$3\r\nfoo\r\n").await.unwrap();
    let n = stream.read(&mut buf).await.unwrap();
    assert_eq!(&buf[..n], b"$-1\r\n");
}

#[tokio::test]
async fn xadd_rejects_ids_not_greater_than_the_last() {
    let port = spawn_server(default_config()).await;
    let mut stream = TcpStream::connect(("127.0.0.1", port)).await.unwrap();

    stream.write_all(b"*5\r\n$4\r\nXADD\r\n$1\r\ns\r\n$3\r\n5-0\r\n$1\r\nf\r\n$1\r\nv\r\n").await.unwrap();
    let mut buf = vec![0u8; 256];
    let n = stream.read(&mut buf).await.unwrap();
    assert_eq!(&buf[..n], b"$3\r\n5-0\r\n");

    stream.write_all(b"*5\r\n$4\r\nXADD\r\n$1\r\ns\r\n$3\r\n5-0\r\n$1\r\nf\r\n$1\r\nv\r\n").await.unwrap();
    let n = stream.read(&mut buf).await.unwrap();
    let reply = String::from_utf8_lossy(&buf[..n]);
    assert!(reply.starts_with("-ERR"));
    assert!(reply.contains("equal or smaller"));
}

#[tokio::test]
async fn multi_exec_runs_queued_commands_in_order() {
    let port = spawn_server(default_config()).await;
    let mut stream = TcpStream::connect(("127.0.0.1", port)).await.unwrap();
    let mut buf = vec![0u8; 256];

    stream.write_all(b"*1\r\n$5\r\nMULTI\r\n").await.unwrap();
    let n = stream.read(&mut buf).await.unwrap();
    assert_eq!(&buf[..n], b"+OK\r\n");

    stream.write_all(b"*3\r\n$3\r\nSET\r\n$1\r\nk\r\n$1\r\nv\r\n").await.unwrap();
    let n = stream.read(&mut buf).await.unwrap();
    assert_eq!(&buf[..n], b"+QUEUED\r\n");

    stream.write_all(b"*2\r\n$3\r\nGET\r\n$1\r\nk\r\n").await.unwrap();
    let n = stream.read(&mut buf).await.unwrap();
    assert_eq!(&buf[..n], b"+QUEUED\r\n");

    stream.write_all(b"*1\r\n$4\r\nEXEC\r\n").await.unwrap();
    let n = stream.read(&mut buf).await.unwrap();
    assert_eq!(&buf[..n], b"*2\r\n+OK\r\n$1\r\nv\r\n");
}

#[tokio::test]
async fn exec_with_an_empty_queue_returns_an_empty_array() {
    let port = spawn_server(default_config()).await;
    let mut stream = TcpStream::connect(("127.0.0.1", port)).await.unwrap();
    let mut buf = vec![0u8; 64];

    stream.write_all(b"*1\r\n$5\r\nMULTI\r\n").await.unwrap();
    stream.read(&mut buf).await.unwrap();

    stream.write_all(b"*1\r\n$4\r\nEXEC\r\n").await.unwrap();
    let n = stream.read(&mut buf).await.unwrap();
    assert_eq!(&buf[..n], b"*0\r\n");
}

#[tokio::test]
async fn exec_without_multi_is_an_error() {
    let port = spawn_server(default_config()).await;
    let reply = roundtrip(port, b"*1\r\n$4\r\nEXEC\r\n").await;
    assert!(String::from_utf8_lossy(&reply).starts_with("-ERR"));
}

#[tokio::test]
async fn malformed_framing_gets_a_protocol_error_reply_before_the_connection_closes() {
    let port = spawn_server(default_config()).await;
    let mut stream = TcpStream::connect(("127.0.0.1", port)).await.unwrap();

    stream.write_all(b"!oops\r\n").await.unwrap();
    let mut buf = vec![0u8; 256];
    let n = stream.read(&mut buf).await.unwrap();
    assert!(String::from_utf8_lossy(&buf[..n]).starts_with("-ERR"));

    // The connection is closed after the error reply.
    let n = stream.read(&mut buf).await.unwrap();
    assert_eq!(n, 0);
}

#[tokio::test]
async fn bootstraps_keyspace_from_an_rdb_file_at_startup() {
    let dir = std::env::temp_dir().join(format!("rustis-integration-{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();

    let mut bytes = Vec::new();
    bytes.extend_from_slice(b"REDIS0011");
    bytes.push(0xFE);
    bytes.push(0);
    bytes.push(0xFB);
    bytes.push(1);
    bytes.push(0);
    bytes.push(0x00);
    bytes.push(3);
    bytes.extend_from_slice(b"foo");
    bytes.push(3);
    bytes.extend_from_slice(b"bar");
    bytes.push(0xFF);
    std::fs::write(dir.join("dump.rdb"), &bytes).unwrap();

    let config = Config { dir: Some(PathBuf::from(&dir)), dbfilename: Some("dump.rdb".to_string()), port: 0, replicaof: None };
    let port = spawn_server(config).await;

    let reply = roundtrip(port, b"*2\r\n$3\r\nGET\r\n$3\r\nfoo\r\n").await;
    assert_eq!(reply, b"$3\r\nbar\r\n");

    std::fs::remove_dir_all(&dir).ok();
}

#[tokio::test]
async fn info_replication_reports_master_role_and_growing_offset() {
    let port = spawn_server(default_config()).await;
    let mut stream = TcpStream::connect(("127.0.0.1", port)).await.unwrap();
    let mut buf = vec![0u8; 512];

    stream.write_all(b"*1\r\n$4\r\nINFO\r\n").await.unwrap();
    let n = stream.read(&mut buf).await.unwrap();
    let reply = String::from_utf8_lossy(&buf[..n]).into_owned();
    assert!(reply.contains("role:master"));
    assert!(reply.contains("master_repl_offset:0"));

    stream.write_all(b"*3\r\n$3\r\nSET\r\n$1\r\nk\r\n$1\r\nv\r\n").await.unwrap();
    stream.read(&mut buf).await.unwrap();

    stream.write_all(b"*1\r\n$4\r\nINFO\r\n").await.unwrap();
    let n = stream.read(&mut buf).await.unwrap();
    let reply = String::from_utf8_lossy(&buf[..n]);
    assert!(!reply.contains("master_repl_offset:0"));
}
