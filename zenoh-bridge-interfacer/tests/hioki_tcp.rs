//! HIOKI transport against an in-process datalogger.

use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

use zenoh_bridge_interfacer::codec::{self, Datacode, Numeric};
use zenoh_bridge_interfacer::config::{NodeEntry, NodeTable};
use zenoh_bridge_interfacer::connection::{ConnectionManager, ConnectionState};
use zenoh_bridge_interfacer::poller::PollCycle;
use zenoh_bridge_interfacer::transport::{HiokiQuery, HiokiTransport};

/// Accept one client and answer each query with the next scripted reply.
/// Returns the queries received.
async fn datalogger(replies: Vec<&'static str>) -> (u16, JoinHandle<Vec<String>>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    let handle = tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut queries = Vec::new();

        for reply in replies {
            let mut buf = [0u8; 256];
            let n = socket.read(&mut buf).await.unwrap();
            queries.push(String::from_utf8_lossy(&buf[..n]).into_owned());
            socket.write_all(reply.as_bytes()).await.unwrap();
        }

        queries
    });

    (port, handle)
}

fn transport(port: u16) -> HiokiTransport {
    HiokiTransport::new("127.0.0.1", Some(port), Duration::from_secs(2))
}

#[tokio::test]
async fn test_query_reply_decodes_to_physical_value() {
    let (port, server) = datalogger(vec!["1234\r\n"]).await;

    let mut manager = ConnectionManager::new(transport(port));
    assert_eq!(manager.state(), ConnectionState::Disconnected);
    assert!(manager.ensure_connected().await);
    assert_eq!(manager.state(), ConnectionState::Connected);

    let query = HiokiQuery {
        channel: 1,
        voice: 1,
    };
    let raw = manager.send_and_receive(&query).await.unwrap();
    let value = codec::decode_ascii(Datacode::Float32, raw.bytes()).unwrap();
    assert_eq!(value.value, Numeric::Float(12.34));

    let queries = server.await.unwrap();
    assert_eq!(queries, vec![":MEMory:AREAl? CH1_1\r\n"]);
}

#[tokio::test]
async fn test_connect_to_closed_port_stays_disconnected() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);

    let mut manager = ConnectionManager::new(transport(port));
    assert!(!manager.ensure_connected().await);
    assert_eq!(manager.state(), ConnectionState::Disconnected);
}

fn hioki_nodes() -> Arc<NodeTable> {
    let rx = json5::from_str(r#"{ names: ["U1", "U2"], channels: [1, 2], voices: [1, 3] }"#)
        .unwrap();
    let mut table = NodeTable::new();
    table.insert("20".to_string(), NodeEntry { rx: Some(rx) });
    Arc::new(table)
}

#[tokio::test]
async fn test_poll_cycle_builds_float_payload() {
    let (port, server) = datalogger(vec!["23012\r\n", "-150\r\n"]).await;

    let mut poll = PollCycle::new(
        "logger",
        transport(port),
        vec!["20".to_string()],
        hioki_nodes(),
        60,
    );
    let payloads = poll.poll_once().await;

    assert_eq!(payloads.len(), 1);
    assert_eq!(payloads[0].len(), 8);
    let u1 = codec::decode_outbound(Datacode::Float32, &payloads[0].data[..4]).unwrap();
    let u2 = codec::decode_outbound(Datacode::Float32, &payloads[0].data[4..]).unwrap();
    assert!((u1.as_f64() - 230.12).abs() < 1e-4);
    assert_eq!(u2.value, Numeric::Float(-1.5));

    let queries = server.await.unwrap();
    assert_eq!(
        queries,
        vec![":MEMory:AREAl? CH1_1\r\n", ":MEMory:AREAl? CH2_3\r\n"]
    );
}

#[tokio::test]
async fn test_garbled_reply_aborts_node_and_drops_link() {
    let (port, _server) = datalogger(vec!["2301x\r\n", "100\r\n"]).await;

    let mut poll = PollCycle::new(
        "logger",
        transport(port),
        vec!["20".to_string()],
        hioki_nodes(),
        60,
    );
    assert!(poll.poll_once().await.is_empty());
    assert_eq!(poll.connection().state(), ConnectionState::Disconnected);
}

#[tokio::test]
async fn test_reply_split_across_segments() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let server = tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut buf = [0u8; 256];
        for segments in [["230", "12\r\n"], ["-15", "0\r\n"]] {
            socket.read(&mut buf).await.unwrap();
            for segment in segments {
                socket.write_all(segment.as_bytes()).await.unwrap();
                socket.flush().await.unwrap();
                tokio::time::sleep(Duration::from_millis(50)).await;
            }
        }
    });

    let mut poll = PollCycle::new(
        "logger",
        transport(port),
        vec!["20".to_string()],
        hioki_nodes(),
        60,
    );
    let payloads = poll.poll_once().await;

    assert_eq!(payloads.len(), 1);
    let u1 = codec::decode_outbound(Datacode::Float32, &payloads[0].data[..4]).unwrap();
    let u2 = codec::decode_outbound(Datacode::Float32, &payloads[0].data[4..]).unwrap();
    assert!((u1.as_f64() - 230.12).abs() < 1e-4);
    assert_eq!(u2.value, Numeric::Float(-1.5));
    assert_eq!(poll.connection().state(), ConnectionState::Connected);

    server.await.unwrap();
}

#[tokio::test]
async fn test_unterminated_reply_times_out_and_drops_link() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let server = tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut buf = [0u8; 256];
        socket.read(&mut buf).await.unwrap();
        socket.write_all(b"23012").await.unwrap();
        // Hold the socket open without ever finishing the reply.
        tokio::time::sleep(Duration::from_secs(5)).await;
    });

    let mut poll = PollCycle::new(
        "logger",
        HiokiTransport::new("127.0.0.1", Some(port), Duration::from_millis(200)),
        vec!["20".to_string()],
        hioki_nodes(),
        60,
    );
    assert!(poll.poll_once().await.is_empty());
    assert_eq!(poll.connection().state(), ConnectionState::Disconnected);

    server.abort();
}

#[tokio::test]
async fn test_peer_hang_up_disconnects() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let server = tokio::spawn(async move {
        // Hang up on the initial link and on the single reconnect.
        while let Ok((socket, _)) = listener.accept().await {
            drop(socket);
        }
    });

    let mut manager = ConnectionManager::new(transport(port));
    assert!(manager.ensure_connected().await);

    let query = HiokiQuery {
        channel: 1,
        voice: 1,
    };
    assert!(manager.send_and_receive(&query).await.is_err());
    assert_eq!(manager.state(), ConnectionState::Disconnected);

    server.abort();
}
