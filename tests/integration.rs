//! End-to-end tests against scripted in-process RCON servers.

use std::net::SocketAddr;
use std::time::Duration;

use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, TcpStream};

use rcon_client::protocol::{encode, FrameReader, Packet, PacketKind};
use rcon_client::{Config, RconClient, RconError, SessionState};

const PASSWORD: &str = "ha";

async fn bind() -> (TcpListener, SocketAddr) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    (listener, addr)
}

/// Serve one connection like a typical RCON server: reply to auth,
/// answer each command with two fragments (`echo:` + the command), and
/// echo every empty `ResponseValue` probe.
async fn serve_echo(stream: TcpStream) {
    let (read_half, mut write_half) = stream.into_split();
    let mut reader = FrameReader::new(read_half);

    while let Ok(request) = reader.read_frame().await {
        let replies = match request.kind {
            PacketKind::Auth => {
                let id = if request.body == PASSWORD { request.id } else { -1 };
                vec![Packet::new(id, PacketKind::AuthResponse, "")]
            }
            // Wire value 2 decodes to the response tag; on the server
            // side of the stream it is a command request.
            PacketKind::AuthResponse | PacketKind::ExecCommand => vec![
                Packet::new(request.id, PacketKind::ResponseValue, "echo:"),
                Packet::new(request.id, PacketKind::ResponseValue, request.body.clone()),
            ],
            PacketKind::ResponseValue => vec![Packet::sentinel(request.id)],
        };
        for reply in replies {
            if write_half
                .write_all(&encode(&reply).unwrap())
                .await
                .is_err()
            {
                return;
            }
        }
    }
}

async fn spawn_echo_server() -> SocketAddr {
    let (listener, addr) = bind().await;
    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            tokio::spawn(serve_echo(stream));
        }
    });
    addr
}

/// The canonical session: authenticate, then a command whose response
/// arrives split in two fragments. Asserts the exact id sequence the
/// client puts on the wire.
#[tokio::test]
async fn test_handshake_then_fragmented_response() {
    let (listener, addr) = bind().await;

    let server = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let (read_half, mut write_half) = stream.into_split();
        let mut reader = FrameReader::new(read_half);

        let auth = reader.read_frame().await.unwrap();
        assert_eq!(auth.kind, PacketKind::Auth);
        assert_eq!(auth.id, 0);
        assert_eq!(auth.body, "ha");
        let reply = Packet::new(0, PacketKind::AuthResponse, "");
        write_half.write_all(&encode(&reply).unwrap()).await.unwrap();

        let probe = reader.read_frame().await.unwrap();
        assert_eq!(probe.id, 1);
        assert!(probe.body.is_empty());
        let echo = Packet::sentinel(1);
        write_half.write_all(&encode(&echo).unwrap()).await.unwrap();

        let exec = reader.read_frame().await.unwrap();
        assert_eq!(exec.id, 2);
        assert_eq!(exec.body, "GetChat");
        for packet in [
            Packet::new(2, PacketKind::ResponseValue, "Hello"),
            Packet::new(2, PacketKind::ResponseValue, " World"),
        ] {
            write_half.write_all(&encode(&packet).unwrap()).await.unwrap();
        }

        let probe = reader.read_frame().await.unwrap();
        assert_eq!(probe.id, 3);
        assert!(probe.body.is_empty());
        let echo = Packet::sentinel(3);
        write_half.write_all(&encode(&echo).unwrap()).await.unwrap();

        // Ids keep advancing; the next command takes the next pair.
        let exec = reader.read_frame().await.unwrap();
        assert_eq!(exec.id, 4);
        let reply = Packet::new(4, PacketKind::ResponseValue, "1.0");
        write_half.write_all(&encode(&reply).unwrap()).await.unwrap();
        let probe = reader.read_frame().await.unwrap();
        assert_eq!(probe.id, 5);
        let echo = Packet::sentinel(5);
        write_half.write_all(&encode(&echo).unwrap()).await.unwrap();
    });

    let client = RconClient::connect(addr).await.unwrap();
    assert_eq!(client.state(), SessionState::Authenticating);
    assert!(!client.is_authenticated());

    client.authenticate("ha").await.unwrap();
    assert!(client.is_authenticated());

    assert_eq!(client.exec("GetChat").await.unwrap(), "Hello World");
    assert_eq!(client.exec("Version").await.unwrap(), "1.0");

    server.await.unwrap();
    client.close();
    assert_eq!(client.state(), SessionState::Closed);
}

#[tokio::test]
async fn test_concurrent_execs_no_cross_delivery() {
    let addr = spawn_echo_server().await;
    let client = RconClient::connect(addr).await.unwrap();
    client.authenticate(PASSWORD).await.unwrap();

    let (a, b, c, d) = tokio::join!(
        client.exec("alpha"),
        client.exec("beta"),
        client.exec("gamma"),
        client.exec("delta"),
    );

    assert_eq!(a.unwrap(), "echo:alpha");
    assert_eq!(b.unwrap(), "echo:beta");
    assert_eq!(c.unwrap(), "echo:gamma");
    assert_eq!(d.unwrap(), "echo:delta");
}

#[tokio::test]
async fn test_auth_denied_then_retry() {
    let addr = spawn_echo_server().await;
    let client = RconClient::connect(addr).await.unwrap();

    let err = client.authenticate("wrong").await.unwrap_err();
    assert!(matches!(err, RconError::AuthFailed));
    assert!(!client.is_authenticated());

    // The session stays usable; a retry takes the next id pair.
    client.authenticate(PASSWORD).await.unwrap();
    assert!(client.is_authenticated());
}

#[tokio::test]
async fn test_non_ascii_command_rejected_session_usable() {
    let addr = spawn_echo_server().await;
    let client = RconClient::connect(addr).await.unwrap();
    client.authenticate(PASSWORD).await.unwrap();

    let err = client.exec("caf\u{e9}").await.unwrap_err();
    assert!(matches!(err, RconError::Encoding(_)));

    assert_eq!(client.exec("status").await.unwrap(), "echo:status");
}

#[tokio::test]
async fn test_connection_closed_while_pending_does_not_hang() {
    let (listener, addr) = bind().await;
    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let (read_half, _write_half) = stream.into_split();
        let mut reader = FrameReader::new(read_half);
        // Swallow the request, then drop the connection.
        let _ = reader.read_frame().await;
    });

    let client = RconClient::connect(addr).await.unwrap();
    let result = tokio::time::timeout(Duration::from_secs(5), client.exec("ping"))
        .await
        .expect("exec must not hang after the stream closes");
    assert!(matches!(result.unwrap_err(), RconError::ConnectionClosed));
    assert_eq!(client.state(), SessionState::Closed);
}

#[tokio::test]
async fn test_command_deadline() {
    let (listener, addr) = bind().await;
    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let (read_half, _write_half) = stream.into_split();
        let mut reader = FrameReader::new(read_half);
        // Read requests but never answer.
        while reader.read_frame().await.is_ok() {}
    });

    let config = Config {
        command_timeout: Some(Duration::from_millis(100)),
        ..Config::default()
    };
    let client = RconClient::connect_with(addr, config).await.unwrap();

    let err = client.exec("hang").await.unwrap_err();
    assert!(matches!(err, RconError::Timeout));

    // The per-call override applies too.
    let err = client
        .exec_with_timeout("hang", Duration::from_millis(50))
        .await
        .unwrap_err();
    assert!(matches!(err, RconError::Timeout));
}

#[tokio::test]
async fn test_unsolicited_frames_dropped() {
    let (listener, addr) = bind().await;
    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let (read_half, mut write_half) = stream.into_split();
        let mut reader = FrameReader::new(read_half);

        let exec = reader.read_frame().await.unwrap();
        // Out-of-band keep-alive with an id nothing registered.
        let keep_alive = Packet::new(9999, PacketKind::ResponseValue, "Keep Alive");
        write_half
            .write_all(&encode(&keep_alive).unwrap())
            .await
            .unwrap();
        let fragment = Packet::new(exec.id, PacketKind::ResponseValue, "pong");
        write_half
            .write_all(&encode(&fragment).unwrap())
            .await
            .unwrap();

        let probe = reader.read_frame().await.unwrap();
        write_half
            .write_all(&encode(&Packet::sentinel(probe.id)).unwrap())
            .await
            .unwrap();
    });

    let client = RconClient::connect(addr).await.unwrap();
    assert_eq!(client.exec("ping").await.unwrap(), "pong");
}

#[tokio::test]
async fn test_exec_after_close_fails_immediately() {
    let addr = spawn_echo_server().await;
    let client = RconClient::connect(addr).await.unwrap();
    client.authenticate(PASSWORD).await.unwrap();

    client.close();
    let err = client.exec("status").await.unwrap_err();
    assert!(matches!(err, RconError::ConnectionClosed));
}
