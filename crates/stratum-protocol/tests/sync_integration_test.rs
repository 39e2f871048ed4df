//! End-to-end sync against a scripted fixture server on a real socket.

use assert_matches::assert_matches;
use stratum_catalog::TileCatalog;
use stratum_protocol::frame::encode_frame;
use stratum_protocol::message::type_id;
use stratum_protocol::{FramePump, NetError, SyncClient, SyncOutcome};
use stratum_protocol::session::SyncOptions;
use stratum_common::WireCursor;
use stratum_world::{LoadGate, TileGrid};
use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, TcpStream};

#[derive(Clone)]
struct ServerScript {
    password: Option<String>,
    width: i32,
    height: i32,
}

impl ServerScript {
    fn plain(width: i32, height: i32) -> Self {
        Self {
            password: None,
            width,
            height,
        }
    }
}

fn world_info_payload(script: &ServerScript) -> Vec<u8> {
    let mut cur = WireCursor::new();
    cur.write_i32(27000); // time
    cur.write_u8(1);
    cur.write_u8(2);
    cur.write_u8(0);
    cur.write_i32(script.width);
    cur.write_i32(script.height);
    cur.write_i32(script.width / 2);
    cur.write_i32(4);
    cur.write_i32(8);
    cur.write_i32(12);
    cur.write_i32(4242);
    cur.write_u8(0);
    cur.write_string("Test Island");
    cur.into_bytes()
}

fn tile_row_payload(width: i32, y: i32, type_id_for_row: u8) -> Vec<u8> {
    let mut cur = WireCursor::new();
    cur.write_u16(width as u16);
    cur.write_i32(0);
    cur.write_i32(y);
    cur.write_u8(1); // active
    cur.write_u8(type_id_for_row);
    cur.write_u16((width - 1) as u16);
    cur.into_bytes()
}

fn recalc_payload(x1: i16, y1: i16) -> Vec<u8> {
    let mut cur = WireCursor::new();
    cur.write_i16(0);
    cur.write_i16(0);
    cur.write_i16(x1);
    cur.write_i16(y1);
    cur.into_bytes()
}

async fn send(socket: &mut TcpStream, type_id: u8, payload: &[u8]) {
    socket.write_all(&encode_frame(type_id, payload)).await.unwrap();
}

/// Accepts one client and walks it through login, tile transfer, and the
/// section-fetch loop.
async fn run_fixture_server(listener: TcpListener, script: ServerScript) {
    let (mut socket, _) = listener.accept().await.unwrap();
    let mut pump = FramePump::new();
    let mut buf = [0u8; 4096];
    let mut approved_sent = false;

    loop {
        let n = match tokio::io::AsyncReadExt::read(&mut socket, &mut buf).await {
            Ok(0) | Err(_) => return,
            Ok(n) => n,
        };
        for frame in pump.feed(&buf[..n]).unwrap() {
            match frame.type_id {
                type_id::GREETING => {
                    if script.password.is_some() {
                        send(&mut socket, type_id::REQUEST_PASSWORD, &[]).await;
                    } else {
                        send(&mut socket, type_id::APPROVED, &[0]).await;
                        approved_sent = true;
                    }
                }
                type_id::PASSWORD => {
                    let mut cur = WireCursor::from_bytes(frame.payload);
                    let offered = cur.read_string().unwrap();
                    if Some(offered) == script.password {
                        send(&mut socket, type_id::APPROVED, &[0]).await;
                        approved_sent = true;
                    } else {
                        let mut reason = WireCursor::new();
                        reason.write_string("Incorrect password.");
                        send(&mut socket, type_id::DISCONNECT, &reason.buffer).await;
                        return;
                    }
                }
                type_id::REQUEST_WORLD_INFO => {
                    assert!(approved_sent);
                    send(&mut socket, type_id::WORLD_INFO, &world_info_payload(&script)).await;
                }
                type_id::REQUEST_INITIAL_TILES => {
                    let mut status = WireCursor::new();
                    status.write_i32(script.height);
                    status.write_string("Receiving tile data");
                    send(&mut socket, type_id::STATUS, &status.buffer).await;
                    // Small worlds ship whole rows here; big ones are
                    // refused before the client ever asks for sections.
                    if script.width <= 64 {
                        for y in 0..script.height {
                            let row_type = if y == 5 { 0 } else { 1 };
                            send(
                                &mut socket,
                                type_id::TILE_ROW,
                                &tile_row_payload(script.width, y, row_type),
                            )
                            .await;
                        }
                    }
                    send(&mut socket, type_id::OKAY_TO_SPAWN, &[]).await;
                }
                type_id::SECTION_REQUEST => {
                    // Acknowledge everything at once.
                    send(&mut socket, type_id::RECALC_SECTION, &recalc_payload(0, 0)).await;
                }
                _ => {}
            }
        }
    }
}

#[tokio::test]
async fn test_full_sync_reconstructs_world() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(run_fixture_server(listener, ServerScript::plain(24, 20)));

    let client = SyncClient::new(TileCatalog::shared(), LoadGate::new());
    let task = client
        .begin_sync(
            addr.to_string(),
            SyncOptions::default(),
            TileGrid::with_capacity(64, 64),
        )
        .unwrap();
    let outcome = task.join().await.unwrap();

    let SyncOutcome::Complete(world) = outcome else {
        panic!("expected a completed sync");
    };
    assert_eq!(world.contents.meta.title, "Test Island");
    assert_eq!(world.grid.width(), 24);
    assert_eq!(world.grid.height(), 20);
    // Row 5 was dirt, everything else stone; runs must have spread both.
    assert_eq!(world.grid.tile(23, 5).type_id, 0);
    assert_eq!(world.grid.tile(0, 6).type_id, 1);
    assert!(world.grid.tile(12, 12).active);
    assert_eq!(world.contents.meta.spawn.x, 12);
}

#[tokio::test]
async fn test_password_protected_sync() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(run_fixture_server(
        listener,
        ServerScript {
            password: Some("sesame".to_owned()),
            ..ServerScript::plain(24, 20)
        },
    ));

    let client = SyncClient::new(TileCatalog::shared(), LoadGate::new());
    let task = client
        .begin_sync(
            addr.to_string(),
            SyncOptions {
                password: Some("sesame".to_owned()),
                ..SyncOptions::default()
            },
            TileGrid::with_capacity(64, 64),
        )
        .unwrap();
    assert_matches!(task.join().await, Ok(SyncOutcome::Complete(_)));
}

#[tokio::test]
async fn test_missing_password_aborts() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(run_fixture_server(
        listener,
        ServerScript {
            password: Some("sesame".to_owned()),
            ..ServerScript::plain(24, 20)
        },
    ));

    let client = SyncClient::new(TileCatalog::shared(), LoadGate::new());
    let task = client
        .begin_sync(
            addr.to_string(),
            SyncOptions::default(),
            TileGrid::with_capacity(64, 64),
        )
        .unwrap();
    assert_matches!(task.join().await, Err(NetError::PasswordRequired));
}

#[tokio::test]
async fn test_oversized_world_refused() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(run_fixture_server(listener, ServerScript::plain(4201, 32)));

    let client = SyncClient::new(TileCatalog::shared(), LoadGate::new());
    let task = client
        .begin_sync(
            addr.to_string(),
            SyncOptions::default(),
            TileGrid::with_capacity(4224, 64),
        )
        .unwrap();
    assert_matches!(
        task.join().await,
        Ok(SyncOutcome::RefusedTooLarge {
            width: 4201,
            height: 32,
            ..
        })
    );
}

#[tokio::test]
async fn test_gate_refuses_concurrent_sync() {
    // A server that accepts and then goes silent keeps the first sync in
    // flight while the second is attempted.
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let (_socket, _) = listener.accept().await.unwrap();
        std::future::pending::<()>().await;
    });

    let client = SyncClient::new(TileCatalog::shared(), LoadGate::new());
    let _task = client
        .begin_sync(
            addr.to_string(),
            SyncOptions::default(),
            TileGrid::with_capacity(8, 8),
        )
        .unwrap();
    assert_matches!(
        client.begin_sync(
            addr.to_string(),
            SyncOptions::default(),
            TileGrid::with_capacity(8, 8),
        ),
        Err(NetError::Busy)
    );
}
