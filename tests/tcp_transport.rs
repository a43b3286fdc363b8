//! TcpTransport against a loopback SCPI responder.

use std::sync::Arc;
use std::time::Duration;

use scpi_sync::codec::EnumCodec;
use scpi_sync::error::TransportErrorKind;
use scpi_sync::subsystems::OutputMode;
use scpi_sync::transport::{ScpiTransport, TcpTransport};
use scpi_sync::{AttributeCommands, StateSyncPort, SyncContext};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;

/// Answer `OUTP:OFF:MODE?` with the last written mode; stay silent on `*OPC?`.
async fn spawn_responder() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    tokio::spawn(async move {
        let (socket, _) = listener.accept().await.unwrap();
        let (read, mut write) = socket.into_split();
        let mut lines = BufReader::new(read).lines();
        let mut mode = "NORM".to_string();

        while let Ok(Some(line)) = lines.next_line().await {
            let line = line.trim().to_string();
            if let Some(arg) = line.strip_prefix("OUTP:OFF:MODE ") {
                mode = arg.to_string();
            } else if line == "OUTP:OFF:MODE?" {
                write.write_all(format!("{}\r\n", mode).as_bytes()).await.unwrap();
            } else if line == "SYST:ERR?" {
                write.write_all(b"nil\r\n").await.unwrap();
            }
        }
    });

    port
}

#[tokio::test]
async fn query_and_command_over_loopback() {
    let port = spawn_responder().await;
    let transport = TcpTransport::connect("127.0.0.1", port).await.unwrap();
    assert_eq!(transport.peer().port(), port);

    assert_eq!(transport.send_query("OUTP:OFF:MODE?").await.unwrap(), "NORM");
    transport.send_command("OUTP:OFF:MODE HIMP").await.unwrap();
    assert_eq!(transport.send_query("OUTP:OFF:MODE?").await.unwrap(), "HIMP");

    let nil = transport.send_query("SYST:ERR?").await.unwrap();
    assert!(transport.is_nil_reply(&nil));
}

#[tokio::test]
async fn silent_instrument_times_out() {
    let port = spawn_responder().await;
    let transport = TcpTransport::connect("localhost", port)
        .await
        .unwrap()
        .with_timeout(Duration::from_millis(100));

    let err = transport.send_query("*OPC?").await.unwrap_err();
    assert_eq!(err.kind, TransportErrorKind::Timeout);
}

#[tokio::test]
async fn port_applies_through_tcp() {
    let port = spawn_responder().await;
    let transport = TcpTransport::connect("127.0.0.1", port).await.unwrap();

    let mut mode = StateSyncPort::new(
        "output.mode",
        AttributeCommands::new("OUTP:OFF:MODE", "OUTP:OFF:MODE?"),
        EnumCodec::<OutputMode>::new().unwrap(),
        OutputMode::Normal,
        SyncContext::silent(Arc::new(transport)),
    );

    assert_eq!(mode.apply(OutputMode::Guard).await.unwrap(), OutputMode::Guard);
}
