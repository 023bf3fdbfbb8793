// Push channel against a real WebSocket server on localhost.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use bunker_client::{ConnectionState, PushChannel, TungsteniteConnector};
use bunker_shared::PushEvent;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::Message;

const RECONNECT_DELAY: Duration = Duration::from_millis(50);
const WAIT: Duration = Duration::from_secs(5);

/// Accept links one after another. Link `i` is sent `script[i]` and then
/// closed, except the last one which stays open. Request paths are reported
/// on the returned receiver.
async fn serve(script: Vec<Vec<&'static str>>) -> anyhow::Result<(SocketAddr, mpsc::UnboundedReceiver<String>)> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    let (paths_tx, paths_rx) = mpsc::unbounded_channel();

    tokio::spawn(async move {
        let last = script.len().saturating_sub(1);
        for (index, frames) in script.into_iter().enumerate() {
            let Ok((stream, _)) = listener.accept().await else {
                return;
            };
            let paths_tx = paths_tx.clone();
            let callback = move |request: &Request, response: Response| -> Result<Response, ErrorResponse> {
                let _ = paths_tx.send(request.uri().to_string());
                Ok(response)
            };
            let Ok(mut ws) = tokio_tungstenite::accept_hdr_async(stream, callback).await else {
                return;
            };
            for frame in frames {
                if ws.send(Message::text(frame.to_string())).await.is_err() {
                    return;
                }
            }
            if index == last {
                // Keep the final link open until the test ends.
                while ws.next().await.is_some() {}
                return;
            }
            let _ = ws.close(None).await;
        }
    });

    Ok((addr, paths_rx))
}

async fn next_event(events: &mut futures_channel::mpsc::UnboundedReceiver<PushEvent>) -> Option<PushEvent> {
    tokio::time::timeout(WAIT, events.next()).await.ok().flatten()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn delivers_frames_in_order() -> anyhow::Result<()> {
    let (addr, mut paths) = serve(vec![vec![
        r#""Tick""#,
        r#"{"Broadcast":{"bunker":2,"name":"Ann","message":"anyone?"}}"#,
        "not json",
        r#""Message""#,
    ]])
    .await?;

    let url = format!("ws://{addr}/events?broadcast_id=b-1");
    let channel = PushChannel::new(url, Arc::new(TungsteniteConnector), RECONNECT_DELAY);
    let mut events = channel.subscribe();
    channel.connect().await?;
    assert_eq!(channel.state(), ConnectionState::Open);

    assert_eq!(next_event(&mut events).await, Some(PushEvent::Tick));
    match next_event(&mut events).await {
        Some(PushEvent::Broadcast(broadcast)) => {
            assert_eq!(broadcast.bunker_number, 2);
            assert_eq!(broadcast.text, "anyone?");
        }
        other => panic!("expected a broadcast, got {other:?}"),
    }
    assert_eq!(next_event(&mut events).await, Some(PushEvent::MessageArrived));

    let path = tokio::time::timeout(WAIT, paths.recv()).await?;
    assert_eq!(path.as_deref(), Some("/events?broadcast_id=b-1"));

    channel.disconnect();
    assert_eq!(channel.state(), ConnectionState::Inactive);
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn reconnects_after_server_close() -> anyhow::Result<()> {
    let (addr, mut paths) = serve(vec![vec![r#""Tick""#], vec![r#""Expedition""#]]).await?;

    let url = format!("ws://{addr}/events?broadcast_id=b-7");
    let channel = PushChannel::new(url, Arc::new(TungsteniteConnector), RECONNECT_DELAY);
    let mut events = channel.subscribe();
    channel.connect().await?;

    assert_eq!(next_event(&mut events).await, Some(PushEvent::Tick));
    // Arrives over the second link, after the flat reconnect delay.
    assert_eq!(next_event(&mut events).await, Some(PushEvent::ExpeditionResolved));

    for _ in 0..2 {
        let path = tokio::time::timeout(WAIT, paths.recv()).await?;
        assert_eq!(path.as_deref(), Some("/events?broadcast_id=b-7"));
    }

    let mut state = channel.watch_state();
    tokio::time::timeout(WAIT, state.wait_for(|s| s.is_open())).await??;
    channel.disconnect();
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn refused_handshake_is_reported() -> anyhow::Result<()> {
    // Bind and release a port so nothing is listening on it.
    let addr = TcpListener::bind("127.0.0.1:0").await?.local_addr()?;

    let url = format!("ws://{addr}/events?broadcast_id=b-1");
    let channel = PushChannel::new(url, Arc::new(TungsteniteConnector), Duration::from_secs(60));
    assert!(channel.connect().await.is_err());
    assert_eq!(channel.state(), ConnectionState::ReconnectScheduled);

    channel.disconnect();
    assert_eq!(channel.state(), ConnectionState::Inactive);
    Ok(())
}
