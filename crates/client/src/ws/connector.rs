//! Opening the underlying socket for a push channel.

use async_trait::async_trait;
use futures_util::stream::{self, BoxStream};
use futures_util::StreamExt;
use tokio_tungstenite::{connect_async, tungstenite::Message};

use crate::error::TransportError;

/// Text frames from one open link, in arrival order. The stream ends when the
/// link closes.
pub type FrameStream = BoxStream<'static, Result<String, TransportError>>;

/// Factory for push links. The channel calls it once per (re)connect attempt.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Open a link to `url`, resolving once the handshake has completed.
    async fn connect(&self, url: &str) -> Result<FrameStream, TransportError>;
}

/// WebSocket links via tokio-tungstenite.
#[derive(Debug, Clone, Copy, Default)]
pub struct TungsteniteConnector;

#[async_trait]
impl Connector for TungsteniteConnector {
    async fn connect(&self, url: &str) -> Result<FrameStream, TransportError> {
        let (ws_stream, _response) = connect_async(url)
            .await
            .map_err(|e| TransportError::Handshake(e.to_string()))?;

        let frames = stream::unfold(ws_stream, |mut ws| async move {
            loop {
                match ws.next().await? {
                    Ok(Message::Text(text)) => return Some((Ok(text.to_string()), ws)),
                    Ok(Message::Close(frame)) => {
                        crate::log_debug!("Push link received close frame: {:?}", frame);
                        return None;
                    }
                    Ok(Message::Ping(_)) => {
                        // Pong is handled automatically by tungstenite
                    }
                    Ok(_) => {
                        // Ignore binary, pong, etc.
                    }
                    Err(e) => return Some((Err(TransportError::Read(e.to_string())), ws)),
                }
            }
        });

        Ok(frames.boxed())
    }
}
