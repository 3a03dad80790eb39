//! WebSocket transport backed by tokio-tungstenite.

use crate::acquire::traits::{StreamConnection, StreamTransport, TransportEvent};
use crate::error::{AcquireError, Result};
use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

/// Close code reported when the peer closed without a close frame.
const NO_STATUS_CODE: u16 = 1005;
/// Close code reported when the stream ended abnormally (EOF, reset).
const ABNORMAL_CODE: u16 = 1006;

/// Opens WebSocket connections with `connect_async`.
pub struct WsTransport;

#[async_trait]
impl StreamTransport for WsTransport {
    async fn connect(&self, url: &str) -> Result<Box<dyn StreamConnection>> {
        let (socket, _response) = connect_async(url)
            .await
            .map_err(|e| AcquireError::transport_error(e.to_string()))?;
        Ok(Box::new(WsConnection { socket }))
    }
}

struct WsConnection {
    socket: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

#[async_trait]
impl StreamConnection for WsConnection {
    async fn next_event(&mut self) -> TransportEvent {
        loop {
            match self.socket.next().await {
                Some(Ok(Message::Text(text))) => return TransportEvent::Message(text),
                Some(Ok(Message::Close(frame))) => {
                    let code = frame
                        .map(|f| u16::from(f.code))
                        .unwrap_or(NO_STATUS_CODE);
                    return TransportEvent::Closed { code };
                }
                // Control and binary frames carry no samples.
                Some(Ok(_)) => continue,
                Some(Err(e)) => return TransportEvent::Error(e.to_string()),
                None => return TransportEvent::Closed { code: ABNORMAL_CODE },
            }
        }
    }

    async fn close(&mut self) {
        let _ = self
            .socket
            .send(Message::Close(Some(CloseFrame {
                code: CloseCode::Normal,
                reason: "".into(),
            })))
            .await;
        let _ = self.socket.close(None).await;
    }
}
