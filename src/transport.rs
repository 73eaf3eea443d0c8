//! Byte-stream transport boundary.
//!
//! The bridge never touches a socket directly: it talks to a
//! [`TransportLink`], a pair of channels carrying raw bytes out and
//! [`TransportEvent`]s in. [`connect_tcp`] provides the stock TCP
//! implementation (serial-over-IP adapters); embedders with another medium
//! build a link from [`TransportLink::pair`] and drive the far ends
//! themselves. Reconnection is the embedder's problem.

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpStream, ToSocketAddrs};
use tokio::sync::mpsc;
use tracing::{debug, trace};

use crate::Result;

const CHANNEL_CAPACITY: usize = 64;
const READ_BUF_SIZE: usize = 1024;

/// Something the byte stream did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// Stream is up and bytes may flow.
    Opened,
    /// Bytes arrived. Chunk boundaries are arbitrary.
    Data(Vec<u8>),
    /// The stream failed.
    Error(String),
    /// The stream ended.
    Closed,
}

/// The bridge's two ends of a transport.
pub struct TransportLink {
    /// Outbound wire bytes.
    pub tx: mpsc::Sender<Vec<u8>>,
    /// Inbound stream events.
    pub rx: mpsc::Receiver<TransportEvent>,
}

impl TransportLink {
    /// Build a link plus its far ends, for custom transports and tests.
    pub fn pair() -> (Self, mpsc::Sender<TransportEvent>, mpsc::Receiver<Vec<u8>>) {
        let (byte_tx, byte_rx) = mpsc::channel(CHANNEL_CAPACITY);
        let (event_tx, event_rx) = mpsc::channel(CHANNEL_CAPACITY);
        (
            Self {
                tx: byte_tx,
                rx: event_rx,
            },
            event_tx,
            byte_rx,
        )
    }
}

/// Connect to a serial-over-IP endpoint and spawn the reader/writer tasks.
///
/// `Opened` is delivered before any data. A read error surfaces as `Error`
/// followed by `Closed`; a clean EOF as `Closed` alone.
pub async fn connect_tcp(addr: impl ToSocketAddrs) -> Result<TransportLink> {
    let stream = TcpStream::connect(addr).await?;
    let (mut reader, mut writer) = stream.into_split();

    let (link, event_tx, mut byte_rx) = TransportLink::pair();
    // Capacity reserved at construction, cannot fail.
    let _ = event_tx.try_send(TransportEvent::Opened);

    let read_events = event_tx.clone();
    tokio::spawn(async move {
        let mut buf = vec![0u8; READ_BUF_SIZE];
        loop {
            match reader.read(&mut buf).await {
                Ok(0) => break,
                Ok(n) => {
                    trace!(bytes = n, "transport read");
                    if read_events
                        .send(TransportEvent::Data(buf[..n].to_vec()))
                        .await
                        .is_err()
                    {
                        return;
                    }
                }
                Err(e) => {
                    let _ = read_events.send(TransportEvent::Error(e.to_string())).await;
                    break;
                }
            }
        }
        let _ = read_events.send(TransportEvent::Closed).await;
    });

    tokio::spawn(async move {
        while let Some(bytes) = byte_rx.recv().await {
            trace!(bytes = bytes.len(), "transport write");
            if let Err(e) = writer.write_all(&bytes).await {
                debug!(error = %e, "transport write failed");
                let _ = event_tx.send(TransportEvent::Error(e.to_string())).await;
                break;
            }
        }
    });

    Ok(link)
}
