//! Packet stream over one TCP connection, shared by the client and backend
//! connection types.

use crate::error::ConnError;
use shared::codec::{self, CodecError};
use shared::Packet;
use std::net::SocketAddr;
use tokio::io::AsyncWriteExt;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::{watch, Mutex};

/// Split TCP stream with a close signal that wakes blocked readers.
pub struct FramedStream {
    peer_addr: SocketAddr,
    reader: Mutex<OwnedReadHalf>,
    writer: Mutex<OwnedWriteHalf>,
    closed_tx: watch::Sender<bool>,
}

impl FramedStream {
    pub fn new(stream: TcpStream) -> Result<Self, ConnError> {
        stream.set_nodelay(true).map_err(CodecError::from)?;
        let peer_addr = stream.peer_addr().map_err(CodecError::from)?;
        let (reader, writer) = stream.into_split();
        let (closed_tx, _) = watch::channel(false);

        Ok(Self {
            peer_addr,
            reader: Mutex::new(reader),
            writer: Mutex::new(writer),
            closed_tx,
        })
    }

    pub fn peer_addr(&self) -> SocketAddr {
        self.peer_addr
    }

    pub fn is_closed(&self) -> bool {
        *self.closed_tx.borrow()
    }

    /// Reads the next packet, failing with [`ConnError::Closed`] as soon as
    /// [`close`](Self::close) is called.
    pub async fn read(&self) -> Result<Packet, ConnError> {
        let mut closed = self.closed_tx.subscribe();
        if self.is_closed() {
            return Err(ConnError::Closed);
        }

        let mut reader = self.reader.lock().await;
        tokio::select! {
            _ = closed.changed() => Err(ConnError::Closed),
            result = codec::read_packet(&mut *reader) => match result {
                Ok(packet) => Ok(packet),
                Err(CodecError::Closed) => Err(ConnError::Closed),
                Err(e) => Err(e.into()),
            },
        }
    }

    pub async fn write(&self, packet: &Packet) -> Result<(), ConnError> {
        if self.is_closed() {
            return Err(ConnError::Closed);
        }

        let mut writer = self.writer.lock().await;
        codec::write_packet(&mut *writer, packet).await?;
        Ok(())
    }

    /// Closes the stream once; later calls report [`ConnError::Closed`].
    pub async fn close(&self) -> Result<(), ConnError> {
        if self.closed_tx.send_replace(true) {
            return Err(ConnError::Closed);
        }

        let mut writer = self.writer.lock().await;
        let _ = writer.shutdown().await;
        Ok(())
    }
}
