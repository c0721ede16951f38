//! Buffered user-space copy from file to socket.

use super::Transmit;
use async_trait::async_trait;
use std::io;
use tokio::fs::File;
use tokio::io::{AsyncWriteExt, BufReader};
use tokio::net::TcpStream;

/// Read buffer size
const BUFFER_SIZE: usize = 64 * 1024;

/// Copies file contents through a user-space buffer until end of file.
#[derive(Debug, Default, Clone, Copy)]
pub struct CopyTransmitter;

impl CopyTransmitter {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Transmit for CopyTransmitter {
    async fn send(&self, stream: &mut TcpStream, file: File, _len: u64) -> io::Result<u64> {
        let mut reader = BufReader::with_capacity(BUFFER_SIZE, file);
        let written = tokio::io::copy_buf(&mut reader, stream).await?;
        stream.flush().await?;
        Ok(written)
    }

    fn name(&self) -> &'static str {
        "copy"
    }
}
