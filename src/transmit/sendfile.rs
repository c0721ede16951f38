//! Zero-copy transfer with `sendfile(2)`.
//!
//! The socket stays non-blocking: each call is issued when tokio reports
//! the socket writable, and a short count just means the send buffer filled.

use super::{CopyTransmitter, Transmit};
use async_trait::async_trait;
use std::io;
use std::os::unix::io::AsRawFd;
use tokio::fs::File;
use tokio::io::Interest;
use tokio::net::TcpStream;
use tracing::warn;

/// Largest count Linux transfers in one `sendfile` call.
const MAX_CHUNK: u64 = 0x7fff_f000;

/// Kernel file-to-socket transfer.
///
/// If the kernel refuses the transfer before any byte has left, the file
/// is sent with [`CopyTransmitter`] instead. Once bytes are on the wire a
/// failure ends the response.
#[derive(Debug, Default, Clone, Copy)]
pub struct SendfileTransmitter {
    fallback: CopyTransmitter,
}

impl SendfileTransmitter {
    pub fn new() -> Self {
        Self {
            fallback: CopyTransmitter::new(),
        }
    }
}

#[async_trait]
impl Transmit for SendfileTransmitter {
    async fn send(&self, stream: &mut TcpStream, file: File, len: u64) -> io::Result<u64> {
        let socket_fd = stream.as_raw_fd();
        let file_fd = file.as_raw_fd();
        let mut offset: libc::off_t = 0;
        let mut sent: u64 = 0;

        while sent < len {
            let count = (len - sent).min(MAX_CHUNK) as usize;
            let result = stream
                .async_io(Interest::WRITABLE, || {
                    // SAFETY: both descriptors are owned by live objects for
                    // the duration of the call and `offset` is a valid pointer.
                    let n = unsafe { libc::sendfile(socket_fd, file_fd, &mut offset, count) };
                    if n < 0 {
                        Err(io::Error::last_os_error())
                    } else {
                        Ok(n as u64)
                    }
                })
                .await;

            match result {
                // File shrank underneath us
                Ok(0) => break,
                Ok(n) => sent += n,
                Err(e) if sent == 0 => {
                    warn!(error = %e, "sendfile unavailable, falling back to copy");
                    return self.fallback.send(stream, file, len).await;
                }
                Err(e) => return Err(e),
            }
        }

        Ok(sent)
    }

    fn name(&self) -> &'static str {
        "sendfile"
    }
}
