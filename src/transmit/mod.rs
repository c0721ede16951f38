//! File transmission strategies.
//!
//! File responses are the raw bytes of the file with no framing. Two
//! interchangeable strategies implement [`Transmit`]:
//! - `copy`: buffered user-space copy, available everywhere
//! - `sendfile`: kernel zero-copy transfer (Linux and Android)
//!
//! The connection handler only sees the trait; [`platform`] picks the
//! implementation once at startup.

mod copy;
#[cfg(any(target_os = "linux", target_os = "android"))]
mod sendfile;

pub use copy::CopyTransmitter;
#[cfg(any(target_os = "linux", target_os = "android"))]
pub use sendfile::SendfileTransmitter;

use async_trait::async_trait;
use std::io;
use std::sync::Arc;
use tokio::fs::File;
use tokio::net::TcpStream;

/// Streams an opened file to a client connection.
#[async_trait]
pub trait Transmit: Send + Sync {
    /// Send `len` bytes of `file` to `stream`, returning the bytes written.
    async fn send(&self, stream: &mut TcpStream, file: File, len: u64) -> io::Result<u64>;

    /// Short name for logs.
    fn name(&self) -> &'static str;
}

/// Select the transmitter for this platform.
///
/// With `zero_copy` disabled, or on targets without `sendfile`, the generic
/// copy strategy is used.
pub fn platform(zero_copy: bool) -> Arc<dyn Transmit> {
    #[cfg(any(target_os = "linux", target_os = "android"))]
    {
        if zero_copy {
            return Arc::new(SendfileTransmitter::new());
        }
    }

    #[cfg(not(any(target_os = "linux", target_os = "android")))]
    let _ = zero_copy;

    Arc::new(CopyTransmitter::new())
}
