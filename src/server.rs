//! TCP server for handling Gopher connections.
//!
//! Each accepted connection gets its own task that reads one selector,
//! writes one response and closes. Tasks share only read-only state.

use crate::config::Config;
use crate::gopher::{read_selector, resolve, Lister, Listing, RequestError, ResourceKind};
use crate::transmit::{self, Transmit};
use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::fs::File;
use tokio::io::{AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, error, info, trace, warn};

/// Pause before retrying after a resource-exhaustion accept error
const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

type ConnectionResult = Result<(), Box<dyn std::error::Error + Send + Sync>>;

/// State every connection task reads from.
struct Context {
    config: Config,
    lister: Arc<Lister>,
    transmitter: Arc<dyn Transmit>,
}

/// Server instance
pub struct Server {
    context: Arc<Context>,
}

impl Server {
    /// Create a new server instance
    pub fn new(config: Config) -> Self {
        let lister = Lister::new(config.host.clone(), config.port, config.types.clone());
        let transmitter = transmit::platform(config.sendfile);

        Server {
            context: Arc::new(Context {
                config,
                lister: Arc::new(lister),
                transmitter,
            }),
        }
    }

    /// Bind the configured listen address.
    pub async fn bind(&self) -> io::Result<TcpListener> {
        let config = &self.context.config;
        let mut last_err = None;

        for addr in tokio::net::lookup_host((config.address.as_str(), config.port)).await? {
            match create_listener(addr) {
                Ok(listener) => return TcpListener::from_std(listener),
                Err(e) => {
                    debug!(address = %addr, error = %e, "Bind attempt failed");
                    last_err = Some(e);
                }
            }
        }

        Err(last_err.unwrap_or_else(|| {
            io::Error::new(
                io::ErrorKind::AddrNotAvailable,
                format!("no addresses for {}", config.listen_addr()),
            )
        }))
    }

    /// Start the server and begin accepting connections
    pub async fn run(&self) -> Result<(), Box<dyn std::error::Error>> {
        let listener = self.bind().await?;
        info!(
            address = %listener.local_addr()?,
            transmitter = self.context.transmitter.name(),
            "Server listening"
        );

        self.serve(listener).await;
        Ok(())
    }

    /// Accept connections forever, one task per connection.
    pub async fn serve(&self, listener: TcpListener) {
        loop {
            match listener.accept().await {
                Ok((stream, addr)) => {
                    debug!(peer = %addr, "New connection");

                    let context = Arc::clone(&self.context);

                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(stream, context).await {
                            debug!(peer = %addr, error = %e, "Connection error");
                        }
                    });
                }
                Err(e) => {
                    error!(error = %e, "Failed to accept connection");
                    let delay = accept_retry_delay(&e);
                    if !delay.is_zero() {
                        tokio::time::sleep(delay).await;
                    }
                }
            }
        }
    }
}

/// How long to pause after a failed accept.
///
/// Errors from a single aborted handshake are retried at once; anything
/// else (out of descriptors, out of memory) repeats until resources free
/// up, so the loop backs off.
fn accept_retry_delay(error: &io::Error) -> Duration {
    match error.kind() {
        io::ErrorKind::ConnectionAborted
        | io::ErrorKind::ConnectionReset
        | io::ErrorKind::Interrupted
        | io::ErrorKind::WouldBlock => Duration::ZERO,
        _ => ACCEPT_BACKOFF,
    }
}

/// Create a TCP listener with SO_REUSEADDR so restarts can rebind at once.
fn create_listener(addr: SocketAddr) -> io::Result<std::net::TcpListener> {
    let socket = socket2::Socket::new(
        match addr {
            SocketAddr::V4(_) => socket2::Domain::IPV4,
            SocketAddr::V6(_) => socket2::Domain::IPV6,
        },
        socket2::Type::STREAM,
        Some(socket2::Protocol::TCP),
    )?;

    socket.set_reuse_address(true)?;
    socket.set_nonblocking(true)?;
    socket.bind(&addr.into())?;
    socket.listen(1024)?;

    Ok(socket.into())
}

/// Handle a single client connection
async fn handle_connection(mut stream: TcpStream, context: Arc<Context>) -> ConnectionResult {
    let result = respond(&mut stream, &context).await;

    if let Err(e) = stream.shutdown().await {
        trace!(error = %e, "Shutdown failed");
    }
    trace!("Connection closed");

    result
}

/// Read the selector, resolve it and write the matching response.
async fn respond(stream: &mut TcpStream, context: &Context) -> ConnectionResult {
    let config = &context.config;

    let selector = {
        let mut reader = BufReader::new(&mut *stream);
        match with_deadline(config.read_timeout, read_selector(&mut reader)).await {
            Ok(result) => result,
            Err(_) => {
                debug!("Timed out waiting for selector");
                Err(RequestError::Invalid)
            }
        }
    };
    let selector = match selector {
        Ok(selector) => selector,
        Err(e) => return respond_error(stream, config.write_timeout, e).await,
    };

    trace!(selector = %selector, "Processing request");

    let resolved = match resolve(&config.root, &selector).await {
        Ok(resolved) => resolved,
        Err(e) => {
            debug!(selector = %selector, error = %e, "Request failed");
            return respond_error(stream, config.write_timeout, e).await;
        }
    };

    match resolved.kind {
        ResourceKind::Directory => {
            let lister = Arc::clone(&context.lister);
            let path = resolved.path.clone();
            let menu_selector = resolved.selector.clone();
            let listing =
                tokio::task::spawn_blocking(move || lister.list(&path, &menu_selector)).await?;

            let listing = match listing {
                Ok(listing) => listing,
                Err(e) => {
                    warn!(path = %resolved.path.display(), error = %e, "Failed to list directory");
                    return respond_error(stream, config.write_timeout, RequestError::NotFound)
                        .await;
                }
            };

            debug!(selector = %resolved.selector, entries = listing.len(), "Sending menu");
            write_all(stream, config.write_timeout, &listing.render()).await
        }

        ResourceKind::File { len } => {
            let file = match File::open(&resolved.path).await {
                Ok(file) => file,
                Err(e) => {
                    warn!(path = %resolved.path.display(), error = %e, "Failed to open file");
                    return respond_error(stream, config.write_timeout, RequestError::Open).await;
                }
            };

            let transfer = context.transmitter.send(stream, file, len);
            match with_deadline(config.write_timeout, transfer).await {
                Ok(Ok(bytes)) => {
                    debug!(selector = %resolved.selector, bytes, "Sent file");
                    Ok(())
                }
                Ok(Err(e)) => {
                    warn!(selector = %resolved.selector, error = %e, "File transfer failed");
                    Err(e.into())
                }
                Err(_) => {
                    warn!(selector = %resolved.selector, "File transfer timed out");
                    Err(timed_out().into())
                }
            }
        }
    }
}

/// Write the single-line error menu for `error`.
async fn respond_error(
    stream: &mut TcpStream,
    deadline: Option<Duration>,
    error: RequestError,
) -> ConnectionResult {
    let listing = Listing::error(error.to_string());
    write_all(stream, deadline, &listing.render()).await
}

async fn write_all(
    stream: &mut TcpStream,
    deadline: Option<Duration>,
    data: &[u8],
) -> ConnectionResult {
    let write = async {
        stream.write_all(data).await?;
        stream.flush().await
    };

    match with_deadline(deadline, write).await {
        Ok(result) => Ok(result?),
        Err(_) => Err(timed_out().into()),
    }
}

/// Run `future` under an optional deadline.
async fn with_deadline<F: Future>(
    deadline: Option<Duration>,
    future: F,
) -> Result<F::Output, tokio::time::error::Elapsed> {
    match deadline {
        Some(deadline) => tokio::time::timeout(deadline, future).await,
        None => Ok(future.await),
    }
}

fn timed_out() -> io::Error {
    io::Error::new(io::ErrorKind::TimedOut, "deadline exceeded")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gopher::TypeMap;
    use std::fs;
    use std::path::Path;
    use tokio::io::AsyncReadExt;

    fn test_config(root: &Path, sendfile: bool) -> Config {
        Config {
            host: "h".to_string(),
            address: "127.0.0.1".to_string(),
            port: 0,
            root: fs::canonicalize(root).unwrap(),
            read_timeout: Some(Duration::from_secs(5)),
            write_timeout: Some(Duration::from_secs(5)),
            sendfile,
            types: TypeMap::new(),
            log_level: "info".to_string(),
        }
    }

    /// Start a server on an ephemeral port and return its address.
    async fn start(config: Config) -> SocketAddr {
        let server = Server::new(config);
        let listener = server.bind().await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move { server.serve(listener).await });
        addr
    }

    async fn request(addr: SocketAddr, payload: &[u8]) -> Vec<u8> {
        let mut stream = TcpStream::connect(addr).await.unwrap();
        stream.write_all(payload).await.unwrap();
        let mut response = Vec::new();
        stream.read_to_end(&mut response).await.unwrap();
        response
    }

    fn fixture() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("readme.txt"), b"Welcome to gopherspace\n").unwrap();
        fs::create_dir(dir.path().join("docs")).unwrap();
        fs::write(dir.path().join("docs").join("guide.txt"), b"guide").unwrap();
        dir
    }

    #[tokio::test]
    async fn test_root_menu() {
        let dir = fixture();
        let addr = start(test_config(dir.path(), true)).await;

        let response = request(addr, b"\r\n").await;
        assert_eq!(
            response,
            b"1docs\t/docs\th\t0\r\n0readme.txt\t/readme.txt\th\t0\r\n.\r\n"
        );
    }

    #[tokio::test]
    async fn test_subdirectory_menu() {
        let dir = fixture();
        let addr = start(test_config(dir.path(), true)).await;

        let response = request(addr, b"/docs\r\n").await;
        assert_eq!(response, b"0guide.txt\t/docs/guide.txt\th\t0\r\n.\r\n");
    }

    #[tokio::test]
    async fn test_missing_selector() {
        let dir = fixture();
        let addr = start(test_config(dir.path(), true)).await;

        let response = request(addr, b"/missing\r\n").await;
        assert_eq!(response, b"3not found\t\t\t\r\n.\r\n");
    }

    #[tokio::test]
    async fn test_file_is_sent_raw() {
        let dir = fixture();
        for sendfile in [true, false] {
            let addr = start(test_config(dir.path(), sendfile)).await;
            let response = request(addr, b"/readme.txt\r\n").await;
            assert_eq!(response, b"Welcome to gopherspace\n");
        }
    }

    #[tokio::test]
    async fn test_traversal_is_contained() {
        let outer = tempfile::tempdir().unwrap();
        let root = outer.path().join("root");
        fs::create_dir(&root).unwrap();
        fs::write(outer.path().join("secret.txt"), b"secret").unwrap();
        let addr = start(test_config(&root, true)).await;

        let response = request(addr, b"../secret.txt\r\n").await;
        assert_eq!(response, b"3not found\t\t\t\r\n.\r\n");

        let response = request(addr, b"/../../..\r\n").await;
        assert_eq!(response, b".\r\n");
    }

    #[tokio::test]
    async fn test_empty_connection() {
        let dir = fixture();
        let addr = start(test_config(dir.path(), true)).await;

        let mut stream = TcpStream::connect(addr).await.unwrap();
        stream.shutdown().await.unwrap();
        let mut response = Vec::new();
        stream.read_to_end(&mut response).await.unwrap();
        assert_eq!(response, b"3invalid request\t\t\t\r\n.\r\n");
    }

    #[tokio::test]
    async fn test_silent_client_times_out() {
        let dir = fixture();
        let mut config = test_config(dir.path(), true);
        config.read_timeout = Some(Duration::from_millis(100));
        let addr = start(config).await;

        let mut stream = TcpStream::connect(addr).await.unwrap();
        let mut response = Vec::new();
        tokio::time::timeout(Duration::from_secs(5), stream.read_to_end(&mut response))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(response, b"3invalid request\t\t\t\r\n.\r\n");
    }

    #[tokio::test]
    async fn test_stalled_reader_hits_write_deadline() {
        let dir = tempfile::tempdir().unwrap();
        let size = 64 * 1024 * 1024;
        fs::write(dir.path().join("large.bin"), vec![0u8; size]).unwrap();

        for sendfile in [true, false] {
            let mut config = test_config(dir.path(), sendfile);
            config.write_timeout = Some(Duration::from_millis(300));
            let addr = start(config).await;

            let mut stream = TcpStream::connect(addr).await.unwrap();
            stream.write_all(b"/large.bin\r\n").await.unwrap();

            // Stop reading until well past the write deadline.
            tokio::time::sleep(Duration::from_secs(1)).await;

            let mut received = Vec::new();
            tokio::time::timeout(Duration::from_secs(5), stream.read_to_end(&mut received))
                .await
                .expect("connection was not closed after the write deadline")
                .unwrap();
            assert!(
                received.len() < size,
                "sendfile={sendfile}: whole file arrived despite the deadline"
            );
        }
    }

    #[test]
    fn test_accept_retry_delay() {
        let aborted = io::Error::from(io::ErrorKind::ConnectionAborted);
        assert_eq!(accept_retry_delay(&aborted), Duration::ZERO);

        let reset = io::Error::from(io::ErrorKind::ConnectionReset);
        assert_eq!(accept_retry_delay(&reset), Duration::ZERO);

        let emfile = io::Error::from_raw_os_error(libc::EMFILE);
        assert_eq!(accept_retry_delay(&emfile), ACCEPT_BACKOFF);

        let enomem = io::Error::from_raw_os_error(libc::ENOMEM);
        assert_eq!(accept_retry_delay(&enomem), ACCEPT_BACKOFF);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_unreadable_file() {
        use std::os::unix::fs::PermissionsExt;

        let dir = fixture();
        let locked = dir.path().join("locked.txt");
        fs::write(&locked, b"nope").unwrap();
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o000)).unwrap();

        // Privileged users can open the file regardless of mode.
        if fs::File::open(&locked).is_ok() {
            return;
        }

        let addr = start(test_config(dir.path(), true)).await;
        let response = request(addr, b"/locked.txt\r\n").await;
        assert_eq!(response, b"3couldn't open file\t\t\t\r\n.\r\n");
    }

    #[tokio::test]
    async fn test_error_and_menu_always_terminated() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("empty")).unwrap();
        let addr = start(test_config(dir.path(), true)).await;

        for payload in [&b"/empty\r\n"[..], b"/nope\r\n", b"\r\n"] {
            let response = request(addr, payload).await;
            assert!(response.ends_with(b".\r\n"), "{payload:?}: {response:?}");
        }
    }
}
