//! TCP and UDP front door
//!
//! Both transports bind the same port. A TCP peer sends one payload and is
//! disconnected as soon as it arrives; a UDP datagram is one payload. Each
//! payload runs on its own task so a slow or failing run never holds up the
//! accept loops. On shutdown, connections that have not sent anything yet
//! are dropped; payloads already read are processed before `run` returns.

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream, UdpSocket};
use tokio::sync::watch;
use tokio::task::{JoinError, JoinSet};
use tracing::{debug, error, info, warn};

use crate::ingest::pipeline::Pipeline;

/// Largest payload read from a connection or datagram
pub const MAX_PAYLOAD_BYTES: usize = 4096;

/// Pause after a failed accept (e.g. out of file descriptors)
const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

pub struct Listener {
    tcp: TcpListener,
    udp: UdpSocket,
}

impl Listener {
    /// Bind TCP and UDP on `host:port`.
    ///
    /// With port 0 the UDP socket takes whatever port TCP was given.
    pub async fn bind(host: &str, port: u16) -> io::Result<Self> {
        let tcp = TcpListener::bind((host, port)).await?;
        let port = tcp.local_addr()?.port();
        let udp = UdpSocket::bind((host, port)).await?;
        Ok(Self { tcp, udp })
    }

    pub fn tcp_addr(&self) -> io::Result<SocketAddr> {
        self.tcp.local_addr()
    }

    pub fn udp_addr(&self) -> io::Result<SocketAddr> {
        self.udp.local_addr()
    }

    /// Serve both transports until `shutdown` flips to `true` (or its sender is dropped)
    pub async fn run(
        self,
        pipeline: Arc<Pipeline>,
        shutdown: watch::Receiver<bool>,
    ) -> io::Result<()> {
        info!("TCP server is running on {}", self.tcp.local_addr()?);
        info!("UDP server is running on {}", self.udp.local_addr()?);

        tokio::try_join!(
            serve_tcp(self.tcp, Arc::clone(&pipeline), shutdown.clone()),
            serve_udp(self.udp, pipeline, shutdown),
        )?;
        Ok(())
    }
}

async fn serve_tcp(
    listener: TcpListener,
    pipeline: Arc<Pipeline>,
    mut shutdown: watch::Receiver<bool>,
) -> io::Result<()> {
    let mut tasks = JoinSet::new();

    loop {
        tokio::select! {
            accepted = listener.accept() => match accepted {
                Ok((socket, peer)) => {
                    info!("CONNECTED: {}", peer);
                    tasks.spawn(handle_connection(
                        socket,
                        peer,
                        Arc::clone(&pipeline),
                        shutdown.clone(),
                    ));
                }
                Err(e) => {
                    warn!("Failed to accept TCP connection: {}", e);
                    tokio::time::sleep(ACCEPT_BACKOFF).await;
                }
            },
            Some(joined) = tasks.join_next(), if !tasks.is_empty() => log_join(joined),
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
        }
    }

    info!("TCP server stopped accepting, draining {} tasks", tasks.len());
    while let Some(joined) = tasks.join_next().await {
        log_join(joined);
    }
    Ok(())
}

async fn handle_connection(
    mut socket: TcpStream,
    peer: SocketAddr,
    pipeline: Arc<Pipeline>,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut buf = vec![0u8; MAX_PAYLOAD_BYTES];
    let read = tokio::select! {
        read = socket.read(&mut buf) => read,
        // A dropped sender counts as shutdown, same as in the accept loop
        _ = shutdown.wait_for(|stop| *stop) => {
            info!("CLOSED: {} (shutting down before any data)", peer);
            return;
        }
    };

    // One payload per connection: hang up before processing
    if let Err(e) = socket.shutdown().await {
        debug!("Error closing connection from {}: {}", peer, e);
    }
    drop(socket);
    info!("CLOSED: {}", peer);

    match read {
        Ok(0) => debug!("Connection from {} closed without data", peer),
        Ok(n) => {
            pipeline.process(&buf[..n]).await;
        }
        Err(e) => warn!("Failed to read from {}: {}", peer, e),
    }
}

async fn serve_udp(
    socket: UdpSocket,
    pipeline: Arc<Pipeline>,
    mut shutdown: watch::Receiver<bool>,
) -> io::Result<()> {
    let mut tasks = JoinSet::new();
    let mut buf = vec![0u8; MAX_PAYLOAD_BYTES];

    loop {
        tokio::select! {
            received = socket.recv_from(&mut buf) => match received {
                Ok((n, peer)) => {
                    debug!("Datagram of {} bytes from {}", n, peer);
                    let payload = buf[..n].to_vec();
                    let pipeline = Arc::clone(&pipeline);
                    tasks.spawn(async move {
                        pipeline.process(&payload).await;
                    });
                }
                Err(e) => warn!("Failed to receive datagram: {}", e),
            },
            Some(joined) = tasks.join_next(), if !tasks.is_empty() => log_join(joined),
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
        }
    }

    info!("UDP server stopped receiving, draining {} tasks", tasks.len());
    while let Some(joined) = tasks.join_next().await {
        log_join(joined);
    }
    Ok(())
}

fn log_join(joined: Result<(), JoinError>) {
    if let Err(e) = joined {
        error!("An error has occurred processing one payload: {}", e);
    }
}
