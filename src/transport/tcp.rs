use std::io;
use std::net::SocketAddr;
use std::sync::Arc;

use bytes::Bytes;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{Semaphore, mpsc};
use tracing::{debug, info, warn};

use crate::broker::{SharedBroker, SubscriberId, lock};
use crate::client::Client;
use crate::config::Settings;
use crate::protocol::FrameReader;

/// Binds the configured address and serves connections until the task is
/// cancelled.
pub async fn start_server(settings: &Settings, broker: SharedBroker) -> io::Result<()> {
    let addr = settings.address();
    let listener = TcpListener::bind(&addr).await?;
    info!("Broker listening on {addr}");
    serve(listener, broker, settings.broker.max_connections).await
}

/// Accept loop. At most `max_connections` connections are served at once;
/// extra ones are closed as soon as they are accepted.
pub async fn serve(
    listener: TcpListener,
    broker: SharedBroker,
    max_connections: usize,
) -> io::Result<()> {
    let permits = Arc::new(Semaphore::new(max_connections));

    loop {
        let (stream, peer) = match listener.accept().await {
            Ok(accepted) => accepted,
            Err(e) => {
                warn!("Failed to accept connection: {e}");
                continue;
            }
        };

        let Ok(permit) = permits.clone().try_acquire_owned() else {
            warn!("Connection limit of {max_connections} reached, rejecting {peer}");
            drop(stream);
            continue;
        };

        let broker = broker.clone();
        tokio::spawn(async move {
            handle_connection(stream, peer, broker).await;
            drop(permit);
        });
    }
}

async fn handle_connection(stream: TcpStream, peer: SocketAddr, broker: SharedBroker) {
    let (read_half, write_half) = stream.into_split();
    run_session(read_half, write_half, broker, peer.to_string()).await;
}

/// Serves one client until it hangs up, a read fails or a write fails,
/// then removes it from the broker.
pub(crate) async fn run_session<R, W>(
    read_half: R,
    mut write_half: W,
    broker: SharedBroker,
    peer: String,
) where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin + Send + 'static,
{
    // Create channel for this client
    let (tx, mut rx) = mpsc::unbounded_channel::<Bytes>();
    let client = Client::new(tx);
    let client_id = client.id.clone();
    lock(&broker).register_client(client);
    info!("{client_id} connected from {peer}");

    // Forward frames from broker to socket. Ends on a write error, or when
    // the client record, and with it the sender, is dropped.
    let writer_id = client_id.clone();
    let mut writer = tokio::spawn(async move {
        while let Some(frame) = rx.recv().await {
            if let Err(e) = write_half.write_all(&frame).await {
                warn!("Failed to send to {writer_id}: {e}");
                break;
            }
        }
        debug!("Send loop closed for {writer_id}");
    });

    let mut reader = FrameReader::new(read_half);
    let writer_finished = tokio::select! {
        _ = read_messages(&mut reader, &broker, &client_id) => false,
        result = &mut writer => {
            if let Err(e) = result {
                warn!("Writer task for {client_id} failed: {e}");
            }
            true
        }
    };

    lock(&broker).cleanup_client(&client_id);
    info!("{client_id} disconnected");
    if !writer_finished {
        if let Err(e) = writer.await {
            warn!("Writer task for {client_id} failed: {e}");
        }
    }
}

async fn read_messages<R: AsyncRead + Unpin>(
    reader: &mut FrameReader<R>,
    broker: &SharedBroker,
    client_id: &SubscriberId,
) {
    loop {
        match reader.read_message().await {
            Ok(Some(message)) => {
                lock(broker).handle_message(client_id, message);
            }
            Ok(None) => break,
            Err(e) if e.is_recoverable() => warn!("{client_id}: {e}"),
            Err(e) => {
                warn!("Dropping {client_id}: {e}");
                break;
            }
        }
    }
}
