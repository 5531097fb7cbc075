//! Per-connection request handling on a storage node
//!
//! Store calls may touch the disk, so each one runs on the blocking pool
//! rather than on the connection's task.

use crate::protocol::{self, read_frame, read_frame_or_eof, write_frame, Request};
use crate::storage::ChunkStorage;
use crate::{Error, Result, CHUNK_COUNT};
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::watch;
use tracing::{debug, warn};

/// Serve requests on one connection until the peer leaves or shutdown starts
///
/// Shutdown is only observed between requests; a request that has begun is
/// answered first.
pub async fn serve_connection<T, S>(
    mut stream: T,
    store: Arc<S>,
    mut shutdown: watch::Receiver<bool>,
) -> Result<()>
where
    T: AsyncRead + AsyncWrite + Unpin,
    S: ChunkStorage + 'static,
{
    loop {
        if *shutdown.borrow() {
            return Ok(());
        }

        let frame = tokio::select! {
            frame = read_frame_or_eof(&mut stream) => frame?,
            _ = shutdown.changed() => return Ok(()),
        };
        let Some(frame) = frame else {
            debug!("peer disconnected");
            return Ok(());
        };

        let text = String::from_utf8_lossy(&frame).into_owned();
        match Request::parse(&text) {
            Ok(request) => handle_request(&mut stream, &store, request).await?,
            Err(e) => {
                debug!("rejecting request {:?}: {}", text, e);
                reply(&mut stream, &protocol::error_reply(&e.to_string())).await?;
            }
        }
    }
}

async fn reply<T>(stream: &mut T, text: &str) -> Result<()>
where
    T: AsyncWrite + Unpin,
{
    write_frame(stream, text.as_bytes()).await
}

/// Run a store operation on the blocking pool
async fn on_store<S, R, F>(store: &Arc<S>, op: F) -> Result<R>
where
    S: ChunkStorage + 'static,
    R: Send + 'static,
    F: FnOnce(&S) -> Result<R> + Send + 'static,
{
    let store = Arc::clone(store);
    tokio::task::spawn_blocking(move || op(&store))
        .await
        .map_err(|e| Error::Io(std::io::Error::other(e)))?
}

async fn handle_request<T, S>(stream: &mut T, store: &Arc<S>, request: Request) -> Result<()>
where
    T: AsyncRead + AsyncWrite + Unpin,
    S: ChunkStorage + 'static,
{
    debug!("request: {}", request);

    match request {
        Request::Put {
            name,
            chunk_size,
            file_size,
        } => handle_put(stream, store, name, chunk_size, file_size).await,
        Request::Chunk { .. } => reply(stream, &protocol::error_reply("CHUNK outside PUT")).await,
        Request::Get { name, number } => {
            let key = name.clone();
            match on_store(store, move |s| s.load_chunk(&key, number)).await {
                Ok(Some(data)) => {
                    reply(stream, &protocol::data_reply(data.len() as u64)).await?;
                    write_frame(stream, &data).await
                }
                Ok(None) => reply(stream, &protocol::error_reply("file not found")).await,
                Err(e) => {
                    warn!("loading {} chunk {} failed: {}", name, number, e);
                    reply(stream, &protocol::error_reply(&e.to_string())).await
                }
            }
        }
        Request::List => match on_store(store, |s| s.list_files()).await {
            Ok(names) => reply(stream, &protocol::list_reply(&names)).await,
            Err(e) => {
                warn!("listing failed: {}", e);
                reply(stream, &protocol::error_reply(&e.to_string())).await
            }
        },
        Request::Check { name } => {
            let key = name.clone();
            let answer = match on_store(store, move |s| s.has_file(&key)).await {
                Ok(true) => protocol::EXISTS,
                Ok(false) => protocol::NOT_FOUND,
                Err(e) => {
                    warn!("checking {} failed: {}", name, e);
                    protocol::NOT_FOUND
                }
            };
            reply(stream, answer).await
        }
        Request::Size { name } => {
            let key = name.clone();
            let looked_up =
                on_store(store, move |s| Ok((s.chunk_size(&key)?, s.file_size(&key)?))).await;
            let sizes = match looked_up {
                Ok((Some(chunk_size), file_size)) => Some((
                    chunk_size,
                    file_size.unwrap_or(chunk_size * CHUNK_COUNT as u64),
                )),
                Ok((None, _)) => None,
                Err(e) => {
                    warn!("sizing {} failed: {}", name, e);
                    None
                }
            };
            reply(stream, &protocol::size_reply(sizes)).await
        }
    }
}

/// Receive the two chunks announced by a PUT and store them
async fn handle_put<T, S>(
    stream: &mut T,
    store: &Arc<S>,
    name: String,
    chunk_size: u64,
    file_size: Option<u64>,
) -> Result<()>
where
    T: AsyncRead + AsyncWrite + Unpin,
    S: ChunkStorage + 'static,
{
    let mut received = Vec::with_capacity(2);
    for _ in 0..2 {
        let header = read_frame(stream).await?;
        let number = match Request::parse(&String::from_utf8_lossy(&header)) {
            Ok(Request::Chunk { number }) => number,
            _ => {
                reply(stream, &protocol::error_reply("expected CHUNK header")).await?;
                return Err(Error::protocol("client", "PUT without CHUNK header"));
            }
        };
        let payload = read_frame(stream).await?;
        received.push((number, payload));
    }

    if let Some((number, payload)) = received
        .iter()
        .find(|(_, payload)| payload.len() as u64 != chunk_size)
    {
        let message = format!(
            "chunk {} is {} bytes, expected {}",
            number,
            payload.len(),
            chunk_size
        );
        return reply(stream, &protocol::error_reply(&message)).await;
    }

    let numbers = [received[0].0, received[1].0];
    let key = name.clone();
    let stored = on_store(store, move |s| {
        for (number, payload) in &received {
            s.store_chunk(&key, *number, payload)?;
        }
        match file_size {
            Some(size) => s.record_file_size(&key, size),
            None => Ok(()),
        }
    })
    .await;

    match stored {
        Ok(()) => {
            debug!("stored {} chunks {} and {}", name, numbers[0], numbers[1]);
            reply(stream, protocol::OK).await
        }
        Err(e) => {
            warn!("storing {} failed: {}", name, e);
            reply(stream, &protocol::error_reply(&e.to_string())).await
        }
    }
}
