//! Length-prefixed framing
//!
//! Every message on the wire is a `u32` little-endian length followed by
//! that many payload bytes. A frame is either read completely or the read
//! fails, so a chunk payload can never come back short. The `_within`
//! variants bound how long a single read or write may stall, not the whole
//! frame.

use crate::{Error, Result};
use std::future::Future;
use std::io::ErrorKind;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::time::timeout;

/// Size of the length prefix
pub const FRAME_HEADER_LEN: usize = 4;

/// Largest payload a single frame may carry (64 MiB)
pub const MAX_FRAME_SIZE: usize = 64 * 1024 * 1024;

/// Write one frame and flush it
pub async fn write_frame<W>(writer: &mut W, payload: &[u8]) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    write_frame_within(writer, payload, None).await
}

/// Write one frame, failing if any single write makes no progress for `stall`
///
/// The limit applies per write call, so a large payload may take as long as
/// it needs while the peer keeps draining it.
pub async fn write_frame_within<W>(
    writer: &mut W,
    payload: &[u8],
    stall: Option<Duration>,
) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    if payload.len() > MAX_FRAME_SIZE {
        return Err(Error::FrameTooLarge {
            size: payload.len(),
            max: MAX_FRAME_SIZE,
        });
    }

    let header = (payload.len() as u32).to_le_bytes();
    write_fully(writer, &header, stall).await?;
    write_fully(writer, payload, stall).await?;
    bounded(stall, writer.flush()).await
}

/// Read one frame, failing on early end of stream
pub async fn read_frame<R>(reader: &mut R) -> Result<Vec<u8>>
where
    R: AsyncRead + Unpin,
{
    read_frame_within(reader, None).await
}

/// Read one frame, failing if any single read waits longer than `stall`
pub async fn read_frame_within<R>(reader: &mut R, stall: Option<Duration>) -> Result<Vec<u8>>
where
    R: AsyncRead + Unpin,
{
    match read_frame_or_eof_within(reader, stall).await? {
        Some(frame) => Ok(frame),
        None => Err(Error::Io(std::io::Error::new(
            ErrorKind::UnexpectedEof,
            "connection closed",
        ))),
    }
}

/// Read one frame, returning `None` if the peer closed before it began
pub async fn read_frame_or_eof<R>(reader: &mut R) -> Result<Option<Vec<u8>>>
where
    R: AsyncRead + Unpin,
{
    read_frame_or_eof_within(reader, None).await
}

async fn read_frame_or_eof_within<R>(
    reader: &mut R,
    stall: Option<Duration>,
) -> Result<Option<Vec<u8>>>
where
    R: AsyncRead + Unpin,
{
    let mut header = [0u8; FRAME_HEADER_LEN];
    match read_fully(reader, &mut header, stall).await? {
        0 => return Ok(None),
        FRAME_HEADER_LEN => {}
        _ => {
            return Err(Error::Io(std::io::Error::new(
                ErrorKind::UnexpectedEof,
                "connection closed inside frame header",
            )))
        }
    }

    let len = u32::from_le_bytes(header) as usize;
    if len > MAX_FRAME_SIZE {
        return Err(Error::FrameTooLarge {
            size: len,
            max: MAX_FRAME_SIZE,
        });
    }

    let mut payload = vec![0u8; len];
    if read_fully(reader, &mut payload, stall).await? < len {
        return Err(Error::Io(std::io::Error::new(
            ErrorKind::UnexpectedEof,
            "connection closed inside frame payload",
        )));
    }
    Ok(Some(payload))
}

/// Run one I/O step, bounded by `stall` when given
async fn bounded<T, F>(stall: Option<Duration>, io: F) -> Result<T>
where
    F: Future<Output = std::io::Result<T>>,
{
    match stall {
        Some(limit) => match timeout(limit, io).await {
            Ok(result) => Ok(result?),
            Err(_) => Err(Error::Timeout),
        },
        None => Ok(io.await?),
    }
}

/// Fill `buf` until it is full or the stream ends; returns the bytes read
async fn read_fully<R>(reader: &mut R, buf: &mut [u8], stall: Option<Duration>) -> Result<usize>
where
    R: AsyncRead + Unpin,
{
    let mut filled = 0;
    while filled < buf.len() {
        let n = bounded(stall, reader.read(&mut buf[filled..])).await?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    Ok(filled)
}

async fn write_fully<W>(writer: &mut W, mut buf: &[u8], stall: Option<Duration>) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    while !buf.is_empty() {
        let n = bounded(stall, writer.write(buf)).await?;
        if n == 0 {
            return Err(Error::Io(std::io::Error::new(
                ErrorKind::WriteZero,
                "connection closed",
            )));
        }
        buf = &buf[n..];
    }
    Ok(())
}
