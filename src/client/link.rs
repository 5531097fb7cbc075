//! Connection to a single storage node
//!
//! Every individual read and write is bounded by the I/O timeout, so a slow
//! but steady transfer is fine while a stalled one is not. A timeout or
//! broken stream surfaces as an error the caller uses to retire the link.

use crate::client::NodeSpec;
use crate::protocol::{self, read_frame_within, write_frame_within, Request};
use crate::{Error, Result};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::time::timeout;

/// Live connection to a storage node
#[derive(Debug)]
pub struct NodeLink {
    node: String,
    stream: TcpStream,
    io_timeout: Duration,
}

impl NodeLink {
    /// Connect within `connect_timeout`
    pub async fn connect(
        spec: &NodeSpec,
        connect_timeout: Duration,
        io_timeout: Duration,
    ) -> Result<Self> {
        let connect_error = |reason: String| Error::Connect {
            node: spec.name.clone(),
            address: spec.address(),
            reason,
        };

        let stream = match timeout(
            connect_timeout,
            TcpStream::connect((spec.host.as_str(), spec.port)),
        )
        .await
        {
            Ok(Ok(stream)) => stream,
            Ok(Err(e)) => return Err(connect_error(e.to_string())),
            Err(_) => return Err(connect_error("timed out".to_string())),
        };
        stream.set_nodelay(true)?;

        Ok(Self {
            node: spec.name.clone(),
            stream,
            io_timeout,
        })
    }

    /// Node name, for status output
    pub fn node(&self) -> &str {
        &self.node
    }

    async fn send(&mut self, payload: &[u8]) -> Result<()> {
        write_frame_within(&mut self.stream, payload, Some(self.io_timeout)).await
    }

    async fn recv(&mut self) -> Result<Vec<u8>> {
        read_frame_within(&mut self.stream, Some(self.io_timeout)).await
    }

    async fn recv_text(&mut self) -> Result<String> {
        let frame = self.recv().await?;
        String::from_utf8(frame).map_err(|_| Error::protocol(&self.node, "reply is not text"))
    }

    /// Send a command and wait for its single text reply
    pub async fn request(&mut self, request: &Request) -> Result<String> {
        self.send(request.to_string().as_bytes()).await?;
        self.recv_text().await
    }

    /// Ship two chunks of `name` and wait for the acknowledgment
    pub async fn put(
        &mut self,
        name: &str,
        chunk_size: u64,
        file_size: u64,
        chunks: [(u8, &[u8]); 2],
    ) -> Result<()> {
        let header = Request::Put {
            name: name.to_string(),
            chunk_size,
            file_size: Some(file_size),
        };
        self.send(header.to_string().as_bytes()).await?;
        for (number, payload) in chunks {
            self.send(Request::Chunk { number }.to_string().as_bytes())
                .await?;
            self.send(payload).await?;
        }

        let ack = self.recv_text().await?;
        if ack.starts_with(protocol::OK) {
            Ok(())
        } else {
            Err(Error::protocol(&self.node, ack))
        }
    }

    /// Whether the node holds any chunk of `name`
    pub async fn check(&mut self, name: &str) -> Result<bool> {
        let reply = self
            .request(&Request::Check {
                name: name.to_string(),
            })
            .await?;
        match reply.as_str() {
            protocol::EXISTS => Ok(true),
            protocol::NOT_FOUND => Ok(false),
            _ => Err(Error::protocol(&self.node, reply)),
        }
    }

    /// `(chunk_size, file_size)` of `name` if the node stores it
    pub async fn size(&mut self, name: &str) -> Result<Option<(u64, u64)>> {
        let reply = self
            .request(&Request::Size {
                name: name.to_string(),
            })
            .await?;
        if !reply.starts_with("SIZE") {
            return Err(Error::protocol(&self.node, reply));
        }
        Ok(protocol::parse_size_reply(&reply))
    }

    /// Fetch chunk `number` (1-based) of `name`, which must be `expected` bytes
    pub async fn get(&mut self, name: &str, number: u8, expected: u64) -> Result<Vec<u8>> {
        let reply = self
            .request(&Request::Get {
                name: name.to_string(),
                number,
            })
            .await?;
        let Some(len) = protocol::parse_data_reply(&reply) else {
            return Err(Error::protocol(&self.node, reply));
        };

        let payload = self.recv().await?;
        if payload.len() as u64 != len || len != expected {
            return Err(Error::protocol(
                &self.node,
                format!(
                    "chunk {} of {} is {} bytes, expected {}",
                    number,
                    name,
                    payload.len(),
                    expected
                ),
            ));
        }
        Ok(payload)
    }

    /// Distinct file names the node stores
    pub async fn list(&mut self) -> Result<Vec<String>> {
        self.send(Request::List.to_string().as_bytes()).await?;
        let reply = self.recv_text().await?;
        if reply.starts_with("error ") {
            return Err(Error::protocol(&self.node, reply));
        }
        Ok(protocol::parse_list_reply(&reply))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::frame::FRAME_HEADER_LEN;
    use crate::protocol::write_frame;
    use tokio::io::AsyncReadExt;
    use tokio::net::{TcpListener, TcpSocket};

    fn framed_len(payloads: &[&[u8]]) -> usize {
        payloads.iter().map(|p| FRAME_HEADER_LEN + p.len()).sum()
    }

    /// Listener whose accepted sockets keep a small, fixed receive buffer
    fn local_node() -> (TcpListener, NodeSpec) {
        let socket = TcpSocket::new_v4().unwrap();
        socket.set_recv_buffer_size(256 * 1024).unwrap();
        socket.bind("127.0.0.1:0".parse().unwrap()).unwrap();
        let listener = socket.listen(4).unwrap();
        let port = listener.local_addr().unwrap().port();
        (listener, NodeSpec::new("slow", "127.0.0.1", port))
    }

    #[tokio::test]
    async fn test_slow_steady_node_accepts_large_put() {
        let (listener, spec) = local_node();
        let chunk = vec![5u8; 12 * 1024 * 1024];

        let put = Request::Put {
            name: "big.bin".into(),
            chunk_size: chunk.len() as u64,
            file_size: Some(2 * chunk.len() as u64),
        }
        .to_string();
        let expected = framed_len(&[put.as_bytes(), b"CHUNK 1", &chunk, b"CHUNK 2", &chunk]);

        // about 12 MB/s: never idle for long, but the transfer spans
        // several I/O timeouts
        let node = tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let mut buf = vec![0u8; 256 * 1024];
            let mut total = 0;
            while total < expected {
                tokio::time::sleep(Duration::from_millis(20)).await;
                let n = stream.read(&mut buf).await.unwrap();
                assert!(n > 0);
                total += n;
            }
            write_frame(&mut stream, protocol::OK.as_bytes())
                .await
                .unwrap();
            stream
        });

        let io_timeout = Duration::from_millis(600);
        let mut link = NodeLink::connect(&spec, Duration::from_secs(1), io_timeout)
            .await
            .unwrap();
        let started = std::time::Instant::now();
        link.put(
            "big.bin",
            chunk.len() as u64,
            2 * chunk.len() as u64,
            [(1, chunk.as_slice()), (2, chunk.as_slice())],
        )
        .await
        .unwrap();
        assert!(started.elapsed() > io_timeout);
        node.await.unwrap();
    }

    #[tokio::test]
    async fn test_silent_node_times_out() {
        let (listener, spec) = local_node();
        let node = tokio::spawn(async move { listener.accept().await.unwrap().0 });

        let mut link = NodeLink::connect(&spec, Duration::from_secs(1), Duration::from_millis(100))
            .await
            .unwrap();
        let _stream = node.await.unwrap();

        let error = link.check("anything").await.unwrap_err();
        assert!(matches!(error, Error::Timeout));
        assert!(error.breaks_link());
    }
}
