//! Upload coordinator
//!
//! Splits a file, checks the live-node quorum, then sends each live node
//! the chunk pair its roster position is assigned. Nodes are handled one
//! after another; a node that fails is reported and the rest still get
//! their chunks.

use crate::chunking;
use crate::client::{ensure_valid_name, file_identifier, Fleet};
use crate::placement::{placement, ChunkPair};
use crate::protocol::MAX_FRAME_SIZE;
use crate::{Error, Result};
use std::path::Path;
use tracing::{debug, info};

/// What happened on one node during an upload
#[derive(Debug, Clone)]
pub struct NodeOutcome {
    /// Roster position
    pub position: usize,
    /// Node name
    pub node: String,
    /// Chunks sent to the node
    pub pair: ChunkPair,
    /// `Err` carries the reason the node did not store its chunks
    pub result: std::result::Result<(), String>,
}

impl NodeOutcome {
    /// Whether the node acknowledged its chunks
    pub fn succeeded(&self) -> bool {
        self.result.is_ok()
    }
}

/// Result of uploading one file
#[derive(Debug, Clone)]
pub struct UploadReport {
    /// File identifier
    pub name: String,
    /// Original length
    pub file_size: u64,
    /// Size of each chunk
    pub chunk_size: u64,
    /// Placement rotation used
    pub rotation: usize,
    /// One entry per live node attempted
    pub outcomes: Vec<NodeOutcome>,
}

impl UploadReport {
    /// Nodes that did not store their chunks
    pub fn failures(&self) -> impl Iterator<Item = &NodeOutcome> {
        self.outcomes.iter().filter(|outcome| !outcome.succeeded())
    }

    /// Whether every attempted node stored its chunks
    pub fn fully_stored(&self) -> bool {
        self.failures().next().is_none()
    }
}

/// Upload the file at `path` under its final path component
pub async fn upload(fleet: &mut Fleet, path: &Path) -> Result<UploadReport> {
    let name = file_identifier(path)?;
    let data = tokio::fs::read(path).await.map_err(|source| Error::ChunkIo {
        path: path.to_path_buf(),
        source,
    })?;
    upload_bytes(fleet, &name, &data).await
}

/// Upload `data` under `name`
pub async fn upload_bytes(fleet: &mut Fleet, name: &str, data: &[u8]) -> Result<UploadReport> {
    ensure_valid_name(name)?;

    let split = chunking::split(data);
    if split.chunk_size as usize > MAX_FRAME_SIZE {
        return Err(Error::FrameTooLarge {
            size: split.chunk_size as usize,
            max: MAX_FRAME_SIZE,
        });
    }

    let placement = placement(name, fleet.roster().len())?;
    info!("file {} maps to {}", name, placement.rotation());

    let live = fleet.live_count();
    if live < fleet.quorum() {
        return Err(Error::Quorum {
            live,
            required: fleet.quorum(),
        });
    }

    let mut outcomes = Vec::with_capacity(live);
    for position in fleet.live_positions() {
        let pair = placement.pair_for(position);
        let node = fleet.node_name(position).to_string();
        let Some(link) = fleet.link_mut(position) else {
            continue;
        };

        let [a, b] = pair.chunks();
        let sent = link
            .put(
                name,
                split.chunk_size,
                split.file_size,
                [
                    (a as u8 + 1, split.chunks[a].as_slice()),
                    (b as u8 + 1, split.chunks[b].as_slice()),
                ],
            )
            .await;

        let result = match sent {
            Ok(()) => {
                debug!("server {}: chunks {} uploaded", node, pair);
                Ok(())
            }
            Err(e) => {
                let reason = e.to_string();
                fleet.node_failed(position, &e);
                Err(reason)
            }
        };
        outcomes.push(NodeOutcome {
            position,
            node,
            pair,
            result,
        });
    }

    Ok(UploadReport {
        name: name.to_string(),
        file_size: split.file_size,
        chunk_size: split.chunk_size,
        rotation: placement.rotation(),
        outcomes,
    })
}
