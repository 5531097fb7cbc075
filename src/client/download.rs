//! Completeness check and download coordinator
//!
//! A node answering `EXISTS` for a file is taken to hold both chunks of its
//! pair. The file is complete when those pairs cover all four chunk numbers
//! among live nodes; no chunk is requested before that holds.

use crate::chunking;
use crate::client::{ensure_valid_name, Fleet};
use crate::placement::placement;
use crate::{Error, Result, CHUNK_COUNT};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Which chunk numbers (0-based) some live node claims to hold
pub async fn chunk_coverage(fleet: &mut Fleet, name: &str) -> Result<[bool; CHUNK_COUNT]> {
    let placement = placement(name, fleet.roster().len())?;
    let mut present = [false; CHUNK_COUNT];

    for position in fleet.live_positions() {
        let Some(link) = fleet.link_mut(position) else {
            continue;
        };
        match link.check(name).await {
            Ok(true) => {
                for chunk in placement.pair_for(position).chunks() {
                    present[chunk] = true;
                }
            }
            Ok(false) => {}
            Err(e) => fleet.node_failed(position, &e),
        }
    }

    Ok(present)
}

/// Whether all chunk numbers of `name` are held by live nodes
pub async fn check_complete(fleet: &mut Fleet, name: &str) -> Result<bool> {
    let present = chunk_coverage(fleet, name).await?;
    Ok(present.iter().all(|&held| held))
}

/// Find the chunk size and original length of `name`
async fn query_sizes(fleet: &mut Fleet, name: &str) -> Result<(u64, u64)> {
    for position in fleet.live_positions() {
        let Some(link) = fleet.link_mut(position) else {
            continue;
        };
        match link.size(name).await {
            Ok(Some(sizes)) => return Ok(sizes),
            Ok(None) => {}
            Err(e) => fleet.node_failed(position, &e),
        }
    }

    Err(Error::protocol(
        "fleet",
        format!("could not determine chunk size of {}", name),
    ))
}

/// Reconstruct the content of `name` from the live nodes
pub async fn fetch(fleet: &mut Fleet, name: &str) -> Result<Vec<u8>> {
    ensure_valid_name(name)?;

    if !check_complete(fleet, name).await? {
        return Err(Error::IncompleteFile {
            name: name.to_string(),
        });
    }

    let placement = placement(name, fleet.roster().len())?;
    let (chunk_size, file_size) = query_sizes(fleet, name).await?;
    debug!("{}: chunk size {}, file size {}", name, chunk_size, file_size);

    let mut chunks: [Option<Vec<u8>>; CHUNK_COUNT] = Default::default();
    for position in fleet.live_positions() {
        for chunk in placement.pair_for(position).chunks() {
            if chunks[chunk].is_some() {
                continue;
            }
            let Some(link) = fleet.link_mut(position) else {
                break;
            };
            match link.get(name, chunk as u8 + 1, chunk_size).await {
                Ok(data) => chunks[chunk] = Some(data),
                Err(e) => fleet.node_failed(position, &e),
            }
        }
    }

    let missing: Vec<usize> = (0..CHUNK_COUNT).filter(|&i| chunks[i].is_none()).collect();
    if !missing.is_empty() {
        warn!("{}: chunks {:?} could not be retrieved", name, missing);
        return Err(Error::IncompleteFile {
            name: name.to_string(),
        });
    }

    let chunks = chunks.map(Option::unwrap_or_default);
    Ok(chunking::reassemble(&chunks, file_size))
}

/// Download `name` into `dest_dir`, replacing any existing file
pub async fn download(fleet: &mut Fleet, name: &str, dest_dir: &Path) -> Result<PathBuf> {
    let data = fetch(fleet, name).await?;

    let path = dest_dir.join(name);
    tokio::fs::write(&path, &data)
        .await
        .map_err(|source| Error::ChunkIo {
            path: path.clone(),
            source,
        })?;

    info!("file {} downloaded ({} bytes)", name, data.len());
    Ok(path)
}
