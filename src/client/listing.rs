//! Listing files across the fleet

use crate::client::download::check_complete;
use crate::client::Fleet;
use crate::Result;
use std::collections::BTreeSet;

/// A file name seen on at least one node
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListEntry {
    pub name: String,
    pub complete: bool,
}

impl std::fmt::Display for ListEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.complete {
            write!(f, "{}", self.name)
        } else {
            write!(f, "{} [incomplete]", self.name)
        }
    }
}

/// Union of every live node's listing, each name checked for completeness
pub async fn list(fleet: &mut Fleet) -> Result<Vec<ListEntry>> {
    let mut names = BTreeSet::new();

    for position in fleet.live_positions() {
        let Some(link) = fleet.link_mut(position) else {
            continue;
        };
        match link.list().await {
            Ok(listed) => names.extend(listed),
            Err(e) => fleet.node_failed(position, &e),
        }
    }

    let mut entries = Vec::with_capacity(names.len());
    for name in names {
        let complete = check_complete(fleet, &name).await?;
        entries.push(ListEntry { name, complete });
    }
    Ok(entries)
}
