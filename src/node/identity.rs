use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::chain::NodeId;

const NODE_DATA_FILE: &str = "node_data.json";

/// Persisted node identity
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeData {
    #[serde(default)]
    pub node_id: Option<NodeId>,
}

/// `node_data.json` inside the node's data directory
#[derive(Debug, Clone)]
pub struct NodeStore {
    path: PathBuf,
}

impl NodeStore {
    pub fn new<P: AsRef<Path>>(data_dir: P) -> Self {
        Self {
            path: data_dir.as_ref().join(NODE_DATA_FILE),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Missing file means no identity yet
    pub fn load(&self) -> Result<NodeData> {
        if !self.path.exists() {
            return Ok(NodeData::default());
        }
        let content = fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read {}", self.path.display()))?;
        serde_json::from_str(&content).with_context(|| format!("Invalid node data in {}", self.path.display()))
    }

    pub fn save(&self, data: &NodeData) -> Result<()> {
        if let Some(dir) = self.path.parent() {
            fs::create_dir_all(dir)?;
        }
        let content = serde_json::to_string_pretty(data)?;
        fs::write(&self.path, content)?;
        Ok(())
    }
}

/// Node id already known: command line first (persisted), then config, then the store
pub fn known_node_id(cli: Option<NodeId>, configured: Option<NodeId>, store: &NodeStore) -> Result<Option<NodeId>> {
    if let Some(node_id) = cli {
        store.save(&NodeData { node_id: Some(node_id) })?;
        log::info!("Saved node id {} to {}", node_id, store.path().display());
        return Ok(Some(node_id));
    }
    if configured.is_some() {
        return Ok(configured);
    }
    Ok(store.load()?.node_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_store_is_empty() {
        let dir = TempDir::new().unwrap();
        let store = NodeStore::new(dir.path());
        assert_eq!(store.load().unwrap(), NodeData::default());
        assert_eq!(known_node_id(None, None, &store).unwrap(), None);
    }

    #[test]
    fn test_cli_id_is_persisted() {
        let dir = TempDir::new().unwrap();
        let store = NodeStore::new(dir.path().join("nested"));

        assert_eq!(known_node_id(Some(42), Some(1), &store).unwrap(), Some(42));
        assert_eq!(store.load().unwrap().node_id, Some(42));
        assert_eq!(known_node_id(None, None, &store).unwrap(), Some(42));
    }

    #[test]
    fn test_config_wins_over_store() {
        let dir = TempDir::new().unwrap();
        let store = NodeStore::new(dir.path());
        store.save(&NodeData { node_id: Some(5) }).unwrap();

        assert_eq!(known_node_id(None, Some(8), &store).unwrap(), Some(8));
    }

    #[test]
    fn test_corrupt_store_is_an_error() {
        let dir = TempDir::new().unwrap();
        let store = NodeStore::new(dir.path());
        fs::write(store.path(), "not json").unwrap();
        assert!(store.load().is_err());
    }
}
