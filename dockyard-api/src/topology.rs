//! Service topology: a fixed demo graph plus node positions the console
//! user has arranged, persisted in the blob store.

use dockyard_store::{BlobStore, StoreError};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use tracing::warn;

pub const POSITIONS_KEY: &str = "topology/positions.json";

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

pub type Positions = BTreeMap<String, Position>;

#[derive(Debug, Clone, Serialize)]
pub struct Node {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub label: String,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position: Option<Position>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Edge {
    pub id: String,
    pub source: String,
    pub target: String,
    pub binding_type: String,
    pub binding_name: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct Graph {
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
}

impl Graph {
    pub fn demo() -> Self {
        let nodes = [
            ("gateway", "worker", "API Gateway", "healthy"),
            ("svc-api", "container", "API Service", "healthy"),
            ("svc-worker", "container", "Background Worker", "degraded"),
            ("primary-db", "d1", "Primary Database", "healthy"),
            ("jobs-queue", "queue", "Jobs Queue", "healthy"),
            ("assets", "r2", "Assets Bucket", "healthy"),
            ("legacy-cron", "container", "Legacy Cron", "inactive"),
        ]
        .into_iter()
        .map(|(id, kind, label, status)| Node {
            id: id.to_string(),
            kind: kind.to_string(),
            label: label.to_string(),
            status: status.to_string(),
            position: None,
        })
        .collect();

        let edges = [
            ("gateway", "svc-api", "service", "API"),
            ("svc-api", "primary-db", "d1", "DB"),
            ("svc-api", "jobs-queue", "queue", "JOBS"),
            ("jobs-queue", "svc-worker", "queue", "JOBS"),
            ("svc-worker", "assets", "r2", "ASSETS"),
        ]
        .into_iter()
        .map(|(source, target, binding_type, binding_name)| Edge {
            id: format!("{source}->{target}"),
            source: source.to_string(),
            target: target.to_string(),
            binding_type: binding_type.to_string(),
            binding_name: binding_name.to_string(),
        })
        .collect();

        Self { nodes, edges }
    }

    pub fn with_positions(mut self, positions: &Positions) -> Self {
        for node in &mut self.nodes {
            node.position = positions.get(&node.id).copied();
        }
        self
    }

    /// Nodes that no edge touches.
    pub fn orphans(&self) -> Vec<&Node> {
        let connected: HashSet<&str> = self
            .edges
            .iter()
            .flat_map(|e| [e.source.as_str(), e.target.as_str()])
            .collect();

        self.nodes
            .iter()
            .filter(|n| !connected.contains(n.id.as_str()))
            .collect()
    }
}

/// Saved positions; a missing or unreadable document reads as empty.
pub async fn load_positions(blobs: &dyn BlobStore) -> Result<Positions, StoreError> {
    let Some(bytes) = blobs.get(POSITIONS_KEY).await? else {
        return Ok(Positions::new());
    };

    match serde_json::from_slice(&bytes) {
        Ok(positions) => Ok(positions),
        Err(e) => {
            warn!(key = POSITIONS_KEY, error = %e, "Ignoring unreadable topology positions");
            Ok(Positions::new())
        }
    }
}

pub async fn save_positions(blobs: &dyn BlobStore, positions: &Positions) -> Result<(), StoreError> {
    let bytes = serde_json::to_vec(positions)?;
    blobs.put(POSITIONS_KEY, bytes).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use dockyard_store::MemoryBlobStore;

    #[test]
    fn test_demo_graph_has_one_orphan() {
        let graph = Graph::demo();
        let orphans: Vec<&str> = graph.orphans().iter().map(|n| n.id.as_str()).collect();
        assert_eq!(orphans, vec!["legacy-cron"]);
    }

    #[test]
    fn test_wire_shape_uses_type_and_binding_keys() {
        let graph = serde_json::to_value(Graph::demo()).unwrap();

        let node = &graph["nodes"][0];
        assert_eq!(node["type"], "worker");
        assert_eq!(node["status"], "healthy");
        assert!(node.get("kind").is_none());
        assert!(node.get("position").is_none());

        let edge = &graph["edges"][0];
        assert_eq!(edge["bindingType"], "service");
        assert_eq!(edge["bindingName"], "API");
        assert!(edge.get("label").is_none());
    }

    #[tokio::test]
    async fn test_positions_round_trip_through_blob_store() {
        let blobs = MemoryBlobStore::new();
        assert!(load_positions(&blobs).await.unwrap().is_empty());

        let mut positions = Positions::new();
        positions.insert("gateway".to_string(), Position { x: 10.0, y: 20.5 });
        save_positions(&blobs, &positions).await.unwrap();

        let loaded = load_positions(&blobs).await.unwrap();
        assert_eq!(loaded, positions);

        let graph = Graph::demo().with_positions(&loaded);
        let gateway = graph.nodes.iter().find(|n| n.id == "gateway").unwrap();
        assert_eq!(gateway.position, Some(Position { x: 10.0, y: 20.5 }));
    }

    #[tokio::test]
    async fn test_corrupt_positions_read_as_empty() {
        let blobs = MemoryBlobStore::new();
        blobs.put(POSITIONS_KEY, b"not json".to_vec()).await.unwrap();
        assert!(load_positions(&blobs).await.unwrap().is_empty());
    }
}
