//! In-memory graph repository.

use std::collections::HashMap;
use std::sync::Arc;

use atelier_core::GraphId;
use atelier_core::graph::Graph;
use tokio::sync::RwLock;

use super::GraphRepository;
use crate::Result;

/// Graph repository backed by a shared map.
///
/// Clones share the same underlying storage.
#[derive(Debug, Clone, Default)]
pub struct InMemoryGraphRepository {
    graphs: Arc<RwLock<HashMap<GraphId, Graph>>>,
}

impl InMemoryGraphRepository {
    /// Creates an empty repository.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl GraphRepository for InMemoryGraphRepository {
    async fn load(&self, id: GraphId) -> Result<Option<Graph>> {
        Ok(self.graphs.read().await.get(&id).cloned())
    }

    async fn save(&self, graph: &Graph) -> Result<()> {
        self.graphs.write().await.insert(graph.id, graph.clone());
        Ok(())
    }

    async fn delete(&self, id: GraphId) -> Result<bool> {
        Ok(self.graphs.write().await.remove(&id).is_some())
    }

    async fn list(&self) -> Result<Vec<Graph>> {
        let mut graphs: Vec<Graph> = self.graphs.read().await.values().cloned().collect();
        graphs.sort_by_key(|graph| (graph.created_at, graph.id));
        Ok(graphs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn save_load_list_delete() {
        let repository = InMemoryGraphRepository::new();
        let first = Graph::new("first");
        let second = Graph::new("second");
        repository.save(&second).await.unwrap();
        repository.save(&first).await.unwrap();

        let loaded = repository.load(first.id).await.unwrap().unwrap();
        assert_eq!(loaded.name, "first");

        let names: Vec<_> = repository
            .list()
            .await
            .unwrap()
            .into_iter()
            .map(|graph| graph.name)
            .collect();
        assert_eq!(names, ["first", "second"]);

        assert!(repository.delete(first.id).await.unwrap());
        assert!(!repository.delete(first.id).await.unwrap());
        assert!(repository.load(first.id).await.unwrap().is_none());
    }
}
