use std::sync::Arc;

use strata_ingest::Ingester;
use strata_query::ChildQueryEngine;
use strata_store::{MemoryStore, ObjectStore};

use crate::auth::{AllowAll, StreamPermissions};
use crate::config::ServerConfig;

/// Shared handler state: the store plus the engines built on top of it.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ServerConfig>,
    pub store: Arc<dyn ObjectStore>,
    pub ingester: Arc<Ingester>,
    pub queries: Arc<ChildQueryEngine>,
    pub permissions: Arc<dyn StreamPermissions>,
}

impl AppState {
    pub fn new(
        config: ServerConfig,
        store: Arc<dyn ObjectStore>,
        permissions: Arc<dyn StreamPermissions>,
    ) -> Self {
        let ingester = Arc::new(Ingester::new(Arc::clone(&store), config.ingest_config()));
        let queries = Arc::new(ChildQueryEngine::new(Arc::clone(&store)));
        Self {
            config: Arc::new(config),
            store,
            ingester,
            queries,
            permissions,
        }
    }

    /// Fresh in-memory deployment with an allow-all policy.
    pub fn in_memory(config: ServerConfig) -> Self {
        Self::new(config, Arc::new(MemoryStore::new()), Arc::new(AllowAll))
    }
}
