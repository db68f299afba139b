//! Client session: configuration and catalog shared by its operations.

use super::table_type_mapping::{mapping_for, TableTypeMapping};
use crate::config::Config;
use crate::metastore::MetastoreHandler;
use crate::metrics::PlannerMetrics;
use std::sync::Arc;
use uuid::Uuid;

/// A client session.
pub struct HiveSession {
    id: Uuid,
    config: Config,
    metastore: Arc<dyn MetastoreHandler>,
    metrics: Option<Arc<PlannerMetrics>>,
}

impl HiveSession {
    pub fn new(config: Config, metastore: Arc<dyn MetastoreHandler>) -> Self {
        Self {
            id: Uuid::new_v4(),
            config,
            metastore,
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<PlannerMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn metastore(&self) -> &Arc<dyn MetastoreHandler> {
        &self.metastore
    }

    pub fn metrics(&self) -> Option<&Arc<PlannerMetrics>> {
        self.metrics.as_ref()
    }

    /// Table type mapping selected by `server.table_type_mapping`.
    pub fn table_type_mapping(&self) -> Box<dyn TableTypeMapping> {
        mapping_for(self.config.server.table_type_mapping)
    }
}
