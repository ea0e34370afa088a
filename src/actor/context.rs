use std::sync::Arc;

use crate::{
    application::{AccessControl, AllowAll, AllFiltersMatch, IndexMatchPolicy, StateStore},
    config::BrokerConfig,
    engine::InMemoryStateStore,
};

/// Общие зависимости, с которыми запускается каждый актор.
#[derive(Clone)]
pub struct ActorContext {
    pub store: Arc<dyn StateStore>,
    pub access: Arc<dyn AccessControl>,
    pub policy: Arc<dyn IndexMatchPolicy>,
    pub config: Arc<BrokerConfig>,
}

impl ActorContext {
    pub fn new(
        store: Arc<dyn StateStore>,
        access: Arc<dyn AccessControl>,
        policy: Arc<dyn IndexMatchPolicy>,
        config: BrokerConfig,
    ) -> Self {
        Self {
            store,
            access,
            policy,
            config: Arc::new(config),
        }
    }
}

impl Default for ActorContext {
    fn default() -> Self {
        Self::new(
            Arc::new(InMemoryStateStore::new()),
            Arc::new(AllowAll),
            Arc::new(AllFiltersMatch),
            BrokerConfig::default(),
        )
    }
}

impl std::fmt::Debug for ActorContext {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("ActorContext")
            .field("policy", &self.policy)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
