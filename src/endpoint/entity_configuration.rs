//! The well-known entity-configuration endpoint

use std::sync::Arc;

use crate::entity::FederationEntity;
use crate::error::Result;

/// Serves the entity's self-signed configuration
pub struct EntityConfigurationEndpoint {
    entity: Arc<FederationEntity>,
}

impl EntityConfigurationEndpoint {
    /// An endpoint for the given entity
    pub fn new(entity: Arc<FederationEntity>) -> Self {
        Self { entity }
    }

    /// The signed entity configuration to serve at the well-known path
    pub fn process_request(&self) -> Result<String> {
        self.entity.entity_configuration()
    }
}
