//! The list endpoint served by superiors

use std::sync::Arc;

use crate::entity::FederationEntity;
use crate::message::api::ListRequest;

/// Lists subordinate entity identifiers with optional filters
pub struct ListEndpoint {
    entity: Arc<FederationEntity>,
}

impl ListEndpoint {
    /// An endpoint over the entity's subordinate registry
    pub fn new(entity: Arc<FederationEntity>) -> Self {
        Self { entity }
    }

    /// The matching subordinate identifiers
    pub fn process_request(&self, request: &ListRequest) -> Vec<String> {
        self.entity.list_subordinates(request)
    }
}
