//! The fetch endpoint served by superiors

use std::sync::Arc;

use crate::entity::FederationEntity;
use crate::error::{FederationError, Result};
use crate::message::api::FetchRequest;

/// Serves subordinate statements by subject
pub struct FetchEndpoint {
    entity: Arc<FederationEntity>,
}

impl FetchEndpoint {
    /// An endpoint over the entity's subordinate registry
    pub fn new(entity: Arc<FederationEntity>) -> Self {
        Self { entity }
    }

    /// A signed subordinate statement about the requested subject
    pub fn process_request(&self, request: &FetchRequest) -> Result<String> {
        if request.sub.is_empty() {
            return Err(FederationError::MissingRequiredAttribute("sub".to_string()));
        }
        self.entity.subordinate_statement(&request.sub)
    }
}
