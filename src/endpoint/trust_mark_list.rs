//! The trust-mark list endpoint served by issuers

use std::sync::Arc;

use crate::error::Result;
use crate::message::api::TrustMarkListRequest;
use crate::trust_mark::entity::TrustMarkEntity;

/// Lists the subjects holding a given trust mark
pub struct TrustMarkListEndpoint {
    issuer: Arc<TrustMarkEntity>,
}

impl TrustMarkListEndpoint {
    /// An endpoint over the issuer's records
    pub fn new(issuer: Arc<TrustMarkEntity>) -> Self {
        Self { issuer }
    }

    /// The subjects currently holding the requested mark
    pub async fn process_request(&self, request: &TrustMarkListRequest) -> Result<Vec<String>> {
        self.issuer
            .list(&request.trust_mark_id, request.sub.as_deref())
            .await
    }
}
