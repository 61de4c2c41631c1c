//! The trust-mark issuance endpoint served by issuers

use std::sync::Arc;

use crate::error::Result;
use crate::message::api::TrustMarkRequest;
use crate::trust_mark::entity::TrustMarkEntity;

/// Issues trust marks on request
///
/// Authenticating the requester is the host's concern; this processor
/// assumes the request is already authorized.
pub struct TrustMarkEndpoint {
    issuer: Arc<TrustMarkEntity>,
}

impl TrustMarkEndpoint {
    /// An endpoint over the issuer's specification and records
    pub fn new(issuer: Arc<TrustMarkEntity>) -> Self {
        Self { issuer }
    }

    /// Issue (and record) a mark of the requested type to the subject
    pub async fn process_request(&self, request: &TrustMarkRequest) -> Result<String> {
        self.issuer
            .create_trust_mark(&request.trust_mark_id, &request.sub)
            .await
    }
}
