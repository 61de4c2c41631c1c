//! The trust-mark status endpoint served by issuers

use std::sync::Arc;

use crate::error::Result;
use crate::message::api::{TrustMarkStatusRequest, TrustMarkStatusResponse};
use crate::trust_mark::entity::TrustMarkEntity;

/// Reports whether an issued mark is still active
pub struct TrustMarkStatusEndpoint {
    issuer: Arc<TrustMarkEntity>,
}

impl TrustMarkStatusEndpoint {
    /// An endpoint over the issuer's records
    pub fn new(issuer: Arc<TrustMarkEntity>) -> Self {
        Self { issuer }
    }

    /// Answer a status request
    pub async fn process_request(
        &self,
        request: &TrustMarkStatusRequest,
    ) -> Result<TrustMarkStatusResponse> {
        self.issuer.status(request).await
    }
}
