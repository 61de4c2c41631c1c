//! Message schemas for federation entity statements and endpoint I/O
//!
//! Typed representations of the objects that travel through a federation:
//! entity statements, trust marks, metadata policies, constraints, and the
//! request/response shapes of the federation endpoints. Each type carries
//! its own structural verification.

pub mod api;
pub mod entity_statement;
pub mod metadata;
pub mod policy;
pub mod trust_mark;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

pub use api::{
    FetchRequest, ListRequest, ResolveRequest, ResolveResponse, TrustMarkListRequest,
    TrustMarkRequest, TrustMarkStatusRequest, TrustMarkStatusResponse,
};
pub use entity_statement::{Constraints, EntityStatement, NamingConstraints, TrustMarkOwner};
pub use metadata::FederationEntityMetadata;
pub use policy::{ClaimPolicy, MetadataPolicy};
pub use trust_mark::{TrustMark, TrustMarkDelegation, TrustMarkEntry};

/// A map of claims inside one metadata block
pub type ClaimMap = serde_json::Map<String, Value>;

/// The roles an entity can appear under in a federation
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityType {
    /// A federation entity (anchor, intermediate, resolver, ...)
    FederationEntity,
    /// An OpenID Provider
    OpenidProvider,
    /// An OpenID Relying Party
    OpenidRelyingParty,
    /// An OAuth2 client
    OauthClient,
    /// An OAuth2 authorization server
    OauthAuthorizationServer,
    /// An OAuth2 protected resource
    OauthResource,
    /// A trust mark issuer
    TrustMarkIssuer,
}

impl EntityType {
    /// The wire name of the entity type
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityType::FederationEntity => "federation_entity",
            EntityType::OpenidProvider => "openid_provider",
            EntityType::OpenidRelyingParty => "openid_relying_party",
            EntityType::OauthClient => "oauth_client",
            EntityType::OauthAuthorizationServer => "oauth_authorization_server",
            EntityType::OauthResource => "oauth_resource",
            EntityType::TrustMarkIssuer => "trust_mark_issuer",
        }
    }
}

impl std::fmt::Display for EntityType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for EntityType {
    type Err = crate::error::FederationError;

    fn from_str(s: &str) -> crate::error::Result<Self> {
        match s {
            "federation_entity" => Ok(EntityType::FederationEntity),
            "openid_provider" => Ok(EntityType::OpenidProvider),
            "openid_relying_party" => Ok(EntityType::OpenidRelyingParty),
            "oauth_client" => Ok(EntityType::OauthClient),
            "oauth_authorization_server" => Ok(EntityType::OauthAuthorizationServer),
            "oauth_resource" => Ok(EntityType::OauthResource),
            "trust_mark_issuer" => Ok(EntityType::TrustMarkIssuer),
            other => Err(crate::error::FederationError::InvalidStatement(format!(
                "unknown entity type: {other}"
            ))),
        }
    }
}

/// Per-type metadata carried by an entity statement
///
/// The map is keyed by entity-type name rather than [`EntityType`] so that
/// statements advertising types this crate does not model still parse;
/// typed accessors cover the known roles.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Metadata(pub BTreeMap<String, ClaimMap>);

impl Metadata {
    /// The claims for a known entity type, if present
    pub fn get(&self, entity_type: EntityType) -> Option<&ClaimMap> {
        self.0.get(entity_type.as_str())
    }

    /// Insert claims for a known entity type
    pub fn insert(&mut self, entity_type: EntityType, claims: ClaimMap) {
        self.0.insert(entity_type.as_str().to_string(), claims);
    }

    /// Whether the entity advertises the given type
    pub fn has_type(&self, entity_type: EntityType) -> bool {
        self.0.contains_key(entity_type.as_str())
    }

    /// Whether no metadata is present
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// A copy narrowed to the single named type, if present
    pub fn restrict_to(&self, entity_type: &str) -> Option<Metadata> {
        self.0.get(entity_type).map(|claims| {
            let mut out = BTreeMap::new();
            out.insert(entity_type.to_string(), claims.clone());
            Metadata(out)
        })
    }

    /// The federation-entity metadata block, parsed into its typed view
    pub fn federation_entity(&self) -> Option<FederationEntityMetadata> {
        let claims = self.get(EntityType::FederationEntity)?;
        serde_json::from_value(Value::Object(claims.clone())).ok()
    }
}
