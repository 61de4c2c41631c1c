//! JOSE plumbing: JWKs, compact JWS handling and the federation key jar

pub mod jwk;
pub mod jws;
pub mod keyjar;

pub use jwk::{Jwk, JwkSet};
pub use jws::{JwsAlg, JwsHeader};
pub use keyjar::KeyJar;
