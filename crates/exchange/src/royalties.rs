//! Port for the external royalty registry.

use {
    model::order::Part,
    primitive_types::{H160, U256},
    thiserror::Error,
};

#[derive(Debug, Error)]
pub enum RoyaltyError {
    #[error("royalty lookup failed: {0}")]
    Lookup(String),
}

/// Royalty recipients for a token, as (recipient, bps) pairs.
///
/// A pure query: an empty list means no royalties are due; a hard failure
/// aborts the surrounding match.
pub trait RoyaltyRegistry {
    fn royalties(&self, token: H160, token_id: U256) -> Result<Vec<Part>, RoyaltyError>;
}

/// Registry that never reports royalties.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoRoyalties;

impl RoyaltyRegistry for NoRoyalties {
    fn royalties(&self, _token: H160, _token_id: U256) -> Result<Vec<Part>, RoyaltyError> {
        Ok(Vec::new())
    }
}
