//! Port for contract-based signature validation.
//!
//! Smart-contract makers cannot produce an ECDSA signature; instead the
//! maker contract exposes an `isValidSignature` capability as specified by
//! <https://eips.ethereum.org/EIPS/eip-1271>. The settlement core consumes
//! that capability through the [`SignatureValidating`] trait; hosts plug in
//! an adapter that performs the actual contract call.

use {hex_literal::hex, primitive_types::H160, thiserror::Error};

/// Structure used to represent a signature.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SignatureCheck {
    pub signer: H160,
    pub hash: [u8; 32],
    pub signature: Vec<u8>,
}

#[derive(Debug, Error)]
pub enum SignatureValidationError {
    /// The signature is invalid.
    ///
    /// Either the validating contract reverted or did not return the magic
    /// value.
    #[error("invalid signature")]
    Invalid,
    /// The validation capability itself failed.
    #[error("signature validation failed: {0}")]
    Other(String),
}

#[cfg_attr(any(test, feature = "test-util"), mockall::automock)]
pub trait SignatureValidating: Send + Sync {
    fn validate_signature(&self, check: SignatureCheck) -> Result<(), SignatureValidationError>;
}

/// The magical value as defined by EIP-1271.
pub const MAGICAL_VALUE: [u8; 4] = hex!("1626ba7e");

/// Interprets the 4 byte value returned by an `isValidSignature` call.
pub fn parse_is_valid_signature_result(
    value: [u8; 4],
) -> Result<(), SignatureValidationError> {
    if value == MAGICAL_VALUE {
        Ok(())
    } else {
        Err(SignatureValidationError::Invalid)
    }
}
