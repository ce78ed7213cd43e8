//! The time-bounded match allowance.
//!
//! Orders are only matchable while a trusted operator vouches for them: in
//! addition to the maker's own signature every order carries an allowance
//! signed by the operator, valid up to a timestamp. This lets the operator
//! stop or rate-limit matching without revoking the order itself.

use {
    crate::{
        signature::{EcdsaSignature, EcdsaSigningScheme},
        DomainSeparator,
    },
    anyhow::Result,
    lazy_static::lazy_static,
    primitive_types::{H160, H256},
    serde::{Deserialize, Serialize},
    web3::signing::{self, SecretKeyRef},
};

/// The struct the operator signs.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct MatchAllowance {
    pub order_hash: H256,
    /// Unix seconds; matching is authorized while `now <= before`.
    pub before: u64,
}

impl MatchAllowance {
    /// Returns the value of hashStruct() over the allowance as defined by
    /// EIP-712.
    pub fn hash_struct(&self) -> [u8; 32] {
        lazy_static! {
            static ref TYPE_HASH: [u8; 32] =
                signing::keccak256(b"MatchAllowance(bytes32 orderHash,uint256 before)");
        }
        let mut hash_data = [0u8; 96];
        hash_data[0..32].copy_from_slice(&*TYPE_HASH);
        hash_data[32..64].copy_from_slice(self.order_hash.as_bytes());
        hash_data[88..96].copy_from_slice(&self.before.to_be_bytes());
        signing::keccak256(&hash_data)
    }
}

/// The wire form carried next to an order: expiry plus the operator's
/// signature over [`MatchAllowance`].
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SignedAllowance {
    pub before: u64,
    pub signature: EcdsaSignature,
}

impl SignedAllowance {
    /// Issues an allowance for the given order hash. Operator side; also
    /// used to mint test fixtures.
    pub fn issue(
        domain: &DomainSeparator,
        order_hash: H256,
        before: u64,
        key: SecretKeyRef,
    ) -> Self {
        let allowance = MatchAllowance { order_hash, before };
        Self {
            before,
            signature: EcdsaSignature::sign(
                EcdsaSigningScheme::Eip712,
                domain,
                &allowance.hash_struct(),
                key,
            ),
        }
    }

    /// Recovers the address that signed this allowance for the given order
    /// hash.
    pub fn recover_operator(&self, domain: &DomainSeparator, order_hash: H256) -> Result<H160> {
        let allowance = MatchAllowance {
            order_hash,
            before: self.before,
        };
        self.signature.recover(
            EcdsaSigningScheme::Eip712,
            domain,
            &allowance.hash_struct(),
        )
    }
}

#[cfg(test)]
mod tests {
    use {super::*, secp256k1::SecretKey, web3::signing::Key as _};

    #[test]
    fn issue_and_recover_round_trip() {
        let key = SecretKey::from_slice(&[0x21; 32]).unwrap();
        let domain = DomainSeparator::new(1, H160::from_low_u64_be(0xe0));
        let order_hash = H256([0xab; 32]);

        let allowance = SignedAllowance::issue(&domain, order_hash, 1_700_000_000, SecretKeyRef::new(&key));
        let operator = allowance.recover_operator(&domain, order_hash).unwrap();
        assert_eq!(operator, SecretKeyRef::new(&key).address());

        // Recovering against a different order hash yields a different
        // signer.
        let other = allowance
            .recover_operator(&domain, H256([0xac; 32]))
            .unwrap();
        assert_ne!(other, operator);
    }

    #[test]
    fn hash_commits_to_both_fields() {
        let a = MatchAllowance {
            order_hash: H256([1; 32]),
            before: 10,
        };
        let b = MatchAllowance {
            order_hash: H256([2; 32]),
            before: 10,
        };
        let c = MatchAllowance {
            order_hash: H256([1; 32]),
            before: 11,
        };
        assert_ne!(a.hash_struct(), b.hash_struct());
        assert_ne!(a.hash_struct(), c.hash_struct());
        assert_eq!(a.hash_struct(), a.hash_struct());
    }
}
