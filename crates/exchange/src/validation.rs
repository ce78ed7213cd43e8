//! Order identity and authorization.
//!
//! Every order entering a match is checked for its validity window, the
//! zero-salt rule, the maker's own signature (ECDSA, contract based, or the
//! maker being the direct caller) and the trusted operator's match
//! allowance. Both checks are mandatory for any order not submitted by its
//! own maker.

use {
    model::{
        allowance::SignedAllowance,
        order::{Order, PayloadError},
        signature::{hashed_eip712_message, Signature},
        DomainSeparator,
    },
    primitive_types::{H160, H256, U256},
    signature_validator::{SignatureCheck, SignatureValidating, SignatureValidationError},
    thiserror::Error,
};

/// The transaction context a settlement call executes in.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct CallContext {
    /// The direct caller of the settlement.
    pub caller: H160,
    /// Native coin attached to the call.
    pub attached_value: U256,
    /// Chain time, unix seconds.
    pub now: u64,
}

/// One side of a match as submitted by the caller.
#[derive(Clone, Debug)]
pub struct SignedOrder {
    pub order: Order,
    pub signature: Signature,
    /// May be omitted only when the order's maker is the direct caller.
    pub allowance: Option<SignedAllowance>,
}

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("order is outside its validity window")]
    OrderWindow,
    #[error("zero-salt orders must be submitted by their maker")]
    ZeroSaltNotCaller,
    #[error("order carries no signature and the maker is not the caller")]
    MissingSignature,
    #[error("signature recovery failed: {0}")]
    UnrecoverableSignature(String),
    #[error("signature does not recover to the order maker")]
    WrongSigner,
    #[error(transparent)]
    Eip1271(#[from] SignatureValidationError),
    #[error("match allowance missing for an order not submitted by its maker")]
    MissingAllowance,
    #[error("match allowance expired or not signed by the operator")]
    ExpiredOrUnauthorizedAllowance,
    #[error(transparent)]
    Payload(#[from] PayloadError),
}

/// Validates orders against the exchange's domain and trusted operator.
pub struct OrderVerifier<'a, C> {
    pub domain: &'a DomainSeparator,
    pub operator: H160,
    pub eip1271: &'a C,
}

impl<C> OrderVerifier<'_, C>
where
    C: SignatureValidating,
{
    /// Checks a submitted order end to end and returns its hash.
    pub fn validate(
        &self,
        signed: &SignedOrder,
        ctx: &CallContext,
    ) -> Result<H256, ValidationError> {
        let order = &signed.order;
        order.data.validate()?;

        if (order.start != 0 && order.start > ctx.now) || (order.end != 0 && order.end < ctx.now)
        {
            return Err(ValidationError::OrderWindow);
        }
        // A zero salt waives the order's persistent identity, which is only
        // sound when the maker authorizes the fill in person.
        if order.salt.is_zero() && order.maker != ctx.caller {
            return Err(ValidationError::ZeroSaltNotCaller);
        }

        let hash = order.hash();
        self.validate_signature(order, &signed.signature, &hash, ctx)?;
        self.validate_allowance(order, signed.allowance.as_ref(), hash, ctx)?;

        tracing::trace!(?hash, maker = ?order.maker, "order validated");
        Ok(hash)
    }

    fn validate_signature(
        &self,
        order: &Order,
        signature: &Signature,
        hash: &H256,
        ctx: &CallContext,
    ) -> Result<(), ValidationError> {
        match signature {
            Signature::Direct => {
                if order.maker != ctx.caller {
                    return Err(ValidationError::MissingSignature);
                }
            }
            Signature::Eip712(_) | Signature::EthSign(_) => {
                let signer = signature
                    .recover(self.domain, hash.as_fixed_bytes())
                    .map_err(|err| ValidationError::UnrecoverableSignature(err.to_string()))?
                    .expect("ecdsa schemes always recover");
                if signer != order.maker {
                    return Err(ValidationError::WrongSigner);
                }
            }
            Signature::Eip1271(bytes) => {
                self.eip1271.validate_signature(SignatureCheck {
                    signer: order.maker,
                    hash: hashed_eip712_message(self.domain, hash.as_fixed_bytes()),
                    signature: bytes.clone(),
                })?;
            }
        }
        Ok(())
    }

    fn validate_allowance(
        &self,
        order: &Order,
        allowance: Option<&SignedAllowance>,
        hash: H256,
        ctx: &CallContext,
    ) -> Result<(), ValidationError> {
        let allowance = match allowance {
            Some(allowance) => allowance,
            None if order.maker == ctx.caller => return Ok(()),
            None => return Err(ValidationError::MissingAllowance),
        };
        if ctx.now > allowance.before {
            return Err(ValidationError::ExpiredOrUnauthorizedAllowance);
        }
        let signer = allowance
            .recover_operator(self.domain, hash)
            .map_err(|_| ValidationError::ExpiredOrUnauthorizedAllowance)?;
        if signer != self.operator {
            return Err(ValidationError::ExpiredOrUnauthorizedAllowance);
        }
        Ok(())
    }
}
