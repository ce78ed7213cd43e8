//! Contains the order type with its EIP-712 hashing rules and the decoded
//! per-version order payload (payouts and origin fees).

use {
    crate::{
        asset::Asset,
        signature::{EcdsaSignature, EcdsaSigningScheme, Signature},
        u256_decimal, DomainSeparator,
    },
    lazy_static::lazy_static,
    primitive_types::{H160, H256, U256},
    serde::{Deserialize, Serialize},
    thiserror::Error,
    web3::{
        ethabi::{self, ParamType, Token},
        signing::{self, SecretKeyRef},
    },
};

/// Basis points of the whole: 10000 bps = 100%.
pub const TOTAL_BPS: u16 = 10_000;

/// A fee or payout recipient with its share in basis points.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Part {
    pub account: H160,
    pub bps: u16,
}

impl Part {
    pub fn new(account: H160, bps: u16) -> Self {
        Self { account, bps }
    }
}

#[derive(Debug, Error)]
pub enum PayloadError {
    #[error("part share exceeds 10000 bps")]
    BpsOutOfRange,
    #[error("payout shares sum to more than 10000 bps")]
    PayoutsExceedTotal,
    #[error("malformed payload data: {0}")]
    Malformed(#[from] ethabi::Error),
    #[error("payload data decoded to an unexpected shape")]
    UnexpectedShape,
}

/// The per-version order payload, decoded once at validation time.
#[derive(Clone, Debug, Default, Deserialize, Eq, Hash, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum OrderPayload {
    #[default]
    None,
    #[serde(rename_all = "camelCase")]
    V1 {
        /// How the paying side's remainder is split. Empty means 100% to
        /// the order's own beneficiary.
        payouts: Vec<Part>,
        /// Fees this order authorizes paying to third parties.
        origin_fees: Vec<Part>,
    },
}

impl OrderPayload {
    pub fn v1(payouts: Vec<Part>, origin_fees: Vec<Part>) -> Self {
        Self::V1 {
            payouts,
            origin_fees,
        }
    }

    /// The 4 byte payload version identifier committed to by order hashes.
    pub fn kind_id(&self) -> [u8; 4] {
        lazy_static! {
            static ref V1: [u8; 32] = signing::keccak256(b"V1");
        }
        match self {
            Self::None => [0u8; 4],
            Self::V1 { .. } => {
                let mut id = [0u8; 4];
                id.copy_from_slice(&V1[..4]);
                id
            }
        }
    }

    pub fn payouts(&self) -> &[Part] {
        match self {
            Self::None => &[],
            Self::V1 { payouts, .. } => payouts,
        }
    }

    pub fn origin_fees(&self) -> &[Part] {
        match self {
            Self::None => &[],
            Self::V1 { origin_fees, .. } => origin_fees,
        }
    }

    pub fn validate(&self) -> Result<(), PayloadError> {
        let all = self.payouts().iter().chain(self.origin_fees());
        if all.clone().any(|part| part.bps > TOTAL_BPS) {
            return Err(PayloadError::BpsOutOfRange);
        }
        let payout_total: u32 = self.payouts().iter().map(|part| u32::from(part.bps)).sum();
        if payout_total > u32::from(TOTAL_BPS) {
            return Err(PayloadError::PayoutsExceedTotal);
        }
        Ok(())
    }

    /// ABI encodes the payload into the opaque byte form committed to by the
    /// order hash.
    pub fn encode(&self) -> Vec<u8> {
        fn parts(parts: &[Part]) -> Token {
            Token::Array(
                parts
                    .iter()
                    .map(|part| {
                        Token::Tuple(vec![
                            Token::Address(part.account),
                            Token::Uint(part.bps.into()),
                        ])
                    })
                    .collect(),
            )
        }
        match self {
            Self::None => Vec::new(),
            Self::V1 {
                payouts,
                origin_fees,
            } => ethabi::encode(&[parts(payouts), parts(origin_fees)]),
        }
    }

    /// Decodes the wire form produced by [`OrderPayload::encode`].
    pub fn decode(kind_id: [u8; 4], data: &[u8]) -> Result<Self, PayloadError> {
        if kind_id == [0u8; 4] {
            if !data.is_empty() {
                return Err(PayloadError::UnexpectedShape);
            }
            return Ok(Self::None);
        }
        let v1_id = Self::v1(Vec::new(), Vec::new()).kind_id();
        if kind_id != v1_id {
            return Err(PayloadError::UnexpectedShape);
        }

        fn parts(token: Token) -> Result<Vec<Part>, PayloadError> {
            token
                .into_array()
                .ok_or(PayloadError::UnexpectedShape)?
                .into_iter()
                .map(|part| {
                    let mut fields = part
                        .into_tuple()
                        .ok_or(PayloadError::UnexpectedShape)?
                        .into_iter();
                    let account = fields
                        .next()
                        .and_then(Token::into_address)
                        .ok_or(PayloadError::UnexpectedShape)?;
                    let bps = fields
                        .next()
                        .and_then(Token::into_uint)
                        .filter(|bps| *bps <= U256::from(TOTAL_BPS))
                        .ok_or(PayloadError::BpsOutOfRange)?;
                    Ok(Part::new(account, bps.as_u32() as u16))
                })
                .collect()
        }

        let part = ParamType::Tuple(vec![ParamType::Address, ParamType::Uint(256)]);
        let mut tokens = ethabi::decode(
            &[
                ParamType::Array(Box::new(part.clone())),
                ParamType::Array(Box::new(part)),
            ],
            data,
        )?
        .into_iter();
        let payouts = parts(tokens.next().ok_or(PayloadError::UnexpectedShape)?)?;
        let origin_fees = parts(tokens.next().ok_or(PayloadError::UnexpectedShape)?)?;
        Ok(Self::V1 {
            payouts,
            origin_fees,
        })
    }
}

/// A signed standing offer: give `make_asset`, receive `take_asset`.
///
/// These are the exact fields committed to by the order hash used both as
/// the signing payload and as the fill ledger key.
#[derive(Clone, Debug, Default, Deserialize, Eq, Hash, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub maker: H160,
    pub make_asset: Asset,
    /// Zero means anyone may take the order.
    pub taker: H160,
    pub take_asset: Asset,
    #[serde(with = "u256_decimal")]
    pub salt: U256,
    /// Unix seconds; zero means no lower bound.
    pub start: u64,
    /// Unix seconds; zero means no upper bound.
    pub end: u64,
    pub data: OrderPayload,
}

impl Order {
    /// Returns the value of hashStruct() over the order as defined by
    /// EIP-712.
    ///
    /// https://eips.ethereum.org/EIPS/eip-712#definition-of-hashstruct
    pub fn hash_struct(&self) -> [u8; 32] {
        lazy_static! {
            static ref TYPE_HASH: [u8; 32] = signing::keccak256(
                b"Order(address maker,Asset makeAsset,address taker,Asset takeAsset,\
                  uint256 salt,uint256 start,uint256 end,bytes4 dataKind,bytes data)\
                  Asset(AssetType assetType,uint256 value)\
                  AssetType(bytes4 classId,bytes data)",
            );
        }
        let mut hash_data = [0u8; 320];
        hash_data[0..32].copy_from_slice(&*TYPE_HASH);
        // Some slots are not assigned (stay 0) because all values are
        // extended to 256 bits.
        hash_data[44..64].copy_from_slice(self.maker.as_fixed_bytes());
        hash_data[64..96].copy_from_slice(&self.make_asset.hash_struct());
        hash_data[108..128].copy_from_slice(self.taker.as_fixed_bytes());
        hash_data[128..160].copy_from_slice(&self.take_asset.hash_struct());
        self.salt.to_big_endian(&mut hash_data[160..192]);
        hash_data[216..224].copy_from_slice(&self.start.to_be_bytes());
        hash_data[248..256].copy_from_slice(&self.end.to_be_bytes());
        hash_data[256..260].copy_from_slice(&self.data.kind_id());
        hash_data[288..320].copy_from_slice(&signing::keccak256(&self.data.encode()));
        signing::keccak256(&hash_data)
    }

    /// The order hash used as signing payload and fill ledger key.
    pub fn hash(&self) -> H256 {
        H256(self.hash_struct())
    }

    /// Signs the order with the given key, producing the signature expected
    /// by the settlement entry point.
    pub fn sign(
        &self,
        signing_scheme: EcdsaSigningScheme,
        domain: &DomainSeparator,
        key: SecretKeyRef,
    ) -> Signature {
        EcdsaSignature::sign(signing_scheme, domain, &self.hash_struct(), key)
            .to_signature(signing_scheme)
    }
}

#[derive(Clone, Default, Debug)]
pub struct OrderBuilder(Order);

impl OrderBuilder {
    pub fn with_maker(mut self, maker: H160) -> Self {
        self.0.maker = maker;
        self
    }

    pub fn with_make_asset(mut self, asset: Asset) -> Self {
        self.0.make_asset = asset;
        self
    }

    pub fn with_taker(mut self, taker: H160) -> Self {
        self.0.taker = taker;
        self
    }

    pub fn with_take_asset(mut self, asset: Asset) -> Self {
        self.0.take_asset = asset;
        self
    }

    pub fn with_salt(mut self, salt: impl Into<U256>) -> Self {
        self.0.salt = salt.into();
        self
    }

    pub fn with_window(mut self, start: u64, end: u64) -> Self {
        self.0.start = start;
        self.0.end = end;
        self
    }

    pub fn with_payload(mut self, data: OrderPayload) -> Self {
        self.0.data = data;
        self
    }

    /// Sets the maker to the key's address and returns the built order with
    /// its signature.
    pub fn sign_with(
        mut self,
        signing_scheme: EcdsaSigningScheme,
        domain: &DomainSeparator,
        key: SecretKeyRef,
    ) -> (Order, Signature) {
        use web3::signing::Key as _;
        self.0.maker = key.address();
        let signature = self.0.sign(signing_scheme, domain, key);
        (self.0, signature)
    }

    pub fn build(self) -> Order {
        self.0
    }
}
