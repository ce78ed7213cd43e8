//! Typed asset descriptors.
//!
//! An [`AssetType`] pairs an asset class with the ABI encoded reference to
//! the concrete token (contract address and, for multi token standards, a
//! token id). Two asset types are equal iff class and data are byte
//! identical; the native/wrapped equivalence used during matching lives in
//! [`AssetType::matches`].

use {
    crate::{bytes_hex, u256_decimal},
    lazy_static::lazy_static,
    primitive_types::{H160, U256},
    serde::{Deserialize, Serialize},
    strum::{AsRefStr, EnumString},
    thiserror::Error,
    web3::{
        ethabi::{self, ParamType, Token},
        signing,
    },
};

#[derive(
    AsRefStr,
    Clone,
    Copy,
    Debug,
    Default,
    Deserialize,
    EnumString,
    Eq,
    Hash,
    PartialEq,
    Serialize,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum AssetClass {
    /// The chain's base settlement coin.
    #[default]
    Native,
    /// The canonical wrapped form of the native coin.
    Wrapped,
    /// ERC-20 style fungible token.
    Fungible,
    /// ERC-721 style whole-unit token.
    NftSingle,
    /// ERC-1155 style semi-fungible token.
    NftMulti,
}

impl AssetClass {
    /// The 4 byte identifier committed to by order hashes.
    pub fn id(&self) -> [u8; 4] {
        lazy_static! {
            static ref NATIVE: [u8; 32] = signing::keccak256(b"NATIVE");
            static ref WRAPPED: [u8; 32] = signing::keccak256(b"WRAPPED");
            static ref FUNGIBLE: [u8; 32] = signing::keccak256(b"FUNGIBLE");
            static ref NFT_SINGLE: [u8; 32] = signing::keccak256(b"NFT_SINGLE");
            static ref NFT_MULTI: [u8; 32] = signing::keccak256(b"NFT_MULTI");
        }
        let hash: &[u8; 32] = match self {
            Self::Native => &NATIVE,
            Self::Wrapped => &WRAPPED,
            Self::Fungible => &FUNGIBLE,
            Self::NftSingle => &NFT_SINGLE,
            Self::NftMulti => &NFT_MULTI,
        };
        let mut id = [0u8; 4];
        id.copy_from_slice(&hash[..4]);
        id
    }

    /// Native coin or its wrapped form.
    pub fn is_coin(&self) -> bool {
        matches!(self, Self::Native | Self::Wrapped)
    }

    pub fn is_nft(&self) -> bool {
        matches!(self, Self::NftSingle | Self::NftMulti)
    }
}

/// The token contract behind an asset type, decoded from its data bytes.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct TokenRef {
    pub contract: H160,
    pub token_id: Option<U256>,
}

#[derive(Debug, Error)]
pub enum AssetDecodeError {
    #[error("asset class carries no token reference")]
    NoTokenReference,
    #[error("malformed asset data: {0}")]
    Malformed(#[from] ethabi::Error),
    #[error("asset data decoded to an unexpected shape")]
    UnexpectedShape,
}

#[derive(Clone, Debug, Default, Deserialize, Eq, Hash, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetType {
    pub class: AssetClass,
    #[serde(with = "bytes_hex")]
    pub data: Vec<u8>,
}

impl AssetType {
    pub fn native() -> Self {
        Self {
            class: AssetClass::Native,
            data: Vec::new(),
        }
    }

    pub fn wrapped(token: H160) -> Self {
        Self {
            class: AssetClass::Wrapped,
            data: ethabi::encode(&[Token::Address(token)]),
        }
    }

    pub fn erc20(token: H160) -> Self {
        Self {
            class: AssetClass::Fungible,
            data: ethabi::encode(&[Token::Address(token)]),
        }
    }

    pub fn erc721(token: H160, token_id: U256) -> Self {
        Self {
            class: AssetClass::NftSingle,
            data: ethabi::encode(&[Token::Address(token), Token::Uint(token_id)]),
        }
    }

    pub fn erc1155(token: H160, token_id: U256) -> Self {
        Self {
            class: AssetClass::NftMulti,
            data: ethabi::encode(&[Token::Address(token), Token::Uint(token_id)]),
        }
    }

    /// Decodes the token contract (and token id where the class has one)
    /// out of the opaque data bytes.
    pub fn decode_token(&self) -> Result<TokenRef, AssetDecodeError> {
        let params = match self.class {
            AssetClass::Native => return Err(AssetDecodeError::NoTokenReference),
            AssetClass::Wrapped | AssetClass::Fungible => vec![ParamType::Address],
            AssetClass::NftSingle | AssetClass::NftMulti => {
                vec![ParamType::Address, ParamType::Uint(256)]
            }
        };
        let mut tokens = ethabi::decode(&params, &self.data)?.into_iter();
        let contract = tokens
            .next()
            .and_then(Token::into_address)
            .ok_or(AssetDecodeError::UnexpectedShape)?;
        let token_id = match tokens.next() {
            Some(token) => Some(
                token
                    .into_uint()
                    .ok_or(AssetDecodeError::UnexpectedShape)?,
            ),
            None => None,
        };
        Ok(TokenRef { contract, token_id })
    }

    /// Returns the value of hashStruct() over the asset type as defined by
    /// EIP-712.
    pub fn hash_struct(&self) -> [u8; 32] {
        lazy_static! {
            static ref TYPE_HASH: [u8; 32] =
                signing::keccak256(b"AssetType(bytes4 classId,bytes data)");
        }
        let mut hash_data = [0u8; 96];
        hash_data[0..32].copy_from_slice(&*TYPE_HASH);
        // bytes4 occupies the high order bytes of its 256 bit slot.
        hash_data[32..36].copy_from_slice(&self.class.id());
        hash_data[64..96].copy_from_slice(&signing::keccak256(&self.data));
        signing::keccak256(&hash_data)
    }

    /// Byte equality, or the native/wrapped-coin equivalence for the
    /// configured wrapped token.
    pub fn matches(&self, other: &AssetType, wrapped_token: H160) -> bool {
        if self == other {
            return true;
        }
        let wrapped = AssetType::wrapped(wrapped_token);
        (self.class == AssetClass::Native && *other == wrapped)
            || (other.class == AssetClass::Native && *self == wrapped)
    }
}

#[derive(Clone, Debug, Default, Deserialize, Eq, Hash, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Asset {
    pub asset_type: AssetType,
    #[serde(with = "u256_decimal")]
    pub value: U256,
}

impl Asset {
    pub fn new(asset_type: AssetType, value: impl Into<U256>) -> Self {
        Self {
            asset_type,
            value: value.into(),
        }
    }

    /// Returns the value of hashStruct() over the asset as defined by
    /// EIP-712.
    pub fn hash_struct(&self) -> [u8; 32] {
        lazy_static! {
            static ref TYPE_HASH: [u8; 32] = signing::keccak256(
                b"Asset(AssetType assetType,uint256 value)AssetType(bytes4 classId,bytes data)",
            );
        }
        let mut hash_data = [0u8; 96];
        hash_data[0..32].copy_from_slice(&*TYPE_HASH);
        hash_data[32..64].copy_from_slice(&self.asset_type.hash_struct());
        self.value.to_big_endian(&mut hash_data[64..96]);
        signing::keccak256(&hash_data)
    }
}
