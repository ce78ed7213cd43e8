//! Process-wide settlement configuration, set once at initialization.

use {
    model::{order::TOTAL_BPS, DomainSeparator},
    primitive_types::H160,
    serde::Deserialize,
    thiserror::Error,
};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("protocol fee above 10000 bps")]
    ProtocolFeeOutOfRange,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExchangeConfig {
    /// Chain id the EIP-712 domain separator commits to.
    pub chain_id: u64,
    /// Address of the settlement contract; the verifying contract of the
    /// domain and the holder of transient native coin during bridging.
    pub exchange: H160,
    /// The canonical wrapped form of the chain's native coin.
    pub wrapped_token: H160,
    /// Protocol fee in basis points, levied on the fee side of each match.
    pub protocol_fee_bps: u16,
    /// Recipient of the protocol fee.
    pub fee_receiver: H160,
    /// The trusted operator whose signature every match allowance must
    /// carry.
    pub match_operator: H160,
}

impl ExchangeConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.protocol_fee_bps > TOTAL_BPS {
            return Err(ConfigError::ProtocolFeeOutOfRange);
        }
        Ok(())
    }

    pub fn domain_separator(&self) -> DomainSeparator {
        DomainSeparator::new(self.chain_id, self.exchange)
    }
}
