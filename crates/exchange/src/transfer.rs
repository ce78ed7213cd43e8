//! Port for per-asset-class transfer adapters.

use {model::asset::Asset, primitive_types::H160, thiserror::Error};

#[derive(Debug, Error)]
pub enum TransferError {
    /// The adapter for this asset class rejected or failed the transfer.
    #[error("asset transfer failed: {0}")]
    Failed(String),
    /// No adapter is registered for the asset's class.
    #[error("no transfer adapter for asset class")]
    UnsupportedClass,
}

/// Capability to move an asset between two accounts. Implementations are
/// untrusted; any failure aborts the surrounding match.
pub trait TransferExecutor {
    fn transfer(&self, asset: &Asset, from: H160, to: H160) -> Result<(), TransferError>;
}
