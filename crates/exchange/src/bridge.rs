//! The native/wrapped-coin bridge.
//!
//! Orders may contract for the native coin or its wrapped form; at
//! settlement time the two are fungible. The bridge decides, per paying
//! side, whether the coin legs are funded out of the native value attached
//! to the call (wrapping on the fly where the receiver contracted for the
//! wrapped form) or out of the payer's wrapped-coin wallet (unwrapping on
//! their behalf where raw coin is owed), and routes every leg through the
//! transfer adapter accordingly.

use {
    crate::{
        distribution::Transfer,
        transfer::{TransferError, TransferExecutor},
    },
    model::asset::{Asset, AssetClass, AssetType},
    primitive_types::{H160, U256},
    thiserror::Error,
};

#[derive(Debug, Error)]
#[error("wrapped-coin vault failed: {0}")]
pub struct VaultError(pub String);

/// Port to the canonical wrapped-coin token.
pub trait CoinVault {
    /// Wrapped-coin balance of `owner`.
    fn balance_of(&self, owner: H160) -> Result<U256, VaultError>;

    /// Spending allowance `owner` granted to the exchange.
    fn allowance_of(&self, owner: H160) -> Result<U256, VaultError>;

    /// Wraps native coin held by the exchange.
    fn deposit(&self, value: U256) -> Result<(), VaultError>;

    /// Pulls wrapped coin from `owner` and unwraps it to the exchange.
    fn withdraw_from(&self, owner: H160, value: U256) -> Result<(), VaultError>;
}

#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("native value attached with no obligation able to consume it")]
    UnexpectedNativeValue,
    #[error("payment side cannot be funded from attached value or wrapped balance")]
    InsufficientFunds,
    #[error("a passively matched maker can only receive the wrapped coin")]
    MakerCannotReceiveNative,
    #[error("attached value accounting overflowed")]
    Overflow,
    #[error(transparent)]
    Vault(#[from] VaultError),
    #[error(transparent)]
    Transfer(#[from] TransferError),
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum Funding {
    /// Coin legs are paid out of the value attached to the call.
    Attached,
    /// Coin legs are funded from the payer's wrapped-coin wallet.
    Wallet,
}

/// Executes planned transfer legs, resolving coin funding per side and
/// keeping track of the attached-value pot.
pub(crate) struct LegExecutor<'a, T, V> {
    pub executor: &'a T,
    pub vault: &'a V,
    pub exchange: H160,
    pub caller: H160,
    pub attached: U256,
}

impl<T, V> LegExecutor<'_, T, V>
where
    T: TransferExecutor,
    V: CoinVault,
{
    pub fn execute_side(&mut self, payer: H160, legs: &[Transfer]) -> Result<(), BridgeError> {
        let mut native_total = U256::zero();
        let mut wrapped_total = U256::zero();
        for leg in legs {
            let total = match leg.asset.asset_type.class {
                AssetClass::Native => &mut native_total,
                AssetClass::Wrapped => &mut wrapped_total,
                _ => continue,
            };
            *total = total
                .checked_add(leg.asset.value)
                .ok_or(BridgeError::Overflow)?;
        }
        let coin_total = native_total
            .checked_add(wrapped_total)
            .ok_or(BridgeError::Overflow)?;

        let funding = if coin_total.is_zero() {
            Funding::Wallet
        } else if payer == self.caller && !self.attached.is_zero() {
            // Once the caller attaches value it must cover their whole
            // obligation; there is no silent fallback to the wallet.
            if self.attached < coin_total {
                return Err(BridgeError::InsufficientFunds);
            }
            self.attached -= coin_total;
            if !wrapped_total.is_zero() {
                self.vault.deposit(wrapped_total)?;
            }
            Funding::Attached
        } else {
            if self.vault.balance_of(payer)? < coin_total
                || self.vault.allowance_of(payer)? < coin_total
            {
                return Err(BridgeError::InsufficientFunds);
            }
            if !native_total.is_zero() {
                self.vault.withdraw_from(payer, native_total)?;
            }
            Funding::Wallet
        };

        tracing::debug!(
            ?payer,
            ?funding,
            %native_total,
            %wrapped_total,
            "settling payment side"
        );

        for leg in legs {
            let from = match (leg.asset.asset_type.class, funding) {
                // Attached coin, and coin unwrapped from the payer's
                // wallet, are briefly held by the exchange itself.
                (AssetClass::Native | AssetClass::Wrapped, Funding::Attached) => self.exchange,
                (AssetClass::Native, Funding::Wallet) => self.exchange,
                _ => payer,
            };
            self.executor.transfer(&leg.asset, from, leg.to)?;
        }
        Ok(())
    }

    /// Returns unspent attached value to the caller.
    pub fn refund(&mut self) -> Result<(), BridgeError> {
        if self.attached.is_zero() {
            return Ok(());
        }
        let value = std::mem::take(&mut self.attached);
        tracing::debug!(%value, "refunding unspent attached value");
        self.executor
            .transfer(&Asset::new(AssetType::native(), value), self.exchange, self.caller)?;
        Ok(())
    }
}
