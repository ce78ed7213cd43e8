//! The settlement core of the exchange.
//!
//! Two independently signed orders are matched, possibly partially, and the
//! corresponding assets, protocol fee, royalties and origin fees move
//! atomically in a single [`settlement::Exchange::match_orders`] call. All
//! external effects (asset transfers, royalty lookups, the wrapped-coin
//! vault, contract signature validation) go through injected ports so the
//! core can be exercised in isolation.

pub mod bridge;
pub mod config;
pub mod distribution;
pub mod fill;
pub mod ledger;
pub mod royalties;
pub mod settlement;
pub mod transfer;
pub mod validation;

pub use {
    config::ExchangeConfig,
    distribution::{Direction, FeeSide, Transfer, TransferKind},
    settlement::{Exchange, MatchCall, MatchError, MatchReceipt},
    validation::{CallContext, SignedOrder},
};
