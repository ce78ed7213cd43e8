//! The fill matching algorithm.
//!
//! Given two orders and their cumulative fills this computes the exact
//! amounts each side must send this call. The binding constraint is the
//! side with the smaller remaining capacity; the other side's amount is
//! derived by cross multiplication at the binding order's own make/take
//! ratio with truncating division, so a counterparty may pay more, never
//! less, than the limiting price.

use {
    model::order::Order,
    number::U256Ext,
    primitive_types::{H160, U256},
    thiserror::Error,
};

#[derive(Debug, Error, Eq, PartialEq)]
pub enum FillError {
    #[error("orders' make/take asset types do not pair up")]
    AssetMismatch,
    #[error("right order cannot cover the requested fill")]
    UnableToFillRight,
    #[error("left order cannot cover the requested fill")]
    UnableToFillLeft,
    #[error("no fill possible at these ratios")]
    NoFillPossible,
    #[error("fill arithmetic overflowed")]
    Overflow,
}

/// Amounts changing hands this call.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct FillResult {
    /// Amount of the left order's make asset transferred to the right side.
    pub left_transfer: U256,
    /// Amount of the right order's make asset transferred to the left side.
    pub right_transfer: U256,
}

impl FillResult {
    /// This call's increment of the left order's fill, denominated in its
    /// take side.
    pub fn left_fill_delta(&self) -> U256 {
        self.right_transfer
    }

    /// This call's increment of the right order's fill, denominated in its
    /// take side.
    pub fn right_fill_delta(&self) -> U256 {
        self.left_transfer
    }
}

/// Checks that the two orders trade the same pair of assets, accounting for
/// the native/wrapped-coin equivalence.
fn ensure_assets_match(left: &Order, right: &Order, wrapped_token: H160) -> Result<(), FillError> {
    let paired = left
        .make_asset
        .asset_type
        .matches(&right.take_asset.asset_type, wrapped_token)
        && left
            .take_asset
            .asset_type
            .matches(&right.make_asset.asset_type, wrapped_token);
    if !paired {
        return Err(FillError::AssetMismatch);
    }
    Ok(())
}

/// Remaining make/take capacity of an order given its cumulative fill.
///
/// The fill is denominated in the take side; the remaining make capacity is
/// scaled down proportionally (floor).
fn calculate_remaining(order: &Order, filled: U256) -> Result<(U256, U256), FillError> {
    if order.take_asset.value.is_zero() {
        return Err(FillError::NoFillPossible);
    }
    let take = order.take_asset.value.saturating_sub(filled);
    let make = order
        .make_asset
        .value
        .checked_mul_div_floor(&take, &order.take_asset.value)
        .ok_or(FillError::Overflow)?;
    Ok((make, take))
}

/// The right order's remaining take is the binding constraint; it is filled
/// completely and the left order pays at its own ratio.
fn fill_right(
    left_make: U256,
    left_take: U256,
    right_make: U256,
    right_take: U256,
) -> Result<FillResult, FillError> {
    if right_take.is_zero() {
        return Err(FillError::UnableToFillRight);
    }
    let maker_value = right_take
        .checked_mul_div_floor(&left_take, &left_make)
        .ok_or(FillError::Overflow)?;
    if maker_value.is_zero() || maker_value > right_make {
        return Err(FillError::UnableToFillRight);
    }
    Ok(FillResult {
        left_transfer: right_take,
        right_transfer: maker_value,
    })
}

/// The left order's remaining capacity is the binding constraint; it is
/// filled completely, provided the right order's own ratio is satisfied by
/// what it receives.
fn fill_left(
    left_make: U256,
    left_take: U256,
    right_make: U256,
    right_take: U256,
) -> Result<FillResult, FillError> {
    if left_take.is_zero() || right_make.is_zero() {
        return Err(FillError::UnableToFillLeft);
    }
    let right_take_required = left_take
        .checked_mul_div_floor(&right_take, &right_make)
        .ok_or(FillError::Overflow)?;
    if right_take_required > left_make {
        return Err(FillError::UnableToFillLeft);
    }
    Ok(FillResult {
        left_transfer: left_make,
        right_transfer: left_take,
    })
}

/// Computes the amounts both sides transfer this call.
pub fn fill_orders(
    left: &Order,
    right: &Order,
    left_filled: U256,
    right_filled: U256,
    wrapped_token: H160,
) -> Result<FillResult, FillError> {
    ensure_assets_match(left, right, wrapped_token)?;

    let (left_make, left_take) = calculate_remaining(left, left_filled)?;
    let (right_make, right_take) = calculate_remaining(right, right_filled)?;

    tracing::trace!(
        %left_make, %left_take, %right_make, %right_take,
        "remaining capacities"
    );

    let result = if right_take > left_make {
        fill_left(left_make, left_take, right_make, right_take)
    } else {
        fill_right(left_make, left_take, right_make, right_take)
    }?;

    if result.left_transfer.is_zero() || result.right_transfer.is_zero() {
        return Err(FillError::NoFillPossible);
    }
    Ok(result)
}
