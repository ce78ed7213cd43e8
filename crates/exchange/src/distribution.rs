//! Fee and payout distribution.
//!
//! Given the filled amount one side pays, this plans the transfer legs in
//! their fixed order: protocol fee, royalties, origin fees, payout. Each
//! fee step carves its basis-point share off the original filled amount;
//! the payout step splits whatever remains, with rounding dust (and the
//! whole of an indivisible unit) going to the last payout recipient.

use {
    model::{
        asset::{Asset, AssetClass, AssetType},
        order::{Part, TOTAL_BPS},
    },
    number::U256Ext,
    primitive_types::{H160, U256},
    serde::{Deserialize, Serialize},
    thiserror::Error,
};

/// Royalties above this combined share are considered broken data.
const MAX_ROYALTY_BPS: u32 = 5_000;

#[derive(Debug, Error, Eq, PartialEq)]
pub enum DistributionError {
    #[error("fees and royalties exceed the filled amount")]
    FeesExceedAmount,
    #[error("combined royalties exceed 5000 bps")]
    RoyaltiesTooHigh,
    #[error("distribution arithmetic overflowed")]
    Overflow,
}

/// Which recipient group a transfer leg belongs to.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TransferKind {
    Protocol,
    Royalty,
    Origin,
    Payout,
}

/// Which side of the match a leg delivers value to. The left order is the
/// maker side of the match, the right order the taker side.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    ToMaker,
    ToTaker,
}

/// One value-moving leg of a settlement.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Transfer {
    pub asset: Asset,
    pub from: H160,
    pub to: H160,
    pub direction: Direction,
    pub kind: TransferKind,
}

/// Which side's payment carries the protocol fee.
///
/// The original rule is call-context convention, so the match entry point
/// takes this as an explicit parameter;
/// [`FeeSide::from_asset_classes`] reproduces the conventional choice.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FeeSide {
    Left,
    Right,
    None,
}

impl FeeSide {
    /// The side paying with the more money-like asset carries the fee; ties
    /// go to the left side, and a match of two whole-unit NFTs has no fee
    /// side.
    pub fn from_asset_classes(left_make: AssetClass, right_make: AssetClass) -> Self {
        fn rank(class: AssetClass) -> u8 {
            match class {
                AssetClass::Native | AssetClass::Wrapped => 3,
                AssetClass::Fungible => 2,
                AssetClass::NftMulti => 1,
                AssetClass::NftSingle => 0,
            }
        }
        match (rank(left_make), rank(right_make)) {
            (0, 0) => Self::None,
            (left, right) if left >= right => Self::Left,
            _ => Self::Right,
        }
    }
}

/// One paying side of a match, as seen by the distribution pipeline.
pub struct Side<'a> {
    /// The asset and amount this side delivers, in the receiving order's
    /// contracted form.
    pub payment: Asset,
    pub payer: H160,
    /// Maker of the receiving order; the default payout recipient.
    pub beneficiary: H160,
    /// Origin fees authorized by the paying order's payload.
    pub origin_fees: &'a [Part],
    /// Payout split requested by the receiving order's payload.
    pub payouts: &'a [Part],
    pub direction: Direction,
}

/// Protocol and royalty legs are always settled in the native coin when the
/// payment is coin denominated.
fn fee_asset_type(payment: &AssetType) -> AssetType {
    if payment.class.is_coin() {
        AssetType::native()
    } else {
        payment.clone()
    }
}

/// Plans the ordered transfer legs for one paying side.
///
/// `protocol_fee_bps` is `None` for the side not carrying the protocol fee.
/// Legs with a zero value are skipped; the returned legs sum exactly to the
/// payment amount.
pub fn plan_side(
    side: &Side,
    royalties: &[Part],
    protocol_fee_bps: Option<u16>,
    fee_receiver: H160,
) -> Result<Vec<Transfer>, DistributionError> {
    let amount = side.payment.value;
    let fee_type = fee_asset_type(&side.payment.asset_type);
    let mut rest = amount;
    let mut legs = Vec::new();

    // Every fee step is a share of the original amount, not of what the
    // previous step left over.
    let carve = |bps: u16, rest: &mut U256| -> Result<U256, DistributionError> {
        let value = amount.checked_bps(bps).ok_or(DistributionError::Overflow)?;
        *rest = rest
            .checked_sub(value)
            .ok_or(DistributionError::FeesExceedAmount)?;
        Ok(value)
    };

    if let Some(bps) = protocol_fee_bps {
        let value = carve(bps, &mut rest)?;
        if !value.is_zero() {
            legs.push(Transfer {
                asset: Asset::new(fee_type.clone(), value),
                from: side.payer,
                to: fee_receiver,
                direction: side.direction,
                kind: TransferKind::Protocol,
            });
        }
    }

    let royalty_total: u32 = royalties.iter().map(|part| u32::from(part.bps)).sum();
    if royalty_total > MAX_ROYALTY_BPS {
        return Err(DistributionError::RoyaltiesTooHigh);
    }
    for part in royalties {
        let value = carve(part.bps, &mut rest)?;
        if !value.is_zero() {
            legs.push(Transfer {
                asset: Asset::new(fee_type.clone(), value),
                from: side.payer,
                to: part.account,
                direction: side.direction,
                kind: TransferKind::Royalty,
            });
        }
    }

    for part in side.origin_fees {
        let value = carve(part.bps, &mut rest)?;
        if !value.is_zero() {
            legs.push(Transfer {
                asset: Asset::new(side.payment.asset_type.clone(), value),
                from: side.payer,
                to: part.account,
                direction: side.direction,
                kind: TransferKind::Origin,
            });
        }
    }

    let default_payout = [Part::new(side.beneficiary, TOTAL_BPS)];
    let payouts: &[Part] = if side.payouts.is_empty() {
        &default_payout
    } else {
        side.payouts
    };
    let payout_base = rest;
    let (last, shares) = payouts.split_last().expect("payouts are never empty");
    for part in shares {
        let value = payout_base
            .checked_bps(part.bps)
            .ok_or(DistributionError::Overflow)?;
        rest = rest
            .checked_sub(value)
            .ok_or(DistributionError::FeesExceedAmount)?;
        if !value.is_zero() {
            legs.push(Transfer {
                asset: Asset::new(side.payment.asset_type.clone(), value),
                from: side.payer,
                to: part.account,
                direction: side.direction,
                kind: TransferKind::Payout,
            });
        }
    }
    // The last recipient takes what is left, including rounding dust and
    // the whole of an indivisible unit.
    if !rest.is_zero() {
        legs.push(Transfer {
            asset: Asset::new(side.payment.asset_type.clone(), rest),
            from: side.payer,
            to: last.account,
            direction: side.direction,
            kind: TransferKind::Payout,
        });
    }

    tracing::debug!(
        amount = %side.payment.value,
        legs = legs.len(),
        payer = ?side.payer,
        "planned distribution side"
    );
    Ok(legs)
}
