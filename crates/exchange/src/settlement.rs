//! The settlement entry point: match two signed orders and move every
//! resulting transfer leg atomically.
//!
//! The call sequence is validate, compute fills, plan both distribution
//! sides, execute every leg through the injected ports, then write the fill
//! ledger. Any failure aborts before the ledger is touched, so no partial
//! fill ever persists.

use {
    crate::{
        bridge::{BridgeError, CoinVault, LegExecutor},
        config::{ConfigError, ExchangeConfig},
        distribution::{self, Direction, FeeSide, Side, Transfer},
        fill::{self, FillError},
        ledger::FillStore,
        royalties::{RoyaltyError, RoyaltyRegistry},
        transfer::TransferExecutor,
        validation::{CallContext, OrderVerifier, SignedOrder, ValidationError},
    },
    model::{
        asset::{Asset, AssetClass, AssetDecodeError, AssetType},
        order::{Order, Part},
        DomainSeparator,
    },
    primitive_types::{H160, H256, U256},
    signature_validator::SignatureValidating,
    thiserror::Error,
};

#[derive(Debug, Error)]
pub enum MatchError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Fill(#[from] FillError),
    #[error(transparent)]
    Distribution(#[from] distribution::DistributionError),
    #[error(transparent)]
    Bridge(#[from] BridgeError),
    #[error(transparent)]
    Royalties(#[from] RoyaltyError),
    #[error(transparent)]
    Asset(#[from] AssetDecodeError),
    #[error("counterparty not allowed by the order's taker restriction")]
    WrongTaker,
    #[error("cancel caller is not the order maker")]
    CancelNotMaker,
    #[error("zero-salt orders cannot be cancelled")]
    CancelZeroSalt,
}

/// The input of one match call.
#[derive(Clone, Debug)]
pub struct MatchCall {
    pub left: SignedOrder,
    pub right: SignedOrder,
    /// Which side's payment carries the protocol fee. The conventional
    /// choice is [`FeeSide::from_asset_classes`].
    pub fee_side: FeeSide,
    pub ctx: CallContext,
}

/// The match event plus the ordered transfer legs that were executed.
#[derive(Clone, Debug)]
pub struct MatchReceipt {
    pub left_hash: H256,
    pub right_hash: H256,
    pub left_maker: H160,
    pub right_maker: H160,
    /// This call's increment of the left order's fill (take units).
    pub new_left_fill: U256,
    /// This call's increment of the right order's fill (take units).
    pub new_right_fill: U256,
    /// Left side's obligations fully before right side's.
    pub transfers: Vec<Transfer>,
}

pub struct Exchange<S, T, R, V, C> {
    config: ExchangeConfig,
    domain: DomainSeparator,
    fills: S,
    transfers: T,
    royalties: R,
    vault: V,
    eip1271: C,
}

impl<S, T, R, V, C> Exchange<S, T, R, V, C>
where
    S: FillStore,
    T: TransferExecutor,
    R: RoyaltyRegistry,
    V: CoinVault,
    C: SignatureValidating,
{
    pub fn new(
        config: ExchangeConfig,
        fills: S,
        transfers: T,
        royalties: R,
        vault: V,
        eip1271: C,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let domain = config.domain_separator();
        Ok(Self {
            config,
            domain,
            fills,
            transfers,
            royalties,
            vault,
            eip1271,
        })
    }

    pub fn config(&self) -> &ExchangeConfig {
        &self.config
    }

    pub fn domain_separator(&self) -> &DomainSeparator {
        &self.domain
    }

    /// The cumulative fill of an order, denominated in its take side.
    pub fn order_fill(&self, order_hash: &H256) -> U256 {
        self.fills.fill(order_hash)
    }

    /// Marks an order as unfillable forever. Only the maker may cancel, and
    /// only orders with a persistent identity (non-zero salt) can be.
    pub fn cancel(&mut self, order: &Order, ctx: &CallContext) -> Result<H256, MatchError> {
        if order.maker != ctx.caller {
            return Err(MatchError::CancelNotMaker);
        }
        if order.salt.is_zero() {
            return Err(MatchError::CancelZeroSalt);
        }
        let hash = order.hash();
        self.fills.set_fill(hash, U256::MAX);
        tracing::info!(?hash, maker = ?order.maker, "cancelled order");
        Ok(hash)
    }

    /// Matches two orders and settles the resulting transfers atomically.
    pub fn match_orders(&mut self, call: MatchCall) -> Result<MatchReceipt, MatchError> {
        let MatchCall {
            left,
            right,
            fee_side,
            ctx,
        } = call;

        let verifier = OrderVerifier {
            domain: &self.domain,
            operator: self.config.match_operator,
            eip1271: &self.eip1271,
        };
        let left_hash = verifier.validate(&left, &ctx)?;
        let right_hash = verifier.validate(&right, &ctx)?;

        // The taker restriction cuts both ways.
        if !left.order.taker.is_zero() && left.order.taker != right.order.maker {
            return Err(MatchError::WrongTaker);
        }
        if !right.order.taker.is_zero() && right.order.taker != left.order.maker {
            return Err(MatchError::WrongTaker);
        }
        // A standing order cannot force the exchange to hold native coin on
        // its behalf; resting receive assets must use the wrapped form.
        for order in [&left.order, &right.order] {
            if order.maker != ctx.caller
                && order.take_asset.asset_type.class == AssetClass::Native
            {
                return Err(BridgeError::MakerCannotReceiveNative.into());
            }
        }

        let left_filled = self.fills.fill(&left_hash);
        let right_filled = self.fills.fill(&right_hash);
        let fill = fill::fill_orders(
            &left.order,
            &right.order,
            left_filled,
            right_filled,
            self.config.wrapped_token,
        )?;

        // Each side delivers in the form the receiving order contracted
        // for; with the coin equivalence this differs from the payer's make
        // form at most by wrapping.
        let left_legs = distribution::plan_side(
            &Side {
                payment: Asset::new(
                    right.order.take_asset.asset_type.clone(),
                    fill.left_transfer,
                ),
                payer: left.order.maker,
                beneficiary: right.order.maker,
                origin_fees: left.order.data.origin_fees(),
                payouts: right.order.data.payouts(),
                direction: Direction::ToTaker,
            },
            &self.side_royalties(&left.order.take_asset.asset_type)?,
            matches!(fee_side, FeeSide::Left).then_some(self.config.protocol_fee_bps),
            self.config.fee_receiver,
        )?;
        let right_legs = distribution::plan_side(
            &Side {
                payment: Asset::new(
                    left.order.take_asset.asset_type.clone(),
                    fill.right_transfer,
                ),
                payer: right.order.maker,
                beneficiary: left.order.maker,
                origin_fees: right.order.data.origin_fees(),
                payouts: left.order.data.payouts(),
                direction: Direction::ToMaker,
            },
            &self.side_royalties(&right.order.take_asset.asset_type)?,
            matches!(fee_side, FeeSide::Right).then_some(self.config.protocol_fee_bps),
            self.config.fee_receiver,
        )?;

        if !ctx.attached_value.is_zero() {
            let caller_pays_coin = [&left.order, &right.order]
                .into_iter()
                .any(|order| {
                    order.maker == ctx.caller && order.make_asset.asset_type.class.is_coin()
                });
            if !caller_pays_coin {
                return Err(BridgeError::UnexpectedNativeValue.into());
            }
        }

        let mut leg_executor = LegExecutor {
            executor: &self.transfers,
            vault: &self.vault,
            exchange: self.config.exchange,
            caller: ctx.caller,
            attached: ctx.attached_value,
        };
        leg_executor.execute_side(left.order.maker, &left_legs)?;
        leg_executor.execute_side(right.order.maker, &right_legs)?;
        leg_executor.refund()?;

        // Ledger writes come last: a failed leg above must leave no trace.
        self.fills
            .set_fill(left_hash, left_filled.saturating_add(fill.left_fill_delta()));
        self.fills.set_fill(
            right_hash,
            right_filled.saturating_add(fill.right_fill_delta()),
        );

        tracing::info!(
            ?left_hash,
            ?right_hash,
            new_left_fill = %fill.left_fill_delta(),
            new_right_fill = %fill.right_fill_delta(),
            "matched orders"
        );

        let mut transfers = left_legs;
        transfers.extend(right_legs);
        Ok(MatchReceipt {
            left_hash,
            right_hash,
            left_maker: left.order.maker,
            right_maker: right.order.maker,
            new_left_fill: fill.left_fill_delta(),
            new_right_fill: fill.right_fill_delta(),
            transfers,
        })
    }

    /// Royalties for the asset a side is paying for. Only NFT classes carry
    /// royalties.
    fn side_royalties(&self, counter: &AssetType) -> Result<Vec<Part>, MatchError> {
        if !counter.class.is_nft() {
            return Ok(Vec::new());
        }
        let token = counter.decode_token()?;
        Ok(self
            .royalties
            .royalties(token.contract, token.token_id.unwrap_or_default())?)
    }
}

#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::{
            bridge::VaultError,
            distribution::TransferKind,
            ledger::InMemoryFillStore,
            transfer::TransferError,
        },
        model::{
            allowance::SignedAllowance,
            order::{OrderBuilder, OrderPayload},
            signature::{EcdsaSigningScheme, Signature},
        },
        secp256k1::SecretKey,
        signature_validator::MockSignatureValidating,
        std::{
            cell::{Cell, RefCell},
            collections::HashMap,
            rc::Rc,
        },
        web3::signing::{Key as _, SecretKeyRef},
    };

    fn addr(n: u64) -> H160 {
        H160::from_low_u64_be(n)
    }

    const EXCHANGE: u64 = 0xe0;
    const WRAPPED: u64 = 0xe1;
    const FEE_RECEIVER: u64 = 0xfe;

    fn maker_key() -> SecretKey {
        SecretKey::from_slice(&[0x11; 32]).unwrap()
    }

    fn operator_key() -> SecretKey {
        SecretKey::from_slice(&[0x22; 32]).unwrap()
    }

    /// Observable external world shared by all fake ports.
    #[derive(Default)]
    struct World {
        /// Every adapter transfer as (asset, from, to).
        transfers: RefCell<Vec<(Asset, H160, H160)>>,
        wrapped_balance: RefCell<HashMap<H160, U256>>,
        wrapped_allowance: RefCell<HashMap<H160, U256>>,
        deposited: Cell<U256>,
        royalties: Vec<Part>,
        fail_transfers: Cell<bool>,
        fail_royalties: bool,
    }

    impl TransferExecutor for Rc<World> {
        fn transfer(&self, asset: &Asset, from: H160, to: H160) -> Result<(), TransferError> {
            if self.fail_transfers.get() {
                return Err(TransferError::Failed("adapter down".into()));
            }
            // Wrapped coin is an ERC-20 like any other: moving it debits
            // the sender and credits the receiver.
            if asset.asset_type.class == AssetClass::Wrapped {
                let mut balances = self.wrapped_balance.borrow_mut();
                let sender = balances.entry(from).or_default();
                *sender = sender
                    .checked_sub(asset.value)
                    .ok_or_else(|| TransferError::Failed("wrapped balance underflow".into()))?;
                *balances.entry(to).or_default() += asset.value;
            }
            self.transfers.borrow_mut().push((asset.clone(), from, to));
            Ok(())
        }
    }

    impl CoinVault for Rc<World> {
        fn balance_of(&self, owner: H160) -> Result<U256, VaultError> {
            Ok(self
                .wrapped_balance
                .borrow()
                .get(&owner)
                .copied()
                .unwrap_or_default())
        }

        fn allowance_of(&self, owner: H160) -> Result<U256, VaultError> {
            Ok(self
                .wrapped_allowance
                .borrow()
                .get(&owner)
                .copied()
                .unwrap_or_default())
        }

        fn deposit(&self, value: U256) -> Result<(), VaultError> {
            self.deposited.set(self.deposited.get() + value);
            // Freshly wrapped coin sits with the exchange until forwarded.
            *self
                .wrapped_balance
                .borrow_mut()
                .entry(addr(EXCHANGE))
                .or_default() += value;
            Ok(())
        }

        fn withdraw_from(&self, owner: H160, value: U256) -> Result<(), VaultError> {
            let mut balances = self.wrapped_balance.borrow_mut();
            let balance = balances.entry(owner).or_default();
            *balance = balance
                .checked_sub(value)
                .ok_or_else(|| VaultError("wrapped balance underflow".into()))?;
            Ok(())
        }
    }

    impl RoyaltyRegistry for Rc<World> {
        fn royalties(&self, _token: H160, _token_id: U256) -> Result<Vec<Part>, RoyaltyError> {
            if self.fail_royalties {
                return Err(RoyaltyError::Lookup("registry down".into()));
            }
            Ok(self.royalties.clone())
        }
    }

    struct Harness {
        world: Rc<World>,
        exchange: Exchange<
            InMemoryFillStore,
            Rc<World>,
            Rc<World>,
            Rc<World>,
            MockSignatureValidating,
        >,
        domain: DomainSeparator,
    }

    impl Harness {
        fn new(world: World) -> Self {
            let config = ExchangeConfig {
                chain_id: 1,
                exchange: addr(EXCHANGE),
                wrapped_token: addr(WRAPPED),
                protocol_fee_bps: 100,
                fee_receiver: addr(FEE_RECEIVER),
                match_operator: SecretKeyRef::new(&operator_key()).address(),
            };
            let domain = config.domain_separator();
            let world = Rc::new(world);
            let exchange = Exchange::new(
                config,
                InMemoryFillStore::new(),
                world.clone(),
                world.clone(),
                world.clone(),
                MockSignatureValidating::new(),
            )
            .unwrap();
            Self {
                world,
                exchange,
                domain,
            }
        }

        /// A standing order signed by `key` with a fresh operator allowance.
        fn standing(&self, builder: OrderBuilder, key: &SecretKey) -> SignedOrder {
            let (order, signature) =
                builder.sign_with(EcdsaSigningScheme::Eip712, &self.domain, SecretKeyRef::new(key));
            let allowance = SignedAllowance::issue(
                &self.domain,
                order.hash(),
                u64::MAX,
                SecretKeyRef::new(&operator_key()),
            );
            SignedOrder {
                order,
                signature,
                allowance: Some(allowance),
            }
        }

        /// An order authorized in person by the direct caller.
        fn direct(&self, builder: OrderBuilder, caller: H160) -> SignedOrder {
            SignedOrder {
                order: builder.with_maker(caller).build(),
                signature: Signature::Direct,
                allowance: None,
            }
        }

        fn fund_wrapped(&self, owner: H160, value: u64) {
            self.world
                .wrapped_balance
                .borrow_mut()
                .insert(owner, value.into());
            self.world
                .wrapped_allowance
                .borrow_mut()
                .insert(owner, value.into());
        }
    }

    fn nft() -> AssetType {
        AssetType::erc721(addr(0xc), 7.into())
    }

    fn wrapped() -> AssetType {
        AssetType::wrapped(addr(WRAPPED))
    }

    fn erc20_a() -> AssetType {
        AssetType::erc20(addr(0xa))
    }

    fn erc20_b() -> AssetType {
        AssetType::erc20(addr(0xb))
    }

    fn ctx(caller: H160) -> CallContext {
        CallContext {
            caller,
            attached_value: U256::zero(),
            now: 1_000,
        }
    }

    #[test]
    fn fee_royalty_origin_payout_order_and_conservation() {
        let harness_world = World {
            royalties: vec![Part::new(addr(0x31), 100), Part::new(addr(0x32), 50)],
            ..Default::default()
        };
        let mut harness = Harness::new(harness_world);
        let taker = addr(0x71);
        harness.fund_wrapped(taker, 1_000_000);

        // Standing maker order: one NFT for a million of the wrapped coin.
        let right = harness.standing(
            OrderBuilder::default()
                .with_make_asset(Asset::new(nft(), 1u64))
                .with_take_asset(Asset::new(wrapped(), 1_000_000u64))
                .with_salt(1u64),
            &maker_key(),
        );
        // The buyer pays wrapped coin and authorizes two origin fees.
        let left = harness.direct(
            OrderBuilder::default()
                .with_make_asset(Asset::new(wrapped(), 1_000_000u64))
                .with_take_asset(Asset::new(nft(), 1u64))
                .with_payload(OrderPayload::v1(
                    vec![],
                    vec![Part::new(addr(0x41), 100), Part::new(addr(0x42), 50)],
                )),
            taker,
        );

        let receipt = harness
            .exchange
            .match_orders(MatchCall {
                left,
                right,
                fee_side: FeeSide::Left,
                ctx: ctx(taker),
            })
            .unwrap();

        let kinds: Vec<_> = receipt.transfers.iter().map(|leg| leg.kind).collect();
        assert_eq!(
            kinds,
            vec![
                TransferKind::Protocol,
                TransferKind::Royalty,
                TransferKind::Royalty,
                TransferKind::Origin,
                TransferKind::Origin,
                TransferKind::Payout,
                TransferKind::Payout,
            ]
        );
        // Protocol fee and royalties settle in the native coin even though
        // the payment is wrapped.
        assert_eq!(receipt.transfers[0].asset.asset_type, AssetType::native());
        assert_eq!(receipt.transfers[0].to, addr(FEE_RECEIVER));
        assert_eq!(receipt.transfers[1].asset.asset_type, AssetType::native());
        // The buyer side's legs conserve the payment exactly.
        let paid: U256 = receipt.transfers[..6]
            .iter()
            .fold(U256::zero(), |sum, leg| sum + leg.asset.value);
        assert_eq!(paid, 1_000_000.into());
        assert_eq!(
            receipt.transfers[5].asset.value,
            // 1% protocol + 1.5% royalties + 1.5% origin fees off the top.
            U256::from(1_000_000 - 10_000 - 15_000 - 15_000)
        );
        // The maker's NFT goes to the buyer last.
        let nft_leg = receipt.transfers.last().unwrap();
        assert_eq!(nft_leg.asset, Asset::new(nft(), 1u64));
        assert_eq!(nft_leg.to, receipt.left_maker);
        assert_eq!(receipt.new_left_fill, 1.into());
        assert_eq!(receipt.new_right_fill, 1_000_000.into());

        // The buyer's wallet is emptied: 25000 unwrapped for the fee legs,
        // the rest moved as wrapped coin; the maker ends up with the net
        // payout.
        let balances = harness.world.wrapped_balance.borrow();
        assert_eq!(balances[&taker], U256::zero());
        assert_eq!(
            balances[&SecretKeyRef::new(&maker_key()).address()],
            960_000.into()
        );
        assert_eq!(balances[&addr(0x41)], 10_000.into());
        assert_eq!(balances[&addr(0x42)], 5_000.into());
    }

    fn take(
        harness: &mut Harness,
        right: &SignedOrder,
        a: u64,
        b: u64,
        salt: u64,
    ) -> Result<MatchReceipt, MatchError> {
        let taker = addr(0x71);
        let left = harness.direct(
            OrderBuilder::default()
                .with_make_asset(Asset::new(erc20_a(), a))
                .with_take_asset(Asset::new(erc20_b(), b))
                .with_salt(salt),
            taker,
        );
        harness.exchange.match_orders(MatchCall {
            left,
            right: right.clone(),
            fee_side: FeeSide::Left,
            ctx: ctx(taker),
        })
    }

    #[test]
    fn partial_fills_accumulate_to_exactly_the_order_size() {
        let mut harness = Harness::new(World::default());

        // Standing order: sell 1000 B for 100 A, fill tracked in A.
        let right = harness.standing(
            OrderBuilder::default()
                .with_make_asset(Asset::new(erc20_b(), 1_000u64))
                .with_take_asset(Asset::new(erc20_a(), 100u64))
                .with_salt(1u64),
            &maker_key(),
        );
        let right_hash = right.order.hash();

        // 10%, then 50% of the remainder, then all of the rest.
        assert_eq!(
            take(&mut harness, &right, 10, 100, 2).unwrap().new_right_fill,
            10.into()
        );
        assert_eq!(
            take(&mut harness, &right, 45, 450, 3).unwrap().new_right_fill,
            45.into()
        );
        assert_eq!(
            take(&mut harness, &right, 45, 450, 4).unwrap().new_right_fill,
            45.into()
        );
        assert_eq!(harness.exchange.order_fill(&right_hash), 100.into());

        // The order is exhausted; a fourth attempt cannot fill.
        assert!(matches!(
            take(&mut harness, &right, 10, 100, 5),
            Err(MatchError::Fill(FillError::UnableToFillRight))
        ));
        assert_eq!(harness.exchange.order_fill(&right_hash), 100.into());
    }

    #[test]
    fn overpriced_bid_is_charged_the_makers_price() {
        let mut harness = Harness::new(World::default());
        let taker = addr(0x71);
        harness.fund_wrapped(taker, 200);

        // Maker sells one NFT for 100; the bid offers 200.
        let left = harness.standing(
            OrderBuilder::default()
                .with_make_asset(Asset::new(nft(), 1u64))
                .with_take_asset(Asset::new(wrapped(), 100u64))
                .with_salt(1u64),
            &maker_key(),
        );
        let right = harness.direct(
            OrderBuilder::default()
                .with_make_asset(Asset::new(wrapped(), 200u64))
                .with_take_asset(Asset::new(nft(), 1u64)),
            taker,
        );

        let receipt = harness
            .exchange
            .match_orders(MatchCall {
                left,
                right,
                fee_side: FeeSide::Right,
                ctx: ctx(taker),
            })
            .unwrap();

        // Exactly 100 charged: 1 native as protocol fee, 99 wrapped to the
        // maker.
        assert_eq!(receipt.new_left_fill, 100.into());
        assert_eq!(receipt.new_right_fill, 1.into());
        assert_eq!(
            harness.world.wrapped_balance.borrow()[&taker],
            U256::from(200 - 100)
        );
    }

    #[test]
    fn native_taker_settles_a_wrapped_maker_order() {
        let mut harness = Harness::new(World::default());
        let maker = SecretKeyRef::new(&maker_key()).address();
        let taker = addr(0x71);

        let right = harness.standing(
            OrderBuilder::default()
                .with_make_asset(Asset::new(nft(), 1u64))
                .with_take_asset(Asset::new(wrapped(), 100u64))
                .with_salt(1u64),
            &maker_key(),
        );
        let left = harness.direct(
            OrderBuilder::default()
                .with_make_asset(Asset::new(AssetType::native(), 100u64))
                .with_take_asset(Asset::new(nft(), 1u64)),
            taker,
        );

        let call_ctx = CallContext {
            caller: taker,
            attached_value: 150.into(),
            now: 1_000,
        };
        let receipt = harness
            .exchange
            .match_orders(MatchCall {
                left,
                right,
                fee_side: FeeSide::Left,
                ctx: call_ctx,
            })
            .unwrap();

        // The maker receives the wrapped form they contracted for.
        let payout = &receipt.transfers[1];
        assert_eq!(payout.kind, TransferKind::Payout);
        assert_eq!(payout.asset, Asset::new(wrapped(), 99u64));
        assert_eq!(payout.to, maker);
        // Exactly the wrapped portion was wrapped on the fly.
        assert_eq!(harness.world.deposited.get(), 99.into());

        let transfers = harness.world.transfers.borrow();
        // The taker never touches the wrapped coin: every wrapped movement
        // originates from the exchange.
        assert!(transfers
            .iter()
            .filter(|(asset, ..)| asset.asset_type.class == AssetClass::Wrapped)
            .all(|(_, from, to)| *from == addr(EXCHANGE) && *to != taker));
        // Unspent attached value comes back to the caller.
        let refund = transfers.last().unwrap();
        assert_eq!(refund.0, Asset::new(AssetType::native(), 50u64));
        assert_eq!((refund.1, refund.2), (addr(EXCHANGE), taker));
    }

    #[test]
    fn attached_value_without_a_coin_obligation_is_rejected() {
        let mut harness = Harness::new(World::default());
        let taker = addr(0x71);

        let right = harness.standing(
            OrderBuilder::default()
                .with_make_asset(Asset::new(erc20_b(), 100u64))
                .with_take_asset(Asset::new(erc20_a(), 100u64))
                .with_salt(1u64),
            &maker_key(),
        );
        let left = harness.direct(
            OrderBuilder::default()
                .with_make_asset(Asset::new(erc20_a(), 100u64))
                .with_take_asset(Asset::new(erc20_b(), 100u64)),
            taker,
        );

        let call_ctx = CallContext {
            caller: taker,
            attached_value: 1.into(),
            now: 1_000,
        };
        assert!(matches!(
            harness.exchange.match_orders(MatchCall {
                left,
                right,
                fee_side: FeeSide::Left,
                ctx: call_ctx,
            }),
            Err(MatchError::Bridge(BridgeError::UnexpectedNativeValue))
        ));
    }

    #[test]
    fn passive_makers_cannot_receive_raw_native_coin() {
        let mut harness = Harness::new(World::default());
        let taker = addr(0x71);

        // The standing order asks for raw native coin.
        let right = harness.standing(
            OrderBuilder::default()
                .with_make_asset(Asset::new(nft(), 1u64))
                .with_take_asset(Asset::new(AssetType::native(), 100u64))
                .with_salt(1u64),
            &maker_key(),
        );
        let left = harness.direct(
            OrderBuilder::default()
                .with_make_asset(Asset::new(AssetType::native(), 100u64))
                .with_take_asset(Asset::new(nft(), 1u64)),
            taker,
        );

        assert!(matches!(
            harness.exchange.match_orders(MatchCall {
                left,
                right,
                fee_side: FeeSide::Left,
                ctx: ctx(taker),
            }),
            Err(MatchError::Bridge(BridgeError::MakerCannotReceiveNative))
        ));
    }

    #[test]
    fn taker_restricted_orders_only_match_their_counterparty() {
        let mut harness = Harness::new(World::default());
        let taker = addr(0x71);

        let right = harness.standing(
            OrderBuilder::default()
                .with_make_asset(Asset::new(erc20_b(), 100u64))
                .with_take_asset(Asset::new(erc20_a(), 100u64))
                .with_taker(addr(0x99))
                .with_salt(1u64),
            &maker_key(),
        );
        let left = harness.direct(
            OrderBuilder::default()
                .with_make_asset(Asset::new(erc20_a(), 100u64))
                .with_take_asset(Asset::new(erc20_b(), 100u64)),
            taker,
        );

        assert!(matches!(
            harness.exchange.match_orders(MatchCall {
                left,
                right,
                fee_side: FeeSide::Left,
                ctx: ctx(taker),
            }),
            Err(MatchError::WrongTaker)
        ));
    }

    #[test]
    fn indivisible_assets_go_entirely_to_the_last_payout_recipient() {
        let mut harness = Harness::new(World::default());
        let taker = addr(0x71);
        harness.fund_wrapped(taker, 100);

        let right = harness.standing(
            OrderBuilder::default()
                .with_make_asset(Asset::new(nft(), 1u64))
                .with_take_asset(Asset::new(wrapped(), 100u64))
                .with_salt(1u64),
            &maker_key(),
        );
        // The buyer splits the received NFT 75/25; the whole unit must land
        // on the last recipient.
        let left = harness.direct(
            OrderBuilder::default()
                .with_make_asset(Asset::new(wrapped(), 100u64))
                .with_take_asset(Asset::new(nft(), 1u64))
                .with_payload(OrderPayload::v1(
                    vec![Part::new(addr(0x81), 7_500), Part::new(addr(0x82), 2_500)],
                    vec![],
                )),
            taker,
        );

        let receipt = harness
            .exchange
            .match_orders(MatchCall {
                left,
                right,
                fee_side: FeeSide::Left,
                ctx: ctx(taker),
            })
            .unwrap();

        let nft_legs: Vec<_> = receipt
            .transfers
            .iter()
            .filter(|leg| leg.asset.asset_type == nft())
            .collect();
        assert_eq!(nft_legs.len(), 1);
        assert_eq!(nft_legs[0].to, addr(0x82));
        assert_eq!(nft_legs[0].asset.value, 1.into());
    }

    #[test]
    fn failed_transfers_leave_no_fill_behind() {
        let world = World::default();
        world.fail_transfers.set(true);
        let mut harness = Harness::new(world);
        let taker = addr(0x71);

        let right = harness.standing(
            OrderBuilder::default()
                .with_make_asset(Asset::new(erc20_b(), 100u64))
                .with_take_asset(Asset::new(erc20_a(), 100u64))
                .with_salt(1u64),
            &maker_key(),
        );
        let right_hash = right.order.hash();
        let left = harness.direct(
            OrderBuilder::default()
                .with_make_asset(Asset::new(erc20_a(), 100u64))
                .with_take_asset(Asset::new(erc20_b(), 100u64)),
            taker,
        );

        assert!(matches!(
            harness.exchange.match_orders(MatchCall {
                left: left.clone(),
                right: right.clone(),
                fee_side: FeeSide::Left,
                ctx: ctx(taker),
            }),
            Err(MatchError::Bridge(BridgeError::Transfer(_)))
        ));
        assert_eq!(harness.exchange.order_fill(&right_hash), U256::zero());

        // With the adapter healthy again the same call settles.
        harness.world.fail_transfers.set(false);
        harness
            .exchange
            .match_orders(MatchCall {
                left,
                right,
                fee_side: FeeSide::Left,
                ctx: ctx(taker),
            })
            .unwrap();
        assert_eq!(harness.exchange.order_fill(&right_hash), 100.into());
    }

    #[test]
    fn royalty_registry_failures_abort_the_match() {
        let world = World {
            fail_royalties: true,
            ..Default::default()
        };
        let mut harness = Harness::new(world);
        let taker = addr(0x71);
        harness.fund_wrapped(taker, 100);

        let right = harness.standing(
            OrderBuilder::default()
                .with_make_asset(Asset::new(nft(), 1u64))
                .with_take_asset(Asset::new(wrapped(), 100u64))
                .with_salt(1u64),
            &maker_key(),
        );
        let right_hash = right.order.hash();
        let left = harness.direct(
            OrderBuilder::default()
                .with_make_asset(Asset::new(wrapped(), 100u64))
                .with_take_asset(Asset::new(nft(), 1u64)),
            taker,
        );

        assert!(matches!(
            harness.exchange.match_orders(MatchCall {
                left,
                right,
                fee_side: FeeSide::Left,
                ctx: ctx(taker),
            }),
            Err(MatchError::Royalties(_))
        ));
        assert_eq!(harness.exchange.order_fill(&right_hash), U256::zero());
    }

    #[test]
    fn cancelled_orders_never_fill_again() {
        let mut harness = Harness::new(World::default());
        let maker = SecretKeyRef::new(&maker_key()).address();
        let taker = addr(0x71);

        let right = harness.standing(
            OrderBuilder::default()
                .with_make_asset(Asset::new(erc20_b(), 100u64))
                .with_take_asset(Asset::new(erc20_a(), 100u64))
                .with_salt(1u64),
            &maker_key(),
        );

        // Only the maker may cancel.
        assert!(matches!(
            harness.exchange.cancel(&right.order, &ctx(taker)),
            Err(MatchError::CancelNotMaker)
        ));
        // Orders without a persistent identity cannot be cancelled.
        let ephemeral = OrderBuilder::default().with_maker(maker).build();
        assert!(matches!(
            harness.exchange.cancel(&ephemeral, &ctx(maker)),
            Err(MatchError::CancelZeroSalt)
        ));

        let hash = harness.exchange.cancel(&right.order, &ctx(maker)).unwrap();
        assert_eq!(harness.exchange.order_fill(&hash), U256::MAX);

        let left = harness.direct(
            OrderBuilder::default()
                .with_make_asset(Asset::new(erc20_a(), 100u64))
                .with_take_asset(Asset::new(erc20_b(), 100u64)),
            taker,
        );
        assert!(matches!(
            harness.exchange.match_orders(MatchCall {
                left,
                right,
                fee_side: FeeSide::Left,
                ctx: ctx(taker),
            }),
            Err(MatchError::Fill(_))
        ));
    }

    #[test]
    fn payouts_split_coin_proceeds_between_recipients() {
        let mut harness = Harness::new(World::default());
        let taker = addr(0x71);
        harness.fund_wrapped(taker, 10_000);

        // The maker routes proceeds 90/10 between two accounts.
        let right = harness.standing(
            OrderBuilder::default()
                .with_make_asset(Asset::new(nft(), 1u64))
                .with_take_asset(Asset::new(wrapped(), 10_000u64))
                .with_payload(OrderPayload::v1(
                    vec![Part::new(addr(0x91), 9_000), Part::new(addr(0x92), 1_000)],
                    vec![],
                ))
                .with_salt(1u64),
            &maker_key(),
        );
        let left = harness.direct(
            OrderBuilder::default()
                .with_make_asset(Asset::new(wrapped(), 10_000u64))
                .with_take_asset(Asset::new(nft(), 1u64)),
            taker,
        );

        let receipt = harness
            .exchange
            .match_orders(MatchCall {
                left,
                right,
                fee_side: FeeSide::Left,
                ctx: ctx(taker),
            })
            .unwrap();

        let payouts: Vec<_> = receipt
            .transfers
            .iter()
            .filter(|leg| {
                leg.kind == TransferKind::Payout && leg.asset.asset_type.class == AssetClass::Wrapped
            })
            .collect();
        // 1% protocol fee first, then 90/10 of the 9900 remainder with dust
        // to the last recipient.
        assert_eq!(payouts.len(), 2);
        assert_eq!(payouts[0].to, addr(0x91));
        assert_eq!(payouts[0].asset.value, 8_910.into());
        assert_eq!(payouts[1].to, addr(0x92));
        assert_eq!(payouts[1].asset.value, 990.into());
    }
}
