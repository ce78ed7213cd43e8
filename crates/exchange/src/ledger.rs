//! The fill ledger: per-order cumulative fill counters.
//!
//! This is the only mutable state the settlement core owns. Entries are
//! created lazily on first fill, are monotonically non-decreasing and are
//! never deleted. Fills are denominated in the order's take side.

use {
    primitive_types::{H256, U256},
    std::collections::HashMap,
};

pub trait FillStore {
    /// The cumulative fill of an order; zero for orders never filled.
    fn fill(&self, order_hash: &H256) -> U256;

    fn set_fill(&mut self, order_hash: H256, fill: U256);
}

#[derive(Clone, Debug, Default)]
pub struct InMemoryFillStore(HashMap<H256, U256>);

impl InMemoryFillStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl FillStore for InMemoryFillStore {
    fn fill(&self, order_hash: &H256) -> U256 {
        self.0.get(order_hash).copied().unwrap_or_default()
    }

    fn set_fill(&mut self, order_hash: H256, fill: U256) {
        self.0.insert(order_hash, fill);
    }
}
