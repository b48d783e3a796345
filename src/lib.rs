//! Live EIP-1559 fee tracking for Ethereum, Polygon and Arbitrum.
//!
//! [`store::GasStore`] polls an Alchemy gateway ([`rpc`]) and a price index
//! ([`price`]) on fixed intervals and publishes a [`data::StoreState`] that the
//! terminal dashboard ([`ui`]) and the cost [`simulator`] read from.

pub mod config;
pub mod data;
pub mod error;
pub mod price;
pub mod rpc;
pub mod simulator;
pub mod store;
#[cfg(test)]
mod testing;
pub mod ui;
