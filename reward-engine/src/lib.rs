//! CoinVault Reward Engine
//!
//! Business layer over the coin ledger: daily link quotas, one-time
//! code redemption with level discounts, the level-upgrade policy, and
//! the withdrawal and purchase request lifecycles.
//!
//! All monetary movement is delegated to [`coin_ledger`]; this crate
//! decides when money moves and drives the request state machines.

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, clippy::all)]

pub mod config;
pub mod error;
pub mod level;
pub mod links;
pub mod purchase;
pub mod service;
pub mod transitions;
pub mod withdrawal;

// Re-exports
pub use config::{CodeDef, Config, LinkConfig, WithdrawalConfig};
pub use error::{Error, Result};
pub use links::{LinkEngine, LinkIssuance, LinkStats, RedemptionResult};
pub use purchase::PurchaseEngine;
pub use service::{GiftTransfer, RewardService};
pub use withdrawal::WithdrawalEngine;
