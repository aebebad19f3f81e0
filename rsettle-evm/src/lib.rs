#![cfg_attr(docsrs, feature(doc_auto_cfg))]

//! Alloy-backed collaborators for the rsettle payment pipeline.
//!
//! - [`wallet`] - [`RpcWallet`], an EIP-1193 wallet over any alloy provider
//! - [`pending`] - [`EvmPendingTransaction`], confirmation tracking for
//!   transactions submitted by a payment executor
//! - [`networks`] - Preset network configurations (`mainnet`, `matic`,
//!   `sepolia`, `xdai`)
//!
//! # Feature Flags
//!
//! - `telemetry` - tracing spans on wallet requests and receipt waits

pub mod networks;
pub mod pending;
pub mod wallet;

pub use networks::{known_networks, known_registry};
pub use pending::EvmPendingTransaction;
pub use wallet::RpcWallet;
