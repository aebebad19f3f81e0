#![cfg_attr(docsrs, feature(doc_auto_cfg))]

//! Settlement pipeline for fiat-denominated payment requests on EVM networks.
//!
//! A payment request states an amount owed in one currency (often fiat, such
//! as EUR) and the on-chain protocol it accepts. This crate drives a connected
//! wallet through everything needed to pay it: picking the right payment
//! network, converting fiat into a bounded crypto spend, moving the wallet
//! onto the right chain, raising the token allowance, and submitting the
//! payment.
//!
//! Signing, broadcasting and contract encoding are not done here. They sit
//! behind the [`wallet::Wallet`] and [`executor::PaymentExecutor`] traits,
//! while rates and currency metadata come from [`oracle::RateOracle`] and
//! [`currency::CurrencyRegistry`] implementations (see the `rsettle-http`
//! and `rsettle-evm` crates).
//!
//! # Modules
//!
//! - [`allowance`] - ERC20 allowance state machine
//! - [`config`] - Slippage, confirmations and currency aliases
//! - [`conversion`] - Fiat to crypto spend-ceiling arithmetic
//! - [`currency`] - Currency metadata and registry trait
//! - [`error`] - Error types for every pipeline layer
//! - [`executor`] - Payment-execution capability
//! - [`gateway`] - Wallet network switching
//! - [`networks`] - Chain ids and the injected network registry
//! - [`oracle`] - Rate oracle trait
//! - [`payment_network`] - Payment-network classification
//! - [`request`] - The invoice being paid
//! - [`settlement`] - The end-to-end orchestrator
//! - [`wallet`] - EIP-1193 wallet capability
//!
//! # Feature Flags
//!
//! - `telemetry` - Enables tracing instrumentation for debugging and monitoring

pub mod allowance;
pub mod config;
pub mod conversion;
pub mod currency;
pub mod error;
pub mod executor;
pub mod gateway;
pub mod networks;
pub mod oracle;
pub mod payment_network;
pub mod request;
pub mod settlement;
pub mod wallet;

pub use config::SettlementConfig;
pub use error::{SettlementError, SettlementErrorKind, SettlementStep};
pub use gateway::NetworkGateway;
pub use networks::{ChainId, NetworkInfo, NetworkRegistry};
pub use request::Request;
pub use settlement::SettlementOrchestrator;
