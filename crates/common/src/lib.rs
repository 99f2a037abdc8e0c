//! Header-bidding adapters for RTB House and AdQuery, plus GU analytics.
//!
//! Adapters turn host bid request descriptors into partner HTTP requests and
//! partner responses back into normalized bids. They never perform I/O: the
//! host sends what they build through a [`transport::Transport`].
//!
//! # Modules
//!
//! - [`adapter`]: The `BidderAdapter` contract and the records it exchanges
//! - [`analytics`]: Auction lifecycle events and the batching queue
//! - [`auction`]: Bid request descriptors and the auction context
//! - [`constants`]: Content types, environment prefix and version
//! - [`error`]: Error types and error handling utilities
//! - [`identity`]: Process-scoped one-time user ids
//! - [`integrations`]: RTB House, AdQuery and GU analytics adapters
//! - [`json`]: Truthiness and merge helpers for untyped JSON
//! - [`logging`]: `fern` logger setup for binaries
//! - [`native`]: Native asset encoding and native markup decoding
//! - [`openrtb`]: OpenRTB request and response subset
//! - [`paapi`]: Protected Audience (FLEDGE) configuration and auction configs
//! - [`pixel`]: Tracking pixel URL builder
//! - [`privacy`]: GDPR consent, DSA and supply-chain validation
//! - [`settings`]: Configuration management and validation
//! - [`test_support`]: Testing utilities and mocks
//! - [`transport`]: Host network sink

pub mod adapter;
pub mod analytics;
pub mod auction;
pub mod constants;
pub mod error;
pub mod identity;
pub mod integrations;
pub mod json;
pub mod logging;
pub mod native;
pub mod openrtb;
pub mod paapi;
pub mod pixel;
pub mod privacy;
pub mod settings;
pub mod transport;
