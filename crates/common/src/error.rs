//! Error types shared by the adapters, the analytics module and the settings loader.
//!
//! Errors are wrapped in [`error_stack::Report`] inside the crate. Nothing of this
//! type crosses the adapter boundary: adapters log the report and degrade to
//! "no request" or "no bid".

use derive_more::{Display, Error};

#[derive(Debug, Display, Error)]
pub enum AdapterError {
    /// Settings could not be loaded or failed validation.
    #[display("Configuration error: {message}")]
    Configuration {
        #[error(not(source))]
        message: String,
    },

    /// A host-provided bid request could not be turned into a descriptor.
    #[display("Invalid bid request: {message}")]
    InvalidBidRequest {
        #[error(not(source))]
        message: String,
    },

    /// A payload could not be serialized for the partner endpoint.
    #[display("Serialization error: {message}")]
    Serialization {
        #[error(not(source))]
        message: String,
    },

    /// Analytics adapter misconfiguration.
    #[display("Analytics error: {message}")]
    Analytics {
        #[error(not(source))]
        message: String,
    },

    /// Unknown bidder code requested from the registry.
    #[display("Unknown bidder: {code}")]
    UnknownBidder {
        #[error(not(source))]
        code: String,
    },
}
