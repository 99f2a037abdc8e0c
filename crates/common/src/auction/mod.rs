//! Host-side auction inputs: bid request descriptors and the auction context
//! shared by every bid in one bidder request.

pub mod descriptor;
pub mod types;

pub use descriptor::RawBidRequest;
pub use types::{
    AuctionContext, BidRequestDescriptor, MediaRequest, MediaType, PaapiFlags, RefererInfo, Size,
    SizeInput,
};
