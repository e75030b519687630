//! Request extractors: link base and media type, JSON bodies, URI lists.

mod body;
mod links;
pub use body::{JsonBody, UriList, URI_LIST};
pub use links::{HalContext, FORWARDED_HOST_HEADER, FORWARDED_PROTO_HEADER};
