//! Query parameters to predicates and pageable requests.

mod binding;
mod pageable;
pub use binding::*;
pub use pageable::*;

/// Parameter names consumed by paging and sorting, never bound as predicates.
pub const RESERVED_PARAMS: &[&str] = &["page", "size", "sort"];
