//! CrudService: generic CRUD and association handling using the safe SQL builder.

mod binder;
mod crud;
mod validation;
pub use binder::{parse_resource_uri, BodyBinder, BoundBody, BoundLink};
pub use crud::{CrudService, Page};
pub use validation::RequestValidator;
