//! MX resolution for the recipient domain.
//!
//! [`lookup_mx`] queries the system resolver and returns the records ordered by
//! preference. The send path goes through `resolve_hosts`, which turns the
//! records into the candidate host list handed to the connector, in the order
//! the resolver produced them.

mod error;
mod resolver;
mod types;

pub use error::MxError;
pub use resolver::lookup_mx;
pub use types::MxRecord;

pub(crate) use resolver::{LookupMx, SystemResolver, resolve_hosts};
