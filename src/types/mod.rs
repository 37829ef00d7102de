mod error;
mod request;

pub use error::{ErrorKind, Result};
pub(crate) use request::Request;
pub use request::{Enrichment, Response, Status};
