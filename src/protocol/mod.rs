//! Message layer: how each operation's request is built and its response parsed.
//!
//! The session driver treats payloads as opaque bytes; everything it needs to
//! know about a particular operation goes through [`OperationHandler`].

pub mod handlers;
pub mod http;

use crate::error::EstResult;
use crate::session::Endpoint;

pub use handlers::{CaCertHandler, CreateProfileHandler, FingerprintHandler, SimpleEnrollHandler};

/// Builds one operation's request and interprets its response.
pub trait OperationHandler {
    type Output;

    /// Short operation name for logs.
    fn name(&self) -> &'static str;

    fn build_request(&self, endpoint: &Endpoint) -> EstResult<Vec<u8>>;

    /// Total response length once enough of it has arrived to tell.
    ///
    /// `None` means unknown; the driver then reads until the peer closes or
    /// the response ceiling is reached.
    fn expected_len(&self, received: &[u8]) -> Option<usize> {
        let _ = received;
        None
    }

    fn parse_response(&self, response: &[u8]) -> EstResult<Self::Output>;
}
