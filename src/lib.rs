pub mod client;
pub mod config;
pub mod enroll;
pub mod error;
pub mod protocol;
pub mod session;

pub use client::CaClient;
pub use crate::config::{ClientConfig, SessionConfig};
pub use enroll::EnrollmentRequest;
pub use error::{ErrorKind, EstError, EstResult};
pub use session::{Credentials, Endpoint};

pub use estca_types as types;

/// User-Agent sent with every request.
pub const USER_AGENT: &str = concat!("estca-client/", env!("CARGO_PKG_VERSION"));
