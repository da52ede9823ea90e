//! Session layer: credentials, transport connection, PSK session and the
//! protocol driver that ties them together for one exchange per call.

pub mod connector;
pub mod credentials;
pub mod driver;
pub mod secure;

pub use connector::{Connector, Endpoint, TcpConnector};
pub use credentials::{CredentialScope, Credentials};
pub use driver::{SessionDriver, SessionPhase};
pub use secure::{PskSession, PskTransport, SecureSession, SecureTransport, PSK_CIPHER_SUITE};
