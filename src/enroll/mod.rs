//! End-entity enrollment: local key/CSR generation and the simple-enroll workflow.

pub mod crypto;
pub mod workflow;

pub use crypto::{EnrollmentCrypto, OpenSslCrypto};
pub use workflow::{simple_enroll, split_key_pem, EnrollmentRequest};
