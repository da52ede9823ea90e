//! Caller-facing CA client.
//!
//! Admin operations authenticate with the administrator's PSK identity,
//! EST operations with the end entity's. Each call opens and tears down its
//! own session; a single `CaClient` can be shared across threads.

use crate::config::SessionConfig;
use crate::enroll::{simple_enroll, EnrollmentCrypto, EnrollmentRequest, OpenSslCrypto};
use crate::error::{EstError, EstResult};
use crate::protocol::{CaCertHandler, CreateProfileHandler, FingerprintHandler};
use crate::session::{
    Connector, Credentials, Endpoint, PskTransport, SecureTransport, SessionDriver, TcpConnector,
};
use estca_types::{EnrollmentProfile, EnrollmentResult, FingerprintResult, RevocationStatus};
use tracing::info;

/// Client for the CA's admin and enrollment channels.
#[derive(Debug, Clone)]
pub struct CaClient<C = TcpConnector, T = PskTransport, K = OpenSslCrypto> {
    driver: SessionDriver<C, T>,
    crypto: K,
}

impl CaClient {
    /// TCP + OpenSSL client using the given session limits.
    pub fn new(config: &SessionConfig) -> Self {
        Self::with_parts(
            TcpConnector::new(config.connect_timeout(), config.io_timeout()),
            PskTransport::new(),
            OpenSslCrypto,
            config.response_limit,
        )
    }
}

impl<C, T, K> CaClient<C, T, K>
where
    C: Connector,
    T: SecureTransport<C::Stream>,
    K: EnrollmentCrypto,
{
    pub fn with_parts(connector: C, transport: T, crypto: K, response_limit: usize) -> Self {
        Self {
            driver: SessionDriver::new(connector, transport, response_limit),
            crypto,
        }
    }

    /// Fetch the fingerprint of `ca_name` over the admin channel.
    pub fn get_ca_fingerprint(
        &self,
        endpoint: &Endpoint,
        admin: Credentials,
        ca_name: &str,
    ) -> EstResult<FingerprintResult> {
        check_credentials(&admin)?;
        self.driver
            .exchange(endpoint, admin, &FingerprintHandler::new(ca_name))
    }

    /// Create an enrollment profile so an end entity can later enroll with it.
    pub fn create_enrollment_profile(
        &self,
        endpoint: &Endpoint,
        admin: Credentials,
        profile: EnrollmentProfile,
    ) -> EstResult<()> {
        check_credentials(&admin)?;
        self.driver
            .exchange(endpoint, admin, &CreateProfileHandler::new(profile))
    }

    /// Revocation is not offered by the CA; this never touches the network.
    pub fn revoke_certificate(&self) -> RevocationStatus {
        info!("Certificate revocation is unsupported right now");
        RevocationStatus::Unsupported
    }

    /// Fetch the CA certificate chain as PEM.
    pub fn get_ca_cert(&self, endpoint: &Endpoint, credentials: Credentials) -> EstResult<String> {
        check_credentials(&credentials)?;
        self.driver.exchange(endpoint, credentials, &CaCertHandler)
    }

    /// Generate a key, enroll it and return the key with its issued certificate.
    pub fn get_id_cert(
        &self,
        endpoint: &Endpoint,
        credentials: Credentials,
        request: &EnrollmentRequest,
    ) -> EstResult<EnrollmentResult> {
        check_credentials(&credentials)?;
        simple_enroll(&self.driver, &self.crypto, endpoint, credentials, request)
    }
}

fn check_credentials(credentials: &Credentials) -> EstResult<()> {
    if credentials.identity().is_empty() {
        return Err(EstError::invalid_request("PSK identity must not be empty"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_revoke_is_unsupported() {
        let client = CaClient::new(&SessionConfig::default());
        assert_eq!(client.revoke_certificate(), RevocationStatus::Unsupported);
    }

    #[test]
    fn test_empty_identity_rejected_before_io() {
        let client = CaClient::new(&SessionConfig::default());
        // Port 9 (discard) on a TEST-NET address is never dialled.
        let endpoint = Endpoint::new("192.0.2.1", 9);
        let err = client
            .get_ca_cert(&endpoint, Credentials::new("", "pw"))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidRequest);
    }

    #[test]
    fn test_client_is_shareable_across_threads() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<CaClient>();
    }
}
