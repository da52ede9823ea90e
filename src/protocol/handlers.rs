//! Handlers for the four CA operations.
//!
//! Admin operations speak JSON; end-entity operations follow EST conventions
//! (`/.well-known/est/...`, base64 PKCS#10 bodies, PEM certificates back).

use crate::error::{EstError, EstResult};
use crate::protocol::http::{framed_len, HttpRequest, HttpResponse};
use crate::protocol::OperationHandler;
use crate::session::Endpoint;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use estca_types::{EnrollmentProfile, FingerprintResult};
use openssl::x509::X509;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

pub const FINGERPRINT_PATH: &str = "/admin/v1/fingerprint";
pub const ENROLLMENT_PROFILES_PATH: &str = "/admin/v1/enrollment-profiles";
pub const CACERTS_PATH: &str = "/.well-known/est/cacerts";
pub const SIMPLE_ENROLL_PATH: &str = "/.well-known/est/simpleenroll";

#[derive(Debug, Serialize)]
struct FingerprintRequest<'a> {
    ca_name: &'a str,
}

#[derive(Debug, Deserialize)]
struct FingerprintResponse {
    algorithm: i64,
    /// base64
    fingerprint: String,
}

/// Admin: fetch the fingerprint of a named CA.
#[derive(Debug, Clone)]
pub struct FingerprintHandler {
    ca_name: String,
}

impl FingerprintHandler {
    pub fn new(ca_name: impl Into<String>) -> Self {
        Self {
            ca_name: ca_name.into(),
        }
    }
}

impl OperationHandler for FingerprintHandler {
    type Output = FingerprintResult;

    fn name(&self) -> &'static str {
        "get-ca-fingerprint"
    }

    fn build_request(&self, endpoint: &Endpoint) -> EstResult<Vec<u8>> {
        if self.ca_name.is_empty() {
            return Err(EstError::invalid_request("CA name must not be empty"));
        }
        let body = serde_json::to_vec(&FingerprintRequest {
            ca_name: &self.ca_name,
        })
        .map_err(|e| EstError::invalid_request(e.to_string()))?;
        Ok(HttpRequest::post(FINGERPRINT_PATH, "application/json", body).to_bytes(endpoint))
    }

    fn expected_len(&self, received: &[u8]) -> Option<usize> {
        framed_len(received)
    }

    fn parse_response(&self, response: &[u8]) -> EstResult<FingerprintResult> {
        let response = HttpResponse::parse(response)?;
        response.error_for_status()?;

        let parsed: FingerprintResponse = serde_json::from_slice(&response.body)
            .map_err(|e| EstError::response(format!("invalid fingerprint body: {}", e)))?;
        let fingerprint = BASE64
            .decode(parsed.fingerprint.trim())
            .map_err(|e| EstError::response(format!("invalid fingerprint encoding: {}", e)))?;
        if fingerprint.is_empty() {
            return Err(EstError::response("server returned an empty fingerprint"));
        }

        let result = FingerprintResult {
            algorithm_id: parsed.algorithm,
            fingerprint,
        };
        if result.algorithm().is_none() {
            warn!("Unrecognised fingerprint algorithm id {}", result.algorithm_id);
        }
        info!("Got fingerprint and algorithm: {}, {}", result.algorithm_id, result.hex());
        Ok(result)
    }
}

/// Admin: create an enrollment profile for an end entity.
#[derive(Debug, Clone)]
pub struct CreateProfileHandler {
    profile: EnrollmentProfile,
}

impl CreateProfileHandler {
    pub fn new(profile: EnrollmentProfile) -> Self {
        Self { profile }
    }
}

impl OperationHandler for CreateProfileHandler {
    type Output = ();

    fn name(&self) -> &'static str {
        "create-enrollment-profile"
    }

    fn build_request(&self, endpoint: &Endpoint) -> EstResult<Vec<u8>> {
        if self.profile.enrollment_id.is_empty() || self.profile.enrollment_secret.is_empty() {
            return Err(EstError::invalid_request(
                "enrollment id and secret must not be empty",
            ));
        }
        let body = serde_json::to_vec(&self.profile)
            .map_err(|e| EstError::invalid_request(e.to_string()))?;
        Ok(HttpRequest::post(ENROLLMENT_PROFILES_PATH, "application/json", body).to_bytes(endpoint))
    }

    fn expected_len(&self, received: &[u8]) -> Option<usize> {
        framed_len(received)
    }

    fn parse_response(&self, response: &[u8]) -> EstResult<()> {
        let response = HttpResponse::parse(response)?;
        response.error_for_status()?;
        info!(
            "Enrollment profile created for {}",
            self.profile.enrollment_id
        );
        Ok(())
    }
}

/// End entity: fetch the CA certificate chain.
#[derive(Debug, Clone, Copy, Default)]
pub struct CaCertHandler;

impl OperationHandler for CaCertHandler {
    type Output = String;

    fn name(&self) -> &'static str {
        "get-ca-cert"
    }

    fn build_request(&self, endpoint: &Endpoint) -> EstResult<Vec<u8>> {
        Ok(HttpRequest::get(CACERTS_PATH).to_bytes(endpoint))
    }

    fn expected_len(&self, received: &[u8]) -> Option<usize> {
        framed_len(received)
    }

    fn parse_response(&self, response: &[u8]) -> EstResult<String> {
        let response = HttpResponse::parse(response)?;
        response.error_for_status()?;
        certificate_chain(&response)
    }
}

/// End entity: submit a DER CSR for simple enrollment.
#[derive(Clone)]
pub struct SimpleEnrollHandler {
    csr_der: Vec<u8>,
}

impl SimpleEnrollHandler {
    pub fn new(csr_der: Vec<u8>) -> Self {
        Self { csr_der }
    }
}

impl std::fmt::Debug for SimpleEnrollHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimpleEnrollHandler")
            .field("csr_len", &self.csr_der.len())
            .finish()
    }
}

impl OperationHandler for SimpleEnrollHandler {
    type Output = String;

    fn name(&self) -> &'static str {
        "simple-enroll"
    }

    fn build_request(&self, endpoint: &Endpoint) -> EstResult<Vec<u8>> {
        if self.csr_der.is_empty() {
            return Err(EstError::invalid_request("CSR must not be empty"));
        }
        let body = BASE64.encode(&self.csr_der).into_bytes();
        Ok(HttpRequest::post(SIMPLE_ENROLL_PATH, "application/pkcs10", body)
            .header("Content-Transfer-Encoding", "base64")
            .to_bytes(endpoint))
    }

    fn expected_len(&self, received: &[u8]) -> Option<usize> {
        framed_len(received)
    }

    fn parse_response(&self, response: &[u8]) -> EstResult<String> {
        let response = HttpResponse::parse(response)?;
        if response.status == 202 {
            let retry = response.header("Retry-After").unwrap_or("unspecified");
            return Err(EstError::response(format!(
                "enrollment pending on the CA (retry after {})",
                retry
            )));
        }
        response.error_for_status()?;
        certificate_chain(&response)
    }
}

/// Decode every PEM certificate in the body and re-encode the chain.
fn certificate_chain(response: &HttpResponse) -> EstResult<String> {
    let certificates = X509::stack_from_pem(&response.body)
        .map_err(|e| EstError::response(format!("invalid PEM certificate: {}", e)))?;
    if certificates.is_empty() {
        return Err(EstError::response("response contains no PEM certificate"));
    }

    let mut chain = String::new();
    for certificate in &certificates {
        let pem = certificate
            .to_pem()
            .map_err(|e| EstError::response(format!("could not re-encode certificate: {}", e)))?;
        let pem = String::from_utf8(pem)
            .map_err(|_| EstError::response("certificate PEM is not valid UTF-8"))?;
        chain.push_str(&pem);
    }
    Ok(chain)
}
