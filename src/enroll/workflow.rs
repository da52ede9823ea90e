//! Simple enrollment: key and CSR generation wrapped around one driver exchange.

use crate::enroll::crypto::EnrollmentCrypto;
use crate::error::{CryptoErrorKind, EstError, EstResult};
use crate::protocol::SimpleEnrollHandler;
use crate::session::{Connector, Credentials, Endpoint, SecureTransport, SessionDriver};
use estca_types::{CertAttributes, Curve, EnrollmentResult, SignatureAlgorithm};
use tracing::{error, info};

/// What the end entity asks the CA to certify.
#[derive(Debug, Clone)]
pub struct EnrollmentRequest {
    pub subject: CertAttributes,
    pub curve: Curve,
    pub signature_algorithm: SignatureAlgorithm,
}

impl EnrollmentRequest {
    pub fn new(subject: CertAttributes) -> Self {
        Self {
            subject,
            curve: Curve::default(),
            signature_algorithm: SignatureAlgorithm::default(),
        }
    }

    pub fn with_curve(mut self, curve: Curve) -> Self {
        self.curve = curve;
        self
    }

    pub fn with_signature_algorithm(mut self, algorithm: SignatureAlgorithm) -> Self {
        self.signature_algorithm = algorithm;
        self
    }
}

/// Generate a key and CSR, enroll over the driver and return the key with its certificate.
///
/// Nothing touches the network until both the key and the CSR exist. The key
/// is discarded if the CA response cannot be used.
pub fn simple_enroll<C, T, K>(
    driver: &SessionDriver<C, T>,
    crypto: &K,
    endpoint: &Endpoint,
    credentials: Credentials,
    request: &EnrollmentRequest,
) -> EstResult<EnrollmentResult>
where
    C: Connector,
    T: SecureTransport<C::Stream>,
    K: EnrollmentCrypto,
{
    if request.subject.common_name.trim().is_empty() {
        return Err(EstError::invalid_request("subject common name must not be empty"));
    }

    let key = crypto.generate_key(request.curve).map_err(|e| {
        error!("Error generating key: {}", e);
        e
    })?;
    info!(curve = %request.curve, "Key generated");

    let csr = crypto
        .generate_csr(&request.subject, &key, request.signature_algorithm)
        .map_err(|e| {
            error!("Error generating CSR: {}", e);
            e
        })?;
    info!(algorithm = %request.signature_algorithm, "CSR generated");

    let certificate = driver.exchange(endpoint, credentials, &SimpleEnrollHandler::new(csr))?;

    if !crypto.certificate_matches_key(&certificate, &key)? {
        error!("Issued certificate does not carry the generated public key");
        return Err(EstError::response(
            "issued certificate does not match the generated key",
        ));
    }

    let encoded = crypto.encode_key_pem(&key, request.curve)?;
    let private_key_pem = split_key_pem(&encoded)?;

    info!("Generating key and fetching certificate successful");
    Ok(EnrollmentResult::new(private_key_pem, certificate))
}

/// Drop the curve-parameters block the key encoder emits ahead of the key.
///
/// The encoder output is `<parameters>\n\n<key>`; the key is part 1.
pub fn split_key_pem(encoded: &str) -> EstResult<String> {
    encoded
        .split("\n\n")
        .nth(1)
        .filter(|key| !key.trim().is_empty())
        .map(str::to_owned)
        .ok_or_else(|| {
            EstError::crypto(
                CryptoErrorKind::KeyEncodeFailed,
                "encoded key is missing its key block",
            )
        })
}
