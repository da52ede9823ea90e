//! Shared types for the estca enrollment client.
//!
//! These are the caller-facing values exchanged with the CA client engine:
//! curve and signature-algorithm selectors, CSR subject attributes, admin
//! enrollment profiles and the typed results of each operation.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Elliptic curve used for end-entity key generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Curve {
    P256,
    P384,
    P521,
}

impl Curve {
    /// Canonical short name (`p256`, `p384`, `p521`).
    pub fn as_str(&self) -> &'static str {
        match self {
            Curve::P256 => "p256",
            Curve::P384 => "p384",
            Curve::P521 => "p521",
        }
    }
}

impl Default for Curve {
    fn default() -> Self {
        Curve::P256
    }
}

impl fmt::Display for Curve {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Curve {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "p256" | "p-256" | "prime256v1" | "secp256r1" => Ok(Curve::P256),
            "p384" | "p-384" | "secp384r1" => Ok(Curve::P384),
            "p521" | "p-521" | "secp521r1" => Ok(Curve::P521),
            other => Err(format!("unsupported curve: {}", other)),
        }
    }
}

/// Signature algorithm identifiers shared with the CA.
///
/// The numeric values are part of the wire contract (they match the CA's
/// algorithm numbering) and must not change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SignatureAlgorithm {
    EcdsaSha1,
    EcdsaSha256,
    EcdsaSha384,
    EcdsaSha512,
}

impl SignatureAlgorithm {
    pub fn id(&self) -> i64 {
        match self {
            SignatureAlgorithm::EcdsaSha1 => 9,
            SignatureAlgorithm::EcdsaSha256 => 10,
            SignatureAlgorithm::EcdsaSha384 => 11,
            SignatureAlgorithm::EcdsaSha512 => 12,
        }
    }

    pub fn from_id(id: i64) -> Option<Self> {
        match id {
            9 => Some(SignatureAlgorithm::EcdsaSha1),
            10 => Some(SignatureAlgorithm::EcdsaSha256),
            11 => Some(SignatureAlgorithm::EcdsaSha384),
            12 => Some(SignatureAlgorithm::EcdsaSha512),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SignatureAlgorithm::EcdsaSha1 => "ecdsa-sha1",
            SignatureAlgorithm::EcdsaSha256 => "ecdsa-sha256",
            SignatureAlgorithm::EcdsaSha384 => "ecdsa-sha384",
            SignatureAlgorithm::EcdsaSha512 => "ecdsa-sha512",
        }
    }
}

impl Default for SignatureAlgorithm {
    fn default() -> Self {
        SignatureAlgorithm::EcdsaSha256
    }
}

impl fmt::Display for SignatureAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SignatureAlgorithm {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "ecdsa-sha1" | "sha1" => Ok(SignatureAlgorithm::EcdsaSha1),
            "ecdsa-sha256" | "sha256" => Ok(SignatureAlgorithm::EcdsaSha256),
            "ecdsa-sha384" | "sha384" => Ok(SignatureAlgorithm::EcdsaSha384),
            "ecdsa-sha512" | "sha512" => Ok(SignatureAlgorithm::EcdsaSha512),
            other => Err(format!("unsupported signature algorithm: {}", other)),
        }
    }
}

/// Subject attributes placed in a certificate signing request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CertAttributes {
    /// Subject common name (required)
    pub common_name: String,
    #[serde(default)]
    pub organization: Option<String>,
    #[serde(default)]
    pub organizational_unit: Option<String>,
    #[serde(default)]
    pub locality: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
    /// Two-letter ISO country code
    #[serde(default)]
    pub country: Option<String>,
    /// subjectAltName DNS entries
    #[serde(default)]
    pub dns_names: Vec<String>,
    /// subjectAltName IP address entries
    #[serde(default)]
    pub ip_addresses: Vec<String>,
    /// subjectAltName e-mail entries
    #[serde(default)]
    pub emails: Vec<String>,
}

impl CertAttributes {
    pub fn new(common_name: impl Into<String>) -> Self {
        Self {
            common_name: common_name.into(),
            ..Default::default()
        }
    }

    pub fn has_subject_alt_names(&self) -> bool {
        !(self.dns_names.is_empty() && self.ip_addresses.is_empty() && self.emails.is_empty())
    }
}

/// Enrollment profile created on the CA by an administrator.
///
/// The enrollment secret is the PSK the end entity will later use; it is
/// wiped from memory when the profile is dropped.
#[derive(Clone, Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
pub struct EnrollmentProfile {
    pub enrollment_id: String,
    pub enrollment_secret: String,
    pub profile: String,
    pub ca_name: String,
    pub role: String,
}

impl fmt::Debug for EnrollmentProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EnrollmentProfile")
            .field("enrollment_id", &self.enrollment_id)
            .field("enrollment_secret", &"<redacted>")
            .field("profile", &self.profile)
            .field("ca_name", &self.ca_name)
            .field("role", &self.role)
            .finish()
    }
}

/// CA fingerprint returned by the admin channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FingerprintResult {
    pub algorithm_id: i64,
    pub fingerprint: Vec<u8>,
}

impl FingerprintResult {
    /// Upper-case hex rendering of the fingerprint bytes.
    pub fn hex(&self) -> String {
        hex::encode_upper(&self.fingerprint)
    }

    pub fn algorithm(&self) -> Option<SignatureAlgorithm> {
        SignatureAlgorithm::from_id(self.algorithm_id)
    }
}

/// Private key and issued certificate from a simple enrollment.
///
/// Both halves are always present together; key material is wiped on drop.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct EnrollmentResult {
    private_key_pem: String,
    certificate_pem: String,
}

impl EnrollmentResult {
    pub fn new(private_key_pem: String, certificate_pem: String) -> Self {
        Self {
            private_key_pem,
            certificate_pem,
        }
    }

    pub fn private_key_pem(&self) -> &str {
        &self.private_key_pem
    }

    pub fn certificate_pem(&self) -> &str {
        &self.certificate_pem
    }
}

impl fmt::Debug for EnrollmentResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EnrollmentResult")
            .field("private_key_pem", &"<redacted>")
            .field("certificate_pem", &self.certificate_pem)
            .finish()
    }
}

/// Outcome of a revocation request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RevocationStatus {
    /// The CA does not support revocation
    Unsupported,
}
