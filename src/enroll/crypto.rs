//! Local key and CSR generation for end-entity enrollment.

use crate::error::{CryptoErrorKind, EstError, EstResult};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use estca_types::{CertAttributes, Curve, SignatureAlgorithm};
use openssl::ec::{EcGroup, EcKey};
use openssl::hash::MessageDigest;
use openssl::nid::Nid;
use openssl::pkey::{PKey, Private};
use openssl::stack::Stack;
use openssl::x509::extension::SubjectAlternativeName;
use openssl::x509::{X509NameBuilder, X509ReqBuilder, X509};
use zeroize::Zeroizing;

/// Key, CSR and PEM primitives the enrollment workflow depends on.
pub trait EnrollmentCrypto {
    type Key;

    fn generate_key(&self, curve: Curve) -> EstResult<Self::Key>;

    /// DER-encoded PKCS#10 request signed by `key`.
    fn generate_csr(
        &self,
        subject: &CertAttributes,
        key: &Self::Key,
        algorithm: SignatureAlgorithm,
    ) -> EstResult<Vec<u8>>;

    /// Curve parameters block, a blank line, then the private key block.
    fn encode_key_pem(&self, key: &Self::Key, curve: Curve) -> EstResult<Zeroizing<String>>;

    /// Whether the first certificate in `certificate_pem` carries `key`'s public half.
    fn certificate_matches_key(&self, certificate_pem: &str, key: &Self::Key) -> EstResult<bool>;
}

/// OpenSSL implementation of [`EnrollmentCrypto`].
#[derive(Debug, Clone, Copy, Default)]
pub struct OpenSslCrypto;

fn curve_nid(curve: Curve) -> Nid {
    match curve {
        Curve::P256 => Nid::X9_62_PRIME256V1,
        Curve::P384 => Nid::SECP384R1,
        Curve::P521 => Nid::SECP521R1,
    }
}

/// DER of the named-curve OID, i.e. the body of an `EC PARAMETERS` block.
fn curve_parameters_der(curve: Curve) -> &'static [u8] {
    match curve {
        Curve::P256 => &[0x06, 0x08, 0x2A, 0x86, 0x48, 0xCE, 0x3D, 0x03, 0x01, 0x07],
        Curve::P384 => &[0x06, 0x05, 0x2B, 0x81, 0x04, 0x00, 0x22],
        Curve::P521 => &[0x06, 0x05, 0x2B, 0x81, 0x04, 0x00, 0x23],
    }
}

fn digest(algorithm: SignatureAlgorithm) -> MessageDigest {
    match algorithm {
        SignatureAlgorithm::EcdsaSha1 => MessageDigest::sha1(),
        SignatureAlgorithm::EcdsaSha256 => MessageDigest::sha256(),
        SignatureAlgorithm::EcdsaSha384 => MessageDigest::sha384(),
        SignatureAlgorithm::EcdsaSha512 => MessageDigest::sha512(),
    }
}

fn csr_error(e: openssl::error::ErrorStack) -> EstError {
    EstError::crypto(CryptoErrorKind::CsrGenFailed, e.to_string())
}

impl EnrollmentCrypto for OpenSslCrypto {
    type Key = PKey<Private>;

    fn generate_key(&self, curve: Curve) -> EstResult<PKey<Private>> {
        let group = EcGroup::from_curve_name(curve_nid(curve))
            .map_err(|e| EstError::crypto(CryptoErrorKind::KeyGenFailed, e.to_string()))?;
        let ec_key = EcKey::generate(&group)
            .map_err(|e| EstError::crypto(CryptoErrorKind::KeyGenFailed, e.to_string()))?;
        PKey::from_ec_key(ec_key)
            .map_err(|e| EstError::crypto(CryptoErrorKind::KeyGenFailed, e.to_string()))
    }

    fn generate_csr(
        &self,
        subject: &CertAttributes,
        key: &PKey<Private>,
        algorithm: SignatureAlgorithm,
    ) -> EstResult<Vec<u8>> {
        let mut name = X509NameBuilder::new().map_err(csr_error)?;
        name.append_entry_by_nid(Nid::COMMONNAME, &subject.common_name)
            .map_err(csr_error)?;
        let optional = [
            (Nid::ORGANIZATIONNAME, &subject.organization),
            (Nid::ORGANIZATIONALUNITNAME, &subject.organizational_unit),
            (Nid::LOCALITYNAME, &subject.locality),
            (Nid::STATEORPROVINCENAME, &subject.state),
            (Nid::COUNTRYNAME, &subject.country),
        ];
        for (nid, value) in optional {
            if let Some(value) = value.as_deref().filter(|v| !v.is_empty()) {
                name.append_entry_by_nid(nid, value).map_err(csr_error)?;
            }
        }
        let name = name.build();

        let mut req = X509ReqBuilder::new().map_err(csr_error)?;
        req.set_version(0).map_err(csr_error)?;
        req.set_subject_name(&name).map_err(csr_error)?;
        req.set_pubkey(key).map_err(csr_error)?;

        if subject.has_subject_alt_names() {
            let mut san = SubjectAlternativeName::new();
            for dns in &subject.dns_names {
                san.dns(dns);
            }
            for ip in &subject.ip_addresses {
                san.ip(ip);
            }
            for email in &subject.emails {
                san.email(email);
            }
            let extension = san.build(&req.x509v3_context(None)).map_err(csr_error)?;
            let mut extensions = Stack::new().map_err(csr_error)?;
            extensions.push(extension).map_err(csr_error)?;
            req.add_extensions(&extensions).map_err(csr_error)?;
        }

        req.sign(key, digest(algorithm)).map_err(csr_error)?;
        req.build().to_der().map_err(csr_error)
    }

    fn encode_key_pem(&self, key: &PKey<Private>, curve: Curve) -> EstResult<Zeroizing<String>> {
        let encode_error = |e: openssl::error::ErrorStack| {
            EstError::crypto(CryptoErrorKind::KeyEncodeFailed, e.to_string())
        };
        let key_pem = Zeroizing::new(
            key.ec_key()
                .and_then(|ec| ec.private_key_to_pem())
                .map_err(encode_error)?,
        );
        let key_pem = std::str::from_utf8(&key_pem)
            .map_err(|e| EstError::crypto(CryptoErrorKind::KeyEncodeFailed, e.to_string()))?;

        let parameters = format!(
            "-----BEGIN EC PARAMETERS-----\n{}\n-----END EC PARAMETERS-----\n",
            BASE64.encode(curve_parameters_der(curve))
        );
        Ok(Zeroizing::new(format!("{}\n{}", parameters, key_pem)))
    }

    fn certificate_matches_key(&self, certificate_pem: &str, key: &PKey<Private>) -> EstResult<bool> {
        let certificate = X509::from_pem(certificate_pem.as_bytes())
            .map_err(|e| EstError::response(format!("issued certificate is not valid PEM: {}", e)))?;
        let public = certificate
            .public_key()
            .map_err(|e| EstError::response(format!("issued certificate has no usable key: {}", e)))?;
        Ok(public.public_eq(key))
    }
}
