//! PSK-secured session establishment over an open connection.
//!
//! The default [`PskTransport`] uses OpenSSL with exactly one cipher suite,
//! [`PSK_CIPHER_SUITE`], capped at TLS 1.2 so no other suite family can be
//! negotiated. The PSK callback resolves the secret through the call's
//! [`CredentialScope`].

use crate::error::{EstError, EstResult};
use crate::session::credentials::CredentialScope;
use openssl::error::ErrorStack;
use openssl::ssl::{Ssl, SslContext, SslMethod, SslStream, SslVerifyMode, SslVersion};
use std::fmt;
use std::io::{self, Read, Write};
use tracing::{error, info, warn};

/// The single cipher suite the CA accepts.
pub const PSK_CIPHER_SUITE: &str = "PSK-AES256-CBC-SHA";

/// A handshake-complete secure channel.
///
/// Dropping the session closes the underlying connection.
pub trait SecureSession: Read + Write {
    /// Notify the peer that the session is ending.
    fn shutdown(&mut self) -> io::Result<()>;
}

/// Wraps a connection in a secure session bound to the scope's identity.
pub trait SecureTransport<S> {
    type Session: SecureSession;

    /// Bind the identity, fix the cipher suite and run the client handshake.
    ///
    /// On failure the connection is dropped and nothing half-initialized remains.
    fn establish(&self, stream: S, scope: &CredentialScope) -> EstResult<Self::Session>;
}

/// OpenSSL-backed TLS-PSK transport.
#[derive(Debug, Clone, Copy, Default)]
pub struct PskTransport;

impl PskTransport {
    pub fn new() -> Self {
        Self
    }

    fn context(&self, scope: &CredentialScope, identity: &str) -> Result<SslContext, ErrorStack> {
        let mut builder = SslContext::builder(SslMethod::tls_client())?;

        let scope = scope.clone();
        let identity = identity.to_owned();
        builder.set_psk_client_callback(move |_ssl, _hint, identity_buf, psk_buf| {
            write_psk(&scope, &identity, identity_buf, psk_buf)
        });

        builder.set_max_proto_version(Some(SslVersion::TLS1_2))?;
        builder.set_cipher_list(PSK_CIPHER_SUITE)?;
        builder.set_verify(SslVerifyMode::NONE);
        Ok(builder.build())
    }
}

impl<S> SecureTransport<S> for PskTransport
where
    S: Read + Write + fmt::Debug,
{
    type Session = PskSession<S>;

    fn establish(&self, stream: S, scope: &CredentialScope) -> EstResult<PskSession<S>> {
        let identity = scope
            .identity()
            .ok_or_else(|| EstError::handshake("no credentials installed for this session"))?;

        let context = self.context(scope, &identity).map_err(|e| {
            error!("Could not configure PSK cipher suite: {}", e);
            EstError::handshake(format!("cipher setup failed: {}", e))
        })?;
        let ssl = Ssl::new(&context).map_err(|e| EstError::handshake(e.to_string()))?;

        let stream = ssl.connect(stream).map_err(|e| {
            error!("Could not complete PSK handshake: {}", e);
            EstError::handshake(e.to_string())
        })?;

        info!(
            cipher = stream.ssl().current_cipher().map(|c| c.name()).unwrap_or("unknown"),
            "PSK handshake successful"
        );
        Ok(PskSession { stream })
    }
}

/// Fill OpenSSL's identity and PSK buffers from the scope.
///
/// The identity is written NUL-terminated; the return value is the PSK length.
fn write_psk(
    scope: &CredentialScope,
    identity: &str,
    identity_buf: &mut [u8],
    psk_buf: &mut [u8],
) -> Result<usize, ErrorStack> {
    let Some(secret) = scope.lookup(identity) else {
        warn!("No PSK available for identity {}", identity);
        return Err(ErrorStack::get());
    };

    let id = identity.as_bytes();
    if id.len() >= identity_buf.len() || secret.len() > psk_buf.len() {
        warn!("PSK identity or secret too long for the handshake buffers");
        return Err(ErrorStack::get());
    }

    identity_buf[..id.len()].copy_from_slice(id);
    identity_buf[id.len()] = 0;
    psk_buf[..secret.len()].copy_from_slice(&secret);
    Ok(secret.len())
}

/// Established OpenSSL PSK session.
pub struct PskSession<S> {
    stream: SslStream<S>,
}

impl<S> fmt::Debug for PskSession<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PskSession").finish_non_exhaustive()
    }
}

impl<S: Read + Write> Read for PskSession<S> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.stream.read(buf)
    }
}

impl<S: Read + Write> Write for PskSession<S> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.stream.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.stream.flush()
    }
}

impl<S: Read + Write> SecureSession for PskSession<S> {
    fn shutdown(&mut self) -> io::Result<()> {
        self.stream
            .shutdown()
            .map(|_| ())
            .map_err(|e| io::Error::other(e.to_string()))
    }
}
