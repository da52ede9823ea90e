//! Transient PSK credentials for a single session.
//!
//! A [`CredentialScope`] is created for one call and handed explicitly to the
//! secure-session establisher; nothing here is process-wide, so concurrent
//! calls never observe each other's identity or secret. Secret material is
//! zeroized when cleared or dropped.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

/// Identity/secret pair used to authenticate one PSK handshake.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct Credentials {
    identity: String,
    secret: String,
}

impl Credentials {
    pub fn new(identity: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            identity: identity.into(),
            secret: secret.into(),
        }
    }

    pub fn identity(&self) -> &str {
        &self.identity
    }

    pub(crate) fn secret(&self) -> &str {
        &self.secret
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("identity", &self.identity)
            .field("secret", &"<redacted>")
            .finish()
    }
}

/// Per-call slot holding at most one installed [`Credentials`].
///
/// Clones share the slot, which lets a PSK callback owned by the TLS library
/// resolve the secret while the driver keeps the authority to clear it.
#[derive(Clone, Default)]
pub struct CredentialScope {
    slot: Arc<Mutex<Option<Credentials>>>,
}

impl CredentialScope {
    /// Create a scope with `credentials` installed.
    pub fn begin(credentials: Credentials) -> Self {
        Self {
            slot: Arc::new(Mutex::new(Some(credentials))),
        }
    }

    /// Return the secret if `identity` matches the installed identity.
    ///
    /// Empty identities never match, and nothing matches once [`end`](Self::end) ran.
    pub fn lookup(&self, identity: &str) -> Option<Zeroizing<Vec<u8>>> {
        if identity.is_empty() {
            return None;
        }
        let guard = self.lock();
        guard
            .as_ref()
            .filter(|c| c.identity == identity)
            .map(|c| Zeroizing::new(c.secret().as_bytes().to_vec()))
    }

    /// Identity currently installed, if any.
    pub fn identity(&self) -> Option<String> {
        self.lock().as_ref().map(|c| c.identity.clone())
    }

    pub fn is_active(&self) -> bool {
        self.lock().is_some()
    }

    /// Clear the installed pair. Idempotent.
    pub fn end(&self) {
        // Dropping the credentials zeroizes them.
        self.lock().take();
    }

    fn lock(&self) -> MutexGuard<'_, Option<Credentials>> {
        self.slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl fmt::Debug for CredentialScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialScope")
            .field("identity", &self.identity())
            .finish_non_exhaustive()
    }
}

/// Ends a [`CredentialScope`] when dropped.
pub(crate) struct ScopeGuard {
    scope: CredentialScope,
}

impl ScopeGuard {
    pub(crate) fn new(scope: CredentialScope) -> Self {
        Self { scope }
    }

    pub(crate) fn scope(&self) -> &CredentialScope {
        &self.scope
    }
}

impl Drop for ScopeGuard {
    fn drop(&mut self) {
        self.scope.end();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::thread;

    #[test]
    fn test_lookup_matches_installed_identity() {
        let scope = CredentialScope::begin(Credentials::new("admin", "s3cret"));
        assert_eq!(scope.lookup("admin").as_deref().map(Vec::as_slice), Some(&b"s3cret"[..]));
        assert!(scope.lookup("someone-else").is_none());
        assert!(scope.lookup("").is_none());
        assert_eq!(scope.identity().as_deref(), Some("admin"));
    }

    #[test]
    fn test_end_clears_and_is_idempotent() {
        let scope = CredentialScope::begin(Credentials::new("admin", "s3cret"));
        let callback_view = scope.clone();
        scope.end();
        scope.end();
        assert!(!scope.is_active());
        assert!(callback_view.lookup("admin").is_none());
        assert!(callback_view.identity().is_none());
    }

    #[test]
    fn test_guard_ends_scope_on_drop() {
        let scope = CredentialScope::begin(Credentials::new("ee-1", "pw"));
        {
            let guard = ScopeGuard::new(scope.clone());
            assert!(guard.scope().lookup("ee-1").is_some());
        }
        assert!(scope.lookup("ee-1").is_none());
    }

    #[test]
    fn test_concurrent_scopes_are_isolated() {
        let handles: Vec<_> = (0..8)
            .map(|i| {
                thread::spawn(move || {
                    let identity = format!("device-{}", i);
                    let scope =
                        CredentialScope::begin(Credentials::new(&identity, format!("secret-{}", i)));
                    for _ in 0..100 {
                        let secret = scope.lookup(&identity).expect("own identity resolves");
                        assert_eq!(secret.as_slice(), format!("secret-{}", i).as_bytes());
                        assert!(scope.lookup(&format!("device-{}", (i + 1) % 8)).is_none());
                    }
                    scope.end();
                    assert!(scope.lookup(&identity).is_none());
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }
    }

    #[test]
    fn test_debug_redacts_secret() {
        let creds = Credentials::new("admin", "topsecret");
        assert!(!format!("{:?}", creds).contains("topsecret"));
    }

    proptest! {
        #[test]
        fn prop_foreign_identity_never_resolves(
            installed in "[a-z0-9]{1,16}",
            queried in "[a-z0-9]{0,16}",
            secret in "[ -~]{1,32}",
        ) {
            let scope = CredentialScope::begin(Credentials::new(installed.clone(), secret));
            if queried != installed {
                prop_assert!(scope.lookup(&queried).is_none());
            }
            scope.end();
            prop_assert!(scope.lookup(&installed).is_none());
        }
    }
}
