//! Session protocol driver.
//!
//! Every operation runs the same sequence: build the request, connect,
//! install credentials, handshake, write once, read one bounded response,
//! tear down the session and connection, clear credentials, then parse.
//! Each acquired resource sits behind a guard so it is released exactly once
//! on every exit path, and all of them are gone before parsing starts.

use crate::error::{EstError, EstResult};
use crate::protocol::OperationHandler;
use crate::session::connector::{Connector, Endpoint};
use crate::session::credentials::{CredentialScope, Credentials, ScopeGuard};
use crate::session::secure::{SecureSession, SecureTransport};
use std::io::{self, Read, Write};
use tracing::{debug, error, info, info_span, warn};
use zeroize::Zeroizing;

const READ_CHUNK: usize = 1024;

/// Per-call driver states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Idle,
    Connecting,
    Handshaking,
    Sending,
    Receiving,
    Closing,
    Done,
}

impl SessionPhase {
    /// Whether `next` may follow `self`. Any live phase may jump to `Closing`.
    pub fn can_transition(self, next: SessionPhase) -> bool {
        use SessionPhase::*;
        match (self, next) {
            (Done, _) => false,
            (_, Closing) => true,
            (Idle, Connecting)
            | (Connecting, Handshaking)
            | (Handshaking, Sending)
            | (Sending, Receiving)
            | (Closing, Done) => true,
            _ => false,
        }
    }
}

struct PhaseTracker {
    phase: SessionPhase,
}

impl PhaseTracker {
    fn new() -> Self {
        Self {
            phase: SessionPhase::Idle,
        }
    }

    fn advance(&mut self, next: SessionPhase) {
        debug_assert!(
            self.phase.can_transition(next),
            "invalid session transition {:?} -> {:?}",
            self.phase,
            next
        );
        debug!(from = ?self.phase, to = ?next, "session phase");
        self.phase = next;
    }

    fn abort(&mut self, err: &EstError) {
        warn!(phase = ?self.phase, kind = ?err.kind(), "Session aborted: {}", err);
        self.advance(SessionPhase::Closing);
        self.advance(SessionPhase::Done);
    }
}

/// Owns an established session; shuts it down once and drops the connection with it.
struct SessionGuard<S: SecureSession> {
    session: S,
    closed: bool,
}

impl<S: SecureSession> SessionGuard<S> {
    fn new(session: S) -> Self {
        Self {
            session,
            closed: false,
        }
    }

    fn get_mut(&mut self) -> &mut S {
        &mut self.session
    }

    fn shutdown_once(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        if let Err(e) = self.session.shutdown() {
            debug!("Secure session shutdown reported: {}", e);
        }
    }

    fn close(mut self) {
        self.shutdown_once();
    }
}

impl<S: SecureSession> Drop for SessionGuard<S> {
    fn drop(&mut self) {
        self.shutdown_once();
    }
}

/// Runs one request/response exchange per call over a fresh secure session.
#[derive(Debug, Clone)]
pub struct SessionDriver<C, T> {
    connector: C,
    transport: T,
    response_limit: usize,
}

impl<C, T> SessionDriver<C, T>
where
    C: Connector,
    T: SecureTransport<C::Stream>,
{
    pub fn new(connector: C, transport: T, response_limit: usize) -> Self {
        Self {
            connector,
            transport,
            response_limit,
        }
    }

    /// Perform one operation against `endpoint` authenticated by `credentials`.
    ///
    /// The credentials live only for the duration of this call and are
    /// cleared before it returns, whatever the outcome.
    pub fn exchange<H: OperationHandler>(
        &self,
        endpoint: &Endpoint,
        credentials: Credentials,
        handler: &H,
    ) -> EstResult<H::Output> {
        let span = info_span!("session", operation = handler.name(), endpoint = %endpoint);
        let _entered = span.enter();

        let mut phase = PhaseTracker::new();
        // Request bodies may embed secrets (e.g. enrollment profiles).
        let request = Zeroizing::new(handler.build_request(endpoint)?);

        let response = match self.transfer(endpoint, credentials, &request, handler, &mut phase) {
            Ok(response) => response,
            Err(e) => {
                phase.abort(&e);
                return Err(e);
            }
        };
        phase.advance(SessionPhase::Done);

        handler.parse_response(&response).map_err(|e| {
            error!("Error handling {} response: {}", handler.name(), e);
            e
        })
    }

    fn transfer<H: OperationHandler>(
        &self,
        endpoint: &Endpoint,
        credentials: Credentials,
        request: &[u8],
        handler: &H,
        phase: &mut PhaseTracker,
    ) -> EstResult<Vec<u8>> {
        phase.advance(SessionPhase::Connecting);
        let stream = self.connector.connect(endpoint)?;

        let scope = ScopeGuard::new(CredentialScope::begin(credentials));

        phase.advance(SessionPhase::Handshaking);
        let mut session = SessionGuard::new(self.transport.establish(stream, scope.scope())?);

        phase.advance(SessionPhase::Sending);
        info!("Sending {} byte {} request", request.len(), handler.name());
        write_request(session.get_mut(), request)?;

        phase.advance(SessionPhase::Receiving);
        let response = read_response(session.get_mut(), handler, self.response_limit)?;
        info!("Received response from server [{} bytes]", response.len());

        phase.advance(SessionPhase::Closing);
        session.close();
        drop(scope);

        Ok(response)
    }
}

fn write_request<W: Write>(writer: &mut W, request: &[u8]) -> EstResult<()> {
    writer
        .write_all(request)
        .and_then(|_| writer.flush())
        .map_err(|e| {
            error!("Could not send request to server: {}", e);
            EstError::write_failed(e.to_string())
        })
}

/// Read at most `limit` bytes, stopping early once the handler's framing is satisfied.
///
/// A response longer than `limit` is truncated to `limit`.
fn read_response<R: Read, H: OperationHandler>(
    reader: &mut R,
    handler: &H,
    limit: usize,
) -> EstResult<Vec<u8>> {
    let mut response = Vec::with_capacity(limit.min(READ_CHUNK));
    let mut chunk = [0u8; READ_CHUNK];

    loop {
        if let Some(expected) = handler.expected_len(&response) {
            if response.len() >= expected {
                break;
            }
        }
        if response.len() >= limit {
            warn!("Response reached the {} byte ceiling; any remainder is dropped", limit);
            break;
        }

        let want = (limit - response.len()).min(chunk.len());
        match reader.read(&mut chunk[..want]) {
            Ok(0) => break,
            Ok(n) => response.extend_from_slice(&chunk[..n]),
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => {
                error!("Got error while reading data from server: {}", e);
                return Err(EstError::read_failed(e.to_string()));
            }
        }
    }

    if response.is_empty() {
        return Err(EstError::read_failed("server closed the session without responding"));
    }
    if let Some(expected) = handler.expected_len(&response) {
        if response.len() < expected && response.len() < limit {
            return Err(EstError::read_failed(format!(
                "short response: {} of {} bytes",
                response.len(),
                expected
            )));
        }
    }
    Ok(response)
}
