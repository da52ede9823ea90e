//! Scripted connector/transport doubles that record what the driver does to them.

#![allow(dead_code)]

use estca_client::error::{EstError, EstResult};
use estca_client::protocol::OperationHandler;
use estca_client::session::{
    Connector, CredentialScope, Endpoint, SecureSession, SecureTransport, SessionDriver,
};
use std::io::{self, Cursor, Read, Write};
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Connect,
    Handshake(String),
    Write(usize),
    Shutdown,
    SessionDropped,
    StreamDropped,
}

#[derive(Debug, Clone, Default)]
pub struct EventLog(Arc<Mutex<Vec<Event>>>);

impl EventLog {
    pub fn push(&self, event: Event) {
        self.0.lock().unwrap().push(event);
    }

    pub fn events(&self) -> Vec<Event> {
        self.0.lock().unwrap().clone()
    }

    pub fn count(&self, event: &Event) -> usize {
        self.events().iter().filter(|e| *e == event).count()
    }

    pub fn handshakes(&self) -> usize {
        self.events()
            .iter()
            .filter(|e| matches!(e, Event::Handshake(_)))
            .count()
    }
}

#[derive(Debug)]
pub struct MockStream {
    log: EventLog,
}

impl Read for MockStream {
    fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
        Ok(0)
    }
}

impl Write for MockStream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Drop for MockStream {
    fn drop(&mut self) {
        self.log.push(Event::StreamDropped);
    }
}

#[derive(Debug, Clone)]
pub struct MockConnector {
    pub log: EventLog,
    pub refuse: bool,
}

impl Connector for MockConnector {
    type Stream = MockStream;

    fn connect(&self, endpoint: &Endpoint) -> EstResult<MockStream> {
        if self.refuse {
            return Err(EstError::transport(
                endpoint.to_string(),
                io::Error::from(io::ErrorKind::ConnectionRefused),
            ));
        }
        self.log.push(Event::Connect);
        Ok(MockStream {
            log: self.log.clone(),
        })
    }
}

/// How the scripted session should misbehave, if at all.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Fault {
    #[default]
    None,
    Handshake,
    Write,
    Read,
}

#[derive(Debug, Clone)]
pub struct MockTransport {
    pub log: EventLog,
    pub response: Vec<u8>,
    pub fault: Fault,
    /// Every scope the driver handed us, for checking it was cleared afterwards.
    pub scopes: Arc<Mutex<Vec<CredentialScope>>>,
    /// Identity and secret resolved through the scope during each handshake.
    pub resolved: Arc<Mutex<Vec<(String, Vec<u8>)>>>,
}

impl MockTransport {
    pub fn new(log: EventLog, response: impl Into<Vec<u8>>) -> Self {
        Self {
            log,
            response: response.into(),
            fault: Fault::None,
            scopes: Arc::default(),
            resolved: Arc::default(),
        }
    }

    pub fn with_fault(mut self, fault: Fault) -> Self {
        self.fault = fault;
        self
    }

    pub fn all_scopes_cleared(&self) -> bool {
        self.scopes.lock().unwrap().iter().all(|s| !s.is_active())
    }
}

impl SecureTransport<MockStream> for MockTransport {
    type Session = MockSession;

    fn establish(&self, stream: MockStream, scope: &CredentialScope) -> EstResult<MockSession> {
        self.scopes.lock().unwrap().push(scope.clone());
        let identity = scope
            .identity()
            .ok_or_else(|| EstError::handshake("no credentials"))?;
        self.log.push(Event::Handshake(identity.clone()));

        let secret = scope
            .lookup(&identity)
            .ok_or_else(|| EstError::handshake("unknown identity"))?;
        self.resolved
            .lock()
            .unwrap()
            .push((identity.clone(), secret.to_vec()));

        if self.fault == Fault::Handshake {
            return Err(EstError::handshake("peer rejected PSK"));
        }
        Ok(MockSession {
            response: Cursor::new(self.response.clone()),
            fault: self.fault,
            log: self.log.clone(),
            _stream: stream,
        })
    }
}

pub struct MockSession {
    response: Cursor<Vec<u8>>,
    fault: Fault,
    log: EventLog,
    // Dropped after the session fields above.
    _stream: MockStream,
}

impl Read for MockSession {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.fault == Fault::Read {
            return Err(io::Error::from(io::ErrorKind::ConnectionReset));
        }
        self.response.read(buf)
    }
}

impl Write for MockSession {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.fault == Fault::Write {
            return Err(io::Error::from(io::ErrorKind::BrokenPipe));
        }
        self.log.push(Event::Write(buf.len()));
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl SecureSession for MockSession {
    fn shutdown(&mut self) -> io::Result<()> {
        self.log.push(Event::Shutdown);
        Ok(())
    }
}

impl Drop for MockSession {
    fn drop(&mut self) {
        self.log.push(Event::SessionDropped);
    }
}

/// Sends `ping`, returns the raw response; optionally fails to parse.
#[derive(Debug, Clone, Copy, Default)]
pub struct EchoHandler {
    pub reject: bool,
}

impl OperationHandler for EchoHandler {
    type Output = Vec<u8>;

    fn name(&self) -> &'static str {
        "echo"
    }

    fn build_request(&self, _endpoint: &Endpoint) -> EstResult<Vec<u8>> {
        Ok(b"ping".to_vec())
    }

    fn parse_response(&self, response: &[u8]) -> EstResult<Vec<u8>> {
        if self.reject {
            return Err(EstError::response("unparseable"));
        }
        Ok(response.to_vec())
    }
}

pub fn endpoint() -> Endpoint {
    Endpoint::new("ca.test", 8443)
}

pub fn driver(
    log: &EventLog,
    transport: MockTransport,
    limit: usize,
) -> SessionDriver<MockConnector, MockTransport> {
    SessionDriver::new(
        MockConnector {
            log: log.clone(),
            refuse: false,
        },
        transport,
        limit,
    )
}

pub fn http_ok(body: &str) -> Vec<u8> {
    format!(
        "HTTP/1.1 200 OK\r\nContent-Length: {}\r\n\r\n{}",
        body.len(),
        body
    )
    .into_bytes()
}

/// Freshly signed self-issued certificate, PEM encoded.
pub fn certificate_pem(common_name: &str) -> String {
    use openssl::asn1::Asn1Time;
    use openssl::ec::{EcGroup, EcKey};
    use openssl::hash::MessageDigest;
    use openssl::nid::Nid;
    use openssl::pkey::PKey;
    use openssl::x509::{X509Builder, X509NameBuilder};

    let group = EcGroup::from_curve_name(Nid::X9_62_PRIME256V1).unwrap();
    let key = PKey::from_ec_key(EcKey::generate(&group).unwrap()).unwrap();
    let mut name = X509NameBuilder::new().unwrap();
    name.append_entry_by_nid(Nid::COMMONNAME, common_name).unwrap();
    let name = name.build();

    let mut builder = X509Builder::new().unwrap();
    builder.set_version(2).unwrap();
    builder.set_subject_name(&name).unwrap();
    builder.set_issuer_name(&name).unwrap();
    builder.set_pubkey(&key).unwrap();
    builder.set_not_before(&Asn1Time::days_from_now(0).unwrap()).unwrap();
    builder.set_not_after(&Asn1Time::days_from_now(1).unwrap()).unwrap();
    builder.sign(&key, MessageDigest::sha256()).unwrap();
    String::from_utf8(builder.build().to_pem().unwrap()).unwrap()
}
