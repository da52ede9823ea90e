//! Transport connector: one TCP stream per call, single attempt.

use crate::error::{EstError, EstResult};
use std::fmt;
use std::io::{self, Read, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;
use tracing::{debug, error, info};

/// Target of one call.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Endpoint {
    pub host: String,
    pub port: u16,
}

impl Endpoint {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// Opens a byte-stream connection to an endpoint.
pub trait Connector {
    type Stream: Read + Write;

    /// Connect once; no retries. The returned stream is closed when dropped.
    fn connect(&self, endpoint: &Endpoint) -> EstResult<Self::Stream>;
}

/// Plain TCP connector with optional timeouts.
#[derive(Debug, Clone, Default)]
pub struct TcpConnector {
    connect_timeout: Option<Duration>,
    io_timeout: Option<Duration>,
}

impl TcpConnector {
    pub fn new(connect_timeout: Option<Duration>, io_timeout: Option<Duration>) -> Self {
        Self {
            connect_timeout,
            io_timeout,
        }
    }

    fn open(&self, endpoint: &Endpoint) -> io::Result<TcpStream> {
        let addr = (endpoint.host.as_str(), endpoint.port)
            .to_socket_addrs()?
            .next()
            .ok_or_else(|| {
                io::Error::new(io::ErrorKind::NotFound, "host resolved to no addresses")
            })?;
        debug!("Resolved {} to {}", endpoint, addr);

        let stream = match self.connect_timeout {
            Some(timeout) => TcpStream::connect_timeout(&addr, timeout)?,
            None => TcpStream::connect(addr)?,
        };
        stream.set_read_timeout(self.io_timeout)?;
        stream.set_write_timeout(self.io_timeout)?;
        stream.set_nodelay(true)?;
        Ok(stream)
    }
}

impl Connector for TcpConnector {
    type Stream = TcpStream;

    fn connect(&self, endpoint: &Endpoint) -> EstResult<TcpStream> {
        match self.open(endpoint) {
            Ok(stream) => {
                info!("TCP connection established with {}", endpoint);
                Ok(stream)
            }
            Err(e) => {
                error!("Could not connect to {}: {}", endpoint, e);
                Err(EstError::transport(endpoint.to_string(), e))
            }
        }
    }
}
