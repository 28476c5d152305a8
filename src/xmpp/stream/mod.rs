/*
** This file is a part of Iksemel (XML parser for Jabber/XMPP)
** Copyright (C) 2000-2025 Gurer Ozen
**
** Iksemel is free software: you can redistribute it and/or modify it
** under the terms of the GNU Lesser General Public License as
** published by the Free Software Foundation, either version 3 of
** the License, or (at your option) any later version.
*/

mod tls;

use std::collections::VecDeque;
use std::io::ErrorKind;
use std::io::Read;
use std::io::Write;
use std::net::TcpStream;
use std::time::Duration;

use rustls::ClientConnection;
use rustls::StreamOwned;
use tracing::debug;
use tracing::trace;

use crate::ClientError;
use crate::Element;
use crate::Jid;
use crate::ProtocolElement;
use crate::StreamElement;
use crate::StreamParser;

use super::constants::DEFAULT_PING_INTERVAL;
use super::constants::STREAM_FOOTER;
use super::error::description;
use super::protocol::stream_header;
pub use tls::ClientCertificate;

/// Byte transport under a session stream.
pub trait Connection: Read + Write {
    /// Limits how long a read may block; `None` blocks forever.
    fn set_read_timeout(&self, timeout: Option<Duration>) -> std::io::Result<()>;
}

impl Connection for TcpStream {
    fn set_read_timeout(&self, timeout: Option<Duration>) -> std::io::Result<()> {
        TcpStream::set_read_timeout(self, timeout)
    }
}

/// Something the stream observed, in wire order.
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum StreamEvent {
    StreamStart(Element),
    Element(ProtocolElement),
    TlsEncrypted,
    Error(ClientError),
    /// The server sent `</stream:stream>`.
    Closed,
}

/// The operations a [`ClientSession`](crate::ClientSession) needs from the
/// XML stream it negotiates over.
///
/// Writes are best effort. A failed write makes the stream unavailable and
/// is reported later as a [`StreamEvent::Error`].
pub trait SessionStream {
    fn write_header(&mut self, to: &Jid);
    fn write_element(&mut self, element: &Element);
    fn write_footer(&mut self);
    /// Forgets any partially parsed input; the server starts a new stream.
    fn reset_parser(&mut self);
    fn supports_tls_encryption(&self) -> bool;
    fn has_tls_certificate(&self) -> bool;
    fn set_tls_certificate(&mut self, certificate: ClientCertificate);
    /// Starts TLS; completion is reported with [`StreamEvent::TlsEncrypted`].
    fn add_tls_encryption(&mut self);
    fn set_whitespace_ping_enabled(&mut self, enabled: bool);
    fn is_available(&self) -> bool;
}

enum Transport<C: Connection> {
    Plain(C),
    Tls(Box<StreamOwned<ClientConnection, C>>),
    Closed,
}

impl<C: Connection> Transport<C> {
    fn connection(&self) -> Option<&C> {
        match self {
            Transport::Plain(sock) => Some(sock),
            Transport::Tls(tls) => Some(tls.get_ref()),
            Transport::Closed => None,
        }
    }

    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        match self {
            Transport::Plain(sock) => sock.read(buf),
            Transport::Tls(tls) => tls.read(buf),
            Transport::Closed => Err(ErrorKind::NotConnected.into()),
        }
    }

    fn write_all(&mut self, bytes: &[u8]) -> std::io::Result<()> {
        match self {
            Transport::Plain(sock) => {
                sock.write_all(bytes)?;
                sock.flush()
            }
            Transport::Tls(tls) => {
                tls.write_all(bytes)?;
                tls.flush()
            }
            Transport::Closed => Err(ErrorKind::NotConnected.into()),
        }
    }
}

/// Session stream over a blocking connection, with optional TLS.
pub struct BasicSessionStream<C: Connection> {
    transport: Transport<C>,
    parser: StreamParser,
    domain: String,
    tls_allowed: bool,
    certificate: Option<ClientCertificate>,
    ping_enabled: bool,
    ping_interval: Duration,
    events: VecDeque<StreamEvent>,
    write_error: Option<ClientError>,
    broken: bool,
    footer_sent: bool,
    read_buffer: Vec<u8>,
}

impl<C: Connection> BasicSessionStream<C> {
    pub fn new(connection: C, domain: &str) -> Self {
        BasicSessionStream {
            transport: Transport::Plain(connection),
            parser: StreamParser::new(),
            domain: domain.to_string(),
            tls_allowed: true,
            certificate: None,
            ping_enabled: false,
            ping_interval: DEFAULT_PING_INTERVAL,
            events: VecDeque::new(),
            write_error: None,
            broken: false,
            footer_sent: false,
            read_buffer: vec![0; 4096],
        }
    }

    pub fn set_tls_allowed(&mut self, allowed: bool) {
        self.tls_allowed = allowed;
    }

    pub fn set_ping_interval(&mut self, interval: Duration) {
        self.ping_interval = interval;
    }

    pub fn is_encrypted(&self) -> bool {
        matches!(self.transport, Transport::Tls(_))
    }

    /// Blocks until the next event is available.
    ///
    /// While the whitespace ping is enabled, idle periods longer than the
    /// ping interval send a single space to keep the connection alive.
    pub fn next_event(&mut self) -> StreamEvent {
        loop {
            if let Some(err) = self.write_error.take() {
                return StreamEvent::Error(err);
            }
            if let Some(event) = self.events.pop_front() {
                return event;
            }
            if self.broken {
                return StreamEvent::Error(ClientError::ConnectionRead(
                    description::CONNECTION_CLOSED.to_string(),
                ));
            }
            match self.parser.next_element() {
                Ok(Some(StreamElement::Start(header))) => {
                    return StreamEvent::StreamStart(header);
                }
                Ok(Some(StreamElement::Element(element))) => {
                    return StreamEvent::Element(ProtocolElement::from_element(element));
                }
                Ok(Some(StreamElement::End)) => return StreamEvent::Closed,
                Ok(None) => {}
                Err(err) => {
                    self.broken = true;
                    return StreamEvent::Error(err);
                }
            }
            match self.transport.read(&mut self.read_buffer) {
                Ok(0) => {
                    self.broken = true;
                    return StreamEvent::Error(ClientError::ConnectionRead(
                        description::CONNECTION_CLOSED.to_string(),
                    ));
                }
                Ok(nr_read) => {
                    let bytes = &self.read_buffer[..nr_read];
                    trace!(bytes = %String::from_utf8_lossy(bytes), "received");
                    self.parser.push_bytes(bytes);
                }
                Err(err) if matches!(err.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => {
                    if self.ping_enabled {
                        self.write_bytes(b" ");
                    }
                }
                Err(err) if err.kind() == ErrorKind::Interrupted => {}
                Err(err) => {
                    self.broken = true;
                    return StreamEvent::Error(ClientError::read(err));
                }
            }
        }
    }

    fn write_bytes(&mut self, bytes: &[u8]) {
        if !self.is_available() {
            debug!("dropping write on an unavailable stream");
            return;
        }
        trace!(bytes = %String::from_utf8_lossy(bytes), "sending");
        if let Err(err) = self.transport.write_all(bytes) {
            self.broken = true;
            self.write_error = Some(ClientError::write(err));
        }
    }

    fn start_tls(&mut self) -> Result<(), ClientError> {
        let mut connection = tls::client_connection(&self.domain, self.certificate.as_ref())?;
        let Transport::Plain(mut sock) = std::mem::replace(&mut self.transport, Transport::Closed)
        else {
            return Err(ClientError::Tls("stream is not in plain text".to_string()));
        };
        while connection.is_handshaking() {
            connection
                .complete_io(&mut sock)
                .map_err(|err| ClientError::Tls(err.to_string()))?;
        }
        debug!(domain = %self.domain, "TLS handshake complete");
        self.transport = Transport::Tls(Box::new(StreamOwned::new(connection, sock)));
        Ok(())
    }
}

impl<C: Connection> SessionStream for BasicSessionStream<C> {
    fn write_header(&mut self, to: &Jid) {
        self.write_bytes(stream_header(to).as_bytes());
    }

    fn write_element(&mut self, element: &Element) {
        self.write_bytes(element.to_string().as_bytes());
    }

    fn write_footer(&mut self) {
        self.write_bytes(STREAM_FOOTER.as_bytes());
        self.footer_sent = true;
    }

    fn reset_parser(&mut self) {
        self.parser.reset();
    }

    fn supports_tls_encryption(&self) -> bool {
        self.tls_allowed && matches!(self.transport, Transport::Plain(_))
    }

    fn has_tls_certificate(&self) -> bool {
        self.certificate.is_some()
    }

    fn set_tls_certificate(&mut self, certificate: ClientCertificate) {
        self.certificate = Some(certificate);
    }

    fn add_tls_encryption(&mut self) {
        match self.start_tls() {
            Ok(()) => self.events.push_back(StreamEvent::TlsEncrypted),
            Err(err) => {
                self.broken = true;
                self.events.push_back(StreamEvent::Error(err));
            }
        }
    }

    fn set_whitespace_ping_enabled(&mut self, enabled: bool) {
        self.ping_enabled = enabled;
        let timeout = enabled.then_some(self.ping_interval);
        if let Some(connection) = self.transport.connection()
            && let Err(err) = connection.set_read_timeout(timeout)
        {
            debug!(error = %err, "cannot change the read timeout");
        }
    }

    fn is_available(&self) -> bool {
        !self.broken && !self.footer_sent && self.transport.connection().is_some()
    }
}

#[cfg(test)]
mod tests;
