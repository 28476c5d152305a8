/*
** This file is a part of Iksemel (XML parser for Jabber/XMPP)
** Copyright (C) 2000-2025 Gurer Ozen
**
** Iksemel is free software: you can redistribute it and/or modify it
** under the terms of the GNU Lesser General Public License as
** published by the Free Software Foundation, either version 3 of
** the License, or (at your option) any later version.
*/

use std::net::IpAddr;
use std::net::SocketAddr;
use std::net::TcpStream;
use std::net::ToSocketAddrs;
use std::time::Duration;

use hickory_resolver::Resolver as DnsResolver;
use hickory_resolver::config::ResolverConfig;
use hickory_resolver::config::ResolverOpts;
use tracing::debug;
use tracing::info;
use tracing::warn;

use crate::BasicSessionStream;
use crate::ClientCertificate;
use crate::ClientError;
use crate::ClientSession;
use crate::Element;
use crate::Iq;
use crate::Jid;
use crate::ProtocolElement;
use crate::SessionEvent;
use crate::SessionState;
use crate::SessionStream;

use super::constants::CLIENT_PORT;
use super::constants::DEFAULT_CONNECTION_TIMEOUT;
use super::constants::DEFAULT_PING_INTERVAL;
use super::constants::SRV_SERVICE;
use super::error::description;

/// Turns a host name into the addresses to try, in order.
pub trait Resolver {
    fn resolve(&self, host: &str, default_port: u16) -> Result<Vec<SocketAddr>, ClientError>;
}

/// Resolver using DNS SRV records and the operating system's name lookup.
///
/// Hosts can carry an explicit port as in `example.com:5223` or
/// `[::1]:5223`. Other host names are looked up as
/// `_xmpp-client._tcp.<host>` first, and the host itself on the default
/// port is the fallback when there are no usable SRV records.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemResolver;

fn has_port(host: &str) -> bool {
    match (host.rfind(':'), host.rfind(']')) {
        (None, _) => false,
        (Some(colon), Some(bracket)) => colon > bracket,
        // A bare IPv6 address is full of colons but has no port
        (Some(_), None) => host.parse::<IpAddr>().is_err(),
    }
}

fn wants_srv(host: &str) -> bool {
    !host.is_empty()
        && !has_port(host)
        && !host.starts_with('[')
        && host.parse::<IpAddr>().is_err()
        && !host.contains(char::is_whitespace)
}

#[derive(Debug, Clone, Eq, PartialEq)]
struct SrvTarget {
    priority: u16,
    weight: u16,
    host: String,
    port: u16,
}

// Lower priority first, heavier weight first within a priority (RFC 2782).
// A target of "." means the service is not offered there.
fn order_srv_targets(mut targets: Vec<SrvTarget>) -> Vec<SrvTarget> {
    targets.retain(|target| !target.host.is_empty());
    targets.sort_by(|a, b| {
        a.priority
            .cmp(&b.priority)
            .then_with(|| b.weight.cmp(&a.weight))
    });
    targets
}

fn lookup_srv(domain: &str) -> Vec<SrvTarget> {
    let resolver = match DnsResolver::from_system_conf() {
        Ok(resolver) => resolver,
        Err(err) => {
            debug!(error = %err, "no system DNS configuration, using defaults");
            match DnsResolver::new(ResolverConfig::default(), ResolverOpts::default()) {
                Ok(resolver) => resolver,
                Err(err) => {
                    warn!(error = %err, "cannot create a DNS resolver");
                    return Vec::new();
                }
            }
        }
    };
    let name = format!("{SRV_SERVICE}.{domain}.");
    match resolver.srv_lookup(name.as_str()) {
        Ok(lookup) => lookup
            .iter()
            .map(|srv| SrvTarget {
                priority: srv.priority(),
                weight: srv.weight(),
                host: srv.target().to_utf8().trim_end_matches('.').to_string(),
                port: srv.port(),
            })
            .collect(),
        Err(err) => {
            debug!(%name, error = %err, "no SRV records");
            Vec::new()
        }
    }
}

fn srv_addresses(domain: &str) -> Vec<SocketAddr> {
    let mut addrs = Vec::new();
    for target in order_srv_targets(lookup_srv(domain)) {
        match (target.host.as_str(), target.port).to_socket_addrs() {
            Ok(found) => addrs.extend(found),
            Err(err) => warn!(host = %target.host, port = target.port, error = %err, "SRV target not resolved"),
        }
    }
    addrs
}

impl Resolver for SystemResolver {
    fn resolve(&self, host: &str, default_port: u16) -> Result<Vec<SocketAddr>, ClientError> {
        if wants_srv(host) {
            let addrs = srv_addresses(host);
            if !addrs.is_empty() {
                info!(host, count = addrs.len(), "resolved through SRV records");
                return Ok(addrs);
            }
        }
        let result = if has_port(host) {
            host.to_socket_addrs()
        } else {
            let host = host.trim_start_matches('[').trim_end_matches(']');
            (host, default_port).to_socket_addrs()
        };
        let addrs: Vec<SocketAddr> = result
            .map_err(|err| ClientError::DomainNameResolve(err.to_string()))?
            .collect();
        if addrs.is_empty() {
            return Err(ClientError::DomainNameResolve(
                description::NO_ADDRESS.to_string(),
            ));
        }
        Ok(addrs)
    }
}

pub struct XmppClientBuilder {
    jid: Jid,
    server: Option<String>,
    connection_timeout: Duration,
    password: Option<String>,
    certificate: Option<ClientCertificate>,
    tls_allowed: bool,
    ping_interval: Duration,
    resolver: Box<dyn Resolver>,
}

impl XmppClientBuilder {
    pub fn new(jid: Jid) -> Self {
        XmppClientBuilder {
            jid,
            server: None,
            connection_timeout: DEFAULT_CONNECTION_TIMEOUT,
            password: None,
            certificate: None,
            tls_allowed: true,
            ping_interval: DEFAULT_PING_INTERVAL,
            resolver: Box::new(SystemResolver),
        }
    }

    /// Connects to this host instead of the JID's domain.
    pub fn server(mut self, server: Option<String>) -> Self {
        self.server = server;
        self
    }

    pub fn connection_timeout(mut self, timeout: Duration) -> Self {
        self.connection_timeout = timeout;
        self
    }

    /// Answers PLAIN credential requests without asking the caller.
    pub fn password(mut self, password: &str) -> Self {
        self.password = Some(password.to_string());
        self
    }

    pub fn certificate(mut self, certificate: ClientCertificate) -> Self {
        self.certificate = Some(certificate);
        self
    }

    pub fn tls(mut self, allowed: bool) -> Self {
        self.tls_allowed = allowed;
        self
    }

    pub fn ping_interval(mut self, interval: Duration) -> Self {
        self.ping_interval = interval;
        self
    }

    pub fn resolver(mut self, resolver: impl Resolver + 'static) -> Self {
        self.resolver = Box::new(resolver);
        self
    }

    fn open_connection(&self) -> Result<TcpStream, ClientError> {
        let host = match &self.server {
            Some(server) => server.as_str(),
            None => self.jid.domainpart(),
        };
        let addrs = self.resolver.resolve(host, CLIENT_PORT)?;
        let mut last_error = description::NO_ADDRESS.to_string();
        for addr in addrs {
            debug!(%addr, "connecting");
            match TcpStream::connect_timeout(&addr, self.connection_timeout) {
                Ok(sock) => return Ok(sock),
                Err(err) => {
                    debug!(%addr, error = %err, "connection attempt failed");
                    last_error = err.to_string();
                }
            }
        }
        Err(ClientError::Connection(last_error))
    }

    /// Connects and starts the stream negotiation.
    ///
    /// Only resolution and connection failures are reported here, the
    /// outcome of the negotiation comes from [`XmppClient::wait_for_event`].
    pub fn connect(self) -> Result<XmppClient, ClientError> {
        let sock = self.open_connection()?;
        info!(peer = ?sock.peer_addr().ok(), "connected");

        let mut stream = BasicSessionStream::new(sock, self.jid.domainpart());
        stream.set_tls_allowed(self.tls_allowed);
        stream.set_ping_interval(self.ping_interval);
        if let Some(certificate) = self.certificate {
            stream.set_tls_certificate(certificate);
        }
        let mut session = ClientSession::new(self.jid);
        session.start(&mut stream)?;
        Ok(XmppClient {
            stream,
            session,
            password: self.password,
            last_iq_id: 0,
        })
    }
}

/// What the client has to report to its owner.
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum ClientEvent {
    /// Negotiation is complete; stanzas can be sent.
    Connected,
    /// A password is needed; answer with [`XmppClient::send_credentials`].
    NeedCredentials,
    Message(Element),
    Presence(Element),
    Iq(Iq),
    /// The session ended without an error.
    Disconnected,
}

/// A single XMPP connection driven on the caller's thread.
pub struct XmppClient {
    stream: BasicSessionStream<TcpStream>,
    session: ClientSession,
    password: Option<String>,
    last_iq_id: u64,
}

impl XmppClient {
    pub fn build(jid: Jid) -> XmppClientBuilder {
        XmppClientBuilder::new(jid)
    }

    /// Blocks until there is something to report.
    ///
    /// A failed session returns its error, every later call returns the
    /// same error again.
    pub fn wait_for_event(&mut self) -> Result<ClientEvent, ClientError> {
        loop {
            while let Some(event) = self.session.poll_event() {
                if let Some(result) = self.client_event(event) {
                    return result;
                }
            }
            if let SessionState::Finished(err) = self.session.state() {
                return match err {
                    Some(err) => Err(err.clone()),
                    None => Ok(ClientEvent::Disconnected),
                };
            }
            let event = self.stream.next_event();
            self.session.handle_event(&mut self.stream, event);
        }
    }

    fn client_event(&mut self, event: SessionEvent) -> Option<Result<ClientEvent, ClientError>> {
        match event {
            SessionEvent::Initialized => Some(Ok(ClientEvent::Connected)),
            SessionEvent::NeedCredentials => match &self.password {
                Some(password) => self
                    .session
                    .send_credentials(&mut self.stream, password)
                    .err()
                    .map(Err),
                None => Some(Ok(ClientEvent::NeedCredentials)),
            },
            SessionEvent::ElementReceived(element) => match element {
                ProtocolElement::Message(message) => Some(Ok(ClientEvent::Message(message))),
                ProtocolElement::Presence(presence) => Some(Ok(ClientEvent::Presence(presence))),
                ProtocolElement::Iq(iq) => Some(Ok(ClientEvent::Iq(iq))),
                other => {
                    debug!(kind = other.kind(), "ignoring element");
                    None
                }
            },
            SessionEvent::Finished(None) => Some(Ok(ClientEvent::Disconnected)),
            SessionEvent::Finished(Some(err)) => Some(Err(err)),
        }
    }

    pub fn send_credentials(&mut self, password: &str) -> Result<(), ClientError> {
        self.session.send_credentials(&mut self.stream, password)
    }

    /// Writes a stanza as is. Only valid after [`ClientEvent::Connected`].
    pub fn send(&mut self, stanza: &Element) -> Result<(), ClientError> {
        self.session.send_element(&mut self.stream, stanza)
    }

    pub fn send_message(&mut self, to: &Jid, body: &str) -> Result<(), ClientError> {
        let message = Element::new("message")
            .with_attribute("to", &to.full())
            .with_attribute("type", "chat")
            .with_child(Element::new("body").with_cdata(body));
        self.send(&message)
    }

    pub fn send_presence(&mut self) -> Result<(), ClientError> {
        self.send(&Element::new("presence"))
    }

    pub fn send_iq(&mut self, iq: &Iq) -> Result<(), ClientError> {
        self.send(&iq.to_element())
    }

    /// Returns an id not used by any earlier request of this client.
    pub fn new_iq_id(&mut self) -> String {
        self.last_iq_id += 1;
        format!("iks{}", self.last_iq_id)
    }

    /// Closes the stream; [`XmppClient::wait_for_event`] reports the end.
    pub fn disconnect(&mut self) {
        self.session.finish(&mut self.stream);
    }

    /// The local identity, as bound by the server once connected.
    pub fn jid(&self) -> &Jid {
        self.session.local_jid()
    }

    pub fn is_available(&self) -> bool {
        !self.session.is_finished() && self.stream.is_available()
    }

    pub fn is_encrypted(&self) -> bool {
        self.stream.is_encrypted()
    }
}
