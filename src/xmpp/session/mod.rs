/*
** This file is a part of Iksemel (XML parser for Jabber/XMPP)
** Copyright (C) 2000-2025 Gurer Ozen
**
** Iksemel is free software: you can redistribute it and/or modify it
** under the terms of the GNU Lesser General Public License as
** published by the Free Software Foundation, either version 3 of
** the License, or (at your option) any later version.
*/

use std::collections::VecDeque;

use tracing::debug;
use tracing::info;
use tracing::warn;

use crate::ClientError;
use crate::Element;
use crate::Iq;
use crate::IqType;
use crate::Jid;
use crate::ProtocolElement;
use crate::SessionStream;
use crate::StreamEvent;
use crate::StreamFeatures;

use super::constants::BIND_IQ_ID;
use super::error::description;
use super::protocol::auth_request;
use super::protocol::plain_message;
use super::protocol::resource_bind_request;
use super::protocol::session_start_request;
use super::protocol::start_tls_request;

/// Negotiation phase of a client session.
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum SessionState {
    Initial,
    WaitingForStreamStart,
    Negotiating,
    WaitingForEncrypt,
    Encrypting,
    WaitingForCredentials,
    Authenticating,
    BindingResource,
    StartingSession,
    Initialized,
    /// Terminal; carries the failure reason, if any.
    Finished(Option<ClientError>),
}

impl SessionState {
    pub fn name(&self) -> &'static str {
        match self {
            SessionState::Initial => "initial",
            SessionState::WaitingForStreamStart => "waiting for stream start",
            SessionState::Negotiating => "negotiating",
            SessionState::WaitingForEncrypt => "waiting for encrypt",
            SessionState::Encrypting => "encrypting",
            SessionState::WaitingForCredentials => "waiting for credentials",
            SessionState::Authenticating => "authenticating",
            SessionState::BindingResource => "binding resource",
            SessionState::StartingSession => "starting session",
            SessionState::Initialized => "initialized",
            SessionState::Finished(_) => "finished",
        }
    }
}

/// Notifications for the owner of a session, in the order they happened.
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum SessionEvent {
    /// Negotiation is complete and stanzas can flow.
    Initialized,
    /// The server accepts PLAIN; answer with [`ClientSession::send_credentials`].
    NeedCredentials,
    /// A stanza received after initialization.
    ElementReceived(ProtocolElement),
    /// The session ended, with the failure reason if it was not a clean end.
    /// This is always the last event.
    Finished(Option<ClientError>),
}

/// Client side XMPP stream negotiation.
///
/// The session never owns the stream. Every entry point borrows it for the
/// duration of one transition, so the owner decides how long the stream
/// lives and no callback can outlive either side. Transitions run only
/// through `&mut self` and are therefore strictly sequential.
///
/// Events coming from the server are validated against the current state.
/// An event that does not belong to the current state finishes the session
/// with [`ClientError::UnexpectedElement`]. Calls made by the owner in the
/// wrong state are refused with [`ClientError::InvalidState`] instead.
pub struct ClientSession {
    local_jid: Jid,
    state: SessionState,
    need_session_start: bool,
    events: VecDeque<SessionEvent>,
}

impl ClientSession {
    pub fn new(jid: Jid) -> Self {
        ClientSession {
            local_jid: jid,
            state: SessionState::Initial,
            need_session_start: false,
            events: VecDeque::new(),
        }
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    /// The local identity; after resource binding this is the server
    /// assigned full JID.
    pub fn local_jid(&self) -> &Jid {
        &self.local_jid
    }

    pub fn is_finished(&self) -> bool {
        matches!(self.state, SessionState::Finished(_))
    }

    pub fn poll_event(&mut self) -> Option<SessionEvent> {
        self.events.pop_front()
    }

    /// Opens the stream. Only valid once, in the initial state.
    pub fn start(&mut self, stream: &mut dyn SessionStream) -> Result<(), ClientError> {
        self.require(SessionState::Initial)?;
        self.set_state(SessionState::WaitingForStreamStart);
        self.send_stream_header(stream);
        Ok(())
    }

    /// Answers a [`SessionEvent::NeedCredentials`] request.
    pub fn send_credentials(
        &mut self,
        stream: &mut dyn SessionStream,
        password: &str,
    ) -> Result<(), ClientError> {
        self.require(SessionState::WaitingForCredentials)?;
        self.set_state(SessionState::Authenticating);
        let node = self.local_jid.localpart().unwrap_or_default();
        stream.write_element(&auth_request("PLAIN", &plain_message(node, password)));
        Ok(())
    }

    /// Writes a stanza to an initialized session, without inspecting it.
    pub fn send_element(
        &mut self,
        stream: &mut dyn SessionStream,
        element: &Element,
    ) -> Result<(), ClientError> {
        self.require(SessionState::Initialized)?;
        stream.write_element(element);
        Ok(())
    }

    /// Ends the session gracefully, closing the stream if still possible.
    pub fn finish(&mut self, stream: &mut dyn SessionStream) {
        if self.is_finished() {
            return;
        }
        if stream.is_available() {
            stream.write_footer();
        }
        self.finish_session(stream, None);
    }

    /// Dispatches a stream event to its handler.
    pub fn handle_event(&mut self, stream: &mut dyn SessionStream, event: StreamEvent) {
        match event {
            StreamEvent::StreamStart(header) => self.handle_stream_start(stream, &header),
            StreamEvent::Element(element) => self.handle_element(stream, element),
            StreamEvent::TlsEncrypted => self.handle_tls_encrypted(stream),
            StreamEvent::Error(err) => self.handle_stream_error(stream, err),
            StreamEvent::Closed => self.handle_stream_end(stream),
        }
    }

    pub fn handle_stream_start(&mut self, stream: &mut dyn SessionStream, header: &Element) {
        if self.is_finished() || !self.check_state(stream, SessionState::WaitingForStreamStart) {
            return;
        }
        debug!(id = header.attribute("id"), "server stream started");
        self.set_state(SessionState::Negotiating);
    }

    pub fn handle_element(&mut self, stream: &mut dyn SessionStream, element: ProtocolElement) {
        if self.is_finished() {
            return;
        }
        match element {
            ProtocolElement::StreamError(condition) => {
                self.finish_session(stream, Some(ClientError::StreamError(condition)));
            }
            ProtocolElement::Iq(_)
            | ProtocolElement::Message(_)
            | ProtocolElement::Presence(_)
            | ProtocolElement::Unknown(_)
                if self.state == SessionState::Initialized =>
            {
                self.events.push_back(SessionEvent::ElementReceived(element));
            }
            ProtocolElement::StreamFeatures(features) => {
                self.handle_stream_features(stream, &features);
            }
            ProtocolElement::AuthSuccess => {
                if self.check_state(stream, SessionState::Authenticating) {
                    info!("authenticated");
                    self.restart_stream(stream);
                }
            }
            ProtocolElement::AuthFailure => {
                if self.check_state(stream, SessionState::Authenticating) {
                    self.finish_session(stream, Some(ClientError::AuthenticationFailed));
                }
            }
            ProtocolElement::TlsProceed => {
                if self.check_state(stream, SessionState::WaitingForEncrypt) {
                    self.set_state(SessionState::Encrypting);
                    stream.add_tls_encryption();
                }
            }
            ProtocolElement::TlsFailure => {
                if self.check_state(stream, SessionState::WaitingForEncrypt) {
                    let err = ClientError::Tls(description::STARTTLS_REFUSED.to_string());
                    self.finish_session(stream, Some(err));
                }
            }
            ProtocolElement::Iq(iq) => match self.state {
                SessionState::BindingResource => self.handle_resource_bind(stream, &iq),
                SessionState::StartingSession => self.handle_session_start(stream, &iq),
                _ => self.finish_session(stream, Some(ClientError::UnexpectedElement)),
            },
            ProtocolElement::Message(_)
            | ProtocolElement::Presence(_)
            | ProtocolElement::Unknown(_) => {
                self.finish_session(stream, Some(ClientError::UnexpectedElement));
            }
        }
    }

    /// TLS is up on the transport; the XML stream starts over.
    pub fn handle_tls_encrypted(&mut self, stream: &mut dyn SessionStream) {
        if self.is_finished() {
            return;
        }
        match self.state {
            SessionState::WaitingForEncrypt | SessionState::Encrypting => {
                info!("stream encrypted");
                self.restart_stream(stream);
            }
            _ => self.finish_session(stream, Some(ClientError::UnexpectedElement)),
        }
    }

    pub fn handle_stream_error(&mut self, stream: &mut dyn SessionStream, err: ClientError) {
        self.finish_session(stream, Some(err));
    }

    /// The server closed its stream.
    ///
    /// This is a normal end for an initialized session, and a read error
    /// during negotiation.
    pub fn handle_stream_end(&mut self, stream: &mut dyn SessionStream) {
        if self.is_finished() {
            return;
        }
        if stream.is_available() {
            stream.write_footer();
        }
        let err = match self.state {
            SessionState::Initialized => None,
            _ => Some(ClientError::ConnectionRead(
                description::STREAM_CLOSED.to_string(),
            )),
        };
        self.finish_session(stream, err);
    }

    fn handle_stream_features(&mut self, stream: &mut dyn SessionStream, features: &StreamFeatures) {
        if !self.check_state(stream, SessionState::Negotiating) {
            return;
        }

        if features.has_start_tls() && stream.supports_tls_encryption() {
            self.set_state(SessionState::WaitingForEncrypt);
            stream.write_element(&start_tls_request());
        } else if features.has_authentication_mechanisms() {
            if stream.has_tls_certificate() && features.has_authentication_mechanism("EXTERNAL") {
                self.set_state(SessionState::Authenticating);
                stream.write_element(&auth_request("EXTERNAL", b""));
            } else if features.has_authentication_mechanism("PLAIN") {
                self.set_state(SessionState::WaitingForCredentials);
                self.events.push_back(SessionEvent::NeedCredentials);
            } else {
                self.finish_session(stream, Some(ClientError::NoSupportedAuthMechanisms));
            }
        } else {
            stream.set_whitespace_ping_enabled(true);
            if features.has_session() {
                self.need_session_start = true;
            }
            if features.has_resource_bind() {
                self.set_state(SessionState::BindingResource);
                let resource = self.local_jid.resourcepart();
                stream.write_element(&resource_bind_request(resource));
            } else if self.need_session_start {
                self.send_session_start(stream);
            } else {
                self.set_initialized();
            }
        }
    }

    fn handle_resource_bind(&mut self, stream: &mut dyn SessionStream, iq: &Iq) {
        if iq.kind() == IqType::Error && iq.id() == BIND_IQ_ID {
            debug!(condition = iq.error_condition(), "resource bind refused");
            self.finish_session(stream, Some(ClientError::ResourceBind));
            return;
        }
        let Some(bind) = iq.resource_bind() else {
            self.finish_session(stream, Some(ClientError::UnexpectedElement));
            return;
        };
        if iq.kind() != IqType::Result {
            self.finish_session(stream, Some(ClientError::UnexpectedElement));
            return;
        }
        match bind.jid().map(Jid::new) {
            Some(Ok(jid)) => {
                info!(jid = %jid, "resource bound");
                self.local_jid = jid;
                if self.need_session_start {
                    self.send_session_start(stream);
                } else {
                    self.set_initialized();
                }
            }
            _ => {
                debug!(jid = bind.jid(), "server assigned an invalid JID");
                self.finish_session(stream, Some(ClientError::ResourceBind));
            }
        }
    }

    fn handle_session_start(&mut self, stream: &mut dyn SessionStream, iq: &Iq) {
        match iq.kind() {
            IqType::Result => self.set_initialized(),
            IqType::Error => self.finish_session(stream, Some(ClientError::SessionStart)),
            _ => self.finish_session(stream, Some(ClientError::UnexpectedElement)),
        }
    }

    fn send_session_start(&mut self, stream: &mut dyn SessionStream) {
        self.set_state(SessionState::StartingSession);
        stream.write_element(&session_start_request());
    }

    fn send_stream_header(&self, stream: &mut dyn SessionStream) {
        stream.write_header(&self.local_jid.domain_jid());
    }

    fn restart_stream(&mut self, stream: &mut dyn SessionStream) {
        self.set_state(SessionState::WaitingForStreamStart);
        stream.reset_parser();
        self.send_stream_header(stream);
    }

    fn set_initialized(&mut self) {
        info!(jid = %self.local_jid, "session initialized");
        self.set_state(SessionState::Initialized);
        self.events.push_back(SessionEvent::Initialized);
    }

    fn set_state(&mut self, state: SessionState) {
        debug!(from = self.state.name(), to = state.name(), "session state");
        self.state = state;
    }

    fn require(&self, expected: SessionState) -> Result<(), ClientError> {
        if self.state != expected {
            return Err(ClientError::InvalidState(self.state.name()));
        }
        Ok(())
    }

    fn check_state(&mut self, stream: &mut dyn SessionStream, expected: SessionState) -> bool {
        if self.state != expected {
            debug!(
                expected = expected.name(),
                actual = self.state.name(),
                "event in wrong state"
            );
            self.finish_session(stream, Some(ClientError::UnexpectedElement));
            return false;
        }
        true
    }

    fn finish_session(&mut self, stream: &mut dyn SessionStream, err: Option<ClientError>) {
        if self.is_finished() {
            return;
        }
        stream.set_whitespace_ping_enabled(false);
        match &err {
            Some(err) => warn!(state = self.state.name(), error = %err, "session failed"),
            None => info!("session finished"),
        }
        self.state = SessionState::Finished(err.clone());
        self.events.push_back(SessionEvent::Finished(err));
    }
}
