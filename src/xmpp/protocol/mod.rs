/*
** This file is a part of Iksemel (XML parser for Jabber/XMPP)
** Copyright (C) 2000-2025 Gurer Ozen
**
** Iksemel is free software: you can redistribute it and/or modify it
** under the terms of the GNU Lesser General Public License as
** published by the Free Software Foundation, either version 3 of
** the License, or (at your option) any later version.
*/

use base64::Engine;
use base64::engine::general_purpose::STANDARD;

use crate::Element;
use crate::Jid;

use super::constants::BIND_IQ_ID;
use super::constants::BIND_NS;
use super::constants::CLIENT_NS;
use super::constants::FEATURES_TAG;
use super::constants::SASL_NS;
use super::constants::SESSION_IQ_ID;
use super::constants::SESSION_NS;
use super::constants::STANZAS_NS;
use super::constants::STREAM_ERROR_TAG;
use super::constants::STREAM_NS;
use super::constants::STREAM_TAG;
use super::constants::TLS_NS;

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum IqType {
    Get,
    Set,
    Result,
    Error,
}

impl IqType {
    pub fn as_str(&self) -> &'static str {
        match self {
            IqType::Get => "get",
            IqType::Set => "set",
            IqType::Result => "result",
            IqType::Error => "error",
        }
    }

    fn parse(value: &str) -> Option<IqType> {
        match value {
            "get" => Some(IqType::Get),
            "set" => Some(IqType::Set),
            "result" => Some(IqType::Result),
            "error" => Some(IqType::Error),
            _ => None,
        }
    }
}

/// An info/query stanza with at most one payload element.
///
/// Error responses may echo the request payload next to the `<error/>`
/// child; the payload is the first child which is not the error.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Iq {
    kind: IqType,
    id: String,
    to: Option<String>,
    from: Option<String>,
    payload: Option<Element>,
    error: Option<Element>,
}

impl Iq {
    pub fn new(kind: IqType, id: &str) -> Self {
        Iq {
            kind,
            id: id.to_string(),
            to: None,
            from: None,
            payload: None,
            error: None,
        }
    }

    pub fn with_to(mut self, to: &str) -> Self {
        self.to = Some(to.to_string());
        self
    }

    pub fn with_payload(mut self, payload: Element) -> Self {
        self.payload = Some(payload);
        self
    }

    pub fn kind(&self) -> IqType {
        self.kind
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn to(&self) -> Option<&str> {
        self.to.as_deref()
    }

    pub fn from(&self) -> Option<&str> {
        self.from.as_deref()
    }

    pub fn payload(&self) -> Option<&Element> {
        self.payload.as_ref()
    }

    /// Defined condition of an error response, like `conflict`.
    pub fn error_condition(&self) -> Option<&str> {
        self.error
            .as_ref()?
            .tags()
            .find(|tag| tag.ns() == Some(STANZAS_NS))
            .map(|tag| tag.name())
    }

    /// The bind payload of a resource binding response.
    pub fn resource_bind(&self) -> Option<ResourceBind> {
        let bind = self.payload.as_ref()?;
        if bind.name() != "bind" || bind.ns() != Some(BIND_NS) {
            return None;
        }
        Some(ResourceBind {
            jid: bind.find_tag("jid").map(|jid| jid.cdata().trim().to_string()),
        })
    }

    fn from_element(element: &Element) -> Option<Iq> {
        let kind = IqType::parse(element.attribute("type")?)?;
        let mut payload = None;
        let mut error = None;
        for tag in element.tags() {
            if tag.name() == "error" {
                error.get_or_insert_with(|| tag.clone());
            } else {
                payload.get_or_insert_with(|| tag.clone());
            }
        }
        Some(Iq {
            kind,
            id: element.attribute("id").unwrap_or_default().to_string(),
            to: element.attribute("to").map(str::to_string),
            from: element.attribute("from").map(str::to_string),
            payload,
            error,
        })
    }

    pub fn to_element(&self) -> Element {
        let mut element = Element::new("iq")
            .with_attribute("type", self.kind.as_str())
            .with_attribute("id", &self.id);
        if let Some(to) = &self.to {
            element.set_attribute("to", to);
        }
        if let Some(from) = &self.from {
            element.set_attribute("from", from);
        }
        if let Some(payload) = &self.payload {
            element.push_child(payload.clone());
        }
        if let Some(error) = &self.error {
            element.push_child(error.clone());
        }
        element
    }
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub struct ResourceBind {
    jid: Option<String>,
}

impl ResourceBind {
    /// The identity assigned by the server, still unvalidated.
    pub fn jid(&self) -> Option<&str> {
        self.jid.as_deref()
    }
}

/// What the server offers in a `<stream:features/>` round.
#[derive(Debug, Clone, Default, Eq, PartialEq)]
pub struct StreamFeatures {
    start_tls: bool,
    mechanisms: Vec<String>,
    resource_bind: bool,
    session: bool,
}

impl StreamFeatures {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_start_tls(mut self) -> Self {
        self.start_tls = true;
        self
    }

    pub fn with_mechanism(mut self, mechanism: &str) -> Self {
        self.mechanisms.push(mechanism.to_string());
        self
    }

    pub fn with_resource_bind(mut self) -> Self {
        self.resource_bind = true;
        self
    }

    pub fn with_session(mut self) -> Self {
        self.session = true;
        self
    }

    pub fn has_start_tls(&self) -> bool {
        self.start_tls
    }

    pub fn has_authentication_mechanisms(&self) -> bool {
        !self.mechanisms.is_empty()
    }

    pub fn has_authentication_mechanism(&self, mechanism: &str) -> bool {
        self.mechanisms.iter().any(|m| m == mechanism)
    }

    pub fn has_resource_bind(&self) -> bool {
        self.resource_bind
    }

    pub fn has_session(&self) -> bool {
        self.session
    }

    fn from_element(element: &Element) -> StreamFeatures {
        let mechanisms = element
            .find_tag_ns("mechanisms", SASL_NS)
            .map(|mechanisms| {
                mechanisms
                    .tags()
                    .filter(|tag| tag.name() == "mechanism")
                    .map(|tag| tag.cdata().trim().to_string())
                    .collect()
            })
            .unwrap_or_default();
        StreamFeatures {
            start_tls: element.find_tag_ns("starttls", TLS_NS).is_some(),
            mechanisms,
            resource_bind: element.find_tag_ns("bind", BIND_NS).is_some(),
            session: element.find_tag_ns("session", SESSION_NS).is_some(),
        }
    }
}

/// Every element the negotiation can receive from the server.
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum ProtocolElement {
    StreamFeatures(StreamFeatures),
    TlsProceed,
    TlsFailure,
    AuthSuccess,
    AuthFailure,
    Iq(Iq),
    Message(Element),
    Presence(Element),
    /// A `<stream:error/>` with its defined condition.
    StreamError(String),
    Unknown(Element),
}

fn is_client_stanza(element: &Element) -> bool {
    matches!(element.ns(), None | Some(CLIENT_NS))
}

impl ProtocolElement {
    pub fn from_element(element: Element) -> Self {
        let name = element.name().to_string();
        let ns = element.ns().map(str::to_string);
        let ns = ns.as_deref();
        match name.as_str() {
            FEATURES_TAG => ProtocolElement::StreamFeatures(StreamFeatures::from_element(&element)),
            STREAM_ERROR_TAG => {
                let condition = element
                    .tags()
                    .map(|tag| tag.name())
                    .find(|name| *name != "text")
                    .unwrap_or("undefined-condition");
                ProtocolElement::StreamError(condition.to_string())
            }
            "proceed" if ns == Some(TLS_NS) => ProtocolElement::TlsProceed,
            "failure" if ns == Some(TLS_NS) => ProtocolElement::TlsFailure,
            "success" if ns == Some(SASL_NS) => ProtocolElement::AuthSuccess,
            "failure" if ns == Some(SASL_NS) => ProtocolElement::AuthFailure,
            "iq" if is_client_stanza(&element) => match Iq::from_element(&element) {
                Some(iq) => ProtocolElement::Iq(iq),
                None => ProtocolElement::Unknown(element),
            },
            "message" if is_client_stanza(&element) => ProtocolElement::Message(element),
            "presence" if is_client_stanza(&element) => ProtocolElement::Presence(element),
            _ => ProtocolElement::Unknown(element),
        }
    }

    /// Short name for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            ProtocolElement::StreamFeatures(_) => "stream features",
            ProtocolElement::TlsProceed => "TLS proceed",
            ProtocolElement::TlsFailure => "TLS failure",
            ProtocolElement::AuthSuccess => "auth success",
            ProtocolElement::AuthFailure => "auth failure",
            ProtocolElement::Iq(_) => "iq",
            ProtocolElement::Message(_) => "message",
            ProtocolElement::Presence(_) => "presence",
            ProtocolElement::StreamError(_) => "stream error",
            ProtocolElement::Unknown(_) => "unknown element",
        }
    }
}

impl From<Element> for ProtocolElement {
    fn from(element: Element) -> Self {
        ProtocolElement::from_element(element)
    }
}

pub fn stream_header(to: &Jid) -> String {
    let header = Element::new(STREAM_TAG)
        .with_attribute("xmlns", CLIENT_NS)
        .with_attribute("xmlns:stream", STREAM_NS)
        .with_attribute("version", "1.0")
        .with_attribute("xml:lang", "en")
        .with_attribute("to", to.domainpart());
    format!("<?xml version='1.0'?>{}", header.start_tag())
}

pub fn start_tls_request() -> Element {
    Element::with_ns("starttls", TLS_NS)
}

/// SASL `<auth/>` request; an empty initial response is sent as `=`.
pub fn auth_request(mechanism: &str, initial_response: &[u8]) -> Element {
    let value = if initial_response.is_empty() {
        "=".to_string()
    } else {
        STANDARD.encode(initial_response)
    };
    Element::with_ns("auth", SASL_NS)
        .with_attribute("mechanism", mechanism)
        .with_cdata(&value)
}

/// PLAIN message of RFC 4616 without an authorization identity.
pub fn plain_message(authcid: &str, password: &str) -> Vec<u8> {
    let mut message = Vec::with_capacity(authcid.len() + password.len() + 2);
    message.push(0);
    message.extend_from_slice(authcid.as_bytes());
    message.push(0);
    message.extend_from_slice(password.as_bytes());
    message
}

pub fn resource_bind_request(resource: Option<&str>) -> Element {
    let mut bind = Element::with_ns("bind", BIND_NS);
    if let Some(resource) = resource {
        bind.push_child(Element::new("resource").with_cdata(resource));
    }
    Iq::new(IqType::Set, BIND_IQ_ID).with_payload(bind).to_element()
}

pub fn session_start_request() -> Element {
    Iq::new(IqType::Set, SESSION_IQ_ID)
        .with_payload(Element::with_ns("session", SESSION_NS))
        .to_element()
}
