/*
** This file is a part of Iksemel (XML parser for Jabber/XMPP)
** Copyright (C) 2000-2025 Gurer Ozen
**
** Iksemel is free software: you can redistribute it and/or modify it
** under the terms of the GNU Lesser General Public License as
** published by the Free Software Foundation, either version 3 of
** the License, or (at your option) any later version.
*/

use thiserror::Error;

/// Reasons a client connection can fail.
///
/// Except for [`ClientError::InvalidState`], every variant is a terminal
/// outcome: a session finishes with at most one of them, and the client
/// hands it to its caller unchanged.
#[derive(Debug, Clone, Eq, PartialEq, Error)]
pub enum ClientError {
    #[error("cannot resolve domain name: {0}")]
    DomainNameResolve(String),

    #[error("cannot connect to the server: {0}")]
    Connection(String),

    #[error("error while reading from the connection: {0}")]
    ConnectionRead(String),

    #[error("error while writing to the connection: {0}")]
    ConnectionWrite(String),

    #[error("invalid XML syntax: {0}")]
    Xml(String),

    #[error("authentication failed")]
    AuthenticationFailed,

    #[error("server offers no supported authentication mechanism")]
    NoSupportedAuthMechanisms,

    #[error("unexpected element received")]
    UnexpectedElement,

    #[error("resource binding failed")]
    ResourceBind,

    #[error("session start failed")]
    SessionStart,

    #[error("TLS error: {0}")]
    Tls(String),

    #[error("cannot load the client certificate: {0}")]
    ClientCertificateLoad(String),

    #[error("client certificate is not usable: {0}")]
    ClientCertificate(String),

    #[error("server closed the stream with error: {0}")]
    StreamError(String),

    /// The caller asked for something the session cannot do in its
    /// current state. Nothing was sent and the state did not change.
    #[error("operation is not valid in the {0} state")]
    InvalidState(&'static str),
}

impl ClientError {
    pub(crate) fn read(err: std::io::Error) -> Self {
        ClientError::ConnectionRead(err.to_string())
    }

    pub(crate) fn write(err: std::io::Error) -> Self {
        ClientError::ConnectionWrite(err.to_string())
    }
}

pub(super) mod description {
    pub(in super::super) const STREAM_CLOSED: &str = "stream closed by server";
    pub(in super::super) const CONNECTION_CLOSED: &str = "connection closed by peer";
    pub(in super::super) const STARTTLS_REFUSED: &str = "server refused to start TLS";
    pub(in super::super) const NO_ADDRESS: &str = "no address found";
    pub(in super::super) const UNBALANCED_END_TAG: &str = "end tag without a start tag";
    pub(in super::super) const STANZA_TOO_LARGE: &str = "stanza exceeds the size limit";
    pub(in super::super) const TOP_LEVEL_CDATA: &str = "character data outside of a stanza";
}
