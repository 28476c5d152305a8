/*
** This file is a part of Iksemel (XML parser for Jabber/XMPP)
** Copyright (C) 2000-2025 Gurer Ozen
**
** Iksemel is free software: you can redistribute it and/or modify it
** under the terms of the GNU Lesser General Public License as
** published by the Free Software Foundation, either version 3 of
** the License, or (at your option) any later version.
*/

use std::time::Duration;

pub const CLIENT_PORT: u16 = 5222;

pub const DEFAULT_CONNECTION_TIMEOUT: Duration = Duration::from_secs(30);

pub const DEFAULT_PING_INTERVAL: Duration = Duration::from_secs(60);

/// Largest unit the stream parser buffers before giving up.
pub const MAX_STANZA_SIZE: usize = 1024 * 1024;

pub const SRV_SERVICE: &str = "_xmpp-client._tcp";

pub const STREAM_TAG: &str = "stream:stream";

pub const FEATURES_TAG: &str = "stream:features";

pub const STREAM_ERROR_TAG: &str = "stream:error";

pub const STREAM_NS: &str = "http://etherx.jabber.org/streams";

pub const CLIENT_NS: &str = "jabber:client";

pub const TLS_NS: &str = "urn:ietf:params:xml:ns:xmpp-tls";

pub const SASL_NS: &str = "urn:ietf:params:xml:ns:xmpp-sasl";

pub const BIND_NS: &str = "urn:ietf:params:xml:ns:xmpp-bind";

pub const SESSION_NS: &str = "urn:ietf:params:xml:ns:xmpp-session";

pub const STANZAS_NS: &str = "urn:ietf:params:xml:ns:xmpp-stanzas";

pub const BIND_IQ_ID: &str = "session-bind";

pub const SESSION_IQ_ID: &str = "session-start";

pub const STREAM_FOOTER: &str = "</stream:stream>";
