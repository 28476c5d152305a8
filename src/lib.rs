/*
** This file is a part of Iksemel (XML parser for Jabber/XMPP)
** Copyright (C) 2000-2025 Gurer Ozen
**
** Iksemel is free software: you can redistribute it and/or modify it
** under the terms of the GNU Lesser General Public License as
** published by the Free Software Foundation, either version 3 of
** the License, or (at your option) any later version.
*/

mod xmpp;

pub use xmpp::BadJid;
pub use xmpp::Jid;

pub use xmpp::Element;
pub use xmpp::Node;
pub use xmpp::StreamElement;
pub use xmpp::StreamElements;
pub use xmpp::StreamParser;

pub use xmpp::Iq;
pub use xmpp::IqType;
pub use xmpp::ProtocolElement;
pub use xmpp::ResourceBind;
pub use xmpp::StreamFeatures;

pub use xmpp::BasicSessionStream;
pub use xmpp::ClientCertificate;
pub use xmpp::Connection;
pub use xmpp::SessionStream;
pub use xmpp::StreamEvent;

pub use xmpp::ClientSession;
pub use xmpp::SessionEvent;
pub use xmpp::SessionState;

pub use xmpp::ClientError;
pub use xmpp::ClientEvent;
pub use xmpp::Resolver;
pub use xmpp::SystemResolver;
pub use xmpp::XmppClient;
pub use xmpp::XmppClientBuilder;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
