/*
** This file is a part of Iksemel (XML parser for Jabber/XMPP)
** Copyright (C) 2000-2025 Gurer Ozen
**
** Iksemel is free software: you can redistribute it and/or modify it
** under the terms of the GNU Lesser General Public License as
** published by the Free Software Foundation, either version 3 of
** the License, or (at your option) any later version.
*/

mod client;
mod constants;
mod element;
mod error;
mod jid;
mod parser;
mod protocol;
mod session;
mod stream;

pub use client::ClientEvent;
pub use client::Resolver;
pub use client::SystemResolver;
pub use client::XmppClient;
pub use client::XmppClientBuilder;
pub use element::Element;
pub use element::Node;
pub use error::ClientError;
pub use jid::BadJid;
pub use jid::Jid;
pub use parser::StreamElement;
pub use parser::StreamElements;
pub use parser::StreamParser;
pub use protocol::Iq;
pub use protocol::IqType;
pub use protocol::ProtocolElement;
pub use protocol::ResourceBind;
pub use protocol::StreamFeatures;
pub use session::ClientSession;
pub use session::SessionEvent;
pub use session::SessionState;
pub use stream::BasicSessionStream;
pub use stream::ClientCertificate;
pub use stream::Connection;
pub use stream::SessionStream;
pub use stream::StreamEvent;
