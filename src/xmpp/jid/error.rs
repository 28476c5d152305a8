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

#[derive(Debug, Eq, PartialEq, Copy, Clone, Error)]
#[error("invalid JabberID: {0}")]
pub struct BadJid(pub &'static str);

pub(super) mod description {
    pub(in super::super) const DOMAIN_EMPTY: &str = "domainpart is empty";
    pub(in super::super) const DOMAIN_INVALID: &str = "domainpart contains '@' or whitespace";
    pub(in super::super) const LOCAL_EMPTY: &str = "localpart is empty";
    pub(in super::super) const RESOURCE_EMPTY: &str = "resourcepart is empty";
    pub(in super::super) const PART_TOO_LONG: &str = "a part is longer than 1023 octets";
}
