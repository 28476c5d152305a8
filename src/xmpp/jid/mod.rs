/*
** This file is a part of Iksemel (XML parser for Jabber/XMPP)
** Copyright (C) 2000-2025 Gurer Ozen
**
** Iksemel is free software: you can redistribute it and/or modify it
** under the terms of the GNU Lesser General Public License as
** published by the Free Software Foundation, either version 3 of
** the License, or (at your option) any later version.
*/

mod error;

use std::fmt::Display;
use std::str::FromStr;

pub use error::BadJid;
use error::description;

const MAX_PART_SIZE: usize = 1023;

fn check_part(part: &str, empty: &'static str) -> Result<(), BadJid> {
    if part.is_empty() {
        return Err(BadJid(empty));
    }
    if part.len() > MAX_PART_SIZE {
        return Err(BadJid(description::PART_TOO_LONG));
    }
    Ok(())
}

/// The address of an entity in the XMPP protocol.
///
/// Each JID has three parts:
/// - Local part: Optionally identifies an account on the domain.
/// - Domain part: Identifies an XMPP server, never empty.
/// - Resource part: Optionally identifies one connection of the account.
///   Servers assign it during resource binding.
///
/// More details can be found in [RFC7622](https://datatracker.ietf.org/doc/rfc7622/)
#[derive(Debug, Clone, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub struct Jid {
    local: Option<String>,
    domain: String,
    resource: Option<String>,
}

impl Jid {
    /// Create a JID from a string.
    pub fn new(jid: &str) -> Result<Self, BadJid> {
        let (bare, resource) = match jid.split_once('/') {
            Some((bare, resource)) => (bare, Some(resource)),
            None => (jid, None),
        };
        let (local, domain) = match bare.split_once('@') {
            Some((local, domain)) => (Some(local), domain),
            None => (None, bare),
        };

        // A final dot is not part of the domain, RFC 7622 section 3.2
        let domain = domain.strip_suffix('.').unwrap_or(domain);
        check_part(domain, description::DOMAIN_EMPTY)?;
        if domain.contains(|c: char| c == '@' || c.is_whitespace()) {
            return Err(BadJid(description::DOMAIN_INVALID));
        }
        if let Some(local) = local {
            check_part(local, description::LOCAL_EMPTY)?;
        }
        if let Some(resource) = resource {
            check_part(resource, description::RESOURCE_EMPTY)?;
        }

        Ok(Jid {
            local: local.map(str::to_string),
            domain: domain.to_string(),
            resource: resource.map(str::to_string),
        })
    }

    /// Full form of the JID with all the components.
    pub fn full(&self) -> String {
        self.to_string()
    }

    /// Bare form of the JID without the resource part.
    pub fn bare(&self) -> String {
        match &self.local {
            Some(local) => format!("{local}@{}", self.domain),
            None => self.domain.clone(),
        }
    }

    /// Only the local part of the JID.
    pub fn localpart(&self) -> Option<&str> {
        self.local.as_deref()
    }

    /// Only the domain part of the JID.
    pub fn domainpart(&self) -> &str {
        &self.domain
    }

    /// Only the resource part of the JID.
    pub fn resourcepart(&self) -> Option<&str> {
        self.resource.as_deref()
    }

    /// True if the JID does not contain a resource part.
    pub fn is_bare(&self) -> bool {
        self.resource.is_none()
    }

    /// Creates another JID by overriding the resource part.
    pub fn with_resource(&self, resource: &str) -> Result<Jid, BadJid> {
        check_part(resource, description::RESOURCE_EMPTY)?;
        Ok(Jid {
            local: self.local.clone(),
            domain: self.domain.clone(),
            resource: Some(resource.to_string()),
        })
    }

    /// The server part alone, used as the stream destination.
    pub fn domain_jid(&self) -> Jid {
        Jid {
            local: None,
            domain: self.domain.clone(),
            resource: None,
        }
    }
}

impl FromStr for Jid {
    type Err = BadJid;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Jid::new(s)
    }
}

impl Display for Jid {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let Some(local) = &self.local {
            write!(f, "{local}@")?;
        }
        write!(f, "{}", self.domain)?;
        if let Some(resource) = &self.resource {
            write!(f, "/{resource}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests;
