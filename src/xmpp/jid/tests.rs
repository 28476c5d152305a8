/*
** This file is a part of Iksemel (XML parser for Jabber/XMPP)
** Copyright (C) 2000-2025 Gurer Ozen
**
** Iksemel is free software: you can redistribute it and/or modify it
** under the terms of the GNU Lesser General Public License as
** published by the Free Software Foundation, either version 3 of
** the License, or (at your option) any later version.
*/

use super::error::description;
use super::*;

fn check_jid(
    jid: Jid,
    full: &str,
    bare: &str,
    local: Option<&str>,
    domain: &str,
    resource: Option<&str>,
) {
    assert_eq!(jid.full(), full);
    assert_eq!(jid.bare(), bare);
    assert_eq!(jid.localpart(), local);
    assert_eq!(jid.domainpart(), domain);
    assert_eq!(jid.resourcepart(), resource);
    assert_eq!(jid.is_bare(), resource.is_none());
}

#[test]
fn good_jids() {
    check_jid(
        Jid::new("alice@example.com/phone").unwrap(),
        "alice@example.com/phone",
        "alice@example.com",
        Some("alice"),
        "example.com",
        Some("phone"),
    );
    check_jid(
        Jid::new("alice@example.com/phone/2@home").unwrap(),
        "alice@example.com/phone/2@home",
        "alice@example.com",
        Some("alice"),
        "example.com",
        Some("phone/2@home"),
    );
    check_jid(
        Jid::new("example.com.").unwrap(),
        "example.com",
        "example.com",
        None,
        "example.com",
        None,
    );
    check_jid(
        "conference.example.com/room".parse().unwrap(),
        "conference.example.com/room",
        "conference.example.com",
        None,
        "conference.example.com",
        Some("room"),
    );
}

#[test]
fn resource_binding() {
    let jid = Jid::new("alice@example.com").unwrap();
    check_jid(
        jid.with_resource("phone").unwrap(),
        "alice@example.com/phone",
        "alice@example.com",
        Some("alice"),
        "example.com",
        Some("phone"),
    );
    assert_eq!(
        jid.with_resource(""),
        Err(BadJid(description::RESOURCE_EMPTY))
    );
    assert_eq!(jid.domain_jid().full(), "example.com");
}

#[test]
fn bad_jids() {
    assert_eq!(Jid::new(""), Err(BadJid(description::DOMAIN_EMPTY)));
    assert_eq!(Jid::new("alice@/phone"), Err(BadJid(description::DOMAIN_EMPTY)));
    assert_eq!(Jid::new("@example.com"), Err(BadJid(description::LOCAL_EMPTY)));
    assert_eq!(Jid::new("example.com/"), Err(BadJid(description::RESOURCE_EMPTY)));
    assert_eq!(
        Jid::new("a@b@example.com"),
        Err(BadJid(description::DOMAIN_INVALID))
    );
    assert_eq!(
        Jid::new(&"x".repeat(1024)),
        Err(BadJid(description::PART_TOO_LONG))
    );
}
