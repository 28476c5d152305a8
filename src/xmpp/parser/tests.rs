/*
** This file is a part of Iksemel (XML parser for Jabber/XMPP)
** Copyright (C) 2000-2025 Gurer Ozen
**
** Iksemel is free software: you can redistribute it and/or modify it
** under the terms of the GNU Lesser General Public License as
** published by the Free Software Foundation, either version 3 of
** the License, or (at your option) any later version.
*/

use super::*;

fn check_stream(stream_text: &str, expected: &[&str]) {
    let mut parser = StreamParser::new();
    let mut current: usize = 0;
    let mut started = false;
    let mut ended = false;

    for element in parser.elements(stream_text.as_bytes()) {
        assert!(!ended);
        match element.unwrap() {
            StreamElement::Start(header) => {
                assert!(!started);
                assert_eq!(header.name(), "stream:stream");
                started = true;
            }
            StreamElement::Element(element) => {
                assert!(started);
                assert_eq!(element.to_string(), expected[current]);
                current += 1;
            }
            StreamElement::End => {
                ended = true;
                assert_eq!(current, expected.len());
            }
        }
    }
    assert!(ended);
}

#[test]
fn stream_elements() {
    check_stream(
        "<?xml version='1.0'?>\
         <stream:stream xmlns:stream='http://etherx.jabber.org/streams' \
                        version='1.0' from='example.com' id='s1'>\
         <message to='user@example.com'>\
             <body>Hello &amp; bye!</body>\
         </message> \n\
         <presence/>\
         </stream:stream>",
        &[
            "<message to=\"user@example.com\"><body>Hello &amp; bye!</body></message>",
            "<presence/>",
        ],
    );
}

#[test]
fn header_attributes() {
    let mut parser = StreamParser::new();
    parser.push_bytes(b"<stream:stream xmlns='jabber:client' from='example.com' id='abc'>");
    match parser.next_element().unwrap() {
        Some(StreamElement::Start(header)) => {
            assert_eq!(header.attribute("from"), Some("example.com"));
            assert_eq!(header.attribute("id"), Some("abc"));
        }
        other => panic!("unexpected {other:?}"),
    }
    assert_eq!(parser.next_element().unwrap(), None);
    assert!(!parser.has_pending_bytes());
}

#[test]
fn byte_by_byte() {
    let text = "<stream:stream>  <iq type='result' id='a1'><bind xmlns='urn:ietf:params:xml:ns:xmpp-bind'>\
                <jid>alice@example.com/ph&#111;ne</jid></bind></iq></stream:stream>";
    let mut parser = StreamParser::new();
    let mut results = Vec::new();
    for byte in text.as_bytes() {
        parser.push_bytes(&[*byte]);
        while let Some(element) = parser.next_element().unwrap() {
            results.push(element);
        }
    }
    assert_eq!(results.len(), 3);
    match &results[1] {
        StreamElement::Element(iq) => {
            let jid = iq.find_tag("bind").unwrap().find_tag("jid").unwrap();
            assert_eq!(jid.cdata(), "alice@example.com/phone");
        }
        other => panic!("unexpected {other:?}"),
    }
    assert_eq!(results[2], StreamElement::End);
}

#[test]
fn whitespace_keepalives() {
    let mut parser = StreamParser::new();
    parser.push_bytes(b"<stream:stream>");
    assert!(matches!(
        parser.next_element().unwrap(),
        Some(StreamElement::Start(_))
    ));
    parser.push_bytes(b" \n \n");
    assert_eq!(parser.next_element().unwrap(), None);
    assert!(!parser.has_pending_bytes());
}

#[test]
fn reset_drops_partial_input() {
    let mut parser = StreamParser::new();
    parser.push_bytes(b"<stream:stream><proceed xmlns='urn:ietf:params:xml:ns:xmpp-tls'/><garb");
    assert!(matches!(
        parser.next_element().unwrap(),
        Some(StreamElement::Start(_))
    ));
    assert!(matches!(
        parser.next_element().unwrap(),
        Some(StreamElement::Element(_))
    ));
    assert_eq!(parser.next_element().unwrap(), None);
    assert!(parser.has_pending_bytes());
    parser.reset();
    assert!(!parser.has_pending_bytes());
}

#[test]
fn bad_xml() {
    let mut parser = StreamParser::new();
    parser.push_bytes(b"<stream:stream>hello");
    assert!(matches!(
        parser.next_element().unwrap(),
        Some(StreamElement::Start(_))
    ));
    assert!(matches!(parser.next_element(), Err(ClientError::Xml(_))));

    let mut parser = StreamParser::new();
    parser.push_bytes(b"<message><body></message></body>");
    assert!(matches!(parser.next_element(), Err(ClientError::Xml(_))));
}

fn feed_bytes(parser: &mut StreamParser, text: &str) -> Vec<StreamElement> {
    let mut results = Vec::new();
    for byte in text.as_bytes() {
        parser.push_bytes(&[*byte]);
        while let Some(element) = parser.next_element().unwrap() {
            results.push(element);
        }
    }
    results
}

#[test]
fn byte_by_byte_markup() {
    let mut parser = StreamParser::new();
    let results = feed_bytes(
        &mut parser,
        "<stream:stream><!-- hi --><message><body><![CDATA[a<b]]></body><!-- c --></message>\
         </stream:stream>",
    );
    assert_eq!(results.len(), 3);
    match &results[1] {
        StreamElement::Element(message) => {
            assert_eq!(message.find_tag("body").map(Element::cdata), Some("a<b".to_string()));
        }
        other => panic!("unexpected {other:?}"),
    }
    assert_eq!(results[2], StreamElement::End);
}

#[test]
fn split_bang_markup() {
    let mut parser = StreamParser::new();
    parser.push_bytes(b"<stream:stream><message><!");
    assert!(matches!(
        parser.next_element().unwrap(),
        Some(StreamElement::Start(_))
    ));
    assert_eq!(parser.next_element().unwrap(), None);
    parser.push_bytes(b"[CDATA[x]]></message>");
    match parser.next_element().unwrap() {
        Some(StreamElement::Element(message)) => assert_eq!(message.cdata(), "x"),
        other => panic!("unexpected {other:?}"),
    }

    let mut parser = StreamParser::new();
    parser.push_bytes(b"<stream:stream><message><!x></message>");
    assert!(parser.next_element().unwrap().is_some());
    assert!(matches!(parser.next_element(), Err(ClientError::Xml(_))));
}

#[test]
fn scan_resumes() {
    let mut parser = StreamParser::new();
    parser.push_bytes(b"<stream:stream><message><body>hel");
    assert!(parser.next_element().unwrap().is_some());
    assert_eq!(parser.next_element().unwrap(), None);
    assert_eq!(parser.scanned, 18);
    assert_eq!(parser.depth, 2);

    parser.push_bytes(b"lo</bo");
    assert_eq!(parser.next_element().unwrap(), None);
    assert_eq!(parser.scanned, 20);
    parser.push_bytes(b"dy></message>");
    match parser.next_element().unwrap() {
        Some(StreamElement::Element(message)) => {
            assert_eq!(message.to_string(), "<message><body>hello</body></message>");
        }
        other => panic!("unexpected {other:?}"),
    }
    assert_eq!(parser.scanned, 0);
    assert_eq!(parser.depth, 0);
    assert!(!parser.has_pending_bytes());
}

#[test]
fn large_stanza_in_chunks() {
    let mut parser = StreamParser::new();
    parser.push_bytes(b"<stream:stream><message><body>");
    assert!(parser.next_element().unwrap().is_some());
    let chunk = "0123456789".repeat(10);
    for _ in 0..1000 {
        parser.push_bytes(chunk.as_bytes());
        assert_eq!(parser.next_element().unwrap(), None);
    }
    parser.push_bytes(b"</body></message>");
    match parser.next_element().unwrap() {
        Some(StreamElement::Element(message)) => {
            assert_eq!(message.find_tag("body").map(|body| body.cdata().len()), Some(100_000));
        }
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn stanza_size_limit() {
    let mut parser = StreamParser::new();
    parser.push_bytes(b"<stream:stream><message><body>");
    assert!(parser.next_element().unwrap().is_some());
    parser.push_bytes(&vec![b'a'; MAX_STANZA_SIZE]);
    assert_eq!(
        parser.next_element(),
        Err(ClientError::Xml(description::STANZA_TOO_LARGE.to_string()))
    );
}
