/*
** This file is a part of Iksemel (XML parser for Jabber/XMPP)
** Copyright (C) 2000-2025 Gurer Ozen
**
** Iksemel is free software: you can redistribute it and/or modify it
** under the terms of the GNU Lesser General Public License as
** published by the Free Software Foundation, either version 3 of
** the License, or (at your option) any later version.
*/

use std::fmt::Display;

use quick_xml::escape::escape;

#[derive(Debug, Clone, Eq, PartialEq)]
pub enum Node {
    Tag(Element),
    CData(String),
}

/// An owned XML element.
///
/// Names are kept in their qualified form as they appear on the wire
/// (`stream:features`), and namespaces are ordinary `xmlns` attributes.
/// This is all the negotiation needs, and it keeps elements cheap to
/// build and compare.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Element {
    name: String,
    attributes: Vec<(String, String)>,
    children: Vec<Node>,
}

impl Element {
    pub fn new(name: &str) -> Self {
        Element {
            name: name.to_string(),
            attributes: Vec::new(),
            children: Vec::new(),
        }
    }

    /// Shorthand for an element with an `xmlns` attribute.
    pub fn with_ns(name: &str, ns: &str) -> Self {
        Element::new(name).with_attribute("xmlns", ns)
    }

    pub fn with_attribute(mut self, name: &str, value: &str) -> Self {
        self.set_attribute(name, value);
        self
    }

    pub fn with_child(mut self, child: Element) -> Self {
        self.children.push(Node::Tag(child));
        self
    }

    pub fn with_cdata(mut self, cdata: &str) -> Self {
        self.push_cdata(cdata);
        self
    }

    /// Sets an attribute, replacing an existing value with the same name.
    pub fn set_attribute(&mut self, name: &str, value: &str) {
        match self.attributes.iter_mut().find(|(n, _)| n == name) {
            Some((_, old)) => *old = value.to_string(),
            None => self
                .attributes
                .push((name.to_string(), value.to_string())),
        }
    }

    pub fn push_child(&mut self, child: Element) {
        self.children.push(Node::Tag(child));
    }

    /// Appends character data, merging with a directly preceding text node.
    pub fn push_cdata(&mut self, cdata: &str) {
        if let Some(Node::CData(last)) = self.children.last_mut() {
            last.push_str(cdata);
        } else {
            self.children.push(Node::CData(cdata.to_string()));
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn attributes(&self) -> impl Iterator<Item = (&str, &str)> {
        self.attributes.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }

    pub fn ns(&self) -> Option<&str> {
        self.attribute("xmlns")
    }

    pub fn children(&self) -> &[Node] {
        &self.children
    }

    /// Child elements, skipping character data.
    pub fn tags(&self) -> impl Iterator<Item = &Element> {
        self.children.iter().filter_map(|node| match node {
            Node::Tag(tag) => Some(tag),
            Node::CData(_) => None,
        })
    }

    /// First child element with the given name.
    pub fn find_tag(&self, name: &str) -> Option<&Element> {
        self.tags().find(|tag| tag.name == name)
    }

    /// First child element with the given name and namespace.
    pub fn find_tag_ns(&self, name: &str, ns: &str) -> Option<&Element> {
        self.tags().find(|tag| tag.name == name && tag.ns() == Some(ns))
    }

    /// Concatenated character data of the direct children.
    pub fn cdata(&self) -> String {
        self.children
            .iter()
            .filter_map(|node| match node {
                Node::CData(text) => Some(text.as_str()),
                Node::Tag(_) => None,
            })
            .collect()
    }

    /// Writes the start tag only, leaving the element open.
    pub(crate) fn start_tag(&self) -> String {
        let mut tag = format!("<{}", self.name);
        for (name, value) in &self.attributes {
            tag.push_str(&format!(" {name}=\"{}\"", escape(value.as_str())));
        }
        tag.push('>');
        tag
    }
}

impl Display for Element {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "<{}", self.name)?;
        for (name, value) in &self.attributes {
            write!(f, " {name}=\"{}\"", escape(value.as_str()))?;
        }
        if self.children.is_empty() {
            return write!(f, "/>");
        }
        write!(f, ">")?;
        for child in &self.children {
            match child {
                Node::Tag(tag) => tag.fmt(f)?,
                Node::CData(text) => write!(f, "{}", escape(text.as_str()))?,
            }
        }
        write!(f, "</{}>", self.name)
    }
}
