//! The SVG document tree.
//!
//! Cursor sources are small hand-authored SVG files that this crate needs to
//! read, rewrite (recolor, restroke, realign) and hand to a renderer backend.
//! The tree is an [`rctree::Node`] per XML node, built by driving the
//! `xml5ever` tokenizer; element data lives in [`NodeData`].  Attribute
//! values are interned with `string_cache` since the same literals repeat
//! across cursor files.
//!
//! Parsing never resolves DTDs or external entities; a reference to an
//! external resource resolves to nothing.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use markup5ever::buffer_queue::BufferQueue;
use markup5ever::{namespace_url, ns, LocalName, QualName};
use string_cache::DefaultAtom;
use xml5ever::tendril::StrTendril;
use xml5ever::tokenizer::{TagKind, Token, TokenSink, XmlTokenizer, XmlTokenizerOpts};

use crate::error::SourceError;

/// Type used to store attribute values.
pub type AttributeValue = DefaultAtom;

/// Strong reference to a node in the document tree.
pub type Node = rctree::Node<NodeData>;

/// Data for a single DOM node.
#[derive(Clone)]
pub enum NodeData {
    Element(Element),
    Text(RefCell<String>),
}

/// An XML element: a name plus its attributes in document order.
#[derive(Clone)]
pub struct Element {
    name: QualName,
    attributes: RefCell<Vec<(QualName, AttributeValue)>>,
}

impl Element {
    fn new(name: QualName, attributes: Vec<(QualName, AttributeValue)>) -> Element {
        Element {
            name,
            attributes: RefCell::new(attributes),
        }
    }

    pub fn name(&self) -> &QualName {
        &self.name
    }

    pub fn local_name(&self) -> &LocalName {
        &self.name.local
    }

    pub fn get(&self, name: &str) -> Option<String> {
        self.attributes
            .borrow()
            .iter()
            .find(|(qual, _)| &*qual.local == name)
            .map(|(_, value)| value.to_string())
    }

    /// Sets an attribute, replacing the value in place when the attribute is
    /// already present so that document order stays stable.
    pub fn set(&self, name: &str, value: &str) {
        let mut attributes = self.attributes.borrow_mut();

        if let Some(entry) = attributes.iter_mut().find(|(qual, _)| &*qual.local == name) {
            entry.1 = AttributeValue::from(value);
        } else {
            let qual = QualName::new(None, ns!(), LocalName::from(name));
            attributes.push((qual, AttributeValue::from(value)));
        }
    }

    pub fn remove(&self, name: &str) {
        self.attributes
            .borrow_mut()
            .retain(|(qual, _)| &*qual.local != name);
    }

    /// Calls `f` for every attribute, in document order.
    pub fn each_attribute(&self, mut f: impl FnMut(&QualName, &str)) {
        for (qual, value) in self.attributes.borrow().iter() {
            f(qual, value);
        }
    }
}

impl fmt::Display for Element {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name.local)
    }
}

/// Convenience accessors on tree nodes.
pub trait NodeExt {
    fn is_element(&self) -> bool;
    fn is_named(&self, name: &str) -> bool;
    fn attribute(&self, name: &str) -> Option<String>;
    fn set_attribute(&self, name: &str, value: &str);
    fn remove_attribute(&self, name: &str);
    fn id(&self) -> Option<String>;
    /// Whether the `class` attribute contains `token` as a whole word.
    fn has_class(&self, token: &str) -> bool;
}

impl NodeExt for Node {
    fn is_element(&self) -> bool {
        matches!(*self.borrow(), NodeData::Element(_))
    }

    fn is_named(&self, name: &str) -> bool {
        match *self.borrow() {
            NodeData::Element(ref e) => &*e.name.local == name,
            NodeData::Text(_) => false,
        }
    }

    fn attribute(&self, name: &str) -> Option<String> {
        match *self.borrow() {
            NodeData::Element(ref e) => e.get(name),
            NodeData::Text(_) => None,
        }
    }

    fn set_attribute(&self, name: &str, value: &str) {
        if let NodeData::Element(ref e) = *self.borrow() {
            e.set(name, value);
        }
    }

    fn remove_attribute(&self, name: &str) {
        if let NodeData::Element(ref e) = *self.borrow() {
            e.remove(name);
        }
    }

    fn id(&self) -> Option<String> {
        self.attribute("id")
    }

    fn has_class(&self, token: &str) -> bool {
        self.attribute("class")
            .map(|classes| classes.split_ascii_whitespace().any(|c| c == token))
            .unwrap_or(false)
    }
}

/// Structural address of an element: the (tag-name, index-among-same-name)
/// pairs from the root down to the element.
///
/// Unlike a node reference, an `ElementPath` survives deep copies of the
/// document, so it can key side tables across the prepared variants of a
/// source.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct ElementPath(Vec<(LocalName, usize)>);

impl ElementPath {
    /// The path of `node`, starting at its tree root.
    pub fn of(node: &Node) -> ElementPath {
        let mut segments = Vec::new();
        let mut current = node.clone();

        loop {
            let name = match *current.borrow() {
                NodeData::Element(ref e) => e.local_name().clone(),
                NodeData::Text(_) => unreachable!("ElementPath::of called on a text node"),
            };

            let index = match current.parent() {
                Some(ref parent) => sibling_index(parent, &current, &name),
                None => 0,
            };
            segments.push((name, index));

            match current.parent() {
                Some(parent) => current = parent,
                None => break,
            }
        }

        segments.reverse();
        ElementPath(segments)
    }

    /// The path of this element's parent; `None` at the root.
    pub fn parent(&self) -> Option<ElementPath> {
        if self.0.len() > 1 {
            Some(ElementPath(self.0[..self.0.len() - 1].to_vec()))
        } else {
            None
        }
    }

    pub fn depth(&self) -> usize {
        self.0.len()
    }

    /// Finds the node this path addresses under `root`.
    pub fn resolve(&self, root: &Node) -> Option<Node> {
        let mut segments = self.0.iter();

        let (first_name, first_index) = segments.next()?;
        match *root.borrow() {
            NodeData::Element(ref e) if e.local_name() == first_name && *first_index == 0 => (),
            _ => return None,
        }

        let mut current = root.clone();
        for (name, index) in segments {
            let child = current
                .children()
                .filter(|c| c.is_named(name))
                .nth(*index)?;
            current = child;
        }

        Some(current)
    }
}

impl fmt::Display for ElementPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (name, index)) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, "/")?;
            }
            write!(f, "{name}[{index}]")?;
        }
        Ok(())
    }
}

fn sibling_index(parent: &Node, node: &Node, name: &LocalName) -> usize {
    parent
        .children()
        .filter(|c| match *c.borrow() {
            NodeData::Element(ref e) => e.local_name() == name,
            NodeData::Text(_) => false,
        })
        .position(|c| c == *node)
        .expect("node not among its parent's children")
}

/// A parsed XML document.
pub struct Document {
    root: Node,
}

impl Document {
    /// Parses a document out of UTF-8 XML text.
    pub fn parse(input: &str) -> Result<Document, SourceError> {
        let builder = Rc::new(RefCell::new(TreeBuilder::default()));

        let mut queue = BufferQueue::new();
        queue.push_back(StrTendril::from_slice(input));

        let sink = BuilderSink(builder.clone());
        let mut tokenizer = XmlTokenizer::new(sink, XmlTokenizerOpts::default());
        tokenizer.run(&mut queue);
        drop(tokenizer);

        let builder = Rc::try_unwrap(builder)
            .map_err(|_| SourceError::Xml(String::from("tokenizer retained the sink")))?
            .into_inner();
        builder.finish()
    }

    /// The root element.
    pub fn root(&self) -> Node {
        self.root.clone()
    }

    /// A deep copy, sharing nothing with `self`.
    pub fn duplicate(&self) -> Document {
        Document {
            root: deep_clone(&self.root),
        }
    }

    /// First element with the given `id`, in document order.
    pub fn element_by_id(&self, id: &str) -> Option<Node> {
        self.root
            .descendants()
            .find(|n| n.id().as_deref() == Some(id))
    }

    /// All elements, in document order.
    pub fn elements(&self) -> impl Iterator<Item = Node> {
        self.root.descendants().filter(NodeExt::is_element)
    }
}

impl fmt::Display for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        serialize_node(&self.root, f)
    }
}

/// Creates a free-standing element, for grafting into a document.
pub fn new_element(name: &str) -> Node {
    let qual = QualName::new(None, ns!(), LocalName::from(name));
    Node::new(NodeData::Element(Element::new(qual, Vec::new())))
}

fn deep_clone(node: &Node) -> Node {
    let mut copy = Node::new(node.borrow().clone());
    for child in node.children() {
        copy.append(deep_clone(&child));
    }
    copy
}

fn serialize_node(node: &Node, out: &mut fmt::Formatter<'_>) -> fmt::Result {
    match *node.borrow() {
        NodeData::Text(ref text) => write_escaped(out, &text.borrow(), false),

        NodeData::Element(ref e) => {
            write!(out, "<")?;
            write_name(out, e.name())?;
            let mut result = Ok(());
            e.each_attribute(|qual, value| {
                result = result.and_then(|_| {
                    write!(out, " ")?;
                    write_name(out, qual)?;
                    write!(out, "=\"")?;
                    write_escaped(out, value, true)?;
                    write!(out, "\"")
                });
            });
            result?;

            if node.first_child().is_none() {
                write!(out, "/>")
            } else {
                write!(out, ">")?;
                for child in node.children() {
                    serialize_node(&child, out)?;
                }
                write!(out, "</")?;
                write_name(out, e.name())?;
                write!(out, ">")
            }
        }
    }
}

fn write_name(out: &mut fmt::Formatter<'_>, name: &QualName) -> fmt::Result {
    if let Some(ref prefix) = name.prefix {
        write!(out, "{prefix}:")?;
    }
    write!(out, "{}", name.local)
}

fn write_escaped(out: &mut fmt::Formatter<'_>, value: &str, in_attribute: bool) -> fmt::Result {
    for c in value.chars() {
        match c {
            '&' => write!(out, "&amp;")?,
            '<' => write!(out, "&lt;")?,
            '>' => write!(out, "&gt;")?,
            '"' if in_attribute => write!(out, "&quot;")?,
            _ => write!(out, "{c}")?,
        }
    }
    Ok(())
}

#[derive(Default)]
struct TreeBuilder {
    root: Option<Node>,
    stack: Vec<Node>,
    error: Option<String>,
}

impl TreeBuilder {
    fn append(&mut self, node: Node) {
        match self.stack.last_mut() {
            Some(parent) => parent.append(node),
            None if self.root.is_none() => self.root = Some(node),
            // Content outside the root element; drop it.
            None => (),
        }
    }

    fn append_text(&mut self, text: &str) {
        let Some(parent) = self.stack.last_mut() else {
            return;
        };

        // Coalesce adjacent character runs into one text node.
        if let Some(last) = parent.last_child() {
            if let NodeData::Text(ref existing) = *last.borrow() {
                existing.borrow_mut().push_str(text);
                return;
            }
        }

        parent.append(Node::new(NodeData::Text(RefCell::new(text.to_string()))));
    }

    fn finish(self) -> Result<Document, SourceError> {
        if let Some(error) = self.error {
            return Err(SourceError::Xml(error));
        }
        if !self.stack.is_empty() {
            return Err(SourceError::Xml(String::from("unclosed element")));
        }
        match self.root {
            Some(root) => Ok(Document { root }),
            None => Err(SourceError::Xml(String::from("no root element"))),
        }
    }
}

struct BuilderSink(Rc<RefCell<TreeBuilder>>);

impl TokenSink for BuilderSink {
    fn process_token(&mut self, token: Token) {
        let mut builder = self.0.borrow_mut();

        if builder.error.is_some() {
            return;
        }

        match token {
            Token::TagToken(tag) => {
                let attributes = tag
                    .attrs
                    .iter()
                    .map(|a| (a.name.clone(), AttributeValue::from(&*a.value)))
                    .collect();

                match tag.kind {
                    TagKind::StartTag => {
                        let node =
                            Node::new(NodeData::Element(Element::new(tag.name, attributes)));
                        builder.append(node.clone());
                        builder.stack.push(node);
                    }

                    TagKind::EmptyTag => {
                        let node = Node::new(NodeData::Element(Element::new(tag.name, attributes)));
                        builder.append(node);
                    }

                    TagKind::EndTag => match builder.stack.pop() {
                        Some(open) if open.is_named(&tag.name.local) => (),
                        _ => {
                            builder.error =
                                Some(format!("unexpected closing tag </{}>", tag.name.local));
                        }
                    },

                    TagKind::ShortTag => {
                        if builder.stack.pop().is_none() {
                            builder.error = Some(String::from("unexpected short closing tag"));
                        }
                    }
                }
            }

            Token::CharacterTokens(text) => builder.append_text(&text),

            Token::ParseError(e) => {
                builder.error = Some(e.to_string());
            }

            // Comments, processing instructions and doctypes carry nothing a
            // cursor source needs; external entities stay unresolved.
            _ => (),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"<svg viewBox="0 0 256 256"><defs/><g id="pointer"><path class="align-anchor" d="m 16,20"/><path d="m 0,0 h 8"/></g><circle id="cursor-hotspot" cx="4" cy="4"/></svg>"#;

    #[test]
    fn parses_and_serializes() {
        let doc = Document::parse(SAMPLE).unwrap();
        assert_eq!(doc.to_string(), SAMPLE);
    }

    #[test]
    fn rejects_garbage() {
        assert!(Document::parse("").is_err());
        assert!(Document::parse("<svg><g></svg>").is_err());
        assert!(Document::parse("not xml").is_err());
    }

    #[test]
    fn finds_by_id() {
        let doc = Document::parse(SAMPLE).unwrap();
        let hotspot = doc.element_by_id("cursor-hotspot").unwrap();
        assert_eq!(hotspot.attribute("cx").as_deref(), Some("4"));
        assert!(doc.element_by_id("nope").is_none());
    }

    #[test]
    fn mutates_attributes_in_place() {
        let doc = Document::parse(r#"<svg a="1" b="2"/>"#).unwrap();
        let root = doc.root();

        root.set_attribute("a", "changed");
        root.set_attribute("c", "3");
        root.remove_attribute("b");

        assert_eq!(doc.to_string(), r#"<svg a="changed" c="3"/>"#);
    }

    #[test]
    fn escapes_text_and_attributes() {
        let doc = Document::parse(r#"<svg title="a&amp;b"><t>1 &lt; 2</t></svg>"#).unwrap();
        assert_eq!(
            doc.to_string(),
            r#"<svg title="a&amp;b"><t>1 &lt; 2</t></svg>"#
        );
    }

    #[test]
    fn element_path_round_trips() {
        let doc = Document::parse(SAMPLE).unwrap();

        let anchor = doc
            .elements()
            .find(|n| n.has_class("align-anchor"))
            .unwrap();
        let path = ElementPath::of(&anchor);
        assert_eq!(path.to_string(), "svg[0]/g[0]/path[0]");

        let resolved = path.resolve(&doc.root()).unwrap();
        assert!(resolved == anchor);

        // The same path resolves in a deep copy.
        let copy = doc.duplicate();
        let in_copy = path.resolve(&copy.root()).unwrap();
        assert!(in_copy.has_class("align-anchor"));
        assert!(in_copy != anchor);
    }

    #[test]
    fn element_path_distinguishes_same_name_siblings() {
        let doc = Document::parse("<svg><g><p/><p/></g></svg>").unwrap();
        let second = doc
            .root()
            .children()
            .next()
            .unwrap()
            .children()
            .nth(1)
            .unwrap();

        let path = ElementPath::of(&second);
        assert_eq!(path.to_string(), "svg[0]/g[0]/p[1]");
        assert!(path.resolve(&doc.root()).unwrap() == second);
        assert_eq!(path.parent().unwrap().to_string(), "svg[0]/g[0]");
    }

    #[test]
    fn whitespace_text_is_preserved() {
        let source = "<svg>\n  <g/>\n</svg>";
        let doc = Document::parse(source).unwrap();
        assert_eq!(doc.to_string(), source);
    }
}
