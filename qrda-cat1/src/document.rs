//! Immutable element tree built from QRDA XML with `quick-xml`.
//!
//! Nodes live in an arena and are numbered in document order, so sorting by
//! [`NodeId`] restores document order for any node set.

use std::borrow::Cow;

use quick_xml::events::{BytesStart, Event};
use quick_xml::name::ResolveResult;
use quick_xml::NsReader;
use qrda_core::ImportError;

pub const CDA_NS: &str = "urn:hl7-org:v3";
pub const SDTC_NS: &str = "urn:hl7-org:sdtc";
pub const XSI_NS: &str = "http://www.w3.org/2001/XMLSchema-instance";

/// Position of a node inside its [`Document`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(usize);

impl NodeId {
    pub fn index(self) -> usize {
        self.0
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    pub namespace: Option<String>,
    pub name: String,
    pub value: String,
}

#[derive(Debug)]
enum NodeKind {
    Document,
    Element {
        namespace: Option<String>,
        name: String,
        attributes: Vec<Attribute>,
    },
    Text(String),
}

#[derive(Debug)]
struct Node {
    kind: NodeKind,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

/// Parsed XML document. Read-only once built.
#[derive(Debug)]
pub struct Document {
    nodes: Vec<Node>,
}

impl Document {
    /// Parse XML text into a tree. Whitespace-only text is dropped.
    pub fn parse(xml: &str) -> Result<Self, ImportError> {
        let mut reader = NsReader::from_str(xml);
        let mut document = Document {
            nodes: vec![Node {
                kind: NodeKind::Document,
                parent: None,
                children: Vec::new(),
            }],
        };
        let mut stack = vec![NodeId(0)];

        loop {
            let (resolved, event) = reader.read_resolved_event().map_err(xml_error)?;
            let namespace = namespace_uri(resolved);
            let parent = stack.last().copied().unwrap_or(NodeId(0));

            match event {
                Event::Start(start) => {
                    let attributes = read_attributes(&reader, &start)?;
                    let name = local_name(&start)?;
                    let id = document.push(
                        parent,
                        NodeKind::Element {
                            namespace,
                            name,
                            attributes,
                        },
                    );
                    stack.push(id);
                }
                Event::Empty(start) => {
                    let attributes = read_attributes(&reader, &start)?;
                    let name = local_name(&start)?;
                    document.push(
                        parent,
                        NodeKind::Element {
                            namespace,
                            name,
                            attributes,
                        },
                    );
                }
                Event::End(_) => {
                    stack.pop();
                }
                Event::Text(text) => {
                    let content = text
                        .unescape()
                        .map(Cow::into_owned)
                        .unwrap_or_else(|_| String::from_utf8_lossy(&text).into_owned());
                    if !content.trim().is_empty() {
                        document.push(parent, NodeKind::Text(content));
                    }
                }
                Event::CData(data) => {
                    let content = String::from_utf8_lossy(&data.into_inner()).into_owned();
                    if !content.trim().is_empty() {
                        document.push(parent, NodeKind::Text(content));
                    }
                }
                Event::Eof => break,
                _ => {}
            }
        }

        if document.root_element().is_none() {
            return Err(ImportError::MissingRoot);
        }

        Ok(document)
    }

    fn push(&mut self, parent: NodeId, kind: NodeKind) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node {
            kind,
            parent: Some(parent),
            children: Vec::new(),
        });
        self.nodes[parent.0].children.push(id);
        id
    }

    /// The document node (parent of the root element).
    pub fn root(&self) -> NodeRef<'_> {
        NodeRef {
            document: self,
            id: NodeId(0),
        }
    }

    pub fn root_element(&self) -> Option<NodeRef<'_>> {
        self.root().children().find(NodeRef::is_element)
    }

    pub fn node(&self, id: NodeId) -> NodeRef<'_> {
        NodeRef { document: self, id }
    }
}

/// Borrowed handle to one node of a [`Document`].
#[derive(Clone, Copy)]
pub struct NodeRef<'d> {
    document: &'d Document,
    id: NodeId,
}

impl std::fmt::Debug for NodeRef<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NodeRef")
            .field("id", &self.id)
            .field("name", &self.local_name())
            .finish()
    }
}

impl PartialEq for NodeRef<'_> {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self.document, other.document) && self.id == other.id
    }
}

impl Eq for NodeRef<'_> {}

impl<'d> NodeRef<'d> {
    fn node(&self) -> &'d Node {
        &self.document.nodes[self.id.0]
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn document(&self) -> &'d Document {
        self.document
    }

    pub fn is_element(&self) -> bool {
        matches!(self.node().kind, NodeKind::Element { .. })
    }

    pub fn is_text(&self) -> bool {
        matches!(self.node().kind, NodeKind::Text(_))
    }

    pub fn local_name(&self) -> Option<&'d str> {
        match &self.node().kind {
            NodeKind::Element { name, .. } => Some(name.as_str()),
            _ => None,
        }
    }

    pub fn namespace(&self) -> Option<&'d str> {
        match &self.node().kind {
            NodeKind::Element { namespace, .. } => namespace.as_deref(),
            _ => None,
        }
    }

    pub fn attributes(&self) -> &'d [Attribute] {
        match &self.node().kind {
            NodeKind::Element { attributes, .. } => attributes.as_slice(),
            _ => &[],
        }
    }

    /// Attribute without a namespace, e.g. `root` or `extension`.
    pub fn attribute(&self, name: &str) -> Option<&'d str> {
        self.attribute_ns(None, name)
    }

    pub fn attribute_ns(&self, namespace: Option<&str>, name: &str) -> Option<&'d str> {
        self.attributes()
            .iter()
            .find(|attr| attr.name == name && attr.namespace.as_deref() == namespace)
            .map(|attr| attr.value.as_str())
    }

    pub fn parent(&self) -> Option<NodeRef<'d>> {
        self.node().parent.map(|id| self.document.node(id))
    }

    pub fn children(&self) -> impl Iterator<Item = NodeRef<'d>> + 'd {
        let document = self.document;
        self.node()
            .children
            .iter()
            .map(move |id| document.node(*id))
    }

    /// Descendants in document order, excluding `self`.
    pub fn descendants(&self) -> Vec<NodeRef<'d>> {
        let mut out = Vec::new();
        let mut pending: Vec<NodeId> = self.node().children.iter().rev().copied().collect();
        while let Some(id) = pending.pop() {
            out.push(self.document.node(id));
            pending.extend(self.document.nodes[id.0].children.iter().rev().copied());
        }
        out
    }

    /// Concatenated text of this node and its descendants.
    pub fn text(&self) -> String {
        if let NodeKind::Text(content) = &self.node().kind {
            return content.clone();
        }
        self.descendants()
            .into_iter()
            .filter_map(|node| match &node.node().kind {
                NodeKind::Text(content) => Some(content.as_str()),
                _ => None,
            })
            .collect()
    }
}

fn xml_error(err: quick_xml::Error) -> ImportError {
    ImportError::Xml(err.to_string())
}

fn namespace_uri(resolved: ResolveResult<'_>) -> Option<String> {
    match resolved {
        ResolveResult::Bound(ns) => Some(String::from_utf8_lossy(ns.as_ref()).into_owned()),
        _ => None,
    }
}

fn local_name(start: &BytesStart<'_>) -> Result<String, ImportError> {
    std::str::from_utf8(start.local_name().as_ref())
        .map(str::to_string)
        .map_err(|err| ImportError::Xml(err.to_string()))
}

fn read_attributes(
    reader: &NsReader<&[u8]>,
    start: &BytesStart<'_>,
) -> Result<Vec<Attribute>, ImportError> {
    let mut attributes = Vec::new();
    for attr in start.attributes() {
        let attr = attr.map_err(|err| ImportError::Xml(err.to_string()))?;
        let raw_key = attr.key.as_ref();
        if raw_key == b"xmlns" || raw_key.starts_with(b"xmlns:") {
            continue;
        }

        let (resolved, local) = reader.resolve_attribute(attr.key);
        let namespace = namespace_uri(resolved);
        let name = std::str::from_utf8(local.as_ref())
            .map_err(|err| ImportError::Xml(err.to_string()))?
            .to_string();
        let value = attr.unescape_value().map_err(xml_error)?.into_owned();

        attributes.push(Attribute {
            namespace,
            name,
            value,
        });
    }
    Ok(attributes)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"<?xml version="1.0"?>
<ClinicalDocument xmlns="urn:hl7-org:v3" xmlns:sdtc="urn:hl7-org:sdtc"
    xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance">
  <templateId root="2.16.840.1.113883.10.20.24.1.2" extension="2021-08-01"/>
  <title>Sample &amp; test</title>
  <value xsi:type="CD" sdtc:valueSet="1.2.3"/>
</ClinicalDocument>"#;

    #[test]
    fn resolves_default_and_prefixed_namespaces() {
        let document = Document::parse(SAMPLE).expect("Không đọc được tài liệu");
        let root = document.root_element().expect("Thiếu phần tử gốc");
        assert_eq!(root.local_name(), Some("ClinicalDocument"));
        assert_eq!(root.namespace(), Some(CDA_NS));

        let value = root
            .children()
            .find(|node| node.local_name() == Some("value"))
            .expect("Thiếu value");
        assert_eq!(value.attribute_ns(Some(XSI_NS), "type"), Some("CD"));
        assert_eq!(value.attribute_ns(Some(SDTC_NS), "valueSet"), Some("1.2.3"));
        assert_eq!(value.attribute("type"), None);
    }

    #[test]
    fn text_is_unescaped_and_ids_follow_document_order() {
        let document = Document::parse(SAMPLE).expect("Không đọc được tài liệu");
        let root = document.root_element().expect("Thiếu phần tử gốc");
        let ids: Vec<NodeId> = root.descendants().iter().map(NodeRef::id).collect();
        let mut sorted = ids.clone();
        sorted.sort();
        assert_eq!(ids, sorted);

        let title = root
            .children()
            .find(|node| node.local_name() == Some("title"))
            .expect("Thiếu title");
        assert_eq!(title.text(), "Sample & test");
    }

    #[test]
    fn rejects_malformed_xml() {
        assert!(matches!(
            Document::parse("<a><b></a>"),
            Err(ImportError::Xml(_))
        ));
        assert!(matches!(Document::parse("   "), Err(ImportError::MissingRoot)));
    }
}
