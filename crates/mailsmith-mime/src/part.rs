//! The body-part tree.
//!
//! A [`BodyPart`] owns every node of its tree in one arena. Nodes refer to
//! their children and parent by [`PartId`], so there are no owning cycles
//! and cloning the tree clones every node independently.

use std::mem;

use crate::body::{self, Body};
use crate::charset;
use crate::content_type::ContentType;
use crate::encoding::TransferEncoding;
use crate::error::{Error, Result};
use crate::field::{FieldValue, HeaderField};
use crate::header::Header;
use crate::session::{Config, Session};

/// Nesting deeper than this is kept as leaf contents.
const MAX_DEPTH: usize = 64;

const FALLBACK_BOUNDARY_PREFIX: &str = "=_mailsmith_part_";

/// Handle to a node of a [`BodyPart`] tree.
///
/// Handles stay valid until the node is removed. A handle from one tree
/// means nothing in another.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PartId(usize);

impl PartId {
    /// The root of every tree.
    pub const ROOT: Self = Self(0);

    /// Returns the arena index.
    #[must_use]
    pub const fn index(self) -> usize {
        self.0
    }
}

#[derive(Debug, Clone, Default)]
struct Node {
    header: Header,
    body: Body,
    parent: Option<PartId>,
    removed: bool,
}

/// A MIME entity: a header and a body, possibly with nested parts.
#[derive(Debug, Clone)]
pub struct BodyPart {
    nodes: Vec<Node>,
}

/// A borrowed view of one node.
#[derive(Debug, Clone, Copy)]
pub struct PartRef<'a> {
    tree: &'a BodyPart,
    id: PartId,
    node: &'a Node,
}

fn content_type(header: &Header) -> Option<&ContentType> {
    header
        .find("Content-Type")
        .ok()
        .filter(|field| field.is_parsed())
        .and_then(|field| field.as_content_type().ok())
}

fn multipart_boundary(header: &Header, buffer: &[u8], start: usize, end: usize) -> Option<String> {
    let content_type = content_type(header).filter(|ct| ct.is_multipart())?;
    if let Some(boundary) = content_type.boundary() {
        return Some(boundary.to_string());
    }
    let guessed = body::guess_boundary(buffer, start, end);
    tracing::debug!(boundary = ?guessed, "multipart type without boundary parameter");
    guessed
}

/// Moves the subtree at `id` out of `src` and appends it to `dst`.
fn graft(src: &mut [Node], id: PartId, dst: &mut Vec<Node>, parent: Option<PartId>) -> PartId {
    let mut node = mem::take(&mut src[id.0]);
    src[id.0].removed = true;

    let children = mem::take(&mut node.body.children);
    node.parent = parent;
    let new_id = PartId(dst.len());
    dst.push(node);

    let grafted = children
        .into_iter()
        .map(|child| graft(src, child, dst, Some(new_id)))
        .collect();
    dst[new_id.0].body.children = grafted;
    new_id
}

/// A boundary whose delimiter occurs in none of `texts`.
fn fallback_boundary(texts: &[&[u8]]) -> String {
    (0usize..)
        .map(|n| format!("{FALLBACK_BOUNDARY_PREFIX}{n}"))
        .find(|boundary| {
            let delimiter = format!("--{boundary}");
            !texts
                .iter()
                .any(|text| body::contains(text, delimiter.as_bytes()))
        })
        .unwrap_or_default()
}

impl BodyPart {
    /// Creates an empty part.
    #[must_use]
    pub fn new() -> Self {
        Self {
            nodes: vec![Node::default()],
        }
    }

    /// Creates a leaf part from a header and already-encoded contents.
    #[must_use]
    pub fn leaf(header: Header, contents: impl Into<Vec<u8>>) -> Self {
        let mut part = Self::new();
        part.nodes[0].header = header;
        part.nodes[0].body.contents = contents.into();
        part
    }

    /// Parses `buffer[position..end]` as one entity.
    ///
    /// A part always consumes its whole range, so the returned offset is
    /// `end` (clamped to the buffer). Malformed input never fails: headers
    /// are read leniently and an undelimited multipart body stays a leaf.
    #[must_use]
    pub fn parse(config: &Config, buffer: &[u8], position: usize, end: usize) -> (Self, usize) {
        let end = end.min(buffer.len());
        let mut part = Self { nodes: Vec::new() };
        part.parse_node(config, buffer, position.min(end), end, None, 0);
        (part, end)
    }

    fn parse_node(
        &mut self,
        config: &Config,
        buffer: &[u8],
        start: usize,
        end: usize,
        parent: Option<PartId>,
        depth: usize,
    ) -> PartId {
        let (header, body_start) = Header::parse(config, buffer, start, end);
        let boundary = multipart_boundary(&header, buffer, body_start, end);

        let id = PartId(self.nodes.len());
        self.nodes.push(Node {
            header,
            parent,
            ..Node::default()
        });

        let split = match boundary {
            Some(_) if depth >= MAX_DEPTH => {
                tracing::warn!(depth, "multipart nesting too deep, keeping body as leaf");
                None
            }
            Some(boundary) => body::split(buffer, body_start, end, &boundary),
            None => None,
        };

        let body = match split {
            Some(multipart) => {
                let children = multipart
                    .parts
                    .into_iter()
                    .map(|range| {
                        self.parse_node(config, buffer, range.start, range.end, Some(id), depth + 1)
                    })
                    .collect();
                Body {
                    contents: Vec::new(),
                    children,
                    prolog: buffer[multipart.prolog].to_vec(),
                    epilog: buffer[multipart.epilog].to_vec(),
                }
            }
            None => Body {
                contents: buffer[body_start..end].to_vec(),
                ..Body::default()
            },
        };
        self.nodes[id.0].body = body;
        id
    }

    fn node(&self, id: PartId) -> Result<&Node> {
        self.nodes
            .get(id.0)
            .filter(|node| !node.removed)
            .ok_or(Error::NoSuchPart)
    }

    fn node_mut(&mut self, id: PartId) -> Result<&mut Node> {
        self.nodes
            .get_mut(id.0)
            .filter(|node| !node.removed)
            .ok_or(Error::NoSuchPart)
    }

    /// Returns a view of the root.
    #[must_use]
    pub fn root(&self) -> PartRef<'_> {
        PartRef {
            tree: self,
            id: PartId::ROOT,
            node: &self.nodes[0],
        }
    }

    /// Returns a view of a node.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NoSuchPart`] for a removed or foreign handle.
    pub fn part(&self, id: PartId) -> Result<PartRef<'_>> {
        let node = self.node(id)?;
        Ok(PartRef {
            tree: self,
            id,
            node,
        })
    }

    /// The root header.
    #[must_use]
    pub fn header(&self) -> &Header {
        &self.nodes[0].header
    }

    /// The root header, mutably.
    pub fn header_mut(&mut self) -> &mut Header {
        &mut self.nodes[0].header
    }

    /// The header of any node, mutably.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NoSuchPart`] for a removed or foreign handle.
    pub fn part_header_mut(&mut self, id: PartId) -> Result<&mut Header> {
        Ok(&mut self.node_mut(id)?.header)
    }

    /// The root body.
    #[must_use]
    pub fn body(&self) -> &Body {
        &self.nodes[0].body
    }

    /// Child handles of a node.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NoSuchPart`] for a removed or foreign handle.
    pub fn children(&self, id: PartId) -> Result<&[PartId]> {
        Ok(&self.node(id)?.body.children)
    }

    /// Parent handle of a node; `None` for the root.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NoSuchPart`] for a removed or foreign handle.
    pub fn parent(&self, id: PartId) -> Result<Option<PartId>> {
        Ok(self.node(id)?.parent)
    }

    /// Number of parts in the tree, the root included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.iter().filter(|node| !node.removed).count()
    }

    /// Returns true if the tree is a single part with no header and no contents.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        let root = &self.nodes[0];
        self.len() == 1 && root.header.is_empty() && root.body.contents.is_empty()
    }

    /// Every handle in depth-first pre-order, starting at the root.
    #[must_use]
    pub fn depth_first(&self) -> Vec<PartId> {
        let mut order = Vec::with_capacity(self.nodes.len());
        let mut stack = vec![PartId::ROOT];
        while let Some(id) = stack.pop() {
            order.push(id);
            stack.extend(self.nodes[id.0].body.children.iter().rev());
        }
        order
    }

    /// Encodes `data` and stores it as the leaf contents of a node, stamping
    /// its Content-Transfer-Encoding field.
    ///
    /// # Errors
    ///
    /// Returns [`Error::CompositePart`] if the node has children, or
    /// [`Error::NoSuchPart`] for a bad handle.
    pub fn set_contents(&mut self, id: PartId, data: &[u8], encoding: TransferEncoding) -> Result<()> {
        let node = self.node_mut(id)?;
        if node.body.is_composite() {
            return Err(Error::CompositePart);
        }
        node.body.contents = encoding.encode(data);
        node.header.set(HeaderField::new(
            "Content-Transfer-Encoding",
            FieldValue::ContentEncoding(encoding),
        ));
        Ok(())
    }

    /// Sets the text before the first delimiter of a composite node.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NoSuchPart`] for a bad handle.
    pub fn set_prolog(&mut self, id: PartId, prolog: impl Into<Vec<u8>>) -> Result<()> {
        self.node_mut(id)?.body.prolog = prolog.into();
        Ok(())
    }

    /// Sets the text after the close delimiter of a composite node.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NoSuchPart`] for a bad handle.
    pub fn set_epilog(&mut self, id: PartId, epilog: impl Into<Vec<u8>>) -> Result<()> {
        self.node_mut(id)?.body.epilog = epilog.into();
        Ok(())
    }

    /// Grafts `part` as the last child of `parent`. Leaf contents of
    /// `parent` are dropped. Returns the handle of the grafted root.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NoSuchPart`] for a bad handle.
    pub fn add_part(&mut self, parent: PartId, part: Self) -> Result<PartId> {
        self.node(parent)?;
        let mut source = part.nodes;
        let id = graft(&mut source, PartId::ROOT, &mut self.nodes, Some(parent));

        let node = &mut self.nodes[parent.0];
        node.body.contents.clear();
        node.body.children.push(id);
        Ok(id)
    }

    /// Detaches a subtree and returns it as its own tree.
    ///
    /// # Errors
    ///
    /// Returns [`Error::RootPart`] for the root, or [`Error::NoSuchPart`]
    /// for a bad handle.
    pub fn remove_part(&mut self, id: PartId) -> Result<Self> {
        if id == PartId::ROOT {
            return Err(Error::RootPart);
        }
        if let Some(parent) = self.node(id)?.parent {
            self.nodes[parent.0].body.children.retain(|&child| child != id);
        }
        let mut nodes = Vec::new();
        graft(&mut self.nodes, id, &mut nodes, None);
        Ok(Self { nodes })
    }

    /// Copies a subtree into an independent tree whose root has no parent.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NoSuchPart`] for a bad handle.
    pub fn extract(&self, id: PartId) -> Result<Self> {
        self.node(id)?;
        if id == PartId::ROOT {
            return Ok(self.clone());
        }
        self.clone().remove_part(id)
    }

    /// Turns a node into `multipart/<sub_type>` with a fresh boundary.
    ///
    /// Existing leaf contents move, with their Content-Type and
    /// Content-Transfer-Encoding fields, into a new first child.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NoSuchPart`] for a bad handle.
    pub fn make_multipart(&mut self, id: PartId, sub_type: &str, session: &mut Session) -> Result<()> {
        let content_type = ContentType::multipart(sub_type, session.generate_boundary());
        let node = self.node_mut(id)?;

        let mut moved = Node {
            parent: Some(id),
            ..Node::default()
        };
        if !node.body.is_composite() {
            for name in ["Content-Type", "Content-Transfer-Encoding"] {
                if let Ok(field) = node.header.find(name) {
                    moved.header.append(field.clone());
                }
                node.header.remove(name);
            }
            moved.body.contents = mem::take(&mut node.body.contents);
        }
        node.header.set(HeaderField::new(
            "Content-Type",
            FieldValue::ContentType(content_type),
        ));

        if !moved.header.is_empty() || !moved.body.contents.is_empty() {
            let child = PartId(self.nodes.len());
            self.nodes.push(moved);
            self.nodes[id.0].body.children.push(child);
        }
        Ok(())
    }

    /// Generates the tree as CRLF-terminated bytes.
    #[must_use]
    pub fn generate(&self, max_line_length: usize) -> Vec<u8> {
        let mut out = Vec::new();
        self.write(&mut out, max_line_length);
        out
    }

    /// Appends the generated tree to `out`.
    pub fn write(&self, out: &mut Vec<u8>, max_line_length: usize) {
        self.write_node(PartId::ROOT, out, max_line_length);
    }

    fn write_node(&self, id: PartId, out: &mut Vec<u8>, max_line_length: usize) {
        let node = &self.nodes[id.0];
        if !node.body.is_composite() {
            node.header.generate(out, max_line_length);
            out.extend_from_slice(b"\r\n");
            out.extend_from_slice(&node.body.contents);
            return;
        }

        let children: Vec<Vec<u8>> = node
            .body
            .children
            .iter()
            .map(|&child| {
                let mut buffer = Vec::new();
                self.write_node(child, &mut buffer, max_line_length);
                buffer
            })
            .collect();

        let declared = content_type(&node.header).filter(|ct| ct.is_multipart());
        let (boundary, patched) = match declared.and_then(ContentType::boundary) {
            Some(boundary) => (boundary.to_string(), None),
            None => {
                let mut texts: Vec<&[u8]> = children.iter().map(Vec::as_slice).collect();
                texts.push(&node.body.prolog);
                texts.push(&node.body.epilog);
                let boundary = fallback_boundary(&texts);

                let mut content_type = declared
                    .cloned()
                    .unwrap_or_else(|| ContentType::new("multipart", "mixed"));
                content_type.set_parameter("boundary", boundary.clone());
                let mut header = node.header.clone();
                header.set(HeaderField::new(
                    "Content-Type",
                    FieldValue::ContentType(content_type),
                ));
                (boundary, Some(header))
            }
        };

        patched
            .as_ref()
            .unwrap_or(&node.header)
            .generate(out, max_line_length);
        out.extend_from_slice(b"\r\n");

        if !node.body.prolog.is_empty() {
            out.extend_from_slice(&node.body.prolog);
            out.extend_from_slice(b"\r\n");
        }
        for child in &children {
            out.extend_from_slice(b"--");
            out.extend_from_slice(boundary.as_bytes());
            out.extend_from_slice(b"\r\n");
            out.extend_from_slice(child);
            out.extend_from_slice(b"\r\n");
        }
        out.extend_from_slice(b"--");
        out.extend_from_slice(boundary.as_bytes());
        out.extend_from_slice(b"--\r\n");
        out.extend_from_slice(&node.body.epilog);
    }

    fn node_eq(&self, id: PartId, other: &Self, other_id: PartId) -> bool {
        let (a, b) = (&self.nodes[id.0], &other.nodes[other_id.0]);
        a.header == b.header
            && a.body.contents == b.body.contents
            && a.body.prolog == b.body.prolog
            && a.body.epilog == b.body.epilog
            && a.body.children.len() == b.body.children.len()
            && a
                .body
                .children
                .iter()
                .zip(&b.body.children)
                .all(|(&x, &y)| self.node_eq(x, other, y))
    }
}

impl Default for BodyPart {
    fn default() -> Self {
        Self::new()
    }
}

/// Structural equality: headers, contents and children, ignoring handles.
impl PartialEq for BodyPart {
    fn eq(&self, other: &Self) -> bool {
        self.node_eq(PartId::ROOT, other, PartId::ROOT)
    }
}

impl Eq for BodyPart {}

impl<'a> PartRef<'a> {
    /// The node handle.
    #[must_use]
    pub const fn id(&self) -> PartId {
        self.id
    }

    /// The node header.
    #[must_use]
    pub const fn header(&self) -> &'a Header {
        &self.node.header
    }

    /// The node body.
    #[must_use]
    pub const fn body(&self) -> &'a Body {
        &self.node.body
    }

    /// The parent node, if any.
    #[must_use]
    pub fn parent(&self) -> Option<Self> {
        self.node.parent.and_then(|id| self.tree.part(id).ok())
    }

    /// The child nodes, in order.
    pub fn children(&self) -> impl Iterator<Item = PartRef<'a>> + 'a {
        let tree = self.tree;
        self.node
            .body
            .children
            .iter()
            .filter_map(move |&id| tree.part(id).ok())
    }

    /// The parsed Content-Type, if present and well formed.
    #[must_use]
    pub fn content_type(&self) -> Option<&'a ContentType> {
        content_type(&self.node.header)
    }

    /// The Content-Transfer-Encoding, `7bit` when absent.
    #[must_use]
    pub fn encoding(&self) -> TransferEncoding {
        self.node
            .header
            .find("Content-Transfer-Encoding")
            .ok()
            .filter(|field| field.is_parsed())
            .and_then(|field| field.as_encoding().ok())
            .cloned()
            .unwrap_or_default()
    }

    /// Leaf contents with the transfer encoding removed.
    ///
    /// # Errors
    ///
    /// Returns an error if Base64 contents are malformed or the transfer
    /// encoding is not recognized.
    pub fn decoded_contents(&self) -> Result<Vec<u8>> {
        self.encoding().decode(&self.node.body.contents)
    }

    /// Leaf contents decoded to a string using the Content-Type charset
    /// (`us-ascii` when absent).
    ///
    /// # Errors
    ///
    /// Returns an error if the contents cannot be decoded or the charset is
    /// unknown.
    pub fn text(&self) -> Result<String> {
        let data = self.decoded_contents()?;
        let charset = self
            .content_type()
            .and_then(ContentType::charset)
            .unwrap_or_default();
        charset::decode(&data, &charset)
    }
}

impl From<PartRef<'_>> for BodyPart {
    fn from(part: PartRef<'_>) -> Self {
        part.tree.extract(part.id).unwrap_or_default()
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::redundant_clone,
    clippy::manual_string_new,
    clippy::needless_collect,
    clippy::unreadable_literal,
    clippy::used_underscore_items,
    clippy::similar_names
)]
mod tests {
    use super::*;
    use crate::text::line_length;

    const MIXED: &str = "From: a@example.com\r\n\
        Content-Type: multipart/mixed; boundary=\"xyz\"\r\n\
        \r\n\
        prolog\r\n\
        --xyz\r\n\
        Content-Type: text/plain\r\n\
        \r\n\
        hello\r\n\
        --xyz\r\n\
        Content-Type: text/plain; charset=iso-8859-1\r\n\
        Content-Transfer-Encoding: quoted-printable\r\n\
        \r\n\
        caf=E9\r\n\
        --xyz--\r\n\
        epilog\r\n";

    fn parse(raw: &str) -> BodyPart {
        let (part, end) = BodyPart::parse(&Config::default(), raw.as_bytes(), 0, raw.len());
        assert_eq!(end, raw.len());
        part
    }

    fn nested(level: usize, limit: usize) -> String {
        if level == limit {
            return "Content-Type: text/plain\r\n\r\nleaf".to_string();
        }
        format!(
            "Content-Type: multipart/mixed; boundary=\"b{level}\"\r\n\r\n--b{level}\r\n{}\r\n--b{level}--\r\n",
            nested(level + 1, limit)
        )
    }

    #[test]
    fn test_parse_leaf() {
        let part = parse("Subject: hi\r\n\r\nbody text");
        assert_eq!(part.len(), 1);
        assert_eq!(part.body().contents(), b"body text");
        assert!(part.header().has("subject"));
    }

    #[test]
    fn test_parse_multipart() {
        let part = parse(MIXED);
        let children = part.children(PartId::ROOT).unwrap();
        assert_eq!(children.len(), 2);
        assert_eq!(part.body().prolog(), b"prolog");
        assert_eq!(part.body().epilog(), b"epilog\r\n");

        let first = part.part(children[0]).unwrap();
        assert_eq!(first.text().unwrap(), "hello");
        assert_eq!(first.parent().unwrap().id(), PartId::ROOT);

        let second = part.part(children[1]).unwrap();
        assert_eq!(second.encoding(), TransferEncoding::QuotedPrintable);
        assert_eq!(second.decoded_contents().unwrap(), b"caf\xE9");
        assert_eq!(second.text().unwrap(), "café");
    }

    #[test]
    fn test_non_multipart_stays_leaf() {
        let raw = "Content-Type: text/plain\r\n\r\n--xyz\r\nnot a part\r\n--xyz--\r\n";
        let part = parse(raw);
        assert_eq!(part.len(), 1);
        assert!(part.body().contents().starts_with(b"--xyz"));
    }

    #[test]
    fn test_missing_boundary_is_guessed() {
        let raw = "Content-Type: multipart/mixed\r\n\r\n--guess\r\n\r\none\r\n--guess--\r\n";
        let part = parse(raw);
        assert_eq!(part.len(), 2);
    }

    #[test]
    fn test_depth_limit() {
        let raw = nested(0, 70);
        let part = parse(&raw);
        assert_eq!(part.len(), MAX_DEPTH + 1);
        let deepest = *part.depth_first().last().unwrap();
        assert!(part.part(deepest).unwrap().body().contents().starts_with(b"--b64"));
    }

    #[test]
    fn test_generate_round_trip() {
        let part = parse(MIXED);
        let out = part.generate(line_length::RECOMMENDED);
        let (again, _) = BodyPart::parse(&Config::default(), &out, 0, out.len());
        assert_eq!(part, again);
    }

    #[test]
    fn test_generate_adds_fallback_boundary() {
        let mut part = BodyPart::new();
        let mut child = BodyPart::new();
        child.set_contents(PartId::ROOT, b"one", TransferEncoding::SevenBit).unwrap();
        part.add_part(PartId::ROOT, child).unwrap();

        let out = String::from_utf8(part.generate(line_length::INFINITE)).unwrap();
        assert!(out.starts_with("Content-Type: multipart/mixed; boundary=\"=_mailsmith_part_0\"\r\n"));
        assert!(out.contains("\r\n--=_mailsmith_part_0--\r\n"));
        assert!(part.header().is_empty());
    }

    #[test]
    fn test_fallback_boundary_avoids_children() {
        assert_eq!(fallback_boundary(&[b"x --=_mailsmith_part_0 y"]), "=_mailsmith_part_1");
    }

    #[test]
    fn test_set_contents() {
        let mut part = BodyPart::new();
        part.set_contents(PartId::ROOT, b"hello", TransferEncoding::Base64).unwrap();
        assert_eq!(part.body().contents(), b"aGVsbG8=");
        assert_eq!(part.root().decoded_contents().unwrap(), b"hello");

        let mut composite = parse(MIXED);
        assert!(matches!(
            composite.set_contents(PartId::ROOT, b"x", TransferEncoding::SevenBit),
            Err(Error::CompositePart)
        ));
    }

    #[test]
    fn test_add_part_reparents_subtree() {
        let mut tree = BodyPart::new();
        let id = tree.add_part(PartId::ROOT, parse(MIXED)).unwrap();
        assert_eq!(tree.len(), 4);
        assert_eq!(tree.parent(id).unwrap(), Some(PartId::ROOT));
        for &child in tree.children(id).unwrap() {
            assert_eq!(tree.parent(child).unwrap(), Some(id));
        }
    }

    #[test]
    fn test_remove_part() {
        let mut part = parse(MIXED);
        assert!(matches!(part.remove_part(PartId::ROOT), Err(Error::RootPart)));

        let first = part.children(PartId::ROOT).unwrap()[0];
        let removed = part.remove_part(first).unwrap();
        assert_eq!(removed.root().text().unwrap(), "hello");
        assert_eq!(removed.parent(PartId::ROOT).unwrap(), None);
        assert_eq!(part.children(PartId::ROOT).unwrap().len(), 1);
        assert!(matches!(part.part(first), Err(Error::NoSuchPart)));
    }

    #[test]
    fn test_clone_is_independent() {
        let original = parse(MIXED);
        let mut copy = original.clone();
        assert_eq!(copy, original);
        assert_eq!(copy.parent(PartId::ROOT).unwrap(), None);

        let first = copy.children(PartId::ROOT).unwrap()[0];
        copy.part_header_mut(first).unwrap().remove("Content-Type");
        assert_ne!(copy, original);
        assert_eq!(original.part(first).unwrap().header().len(), 1);
    }

    #[test]
    fn test_extract() {
        let part = parse(MIXED);
        let second = part.children(PartId::ROOT).unwrap()[1];
        let extracted = part.extract(second).unwrap();
        assert_eq!(extracted.len(), 1);
        assert_eq!(extracted.root().text().unwrap(), "café");
        assert_eq!(part.len(), 3);
        assert_eq!(BodyPart::from(part.part(second).unwrap()), extracted);
    }

    #[test]
    fn test_make_multipart_moves_contents() {
        let mut session = Session::with_seed(Config::default(), 9);
        let mut part = parse("Subject: s\r\nContent-Type: text/plain\r\n\r\nbody");
        part.make_multipart(PartId::ROOT, "alternative", &mut session).unwrap();

        let content_type = part.root().content_type().unwrap();
        assert_eq!(content_type.sub_type, "alternative");
        assert!(content_type.boundary().is_some());
        assert!(part.header().has("Subject"));

        let child = part.children(PartId::ROOT).unwrap()[0];
        let child = part.part(child).unwrap();
        assert_eq!(child.body().contents(), b"body");
        assert!(child.header().has("content-type"));

        let out = part.generate(line_length::RECOMMENDED);
        let (again, _) = BodyPart::parse(&Config::default(), &out, 0, out.len());
        assert_eq!(again, part);
    }

    #[test]
    fn test_depth_first_order() {
        let mut tree = parse(MIXED);
        let first = tree.children(PartId::ROOT).unwrap()[0];
        tree.add_part(first, BodyPart::new()).unwrap();
        let order: Vec<usize> = tree.depth_first().into_iter().map(PartId::index).collect();
        assert_eq!(order, [0, 1, 3, 2]);
    }
}
