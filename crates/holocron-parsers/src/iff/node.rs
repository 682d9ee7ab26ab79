// holocron-parsers/src/iff/node.rs
//! Container tree nodes

use bytes::Bytes;
use holocron_core::Tag;

use super::{FORM, HEADER_SIZE};

/// A node in a container tree
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChunkNode {
    /// `FORM` container with a schema tag and ordered children
    Form(Form),
    /// Leaf chunk with an opaque payload
    Leaf(Leaf),
}

/// Container node
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Form {
    /// Schema identifier (`FLOR`, `0006`, ...)
    pub form_tag: Tag,
    /// Children in file order
    pub children: Vec<ChunkNode>,
}

/// Leaf node
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Leaf {
    pub tag: Tag,
    /// Payload bytes; layout is owned by the format-specific codec
    pub data: Bytes,
}

impl ChunkNode {
    /// Build a container node
    pub fn form(form_tag: Tag, children: Vec<ChunkNode>) -> Self {
        ChunkNode::Form(Form { form_tag, children })
    }

    /// Build a leaf node
    pub fn leaf(tag: Tag, data: impl Into<Bytes>) -> Self {
        ChunkNode::Leaf(Leaf {
            tag,
            data: data.into(),
        })
    }

    /// Tag written in the chunk header (`FORM` for containers)
    pub fn tag(&self) -> Tag {
        match self {
            ChunkNode::Form(_) => FORM,
            ChunkNode::Leaf(leaf) => leaf.tag,
        }
    }

    pub fn is_container(&self) -> bool {
        matches!(self, ChunkNode::Form(_))
    }

    pub fn as_form(&self) -> Option<&Form> {
        match self {
            ChunkNode::Form(form) => Some(form),
            ChunkNode::Leaf(_) => None,
        }
    }

    pub fn as_leaf(&self) -> Option<&Leaf> {
        match self {
            ChunkNode::Leaf(leaf) => Some(leaf),
            ChunkNode::Form(_) => None,
        }
    }

    /// Value of the header size field: form tag plus encoded children
    /// for containers, payload length for leaves
    pub fn encoded_size(&self) -> usize {
        match self {
            ChunkNode::Form(form) => {
                4 + form
                    .children
                    .iter()
                    .map(ChunkNode::total_size)
                    .sum::<usize>()
            }
            ChunkNode::Leaf(leaf) => leaf.data.len(),
        }
    }

    /// Bytes occupied including the 8-byte header
    pub fn total_size(&self) -> usize {
        HEADER_SIZE + self.encoded_size()
    }

    /// Short label such as `FORM FLOR` or `VERT (120 bytes)`
    pub fn label(&self) -> String {
        match self {
            ChunkNode::Form(form) => format!("FORM {}", form.form_tag),
            ChunkNode::Leaf(leaf) => format!("{} ({} bytes)", leaf.tag, leaf.data.len()),
        }
    }

    /// Depth-first visit of every node with its depth
    pub fn walk<'a, F>(&'a self, visit: &mut F)
    where
        F: FnMut(usize, &'a ChunkNode),
    {
        self.walk_at(0, visit);
    }

    fn walk_at<'a, F>(&'a self, depth: usize, visit: &mut F)
    where
        F: FnMut(usize, &'a ChunkNode),
    {
        visit(depth, self);
        if let ChunkNode::Form(form) = self {
            for child in &form.children {
                child.walk_at(depth + 1, visit);
            }
        }
    }
}

impl Form {
    /// First direct child container with the given form tag
    pub fn find_form(&self, form_tag: Tag) -> Option<&Form> {
        self.children
            .iter()
            .filter_map(ChunkNode::as_form)
            .find(|f| f.form_tag == form_tag)
    }

    /// First direct leaf child with the given tag
    pub fn find_leaf(&self, tag: Tag) -> Option<&Leaf> {
        self.children
            .iter()
            .filter_map(ChunkNode::as_leaf)
            .find(|l| l.tag == tag)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tag(s: &str) -> Tag {
        s.parse().unwrap()
    }

    #[test]
    fn test_encoded_size_invariant() {
        let node = ChunkNode::form(
            tag("TEST"),
            vec![
                ChunkNode::leaf(tag("DATA"), vec![1u8, 2, 3]),
                ChunkNode::form(tag("0001"), vec![ChunkNode::leaf(tag("NAME"), Vec::<u8>::new())]),
            ],
        );
        // 4 + (8 + 3) + (8 + 4 + (8 + 0))
        assert_eq!(node.encoded_size(), 4 + 11 + 20);
        assert_eq!(node.total_size(), 8 + 35);
    }

    #[test]
    fn test_walk_depths() {
        let node = ChunkNode::form(
            tag("ROOT"),
            vec![ChunkNode::form(tag("0000"), vec![ChunkNode::leaf(tag("INFO"), vec![0u8; 4])])],
        );
        let mut seen = Vec::new();
        node.walk(&mut |depth, n| seen.push((depth, n.tag())));
        assert_eq!(seen, vec![(0, FORM), (1, FORM), (2, tag("INFO"))]);
    }

    #[test]
    fn test_find_children() {
        let node = ChunkNode::form(
            tag("ROOT"),
            vec![
                ChunkNode::leaf(tag("META"), vec![0u8; 4]),
                ChunkNode::form(tag("0001"), vec![]),
            ],
        );
        let form = node.as_form().unwrap();
        assert!(form.find_leaf(tag("META")).is_some());
        assert!(form.find_form(tag("0001")).is_some());
        assert!(form.find_form(tag("0002")).is_none());
    }
}
