// holocron-parsers/src/iff/cursor.rs
//! Ordered access to a container's children
//!
//! Format codecs describe their schema as a fixed sequence of expected
//! children. The cursor turns every deviation (missing child, wrong tag,
//! leaf where a container was expected, leftovers) into a
//! `MalformedContainer` error naming the position in the tree.

use std::iter::Peekable;
use std::slice::Iter;

use holocron_core::Tag;

use super::node::{ChunkNode, Form, Leaf};
use crate::traits::{ParseError, ParseResult};

/// Sequential reader over the children of one `FORM`
pub struct ChildCursor<'a> {
    children: Peekable<Iter<'a, ChunkNode>>,
    path: String,
    index: usize,
}

impl<'a> ChildCursor<'a> {
    /// Start reading the children of `form`; `path` names the form in errors
    pub fn new(form: &'a Form, path: impl Into<String>) -> Self {
        Self {
            children: form.children.iter().peekable(),
            path: path.into(),
            index: 0,
        }
    }

    /// Location string for the next child
    pub fn location(&self) -> String {
        format!("{} child {}", self.path, self.index)
    }

    /// Path of the form being read
    pub fn path(&self) -> &str {
        &self.path
    }

    fn advance(&mut self) -> Option<&'a ChunkNode> {
        let node = self.children.next();
        if node.is_some() {
            self.index += 1;
        }
        node
    }

    /// Next child without consuming it
    pub fn peek(&mut self) -> Option<&'a ChunkNode> {
        self.children.peek().copied()
    }

    /// Whether the next child is a leaf with this tag
    pub fn next_is_leaf(&mut self, tag: Tag) -> bool {
        matches!(self.peek(), Some(ChunkNode::Leaf(leaf)) if leaf.tag == tag)
    }

    /// Whether the next child is a container with this form tag
    pub fn next_is_form(&mut self, form_tag: Tag) -> bool {
        matches!(self.peek(), Some(ChunkNode::Form(form)) if form.form_tag == form_tag)
    }

    /// Consume the next child, which must be a leaf tagged `tag`
    pub fn expect_leaf(&mut self, tag: Tag) -> ParseResult<&'a Leaf> {
        let location = self.location();
        match self.advance() {
            Some(ChunkNode::Leaf(leaf)) if leaf.tag == tag => Ok(leaf),
            Some(other) => Err(ParseError::malformed(location, format!("chunk {tag}"), other.label())),
            None => Err(ParseError::malformed(location, format!("chunk {tag}"), "end of container")),
        }
    }

    /// Consume the next child, which must be a container with `form_tag`
    pub fn expect_form(&mut self, form_tag: Tag) -> ParseResult<&'a Form> {
        let location = self.location();
        match self.advance() {
            Some(ChunkNode::Form(form)) if form.form_tag == form_tag => Ok(form),
            Some(other) => Err(ParseError::malformed(location, format!("FORM {form_tag}"), other.label())),
            None => Err(ParseError::malformed(location, format!("FORM {form_tag}"), "end of container")),
        }
    }

    /// Consume the next child, which must be a container of any form tag
    pub fn expect_any_form(&mut self) -> ParseResult<&'a Form> {
        let location = self.location();
        match self.advance() {
            Some(ChunkNode::Form(form)) => Ok(form),
            Some(other) => Err(ParseError::malformed(location, "FORM", other.label())),
            None => Err(ParseError::malformed(location, "FORM", "end of container")),
        }
    }

    /// Require that every child has been consumed
    pub fn finish(mut self) -> ParseResult<()> {
        let location = self.location();
        match self.advance() {
            None => Ok(()),
            Some(extra) => Err(ParseError::malformed(location, "end of container", extra.label())),
        }
    }
}
