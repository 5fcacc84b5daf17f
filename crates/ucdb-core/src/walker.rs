//! Circular list traversal.
//!
//! Every scheduler list in the runtime is an intrusive, circular, doubly
//! linked sequence: a `root` pointer to one node, each node holding `next`
//! and a reference to its payload (cluster, processor or task). There is no
//! null terminator; a walk ends when `next` leads back to the root.
//!
//! [`Ring`] is the single cursor used for all three list kinds. It refuses
//! to loop forever: a null `next`, or reaching a node twice without passing
//! the root, is reported as [`Error::CorruptList`].

use std::collections::HashSet;

use tracing::trace;

use crate::error::{Error, ListKind, Result};
use crate::host::{DebuggerHost, Location, TypeHandle};
use crate::types::Address;

/// Shape of one kind of list node
#[derive(Debug, Clone)]
pub struct NodeKind<'a> {
    pub list: ListKind,
    /// Type of the intrusive link node
    pub node_ty: &'a TypeHandle,
    /// Type of the object the node refers to
    pub payload_ty: &'a TypeHandle,
    /// Member of the node referring to the payload
    pub payload_field: &'a str,
    /// Member of the node pointing at the next node
    pub next_field: &'a str,
}

/// A visited list node
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    pub node: Location,
    pub payload: Location,
}

/// Cursor over one circular list.
///
/// The cursor does not borrow the host, so the caller can read each node's
/// payload between steps.
#[derive(Debug)]
pub struct Ring<'a> {
    kind: NodeKind<'a>,
    root: Location,
    cursor: Option<Location>,
    visited: HashSet<Address>,
}

impl<'a> Ring<'a> {
    /// Start a walk at `root`. A null root walks an empty list.
    pub fn new(kind: NodeKind<'a>, root: Address) -> Self {
        let root = Location::new(root, kind.node_ty.clone());
        let cursor = (!root.address.is_null()).then(|| root.clone());
        Self {
            kind,
            root,
            cursor,
            visited: HashSet::new(),
        }
    }

    /// Visit the next node, or `None` once the list has wrapped around.
    pub fn advance<H: DebuggerHost>(&mut self, host: &mut H) -> Result<Option<Node>> {
        let Some(current) = self.cursor.take() else {
            return Ok(None);
        };

        if !self.visited.insert(current.address) {
            return Err(self.corrupt(&current, "node reached twice without returning to the root"));
        }

        let payload_ref = host.member(&current, self.kind.payload_field)?;
        let payload = Location::new(host.read_address(&payload_ref)?, self.kind.payload_ty.clone());

        let next_ref = host.member(&current, self.kind.next_field)?;
        let next = host.read_address(&next_ref)?;
        trace!(list = %self.kind.list, node = %current.address, next = %next, "visit");

        if next.is_null() {
            return Err(self.corrupt(&current, "null next link in a circular list"));
        }
        if next != self.root.address {
            self.cursor = Some(Location::new(next, self.kind.node_ty.clone()));
        }

        Ok(Some(Node {
            node: current,
            payload,
        }))
    }

    /// Number of nodes visited so far
    pub fn visited(&self) -> usize {
        self.visited.len()
    }

    fn corrupt(&self, node: &Location, reason: &str) -> Error {
        Error::CorruptList {
            list: self.kind.list,
            node: node.address,
            reason: reason.to_string(),
        }
    }
}

/// Enumerate the whole list, root first.
pub fn walk<H: DebuggerHost>(
    host: &mut H,
    kind: NodeKind<'_>,
    root: Address,
) -> Result<Vec<Node>> {
    let mut ring = Ring::new(kind, root);
    let mut nodes = Vec::new();
    while let Some(node) = ring.advance(host)? {
        nodes.push(node);
    }
    Ok(nodes)
}

/// First node whose payload satisfies `pred`, stopping at the wrap-around.
pub fn find<H, F>(
    host: &mut H,
    kind: NodeKind<'_>,
    root: Address,
    mut pred: F,
) -> Result<Option<Node>>
where
    H: DebuggerHost,
    F: FnMut(&mut H, &Node) -> Result<bool>,
{
    let mut ring = Ring::new(kind, root);
    while let Some(node) = ring.advance(host)? {
        if pred(host, &node)? {
            return Ok(Some(node));
        }
    }
    Ok(None)
}
