//! Materialization of identity-preserving JSON.
//!
//! Some endpoints serialize object graphs with `$id`/`$ref` markers (and wrap
//! collections in a `$values` envelope) so that a shared sub-object, such as
//! the customer referenced by several quotation versions, is written once.
//! [`resolve`] turns such a payload into a [`ResolvedGraph`]: an arena of
//! plain nodes addressed by [`NodeId`], where every reference has been
//! replaced by the id of the node it points to.
//!
//! Two positions that reference the same `$id` hold the same `NodeId`. A
//! cyclic payload simply yields a back-edge to an earlier node, so neither
//! resolution nor traversal through [`NodeView`] can recurse forever.

use std::collections::{BTreeMap, HashMap};

use serde_json::{Map, Number, Value};
use tracing::debug;

const REF_KEY: &str = "$ref";
const ID_KEY: &str = "$id";
const VALUES_KEY: &str = "$values";

/// Index of a node inside a [`ResolvedGraph`].
pub type NodeId = usize;

/// A materialized value. Containers hold ids of their children.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Null,
    Bool(bool),
    Number(Number),
    String(String),
    List(Vec<NodeId>),
    Map(BTreeMap<String, NodeId>),
}

impl Node {
    fn empty_map() -> Self {
        Node::Map(BTreeMap::new())
    }
}

/// Fully dereferenced payload. Contains no `$ref`, `$id` or `$values` keys.
#[derive(Debug, Clone)]
pub struct ResolvedGraph {
    nodes: Vec<Node>,
    root: NodeId,
    dangling: Vec<String>,
}

/// Resolve a raw payload into a [`ResolvedGraph`].
///
/// Never fails. A `$ref` whose target is not defined anywhere in the payload
/// resolves to an empty mapping and is reported by [`ResolvedGraph::dangling`].
pub fn resolve(raw: &Value) -> ResolvedGraph {
    let mut resolver = Resolver::default();
    let root = resolver.resolve(raw);
    resolver.finish(root)
}

#[derive(Debug, Clone, Copy)]
enum Slot {
    /// A `$id` has been seen; the node may still be in progress.
    Defined(NodeId),
    /// Only `$ref`s have been seen so far; the node is an empty placeholder.
    Pending(NodeId),
}

#[derive(Default)]
struct Resolver {
    nodes: Vec<Node>,
    ids: HashMap<String, Slot>,
}

impl Resolver {
    fn alloc(&mut self, node: Node) -> NodeId {
        self.nodes.push(node);
        self.nodes.len() - 1
    }

    fn resolve(&mut self, value: &Value) -> NodeId {
        match value {
            Value::Object(map) => self.resolve_map(map),
            Value::Array(items) => {
                let children = items.iter().map(|item| self.resolve(item)).collect();
                self.alloc(Node::List(children))
            }
            Value::Null => self.alloc(Node::Null),
            Value::Bool(b) => self.alloc(Node::Bool(*b)),
            Value::Number(n) => self.alloc(Node::Number(n.clone())),
            Value::String(s) => self.alloc(Node::String(s.clone())),
        }
    }

    fn resolve_map(&mut self, map: &Map<String, Value>) -> NodeId {
        if let Some(target) = map.get(REF_KEY) {
            return self.lookup(marker_id(target));
        }

        let own_id = map.get(ID_KEY).and_then(marker_id);

        if let Some(values) = map.get(VALUES_KEY) {
            // Registered before the elements so they can refer back to the list.
            let node = self.define(own_id, Node::List(Vec::new()));
            let children = match values {
                Value::Array(items) => items.iter().map(|item| self.resolve(item)).collect(),
                _ => Vec::new(),
            };
            self.nodes[node] = Node::List(children);
            return node;
        }

        // Registered before the fields, which is what lets a cycle terminate.
        let node = self.define(own_id, Node::empty_map());
        let mut fields = BTreeMap::new();
        for (key, value) in map {
            if key == ID_KEY {
                continue;
            }
            let child = self.resolve(value);
            fields.insert(key.clone(), child);
        }
        self.nodes[node] = Node::Map(fields);
        node
    }

    fn define(&mut self, own_id: Option<String>, initial: Node) -> NodeId {
        let Some(id) = own_id else {
            return self.alloc(initial);
        };

        match self.ids.get(&id).copied() {
            None => {
                let node = self.alloc(initial);
                self.ids.insert(id, Slot::Defined(node));
                node
            }
            Some(Slot::Pending(node)) => {
                self.nodes[node] = initial;
                self.ids.insert(id, Slot::Defined(node));
                node
            }
            Some(Slot::Defined(_)) => {
                debug!(id = %id, "duplicate $id, keeping the first definition");
                self.alloc(initial)
            }
        }
    }

    fn lookup(&mut self, id: Option<String>) -> NodeId {
        let Some(id) = id else {
            debug!("$ref without a usable id, substituting an empty object");
            return self.alloc(Node::empty_map());
        };

        match self.ids.get(&id).copied() {
            Some(Slot::Defined(node)) | Some(Slot::Pending(node)) => node,
            None => {
                let node = self.alloc(Node::empty_map());
                self.ids.insert(id, Slot::Pending(node));
                node
            }
        }
    }

    fn finish(self, root: NodeId) -> ResolvedGraph {
        let mut dangling: Vec<String> = self
            .ids
            .into_iter()
            .filter_map(|(id, slot)| match slot {
                Slot::Pending(_) => Some(id),
                Slot::Defined(_) => None,
            })
            .collect();
        dangling.sort();

        for id in &dangling {
            debug!(id = %id, "dangling $ref resolved to an empty object");
        }

        ResolvedGraph {
            nodes: self.nodes,
            root,
            dangling,
        }
    }
}

fn marker_id(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

impl ResolvedGraph {
    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn root_view(&self) -> NodeView<'_> {
        NodeView {
            graph: self,
            id: self.root,
        }
    }

    pub fn view(&self, id: NodeId) -> Option<NodeView<'_>> {
        (id < self.nodes.len()).then_some(NodeView { graph: self, id })
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id)
    }

    /// Number of materialized nodes.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Ids that were referenced but never defined, sorted.
    pub fn dangling(&self) -> &[String] {
        &self.dangling
    }

    /// The records of a report payload: the elements of the root list, or the
    /// root itself when it is a single object.
    pub fn records(&self) -> Vec<NodeView<'_>> {
        self.root_view().records()
    }

    /// Records found at a dotted path below the root, for payloads that wrap
    /// the list (e.g. `{"items": {"$values": [...]}}`). A missing path has no
    /// records.
    pub fn records_at(&self, path: &str) -> Vec<NodeView<'_>> {
        self.root_view()
            .path(path)
            .map(|view| view.records())
            .unwrap_or_default()
    }

    /// Convert the subtree at `id` to a plain JSON value.
    ///
    /// Shared nodes are copied at every position. A back-edge to a node that is
    /// already being converted (a cycle) becomes `null`.
    pub fn to_value(&self, id: NodeId) -> Value {
        let mut on_path = vec![false; self.nodes.len()];
        self.value_of(id, &mut on_path)
    }

    fn value_of(&self, id: NodeId, on_path: &mut [bool]) -> Value {
        let Some(node) = self.nodes.get(id) else {
            return Value::Null;
        };
        if on_path[id] {
            return Value::Null;
        }

        match node {
            Node::Null => Value::Null,
            Node::Bool(b) => Value::Bool(*b),
            Node::Number(n) => Value::Number(n.clone()),
            Node::String(s) => Value::String(s.clone()),
            Node::List(items) => {
                on_path[id] = true;
                let values = items
                    .iter()
                    .map(|&child| self.value_of(child, on_path))
                    .collect();
                on_path[id] = false;
                Value::Array(values)
            }
            Node::Map(fields) => {
                on_path[id] = true;
                let object = fields
                    .iter()
                    .map(|(key, &child)| (key.clone(), self.value_of(child, on_path)))
                    .collect::<Map<String, Value>>();
                on_path[id] = false;
                Value::Object(object)
            }
        }
    }
}

/// Borrowed cursor over one node of a [`ResolvedGraph`].
#[derive(Debug, Clone, Copy)]
pub struct NodeView<'g> {
    graph: &'g ResolvedGraph,
    id: NodeId,
}

impl<'g> NodeView<'g> {
    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn node(&self) -> &'g Node {
        &self.graph.nodes[self.id]
    }

    fn at(&self, id: NodeId) -> NodeView<'g> {
        NodeView {
            graph: self.graph,
            id,
        }
    }

    /// Field of a mapping node.
    pub fn get(&self, key: &str) -> Option<NodeView<'g>> {
        match self.node() {
            Node::Map(fields) => fields.get(key).map(|&id| self.at(id)),
            _ => None,
        }
    }

    /// Element of a list node.
    pub fn index(&self, index: usize) -> Option<NodeView<'g>> {
        match self.node() {
            Node::List(items) => items.get(index).map(|&id| self.at(id)),
            _ => None,
        }
    }

    /// Follow a dotted path such as `"version.customer.name"`. Numeric
    /// segments index into lists.
    pub fn path(&self, path: &str) -> Option<NodeView<'g>> {
        path.split('.')
            .filter(|segment| !segment.is_empty())
            .try_fold(*self, |view, segment| match view.node() {
                Node::List(_) => segment.parse().ok().and_then(|i| view.index(i)),
                _ => view.get(segment),
            })
    }

    /// Elements of a list node; empty for anything else.
    pub fn iter(self) -> impl Iterator<Item = NodeView<'g>> + 'g {
        let graph = self.graph;
        let items: &'g [NodeId] = match self.node() {
            Node::List(items) => items,
            _ => &[],
        };
        items.iter().map(move |&id| NodeView { graph, id })
    }

    /// Fields of a mapping node in key order; empty for anything else.
    pub fn entries(self) -> impl Iterator<Item = (&'g str, NodeView<'g>)> + 'g {
        let graph = self.graph;
        let fields = match self.node() {
            Node::Map(fields) => Some(fields),
            _ => None,
        };
        fields
            .into_iter()
            .flatten()
            .map(move |(key, &id)| (key.as_str(), NodeView { graph, id }))
    }

    pub fn as_str(&self) -> Option<&'g str> {
        match self.node() {
            Node::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self.node() {
            Node::Number(n) => n.as_f64(),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self.node() {
            Node::Number(n) => n.as_i64(),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self.node() {
            Node::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self.node(), Node::Null)
    }

    pub fn is_map(&self) -> bool {
        matches!(self.node(), Node::Map(_))
    }

    pub fn is_list(&self) -> bool {
        matches!(self.node(), Node::List(_))
    }

    pub fn to_value(&self) -> Value {
        self.graph.to_value(self.id)
    }

    fn records(self) -> Vec<NodeView<'g>> {
        match self.node() {
            Node::List(_) => self.iter().collect(),
            Node::Null => Vec::new(),
            _ => vec![self],
        }
    }
}
