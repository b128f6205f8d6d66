//! The in-memory representation of a graph unit, as moved between the tools
//! of this project, and its `.unit` file format.
//!
//! A unit is one independently-legalizable piece of a model: an ordered list
//! of operation nodes over a shared set of unit arguments. Nodes reference
//! the values they consume positionally, either a unit argument or a result
//! of an earlier node, which is what lets a rewrite swap a node's identity
//! without disturbing the wiring around it.

use std::{
    fs::File,
    io::{Read, Write},
    str::FromStr,
};

use serde::{Deserialize, Serialize};

use crate::{
    attributes::AttributeMap,
    intern::{InternIdentifier, InternTable},
    types::{Location, TensorType},
};

/// A reference to an object of type [`Node`] in a unit's interning table.
pub type NodeId = InternIdentifier;

/// A reference to one value flowing through the unit.
#[derive(Clone, Copy, Serialize, Deserialize, Debug, PartialEq, Eq)]
pub enum ValueRef {
    /// The unit argument at the given position.
    Argument(usize),

    /// The result at position `index` of the node with the given ID.
    Result {
        /// The producing node.
        node: NodeId,

        /// The position of the result within the producing node's results.
        index: usize,
    },
}

/// What a node *is*: either an ordinary dialect-qualified operation, or the
/// opaque escape hatch the legalizer rewrites unsupported operations into.
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
pub enum OpKind {
    /// An operation defined by some dialect, carrying a typed attribute
    /// dictionary.
    Generic {
        /// The namespace of the dialect defining this operation's semantics.
        dialect: String,

        /// The operation name within its dialect.
        name: String,

        /// The attribute dictionary, in frontend insertion order.
        attributes: AttributeMap,
    },

    /// A generic operation carrying a custom-op name and an arbitrary binary
    /// payload, used for operations without first-class representation in
    /// the target dialect.
    Opaque {
        /// The custom-op name the runtime dispatches on.
        name: String,

        /// The serialized options blob. Owned by the node.
        payload: Vec<u8>,
    },
}

/// One operation in the graph IR.
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
pub struct Node {
    /// The operation-specific data.
    pub op: OpKind,

    /// The values consumed by this node, in positional order.
    pub operands: Vec<ValueRef>,

    /// The types of the values produced by this node, in positional order.
    pub result_types: Vec<TensorType>,

    /// The source location associated with this node, for diagnostics.
    pub location: Location,
}

impl Node {
    /// Creates an ordinary dialect operation node.
    #[must_use]
    pub fn generic(
        location: Location,
        result_types: Vec<TensorType>,
        operands: Vec<ValueRef>,
        dialect: &str,
        name: &str,
        attributes: AttributeMap,
    ) -> Self {
        Self {
            op: OpKind::Generic {
                dialect: dialect.to_owned(),
                name: name.to_owned(),
                attributes,
            },
            operands,
            result_types,
            location,
        }
    }

    /// Creates an opaque replacement node carrying a custom-op `name` and
    /// the serialized options `payload`.
    #[must_use]
    pub fn opaque(
        location: Location,
        result_types: Vec<TensorType>,
        operands: Vec<ValueRef>,
        name: &str,
        payload: Vec<u8>,
    ) -> Self {
        Self {
            op: OpKind::Opaque {
                name: name.to_owned(),
                payload,
            },
            operands,
            result_types,
            location,
        }
    }

    /// Returns the dialect namespace this node belongs to, or [`None`] for
    /// opaque nodes, which live outside any source dialect.
    #[must_use]
    pub fn dialect(&self) -> Option<&str> {
        match &self.op {
            OpKind::Generic { dialect, .. } => Some(dialect),
            OpKind::Opaque { .. } => None,
        }
    }

    /// Returns the dialect-qualified name of this node, e.g. `hlo.add`, or
    /// the custom-op name for opaque nodes.
    #[must_use]
    pub fn qualified_name(&self) -> String {
        match &self.op {
            OpKind::Generic { dialect, name, .. } => format!("{dialect}.{name}"),
            OpKind::Opaque { name, .. } => name.clone(),
        }
    }
}

/// The core, in-memory representation of one graph unit.
///
/// It is used for building, legalizing, and storing units.
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
pub struct GraphUnit {
    /// The name associated with this unit, if any.
    ///
    /// If there is no name it should be set to the empty string.
    pub name: String,

    /// The types of the unit's arguments, referenced positionally by
    /// [`ValueRef::Argument`].
    pub arguments: Vec<TensorType>,

    /// Contains every node referenced by the unit's execution order.
    nodes: InternTable<NodeId, Node>,

    /// The execution order of the unit's nodes.
    order: Vec<NodeId>,
}

impl GraphUnit {
    /// Creates a new, empty unit.
    #[must_use]
    pub fn new(name: &str) -> Self {
        Self {
            name:      name.to_owned(),
            arguments: Vec::new(),
            nodes:     InternTable::new(),
            order:     Vec::new(),
        }
    }

    /// Adds a unit argument of the provided type, returning the reference
    /// nodes should use to consume it.
    pub fn push_argument(&mut self, typ: TensorType) -> ValueRef {
        self.arguments.push(typ);
        ValueRef::Argument(self.arguments.len() - 1)
    }

    /// Appends a node to the end of the unit's execution order.
    pub fn push_node(&mut self, node: Node) -> NodeId {
        let id = self.nodes.insert(node);
        self.order.push(id);
        id
    }

    /// Retrieves a node by ID.
    ///
    /// # Panics
    ///
    /// Panics if the ID has been retired by a rewrite or never existed. This
    /// is a programmer error.
    #[must_use]
    pub fn node(&self, id: NodeId) -> &Node {
        self.nodes.get(id)
    }

    /// Retrieves a node by ID, mutably.
    ///
    /// # Panics
    ///
    /// Panics if the ID has been retired by a rewrite or never existed. This
    /// is a programmer error.
    pub fn node_mut(&mut self, id: NodeId) -> &mut Node {
        self.nodes.get_mut(id)
    }

    /// Returns a snapshot of the unit's execution order.
    ///
    /// Walks that rewrite the unit while traversing it must iterate this
    /// snapshot rather than the live order: nodes inserted during the walk
    /// are then never visited, and nodes removed during the walk can be
    /// detected with [`Self::contains_node`].
    #[must_use]
    pub fn node_ids(&self) -> Vec<NodeId> {
        self.order.clone()
    }

    /// Checks whether the provided ID names a live node in this unit.
    #[must_use]
    pub fn contains_node(&self, id: NodeId) -> bool {
        self.nodes.contains(id)
    }

    /// Returns the number of live nodes in the unit.
    #[must_use]
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// Returns true iff the unit contains no nodes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Replaces the node identified by `old` with `replacement`, in place.
    ///
    /// The replacement takes over the old node's position in the execution
    /// order, every use of the old node's results anywhere in the unit is
    /// rewired to the replacement's results at the same positional index,
    /// and the old node is then deleted. The old ID is retired.
    ///
    /// # Panics
    ///
    /// Panics if `old` does not name a live node. This is a programmer
    /// error.
    pub fn replace_node(&mut self, old: NodeId, replacement: Node) -> NodeId {
        let new_id = self.nodes.insert(replacement);

        let position = self
            .order
            .iter()
            .position(|id| *id == old)
            .expect("internal consistency error: replace_node with an unknown ID!");
        self.order[position] = new_id;

        for node in self.nodes.values_mut() {
            for operand in &mut node.operands {
                if let ValueRef::Result { node: producer, .. } = operand {
                    if *producer == old {
                        *producer = new_id;
                    }
                }
            }
        }

        self.nodes.remove(old);
        new_id
    }

    /// Reads a `.unit` file from the provided `reader`, and generates an
    /// in-memory representation.
    ///
    /// # Errors
    ///
    /// - [`serde_sexpr::Error`] if it is not possible to deserialize a
    ///   `GraphUnit` from the provided `reader`.
    pub fn read(reader: impl Read) -> serde_sexpr::Result<Self> {
        serde_sexpr::from_reader(reader)
    }

    /// Reads a `.unit` file from the filesystem, and generates our in-memory
    /// representation.
    ///
    /// # Errors
    ///
    /// - [`serde_sexpr::Error`] if it is not possible to deserialize a
    ///   `GraphUnit` from the file at the provided `filename`.
    pub fn read_from_file(filename: &str) -> serde_sexpr::Result<Self> {
        let reader = File::open(filename)?;
        serde_sexpr::from_reader(reader)
    }

    /// Produces a string that contains the serialized form of the
    /// `GraphUnit`, ready to be e.g. written to a file.
    ///
    /// # Errors
    ///
    /// - [`serde_sexpr::Error`] if it is not possible to serialize `self` to
    ///   a string.
    pub fn to_str(&self) -> serde_sexpr::Result<String> {
        serde_sexpr::to_string(&self)
    }

    /// Writes the `GraphUnit` to the provided `writer`.
    ///
    /// # Errors
    ///
    /// - [`serde_sexpr::Error`] if it is not possible to write `self` to the
    ///   provided `writer`.
    pub fn write(&self, writer: impl Write) -> serde_sexpr::Result<()> {
        serde_sexpr::to_writer(writer, &self)
    }

    /// Writes the `GraphUnit` to the file at the provided `filename`.
    ///
    /// # Errors
    ///
    /// - [`serde_sexpr::Error`] if it is not possible to write `self` to a
    ///   file.
    pub fn write_to_file(&self, filename: &str) -> serde_sexpr::Result<()> {
        let writer = File::create(filename)?;
        serde_sexpr::to_writer(writer, &self)
    }
}

impl FromStr for GraphUnit {
    type Err = serde_sexpr::Error;

    /// Creates a new `GraphUnit` representation from a string
    /// representation; for example, from a string read from a `.unit` file.
    fn from_str(encoded: &str) -> serde_sexpr::Result<Self> {
        serde_sexpr::from_str(encoded)
    }
}

#[cfg(test)]
mod test {
    use crate::{
        attributes::{AttributeMap, AttributeValue},
        types::{ElementType, Location, TensorType},
        unit::{GraphUnit, Node, OpKind, ValueRef},
    };

    fn f32_scalar() -> TensorType {
        TensorType::new(ElementType::F32, vec![])
    }

    #[test]
    fn replace_node_rewires_positional_uses() {
        let mut unit = GraphUnit::new("main");
        let arg = unit.push_argument(f32_scalar());

        let mut attributes = AttributeMap::new();
        attributes.insert("axis", AttributeValue::Int(0));
        let producer = unit.push_node(Node::generic(
            Location::new("test.mlir"),
            vec![f32_scalar(), f32_scalar()],
            vec![arg],
            "hlo",
            "split",
            attributes,
        ));
        let consumer = unit.push_node(Node::generic(
            Location::new("test.mlir"),
            vec![f32_scalar()],
            vec![
                ValueRef::Result {
                    node:  producer,
                    index: 1,
                },
                arg,
            ],
            "hlo",
            "add",
            AttributeMap::new(),
        ));

        let replacement = Node::opaque(
            Location::new("test.mlir"),
            vec![f32_scalar(), f32_scalar()],
            vec![arg],
            "hlo.split",
            vec![],
        );
        let new_id = unit.replace_node(producer, replacement);

        assert!(!unit.contains_node(producer));
        assert!(unit.contains_node(new_id));
        assert_eq!(unit.node_ids()[0], new_id);

        // The consumer still reads result 1, now from the replacement.
        assert_eq!(
            unit.node(consumer).operands[0],
            ValueRef::Result {
                node:  new_id,
                index: 1,
            }
        );
        // Unrelated operands are untouched.
        assert_eq!(unit.node(consumer).operands[1], arg);
    }

    #[test]
    fn units_round_trip_through_the_file_format() -> anyhow::Result<()> {
        let mut unit = GraphUnit::new("roundtrip");
        let arg = unit.push_argument(f32_scalar());
        let mut attributes = AttributeMap::new();
        attributes.insert("scale", AttributeValue::Float(2.5));
        unit.push_node(Node::generic(
            Location::new_with_position("model.mlir", 3, 7),
            vec![f32_scalar()],
            vec![arg],
            "hlo",
            "mul",
            attributes,
        ));

        let encoded = unit.to_str()?;
        let decoded: GraphUnit = encoded.parse()?;
        assert_eq!(decoded, unit);

        Ok(())
    }

    #[test]
    fn qualified_names_include_the_dialect() {
        let node = Node::generic(
            Location::default(),
            vec![],
            vec![],
            "hlo",
            "add",
            AttributeMap::new(),
        );
        assert_eq!(node.qualified_name(), "hlo.add");
        assert_eq!(node.dialect(), Some("hlo"));

        let opaque = Node::opaque(Location::default(), vec![], vec![], "hlo.add", vec![1, 2]);
        assert_eq!(opaque.qualified_name(), "hlo.add");
        assert_eq!(opaque.dialect(), None);
        assert!(matches!(opaque.op, OpKind::Opaque { .. }));
    }
}
