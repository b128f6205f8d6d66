//! This pass legalizes every node of the source dialect into an opaque
//! operation whose payload is the node's attribute dictionary flattened into
//! an options blob.
//!
//! The pass is deliberately best-effort: attributes the options format
//! cannot represent are dropped with a warning rather than failing the
//! unit, because units routinely carry optional or informational attributes
//! that do not need to round-trip. The collected warnings are returned as
//! the pass data, so callers (and tests) can inspect them as a list.

use itertools::Itertools;
use opaline_errors::legalize::Result;
use opaline_ir::{
    attributes::{AttributeMap, AttributeValue},
    diagnostics::{DiagnosticSink, WarningKind},
    types::Location,
    unit::{GraphUnit, Node, NodeId, OpKind},
};
use tracing::debug;

use crate::{
    options::encode_attribute,
    pass::{
        data::{ConcretePassData, DynPassDataMap, PassDataOps},
        ConcretePass,
        DynamicPassReturnData,
        Pass,
        PassKey,
        PassOps,
    },
};

/// The dialect this pass legalizes away when constructed via
/// [`LegalizeToOpaque::default_dialect`].
pub const DEFAULT_SOURCE_DIALECT: &str = "hlo";

/// The operation name of the composite macro node within the source dialect.
const COMPOSITE_OP: &str = "composite";

/// The closed set of composite specializations that flatten to an opaque
/// operation under their own name.
///
/// Composite macros are opaque named sub-graphs; only macros with a known,
/// fixed-shape attribute contract can be safely flattened, so this is an
/// allow-list rather than a heuristic. Unknown composite names degrade
/// gracefully to generic per-node attribute dumping.
pub const SUPPORTED_COMPOSITES: [&str; 2] = [
    "fused.update_kv_cache",
    "fused.scaled_dot_product_attention",
];

/// Legalizes every node of the configured source dialect into an opaque
/// operation.
///
/// The source dialect tag is fixed at construction time and is not a
/// runtime input.
#[derive(Clone, Debug, PartialEq)]
pub struct LegalizeToOpaque {
    source_dialect: String,
    depends:        Vec<PassKey>,
    invalidates:    Vec<PassKey>,
}

impl LegalizeToOpaque {
    /// Creates a new instance of the legalization pass for the provided
    /// source dialect.
    #[must_use]
    pub fn new(source_dialect: &str) -> Box<Self> {
        let depends = vec![];
        let invalidates = vec![];
        Box::new(Self {
            source_dialect: source_dialect.to_owned(),
            depends,
            invalidates,
        })
    }

    /// Creates a new instance of the legalization pass for the default
    /// source dialect.
    #[must_use]
    pub fn default_dialect() -> Box<Self> {
        Self::new(DEFAULT_SOURCE_DIALECT)
    }

    /// The source dialect this pass legalizes away.
    #[must_use]
    pub fn source_dialect(&self) -> &str {
        &self.source_dialect
    }

    /// Rewrites the node identified by `id` into an opaque operation,
    /// reporting any attributes that could not be encoded.
    fn legalize_node(&self, unit: &mut GraphUnit, id: NodeId, diagnostics: &mut DiagnosticSink) {
        let node = unit.node(id);
        let location = node.location.clone();
        let operands = node.operands.clone();
        let result_types = node.result_types.clone();

        // Composite macros carry their payload in a nested dictionary;
        // everything else dumps its own attribute dictionary.
        let mut custom_name = node.qualified_name();
        let mut options = match &node.op {
            OpKind::Generic { attributes, .. } => attributes.clone(),
            // The caller only hands us source-dialect nodes.
            OpKind::Opaque { .. } => return,
        };
        if let Some((inner_name, params)) = composite_parts(node, &self.source_dialect) {
            if is_supported_composite(&inner_name, &location, diagnostics) {
                custom_name = inner_name;
                options = params;
            }
        }

        // Build the options blob, swallowing per-attribute failures so that
        // the remaining attributes still encode.
        let mut builder = flexbuffers::Builder::default();
        let mut map = builder.start_map();
        for (key, value) in options.iter() {
            encode_attribute(&mut map, key, value, &location, diagnostics);
        }
        map.end_map();
        let payload = builder.view().to_vec();

        let replacement = Node::opaque(location, result_types, operands, &custom_name, payload);
        let new_id = unit.replace_node(id, replacement);
        debug!(node = %custom_name, old_id = id, new_id, "Legalized node into an opaque operation");
    }
}

impl PassOps for LegalizeToOpaque {
    fn run(
        &mut self,
        mut unit: GraphUnit,
        _pass_data: &DynPassDataMap,
    ) -> Result<DynamicPassReturnData> {
        let mut diagnostics = DiagnosticSink::new();

        // Snapshot the order up front: replacements inserted during the walk
        // must never be revisited as if they were original nodes.
        for id in unit.node_ids() {
            let is_source = unit.node(id).dialect() == Some(self.source_dialect.as_str());
            if !is_source {
                continue;
            }
            self.legalize_node(&mut unit, id, &mut diagnostics);
        }

        Ok(DynamicPassReturnData::new(
            unit,
            LegalizeToOpaqueData::new(diagnostics),
        ))
    }

    fn depends(&self) -> &[PassKey] {
        self.depends.as_slice()
    }

    fn invalidates(&self) -> &[PassKey] {
        self.invalidates.as_slice()
    }

    fn dupe(&self) -> Pass {
        Box::new(self.clone())
    }
}

impl ConcretePass for LegalizeToOpaque {
    type Data = LegalizeToOpaqueData;
}

/// The warnings collected while legalizing one unit, returned as the data of
/// the [`LegalizeToOpaque`] pass.
#[derive(Clone, Debug, PartialEq)]
pub struct LegalizeToOpaqueData {
    /// The per-unit diagnostic sink, in reporting order.
    pub diagnostics: DiagnosticSink,
}

impl LegalizeToOpaqueData {
    /// Creates a new instance of the output data for the legalization pass.
    #[must_use]
    pub fn new(diagnostics: DiagnosticSink) -> Box<Self> {
        Box::new(Self { diagnostics })
    }
}

impl PassDataOps for LegalizeToOpaqueData {}
impl ConcretePassData for LegalizeToOpaqueData {
    type Pass = LegalizeToOpaque;
}

/// Extracts the inner name and parameter dictionary of a composite macro
/// node, or returns [`None`] if `node` is not a composite of the provided
/// source dialect.
fn composite_parts(node: &Node, source_dialect: &str) -> Option<(String, AttributeMap)> {
    let OpKind::Generic {
        dialect,
        name,
        attributes,
    } = &node.op
    else {
        return None;
    };
    if dialect != source_dialect || name != COMPOSITE_OP {
        return None;
    }

    let AttributeValue::Str(inner_name) = attributes.get("name")? else {
        return None;
    };
    let AttributeValue::Dict(params) = attributes.get("composite_attributes")? else {
        return None;
    };
    Some((inner_name.clone(), params.clone()))
}

/// Checks whether the provided composite name is in the specialization
/// allow-list, warning if it is not.
fn is_supported_composite(
    name: &str,
    location: &Location,
    diagnostics: &mut DiagnosticSink,
) -> bool {
    if SUPPORTED_COMPOSITES.contains(&name) {
        return true;
    }
    diagnostics.warn(
        WarningKind::UnknownComposite,
        location,
        format!(
            "composite has no specialization: `{name}`; known specializations are {}",
            SUPPORTED_COMPOSITES.iter().map(|n| format!("`{n}`")).join(", ")
        ),
    );
    false
}

#[cfg(test)]
mod test {
    use opaline_ir::{
        attributes::{AttributeMap, AttributeValue},
        diagnostics::WarningKind,
        types::{ElementType, Location, TensorType},
        unit::{GraphUnit, Node, OpKind, ValueRef},
    };

    use crate::pass::{
        data::DynPassDataMap,
        transform::opaque::{LegalizeToOpaque, LegalizeToOpaqueData},
        PassOps,
    };

    fn f32_tensor(shape: Vec<i64>) -> TensorType {
        TensorType::new(ElementType::F32, shape)
    }

    /// Runs the pass over `unit` with the default source dialect, returning
    /// the transformed unit and the collected pass data.
    fn legalize(unit: GraphUnit) -> anyhow::Result<(GraphUnit, LegalizeToOpaqueData)> {
        let mut pass = LegalizeToOpaque::default_dialect();
        let result = pass.run(unit, &DynPassDataMap::new())?;
        let data = result
            .data_as::<LegalizeToOpaqueData>()
            .expect("Legalization pass returned data of the wrong type")
            .clone();
        Ok((result.unit, data))
    }

    fn payload_of(node: &Node) -> &[u8] {
        match &node.op {
            OpKind::Opaque { payload, .. } => payload,
            OpKind::Generic { .. } => panic!("expected an opaque node"),
        }
    }

    #[test]
    fn source_nodes_become_opaque_nodes() -> anyhow::Result<()> {
        let mut unit = GraphUnit::new("main");
        let lhs = unit.push_argument(f32_tensor(vec![4]));
        let rhs = unit.push_argument(f32_tensor(vec![4]));

        let mut attributes = AttributeMap::new();
        attributes.insert("axis", AttributeValue::Int(1));
        attributes.insert("scale", AttributeValue::Float(2.5));
        unit.push_node(Node::generic(
            Location::new("model.unit"),
            vec![f32_tensor(vec![4])],
            vec![lhs, rhs],
            "hlo",
            "add",
            attributes,
        ));

        let (unit, data) = legalize(unit)?;
        assert!(data.diagnostics.is_empty());
        assert_eq!(unit.len(), 1);

        let node = unit.node(unit.node_ids()[0]);
        assert_eq!(node.qualified_name(), "hlo.add");
        assert_eq!(node.operands, vec![lhs, rhs]);
        assert_eq!(node.result_types, vec![f32_tensor(vec![4])]);

        let root = flexbuffers::Reader::get_root(payload_of(node))?;
        let options = root.as_map();
        assert_eq!(options.len(), 2);
        assert_eq!(options.idx("axis").as_i64(), 1);
        assert!((options.idx("scale").as_f64() - 2.5).abs() < f64::EPSILON);
        Ok(())
    }

    #[test]
    fn foreign_dialects_are_left_untouched() -> anyhow::Result<()> {
        let mut unit = GraphUnit::new("main");
        let arg = unit.push_argument(f32_tensor(vec![2]));
        unit.push_node(Node::generic(
            Location::new("model.unit"),
            vec![f32_tensor(vec![2])],
            vec![arg],
            "lite",
            "relu",
            AttributeMap::new(),
        ));

        let before = unit.clone();
        let (after, data) = legalize(unit)?;

        // A unit with no source-dialect nodes is a strict no-op.
        assert_eq!(after, before);
        assert!(data.diagnostics.is_empty());
        Ok(())
    }

    #[test]
    fn unsupported_attributes_are_skipped_with_one_warning_each() -> anyhow::Result<()> {
        let mut unit = GraphUnit::new("main");
        let arg = unit.push_argument(f32_tensor(vec![2]));

        let mut attributes = AttributeMap::new();
        attributes.insert("axis", AttributeValue::Int(0));
        attributes.insert("marker", AttributeValue::Unit);
        attributes.insert("target", AttributeValue::SymbolRef("helper".to_owned()));
        attributes.insert("label", AttributeValue::Str("top".to_owned()));
        unit.push_node(Node::generic(
            Location::new("model.unit"),
            vec![f32_tensor(vec![2])],
            vec![arg],
            "hlo",
            "reduce",
            attributes,
        ));

        let (unit, data) = legalize(unit)?;
        assert_eq!(
            data.diagnostics.count_of(WarningKind::UnsupportedAttribute),
            2
        );

        let node = unit.node(unit.node_ids()[0]);
        let root = flexbuffers::Reader::get_root(payload_of(node))?;
        let options = root.as_map();
        assert_eq!(options.len(), 2);
        assert_eq!(options.idx("axis").as_i64(), 0);
        assert_eq!(options.idx("label").as_str(), "top");
        assert!(options.index("marker").is_err());
        assert!(options.index("target").is_err());
        Ok(())
    }

    #[test]
    fn supported_composites_flatten_to_their_inner_name() -> anyhow::Result<()> {
        let mut unit = GraphUnit::new("main");
        let cache = unit.push_argument(f32_tensor(vec![16, 64]));
        let update = unit.push_argument(f32_tensor(vec![1, 64]));

        let mut params = AttributeMap::new();
        params.insert("cache_size", AttributeValue::Int(16));
        params.insert("layer", AttributeValue::Int(3));

        let mut attributes = AttributeMap::new();
        attributes.insert(
            "name",
            AttributeValue::Str("fused.update_kv_cache".to_owned()),
        );
        attributes.insert("composite_attributes", AttributeValue::Dict(params));
        attributes.insert(
            "decomposition",
            AttributeValue::SymbolRef("update_kv_cache_impl".to_owned()),
        );
        unit.push_node(Node::generic(
            Location::new("model.unit"),
            vec![f32_tensor(vec![16, 64])],
            vec![cache, update],
            "hlo",
            "composite",
            attributes,
        ));

        let (unit, data) = legalize(unit)?;
        assert!(data.diagnostics.is_empty());

        // The opaque node takes the composite's inner name, and its payload
        // holds the nested parameter dictionary, not the macro's own
        // attributes.
        let node = unit.node(unit.node_ids()[0]);
        assert_eq!(node.qualified_name(), "fused.update_kv_cache");

        let root = flexbuffers::Reader::get_root(payload_of(node))?;
        let options = root.as_map();
        assert_eq!(options.len(), 2);
        assert_eq!(options.idx("cache_size").as_i64(), 16);
        assert_eq!(options.idx("layer").as_i64(), 3);
        assert!(options.index("name").is_err());
        assert!(options.index("decomposition").is_err());
        Ok(())
    }

    #[test]
    fn unknown_composites_fall_back_to_generic_dumping() -> anyhow::Result<()> {
        let mut unit = GraphUnit::new("main");
        let arg = unit.push_argument(f32_tensor(vec![8]));

        let mut params = AttributeMap::new();
        params.insert("epsilon", AttributeValue::Float(1e-5));

        let mut attributes = AttributeMap::new();
        attributes.insert("name", AttributeValue::Str("fused.layer_norm".to_owned()));
        attributes.insert("composite_attributes", AttributeValue::Dict(params));
        unit.push_node(Node::generic(
            Location::new("model.unit"),
            vec![f32_tensor(vec![8])],
            vec![arg],
            "hlo",
            "composite",
            attributes,
        ));

        let (unit, data) = legalize(unit)?;
        assert_eq!(data.diagnostics.count_of(WarningKind::UnknownComposite), 1);
        // The macro's own dictionary member is then reported as unsupported.
        assert_eq!(
            data.diagnostics.count_of(WarningKind::UnsupportedAttribute),
            1
        );

        let node = unit.node(unit.node_ids()[0]);
        assert_eq!(node.qualified_name(), "hlo.composite");

        let root = flexbuffers::Reader::get_root(payload_of(node))?;
        let options = root.as_map();
        assert_eq!(options.len(), 1);
        assert_eq!(options.idx("name").as_str(), "fused.layer_norm");
        Ok(())
    }

    #[test]
    fn uses_of_replaced_results_are_rewired() -> anyhow::Result<()> {
        let mut unit = GraphUnit::new("main");
        let arg = unit.push_argument(f32_tensor(vec![4]));

        let producer = unit.push_node(Node::generic(
            Location::new("model.unit"),
            vec![f32_tensor(vec![4])],
            vec![arg],
            "hlo",
            "exp",
            AttributeMap::new(),
        ));
        unit.push_node(Node::generic(
            Location::new("model.unit"),
            vec![f32_tensor(vec![4])],
            vec![ValueRef::Result {
                node:  producer,
                index: 0,
            }],
            "lite",
            "relu",
            AttributeMap::new(),
        ));

        let (unit, _) = legalize(unit)?;
        assert_eq!(unit.len(), 2);

        let ids = unit.node_ids();
        let replacement = unit.node(ids[0]);
        assert_eq!(replacement.qualified_name(), "hlo.exp");
        assert!(matches!(replacement.op, OpKind::Opaque { .. }));

        // The foreign consumer now reads from the replacement node.
        let consumer = unit.node(ids[1]);
        assert_eq!(
            consumer.operands,
            vec![ValueRef::Result {
                node:  ids[0],
                index: 0,
            }]
        );
        Ok(())
    }
}
