//! The attribute values that can be attached to a graph node.
//!
//! Attributes are compile-time-constant values, not runtime operands. The
//! [`AttributeValue`] sum type is deliberately closed: the options encoder
//! matches on it exhaustively, so "unsupported attribute kind" is a
//! compile-time-checked arm rather than a runtime fallthrough.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::types::ElementType;

/// An ordered map from attribute name to attribute value.
///
/// Insertion order is preserved and is the order in which the options
/// encoder walks the map, which keeps the encoded payload deterministic for
/// a given unit. Keys are not required to be sorted or unique beyond what
/// the producing frontend guarantees.
#[derive(Clone, Serialize, Deserialize, Debug, Default, PartialEq)]
pub struct AttributeMap(Vec<(String, AttributeValue)>);

impl AttributeMap {
    /// Creates a new, empty attribute map.
    #[must_use]
    pub fn new() -> Self {
        Self(Vec::new())
    }

    /// Appends an attribute to the end of the map.
    pub fn insert(&mut self, name: &str, value: AttributeValue) {
        self.0.push((name.to_owned(), value));
    }

    /// Retrieves the first attribute with the provided `name`, if any.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&AttributeValue> {
        self.0.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    /// Iterates the (name, value) pairs in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &AttributeValue)> {
        self.0.iter().map(|(n, v)| (n.as_str(), v))
    }

    /// Returns the number of attributes in the map.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true iff the map contains no attributes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<(String, AttributeValue)> for AttributeMap {
    fn from_iter<T: IntoIterator<Item = (String, AttributeValue)>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// One entry of a node's attribute dictionary.
///
/// Every variant must either be encodable into the options format or produce
/// an explicit, non-fatal diagnostic when encoding is attempted; there is no
/// silent data loss without a warning.
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
pub enum AttributeValue {
    /// A signed integer scalar. Wider source integers are carried through a
    /// 64-bit window, which is also how they travel on the wire.
    Int(i64),

    /// A floating-point scalar, carried as a double.
    Float(f64),

    /// A string scalar.
    Str(String),

    /// A homogeneous numeric tensor literal.
    Tensor(TensorValue),

    /// An already-flat array of 64-bit integers, distinct from the tensor
    /// case.
    IntArray(Vec<i64>),

    /// An already-flat array of booleans, distinct from the tensor case.
    BoolArray(Vec<bool>),

    /// A heterogeneous list of sub-values.
    ///
    /// The options format supports such lists only when all elements are
    /// strings or all elements are [`Precision`] tags; anything else is
    /// reported and encoded as an empty vector.
    List(Vec<AttributeValue>),

    /// An enumerated precision tag. Encodable only as a list element; a
    /// standalone occurrence is reported as unsupported.
    Precision(Precision),

    /// Dimension numbers for a convolution operation.
    ConvDimensionNumbers(ConvDimensionNumbers),

    /// Dimension numbers for a gather operation.
    GatherDimensionNumbers(GatherDimensionNumbers),

    /// Dimension numbers for a scatter operation.
    ScatterDimensionNumbers(ScatterDimensionNumbers),

    /// Dimension numbers for a dot-product operation.
    DotDimensionNumbers(DotDimensionNumbers),

    /// An enumerated comparison direction tag.
    ComparisonDirection(ComparisonDirection),

    /// An enumerated comparison type tag.
    ComparisonType(ComparisonType),

    /// A nested attribute dictionary.
    ///
    /// Not encodable by itself; it exists as the carrier for a composite
    /// macro's parameter set, which the legalizer unwraps before encoding.
    Dict(AttributeMap),

    /// A by-name reference to another function or sub-graph in the unit's
    /// surroundings. Not encodable.
    SymbolRef(String),

    /// A presence-only marker attribute with no payload. Not encodable.
    Unit,
}

/// A homogeneous tensor literal: an element type plus flat element storage.
///
/// The storage is segregated by scalar class rather than kept per-width;
/// the element type alone decides how the encoder serializes the data.
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
pub struct TensorValue {
    /// The element type shared by every element.
    pub element_type: ElementType,

    /// The flat element data, in row-major order.
    pub data: TensorData,
}

/// Flat storage for tensor literals, segregated by scalar class.
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
pub enum TensorData {
    /// Elements of any integer-like type, sign-extended to 64 bits.
    Int(Vec<i64>),

    /// Elements of any floating-point type, widened to doubles.
    Float(Vec<f64>),
}

impl TensorValue {
    /// Creates an integer-class tensor literal.
    #[must_use]
    pub fn ints(element_type: ElementType, data: Vec<i64>) -> Self {
        Self {
            element_type,
            data: TensorData::Int(data),
        }
    }

    /// Creates a floating-point-class tensor literal.
    #[must_use]
    pub fn floats(element_type: ElementType, data: Vec<f64>) -> Self {
        Self {
            element_type,
            data: TensorData::Float(data),
        }
    }
}

/// Dimension numbers describing the data layout of a convolution.
///
/// The field order below is a wire contract: the encoder flattens these
/// fields into one positionally-decoded vector, and downstream consumers
/// index into it by position.
#[derive(Clone, Serialize, Deserialize, Debug, Default, PartialEq, Eq)]
pub struct ConvDimensionNumbers {
    pub input_batch_dimension:    i64,
    pub input_feature_dimension:  i64,
    pub input_spatial_dimensions: Vec<i64>,

    pub kernel_input_feature_dimension:  i64,
    pub kernel_output_feature_dimension: i64,
    pub kernel_spatial_dimensions:       Vec<i64>,

    pub output_batch_dimension:    i64,
    pub output_feature_dimension:  i64,
    pub output_spatial_dimensions: Vec<i64>,
}

/// Dimension numbers describing the data layout of a gather.
///
/// Field order is a wire contract; see [`ConvDimensionNumbers`].
#[derive(Clone, Serialize, Deserialize, Debug, Default, PartialEq, Eq)]
pub struct GatherDimensionNumbers {
    pub offset_dims:          Vec<i64>,
    pub collapsed_slice_dims: Vec<i64>,
    pub start_index_map:      Vec<i64>,
    pub index_vector_dim:     i64,
}

/// Dimension numbers describing the data layout of a scatter.
///
/// Field order is a wire contract; see [`ConvDimensionNumbers`].
#[derive(Clone, Serialize, Deserialize, Debug, Default, PartialEq, Eq)]
pub struct ScatterDimensionNumbers {
    pub update_window_dims:           Vec<i64>,
    pub inserted_window_dims:         Vec<i64>,
    pub scatter_dims_to_operand_dims: Vec<i64>,
    pub index_vector_dim:             i64,
}

/// Dimension numbers describing the contraction of a dot product.
///
/// Field order is a wire contract; see [`ConvDimensionNumbers`].
#[derive(Clone, Serialize, Deserialize, Debug, Default, PartialEq, Eq)]
pub struct DotDimensionNumbers {
    pub lhs_batching_dimensions:    Vec<i64>,
    pub rhs_batching_dimensions:    Vec<i64>,
    pub lhs_contracting_dimensions: Vec<i64>,
    pub rhs_contracting_dimensions: Vec<i64>,
}

/// The direction of an element-wise comparison.
#[derive(Clone, Copy, Serialize, Deserialize, Debug, PartialEq, Eq)]
pub enum ComparisonDirection {
    Eq,
    Ne,
    Ge,
    Gt,
    Le,
    Lt,
}

impl ComparisonDirection {
    /// The canonical lowercase name of the tag, as it appears on the wire.
    #[must_use]
    pub fn canonical_name(self) -> &'static str {
        match self {
            ComparisonDirection::Eq => "eq",
            ComparisonDirection::Ne => "ne",
            ComparisonDirection::Ge => "ge",
            ComparisonDirection::Gt => "gt",
            ComparisonDirection::Le => "le",
            ComparisonDirection::Lt => "lt",
        }
    }
}

impl fmt::Display for ComparisonDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.canonical_name())
    }
}

/// The numeric interpretation used by an element-wise comparison.
#[derive(Clone, Copy, Serialize, Deserialize, Debug, PartialEq, Eq)]
pub enum ComparisonType {
    Notype,
    Float,
    Totalorder,
    Signed,
    Unsigned,
}

impl ComparisonType {
    /// The canonical lowercase name of the tag, as it appears on the wire.
    #[must_use]
    pub fn canonical_name(self) -> &'static str {
        match self {
            ComparisonType::Notype => "notype",
            ComparisonType::Float => "float",
            ComparisonType::Totalorder => "totalorder",
            ComparisonType::Signed => "signed",
            ComparisonType::Unsigned => "unsigned",
        }
    }
}

impl fmt::Display for ComparisonType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.canonical_name())
    }
}

/// The precision requested for one operand of a numeric operation.
#[derive(Clone, Copy, Serialize, Deserialize, Debug, PartialEq, Eq)]
pub enum Precision {
    Default,
    High,
    Highest,
}

impl Precision {
    /// The canonical lowercase name of the tag, as it appears on the wire.
    #[must_use]
    pub fn canonical_name(self) -> &'static str {
        match self {
            Precision::Default => "default",
            Precision::High => "high",
            Precision::Highest => "highest",
        }
    }
}

impl fmt::Display for Precision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.canonical_name())
    }
}
