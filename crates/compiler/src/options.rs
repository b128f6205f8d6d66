//! Serialization of node attributes into the self-describing options blob
//! carried by opaque operations.
//!
//! The payload root is a FlexBuffer map keyed by attribute name. Scalars are
//! stored as signed integers, doubles, and strings; flat arrays become typed
//! vectors; and the structured dimension-number records are flattened into
//! untyped vectors whose field order downstream consumers decode
//! positionally. That field order is a wire contract and must not be
//! reordered.
//!
//! Nothing here can fail the caller: any unsupported or malformed value is
//! reported through the diagnostic sink as a warning and contributes either
//! nothing or an empty vector to the output map.

use flexbuffers::{MapBuilder, VectorBuilder};
use opaline_ir::{
    attributes::{AttributeValue, TensorData, TensorValue},
    diagnostics::{DiagnosticSink, WarningKind},
    types::Location,
};

/// Encodes a single named attribute into the in-progress options `map`.
///
/// Appends zero or one entries named `key`. Unsupported values are reported
/// against `location` through `diagnostics` and omitted; unsupported
/// *contents* of supported containers leave an empty vector behind so that
/// the map shape stays predictable.
pub fn encode_attribute(
    map: &mut MapBuilder,
    key: &str,
    value: &AttributeValue,
    location: &Location,
    diagnostics: &mut DiagnosticSink,
) {
    match value {
        AttributeValue::Int(v) => map.push(key, *v),
        AttributeValue::Float(v) => map.push(key, *v),
        AttributeValue::Str(v) => map.push(key, v.as_str()),

        AttributeValue::Tensor(tensor) => {
            encode_tensor(map, key, tensor, location, diagnostics);
        }

        AttributeValue::IntArray(values) => {
            let mut vector = map.start_vector(key);
            for v in values {
                vector.push(*v);
            }
            vector.end_vector();
        }

        AttributeValue::BoolArray(values) => {
            let mut vector = map.start_vector(key);
            for v in values {
                vector.push(*v);
            }
            vector.end_vector();
        }

        AttributeValue::List(elements) => {
            encode_list(map, key, elements, location, diagnostics);
        }

        AttributeValue::ConvDimensionNumbers(d) => {
            let mut vector = map.start_vector(key);
            vector.push(d.input_batch_dimension);
            vector.push(d.input_feature_dimension);
            add_integer_array(&mut vector, &d.input_spatial_dimensions);
            vector.push(d.kernel_input_feature_dimension);
            vector.push(d.kernel_output_feature_dimension);
            add_integer_array(&mut vector, &d.kernel_spatial_dimensions);
            vector.push(d.output_batch_dimension);
            vector.push(d.output_feature_dimension);
            add_integer_array(&mut vector, &d.output_spatial_dimensions);
            vector.end_vector();
        }

        AttributeValue::GatherDimensionNumbers(d) => {
            let mut vector = map.start_vector(key);
            add_integer_array(&mut vector, &d.offset_dims);
            add_integer_array(&mut vector, &d.collapsed_slice_dims);
            add_integer_array(&mut vector, &d.start_index_map);
            vector.push(d.index_vector_dim);
            vector.end_vector();
        }

        AttributeValue::ScatterDimensionNumbers(d) => {
            let mut vector = map.start_vector(key);
            add_integer_array(&mut vector, &d.update_window_dims);
            add_integer_array(&mut vector, &d.inserted_window_dims);
            add_integer_array(&mut vector, &d.scatter_dims_to_operand_dims);
            vector.push(d.index_vector_dim);
            vector.end_vector();
        }

        AttributeValue::DotDimensionNumbers(d) => {
            let mut vector = map.start_vector(key);
            add_integer_array(&mut vector, &d.lhs_batching_dimensions);
            add_integer_array(&mut vector, &d.rhs_batching_dimensions);
            add_integer_array(&mut vector, &d.lhs_contracting_dimensions);
            add_integer_array(&mut vector, &d.rhs_contracting_dimensions);
            vector.end_vector();
        }

        AttributeValue::ComparisonDirection(direction) => {
            map.push(key, direction.canonical_name());
        }

        AttributeValue::ComparisonType(typ) => {
            map.push(key, typ.canonical_name());
        }

        // Standalone precision tags only ever appear on the wire inside
        // precision lists; everything in this arm has no representation in
        // the options format at all.
        AttributeValue::Precision(_)
        | AttributeValue::Dict(_)
        | AttributeValue::SymbolRef(_)
        | AttributeValue::Unit => {
            diagnostics.warn(
                WarningKind::UnsupportedAttribute,
                location,
                format!("serialization not supported for `{key}`"),
            );
        }
    }
}

/// Encodes a homogeneous tensor literal as a vector keyed by `key`.
///
/// The element type alone decides the serialized form: integer-like
/// elements are stored as signed integers and float-like elements as
/// doubles. Any other element type warns and leaves the vector empty, but
/// the vector is still closed cleanly.
fn encode_tensor(
    map: &mut MapBuilder,
    key: &str,
    tensor: &TensorValue,
    location: &Location,
    diagnostics: &mut DiagnosticSink,
) {
    let mut vector = map.start_vector(key);
    match &tensor.data {
        TensorData::Int(values) if tensor.element_type.is_integer_like() => {
            for v in values {
                vector.push(*v);
            }
        }
        TensorData::Float(values) if tensor.element_type.is_float_like() => {
            for v in values {
                vector.push(*v);
            }
        }
        _ => {
            diagnostics.warn(
                WarningKind::UnsupportedElementType,
                location,
                format!(
                    "serialization of tensor elements for `{key}` only supports integer and \
                     float element types, not {:?}",
                    tensor.element_type
                ),
            );
        }
    }
    vector.end_vector();
}

/// Encodes a heterogeneous list as a vector of strings keyed by `key`.
///
/// A list with more than one element must open with a string or a precision
/// tag; otherwise the list is reported and encoded as an empty vector so the
/// key still appears in the map. Single-element lists skip the shape check
/// entirely.
fn encode_list(
    map: &mut MapBuilder,
    key: &str,
    elements: &[AttributeValue],
    location: &Location,
    diagnostics: &mut DiagnosticSink,
) {
    let mut vector = map.start_vector(key);

    if elements.len() > 1
        && !matches!(
            elements[0],
            AttributeValue::Str(_) | AttributeValue::Precision(_)
        )
    {
        diagnostics.warn(
            WarningKind::UnsupportedListShape,
            location,
            format!("serialization of the list at `{key}` only supports strings and precision tags"),
        );
        vector.end_vector();
        return;
    }

    for element in elements {
        match element {
            AttributeValue::Str(text) => vector.push(text.as_str()),
            AttributeValue::Precision(precision) => vector.push(precision.canonical_name()),
            _ => {
                diagnostics.warn(
                    WarningKind::UnsupportedListShape,
                    location,
                    format!("skipping an unsupported element of the list at `{key}`"),
                );
            }
        }
    }

    vector.end_vector();
}

/// Appends `values` to the enclosing `vector` as one nested integer vector.
fn add_integer_array(vector: &mut VectorBuilder, values: &[i64]) {
    let mut nested = vector.start_vector();
    for value in values {
        nested.push(*value);
    }
    nested.end_vector();
}
