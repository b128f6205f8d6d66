//! This library implements the legalization of graph units from an
//! unsupported source dialect into generic, self-describing opaque
//! operations that a lightweight runtime can dispatch on by name.
//!
//! # Process Overview
//!
//! While more information can be found in the module-level documentation of
//! each part of this codebase, a brief overview of the legalization process
//! can be stated as follows:
//!
//! 1. We walk every node of a [`GraphUnit`] exactly once, visiting only the
//!    nodes whose dialect tag matches the configured source dialect.
//! 2. For each such node we flatten its attribute dictionary into a compact,
//!    self-describing options blob (see [`options`]), unwrapping the
//!    parameter dictionaries of known composite macros along the way.
//! 3. We substitute an opaque node for the original, carrying the original's
//!    operands, result types, and location alongside the custom-op name and
//!    the options blob, and rewire all uses of the original's results.
//!
//! It should be noted that step 2 is deliberately lossy-but-loud: attribute
//! kinds the options format cannot represent are dropped with a collected
//! warning rather than aborting the unit, because real units routinely carry
//! optional attributes that do not need to round-trip.

#![warn(clippy::all, clippy::cargo, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)] // Allows for better API naming
#![allow(clippy::multiple_crate_versions)] // Enforced by our dependencies

pub mod options;
pub mod pass;

use opaline_errors::legalize::Result;
use opaline_ir::GraphUnit;

use crate::pass::{PassManager, PassManagerReturnData};

/// Handles the legalization of a [`GraphUnit`] into its opaque-operation
/// form.
///
/// The legalizer itself is a thin driver: all of the work happens in the
/// passes it is configured with, and all of the diagnostics those passes
/// collect come back to the caller in the returned pass data rather than
/// being printed inline.
pub struct Legalizer {
    /// The passes that this legalizer is configured to run.
    pub passes: PassManager,
}

/// The basic operations required of the legalizer.
impl Legalizer {
    /// Constructs a new legalizer instance, wrapping the provided `passes`
    /// to run.
    #[must_use]
    pub fn new(passes: PassManager) -> Self {
        Self { passes }
    }

    /// Executes the legalizer on the provided `unit`.
    ///
    /// Note that this consumes the legalizer, as the pass ordering is not
    /// re-runnable once executed.
    ///
    /// # Errors
    ///
    /// - [`opaline_errors::legalize::Error`] if the legalization process
    ///   fails for any reason.
    pub fn run(mut self, unit: GraphUnit) -> Result<PassManagerReturnData> {
        self.passes.run(unit)
    }
}

impl Default for Legalizer {
    /// Returns a legalizer with the default set of passes associated with
    /// it.
    fn default() -> Self {
        Self::new(PassManager::default())
    }
}

#[cfg(test)]
mod test {
    use opaline_ir::{
        attributes::{AttributeMap, AttributeValue, TensorValue},
        types::{ElementType, Location, TensorType},
        unit::{GraphUnit, Node, OpKind},
    };

    use crate::{
        pass::transform::opaque::{LegalizeToOpaque, LegalizeToOpaqueData},
        Legalizer,
    };

    #[test]
    fn legalizer_runs_successfully() -> anyhow::Result<()> {
        let mut unit = GraphUnit::new("main");
        let arg = unit.push_argument(TensorType::new(ElementType::F64, vec![3]));

        let mut attributes = AttributeMap::new();
        attributes.insert(
            "coeffs",
            AttributeValue::Tensor(TensorValue::floats(ElementType::F64, vec![1.0, 2.0, 3.0])),
        );
        unit.push_node(Node::generic(
            Location::new("model.unit"),
            vec![TensorType::new(ElementType::F64, vec![3])],
            vec![arg],
            "hlo",
            "polynomial",
            attributes,
        ));

        let result = Legalizer::default().run(unit)?;

        let diagnostics = &result
            .data
            .get::<LegalizeToOpaque>()
            .expect("Legalization pass has not been run")
            .diagnostics;
        assert!(diagnostics.is_empty());

        let node = result.unit.node(result.unit.node_ids()[0]);
        assert_eq!(node.qualified_name(), "hlo.polynomial");
        let OpKind::Opaque { payload, .. } = &node.op else {
            panic!("expected an opaque node");
        };

        let root = flexbuffers::Reader::get_root(payload.as_slice())?;
        let coeffs: Vec<f64> = root
            .as_map()
            .idx("coeffs")
            .as_vector()
            .iter()
            .map(|r| r.as_f64())
            .collect();
        assert_eq!(coeffs, vec![1.0, 2.0, 3.0]);
        Ok(())
    }

    #[test]
    fn pass_data_is_retrievable_by_pass_type() -> anyhow::Result<()> {
        let unit = GraphUnit::new("empty");
        let result = Legalizer::default().run(unit)?;

        let data: &LegalizeToOpaqueData = result
            .data
            .get::<LegalizeToOpaque>()
            .expect("Legalization pass has not been run");
        assert!(data.diagnostics.is_empty());
        Ok(())
    }
}
