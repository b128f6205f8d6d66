//! The value-type descriptors carried by graph nodes, and the source-location
//! type used to tag diagnostics.
//!
//! This is deliberately a filtered view of the source framework's type
//! system: the legalizer only ever needs to carry result types through a
//! rewrite and to classify tensor element types, never to reason about the
//! types themselves.

use std::fmt;

use serde::{Deserialize, Serialize};

/// The element type of a tensor-valued attribute or of a node result.
#[derive(Clone, Copy, Serialize, Deserialize, Debug, PartialEq, Eq)]
pub enum ElementType {
    // Integer types, including the single-bit boolean.
    I1,
    I8,
    I16,
    I32,
    I64,
    I128,

    // Floating-point types.
    F16,
    BF16,
    F32,
    F64,
    F128,
}

impl ElementType {
    /// Returns true iff elements of this type serialize as signed integers.
    #[must_use]
    pub fn is_integer_like(self) -> bool {
        matches!(
            self,
            ElementType::I1
                | ElementType::I8
                | ElementType::I16
                | ElementType::I32
                | ElementType::I64
                | ElementType::I128
        )
    }

    /// Returns true iff elements of this type serialize as doubles.
    ///
    /// The 16-bit floating-point types are deliberately excluded: they have
    /// no widening story in the options format and are reported as
    /// unsupported by the encoder.
    #[must_use]
    pub fn is_float_like(self) -> bool {
        matches!(self, ElementType::F32 | ElementType::F64 | ElementType::F128)
    }
}

/// The type of one value flowing between nodes: an element type plus a
/// static shape.
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq, Eq)]
pub struct TensorType {
    /// The element type shared by every element of the tensor.
    pub element_type: ElementType,

    /// The dimensions of the tensor, outermost first. A scalar has an empty
    /// shape.
    pub shape: Vec<i64>,
}

impl TensorType {
    /// Creates a new tensor type descriptor.
    #[must_use]
    pub fn new(element_type: ElementType, shape: Vec<i64>) -> Self {
        Self {
            element_type,
            shape,
        }
    }
}

/// Contains a simple "pointer" to a piece of source material, for diagnostic
/// and debugging purposes.
#[derive(Clone, Serialize, Deserialize, Debug, Default, PartialEq, Eq)]
pub struct Location {
    /// The source context being described—usually a file path.
    pub source: String,

    /// The line number in the relevant source file, if available and relevant.
    pub line: Option<std::num::NonZeroU32>,

    /// The column number in the relevant source file, if available and
    /// relevant.
    pub col: Option<std::num::NonZeroU32>,
}

impl Location {
    /// Creates a location pointing at the provided `source`, with no line or
    /// column information.
    #[must_use]
    pub fn new(source: &str) -> Self {
        Self {
            source: source.to_owned(),
            line:   None,
            col:    None,
        }
    }

    /// Creates a location pointing at a line and column within the provided
    /// `source`.
    ///
    /// Zero line or column numbers are treated as absent, matching the
    /// convention of the frontends that produce units.
    #[must_use]
    pub fn new_with_position(source: &str, line: u32, col: u32) -> Self {
        Self {
            source: source.to_owned(),
            line:   std::num::NonZeroU32::new(line),
            col:    std::num::NonZeroU32::new(col),
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.source.is_empty() {
            write!(f, "<unknown>")?;
        } else {
            write!(f, "{}", self.source)?;
        }
        if let Some(line) = self.line {
            write!(f, ":{line}")?;
            if let Some(col) = self.col {
                write!(f, ":{col}")?;
            }
        }
        Ok(())
    }
}
