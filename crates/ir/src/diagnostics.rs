//! The diagnostic sink used to report recoverable legalization problems.
//!
//! Nothing in here aborts anything: every entry is a warning attached to the
//! location of the node that produced it, collected per unit and surfaced to
//! the caller as a list. Tests assert on counts and kinds rather than on
//! printed output.

use std::fmt;

use crate::types::Location;

/// The closed set of recoverable problems the legalizer can report.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WarningKind {
    /// An attribute kind the options format cannot represent.
    UnsupportedAttribute,

    /// A tensor element type the options format cannot represent.
    UnsupportedElementType,

    /// A heterogeneous list whose elements are neither all strings nor all
    /// precision tags.
    UnsupportedListShape,

    /// A composite macro whose name is not in the specialization allow-list.
    UnknownComposite,
}

/// One recoverable problem, tagged with the location of the node that
/// produced it.
#[derive(Clone, Debug, PartialEq)]
pub struct Warning {
    /// The kind of problem encountered.
    pub kind: WarningKind,

    /// A human-readable description of the problem.
    pub message: String,

    /// The source location of the originating node.
    pub location: Location,
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: warning: {}", self.location, self.message)
    }
}

/// An append-only collection of [`Warning`]s for one unit.
///
/// The sink is owned by whoever drives a legalization of a single unit;
/// units legalized independently get independent sinks.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DiagnosticSink {
    warnings: Vec<Warning>,
}

impl DiagnosticSink {
    /// Creates a new, empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a warning of the provided `kind` at `location`.
    pub fn warn(&mut self, kind: WarningKind, location: &Location, message: impl Into<String>) {
        self.warnings.push(Warning {
            kind,
            message: message.into(),
            location: location.clone(),
        });
    }

    /// Returns every collected warning, in the order it was reported.
    #[must_use]
    pub fn warnings(&self) -> &[Warning] {
        &self.warnings
    }

    /// Returns the number of warnings of the provided `kind`.
    #[must_use]
    pub fn count_of(&self, kind: WarningKind) -> usize {
        self.warnings.iter().filter(|w| w.kind == kind).count()
    }

    /// Returns the total number of collected warnings.
    #[must_use]
    pub fn len(&self) -> usize {
        self.warnings.len()
    }

    /// Returns true iff no warnings have been collected.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.warnings.is_empty()
    }
}
