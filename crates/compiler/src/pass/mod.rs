//! This module contains both the definition of the [`Pass`] type and the
//! [`PassManager`] object.
//!
//! Every pass should implement [`ConcretePass`], as this provides the full
//! set of features required of a pass. It is also expected that each pass
//! provide a type-specific constructor function called `new`.
//!
//! # Passes
//!
//! A pass is a self-contained unit of functionality that performs some
//! operation over a graph unit. They tend to fall into the following two
//! categories:
//!
//! - **Analysis:** These examine the structure of the unit to infer
//!   information about it without changing its structure. The information
//!   produced by analysis passes can be invalidated by transformation
//!   passes.
//! - **Transformation:** Transformation passes use either information from
//!   analysis passes or structural information about the unit to change the
//!   structure of the unit. The legalization of source-dialect nodes into
//!   opaque operations is such a pass.

pub mod data;
pub mod transform;

use std::{
    any::{Any, TypeId},
    fmt::Debug,
};

use derivative::Derivative;
use downcast_rs::Downcast;
use opaline_errors::legalize::{Error, Result};
use opaline_ir::GraphUnit;
use tracing::debug;

use crate::pass::data::{ConcretePassData, DynPassDataMap, PassData};

/// A pass is a self-contained unit of functionality that performs some
/// operation over a graph unit.
pub type Pass = Box<dyn PassOps>;

/// A handle that uniquely identifies the pass.
pub type PassKey = TypeId;

/// The data returned when executing a pass.
#[derive(Derivative)]
#[derivative(Debug(bound = "T: Debug"))]
pub struct PassReturnData<T> {
    /// The newly-modified graph unit.
    pub unit: GraphUnit,

    /// The data returned by the pass.
    pub data: T,
}

impl<T> PassReturnData<T> {
    /// Creates a new instance of the pass return data.
    pub fn new(unit: GraphUnit, data: T) -> Self {
        Self { unit, data }
    }
}

impl PassReturnData<PassData> {
    /// Allows you to get the returned pass data as the concrete data type
    /// `T`, returning `&T` if possible and `None` otherwise.
    #[must_use]
    pub fn data_as<T: ConcretePassData>(&self) -> Option<&T> {
        self.data.view_as::<T>()
    }

    /// Allows you to get the returned pass data as the concrete data type
    /// `T`, returning `&mut T` if possible and `None` otherwise.
    pub fn data_as_mut<T: ConcretePassData>(&mut self) -> Option<&mut T> {
        self.data.view_as_mut::<T>()
    }

    /// Allows you to get the returned pass data as the concrete data type
    /// `T`, returning `&T` if possible.
    ///
    /// # Panics
    ///
    /// If `self.data` is not an instance of `T`.
    #[must_use]
    pub fn unwrap_data_as<T: ConcretePassData>(&self) -> &T {
        self.data_as::<T>().unwrap()
    }

    /// Allows you to get the returned pass data as the concrete data type
    /// `T`, returning `&mut T` if possible.
    ///
    /// # Panics
    ///
    /// If `self.data` is not an instance of `T`.
    pub fn unwrap_data_as_mut<T: ConcretePassData>(&mut self) -> &mut T {
        self.data_as_mut::<T>().unwrap()
    }
}

/// The data returned when executing a pass where the pass data is of a
/// dynamically-dispatched type.
pub type DynamicPassReturnData = PassReturnData<PassData>;

/// The operations that we expect one of our passes to have.
///
/// The implementation is designed to be used via dynamic dispatch, and hence
/// can provide the requisite operations however it is able.
///
/// # Self Bounds
///
/// The bounds on `Self` are required by these traits for the following
/// reasons:
///
/// - [`Any`] allows downcasting to concrete implementations of the pass if
///   needed.
/// - [`Debug`] to provide representations to aid in debugging. It is
///   recommended to use the derive feature for this.
/// - [`Downcast`] for easy conversions _to_ [`Any`] for downcasting.
///
/// In addition, it is required but not enforced that implementors of this
/// trait also implement [`ConcretePass`].
pub trait PassOps
where
    Self: Any + Debug + Downcast,
{
    /// Executes the pass on the provided `unit`, returning both the
    /// potentially-modified unit and any data returned by the pass.
    ///
    /// It takes a map of `pass_data` that allows the running pass to get at
    /// the data produced by the passes it depends on.
    ///
    /// # Errors
    ///
    /// - [`Error`] if pass execution fails for any reason.
    fn run(&mut self, unit: GraphUnit, pass_data: &DynPassDataMap)
        -> Result<DynamicPassReturnData>;

    /// Gets a slice containing the keys of the passes whose output this pass
    /// depends on.
    fn depends(&self) -> &[PassKey];

    /// Gets a slice containing the keys of the passes whose output this pass
    /// invalidates.
    fn invalidates(&self) -> &[PassKey];

    /// Returns a duplicate of this pass.
    fn dupe(&self) -> Pass;

    /// Gets a key that uniquely represents the pass.
    ///
    /// This **must** return the same value as [`ConcretePass::key`].
    fn key_dyn(&self) -> PassKey {
        self.type_id()
    }
}

/// Operations implemented on `dyn PassOps` are **only** available on the
/// concrete trait object and hence not equivalent to a blanket
/// implementation of a method for `trait PassOps`.
impl dyn PassOps {
    /// Checks if the pass is an instance of the concrete pass `T`, returning
    /// `true` if it is and `false` otherwise.
    pub fn is<T: ConcretePass>(&self) -> bool {
        self.as_any().is::<T>()
    }

    /// Allows you to view the dynamic pass `self` as the concrete pass type
    /// `T`, returning a `&T` if possible and `None` otherwise.
    pub fn view_as<T: ConcretePass>(&self) -> Option<&T> {
        self.as_any().downcast_ref::<T>()
    }

    /// Allows you to view the dynamic pass `self` as the concrete pass type
    /// `T`, returning a `&mut T` if possible and `None` otherwise.
    pub fn view_as_mut<T: ConcretePass>(&mut self) -> Option<&mut T> {
        self.as_any_mut().downcast_mut::<T>()
    }

    /// Allows you to view the dynamic pass `self` as the concrete pass type
    /// `T`, returning a `&T` if possible.
    ///
    /// # Panics
    ///
    /// If `self` is not an instance of `T`.
    pub fn unwrap_as<T: ConcretePass>(&self) -> &T {
        self.view_as::<T>()
            .unwrap_or_else(|| panic!("self was not a {:?}", TypeId::of::<T>()))
    }

    /// Allows you to view the dynamic pass `self` as the concrete pass type
    /// `T`, returning a `&mut T` if possible.
    ///
    /// # Panics
    ///
    /// If `self` is not an instance of `T`.
    pub fn unwrap_as_mut<T: ConcretePass>(&mut self) -> &mut T {
        self.view_as_mut::<T>()
            .unwrap_or_else(|| panic!("self was not a {:?}", TypeId::of::<T>()))
    }
}

/// Provides extra operations that can be called when operating on a concrete
/// instance of a specific pass, rather than on any instance of a pass.
pub trait ConcretePass
where
    Self: Clone + Debug + PassOps,
{
    /// The type of data returned by the pass.
    type Data: ConcretePassData;

    /// Gets a key that uniquely represents the pass.
    ///
    /// This **must** return the same value as [`PassOps::key_dyn`].
    #[must_use]
    fn key() -> PassKey {
        TypeId::of::<Self>()
    }
}

/// The data returned when executing all passes via the pass manager.
#[derive(Debug)]
pub struct PassManagerReturnData {
    /// The newly-modified graph unit.
    pub unit: GraphUnit,

    /// A mapping from pass key to the data returned by the pass.
    pub data: DynPassDataMap,
}

impl PassManagerReturnData {
    /// Creates a new pass manager return data element wrapping the
    /// transformed `unit` and the result `data` from all the passes.
    #[must_use]
    pub fn new(unit: GraphUnit, data: DynPassDataMap) -> Self {
        Self { unit, data }
    }
}

/// A manager for passes within the legalizer.
///
/// The primary task of this pass manager is to automatically resolve a pass
/// ordering based on dependencies between passes. This ensures that pass
/// orderings are correct, without the need for costly manual validation.
pub struct PassManager {
    pass_ordering: Vec<Pass>,
}

impl PassManager {
    /// Creates a new pass manager wrapping the provided passes.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidPassOrdering`] if no valid pass ordering can be
    ///   generated from the provided `passes`.
    pub fn new(passes: Vec<Pass>) -> Result<Self> {
        let pass_ordering = Self::generate_pass_ordering(passes)?;
        Ok(Self { pass_ordering })
    }

    /// Executes the pass ordering on the provided `unit`.
    ///
    /// # Errors
    ///
    /// - [`Error`] if any pass fails.
    pub fn run(&mut self, mut unit: GraphUnit) -> Result<PassManagerReturnData> {
        let mut pass_data_map = DynPassDataMap::new();

        for pass in &mut self.pass_ordering {
            debug!(unit = %unit.name, pass = ?pass, "Running pass");
            let PassReturnData { unit: new_unit, data } = pass.run(unit, &pass_data_map)?;
            pass_data_map.put_dyn(pass.as_ref(), data);

            unit = new_unit;
        }

        let result = PassManagerReturnData::new(unit, pass_data_map);
        Ok(result)
    }

    /// Gets the current pass ordering.
    ///
    /// This method is always guaranteed to return a valid pass ordering that
    /// respects the requirements of the passes.
    #[must_use]
    pub fn passes(&self) -> &[Pass] {
        &self.pass_ordering
    }

    /// Generates a valid pass ordering from `passes` wherever possible.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidPassOrdering`] if no valid pass ordering can be
    ///   generated from the provided `passes`. This will usually occur due
    ///   to circular dependencies between passes.
    pub fn generate_pass_ordering(passes: Vec<Pass>) -> Result<Vec<Pass>> {
        // Dependency-carrying passes would need a topological sort here; the
        // passes this legalizer ships are dependency-free.
        let no_deps = passes.iter().all(|p| p.depends().is_empty());
        if no_deps {
            Ok(passes)
        } else {
            Err(Error::InvalidPassOrdering(
                "Passes had dependencies where they should not".to_string(),
            ))
        }
    }
}

impl Default for PassManager {
    /// Returns a pass manager with the default set of passes associated with
    /// it.
    ///
    /// # Default Passes
    ///
    /// - [`transform::opaque::LegalizeToOpaque`], legalizing the default
    ///   source dialect.
    fn default() -> Self {
        Self::new(vec![transform::opaque::LegalizeToOpaque::default_dialect()])
            .expect("Default pass ordering was invalid")
    }
}
