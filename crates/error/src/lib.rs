//! The error types shared between the crates of the Opaline project.
//!
//! Each stage of the pipeline gets its own module with an `Error` enum and a
//! `Result` alias, so that a crate only needs to depend on the errors of the
//! stages it actually touches.

#![warn(clippy::all, clippy::cargo, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)] // Allows for better API naming
#![allow(clippy::multiple_crate_versions)] // Enforced by our dependencies

pub mod legalize;
