//! Transformation passes change the structure of the unit they run over,
//! using either structural information or the output of analysis passes.

pub mod opaque;
