//! Indonesian tax calculations

pub mod ppn;

pub use ppn::*;
