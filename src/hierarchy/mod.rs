//! Hierarchy builder: transitive reduction, cycle breaking, forest assembly.

mod builder;
mod cycles;

pub use builder::{build, BuildOutcome};
