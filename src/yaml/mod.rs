//! YAML helpers for stored plan files

pub mod diagnostics;

pub use diagnostics::PlanSyntaxError;
