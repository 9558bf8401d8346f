//! Small shared helpers.

pub mod bootstrap;
pub mod panic;
