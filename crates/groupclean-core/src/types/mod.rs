//! Core types for group cleanup

mod entry;
mod group;
mod member;
mod report;

pub use entry::*;
pub use group::*;
pub use member::*;
pub use report::*;
