//! Subcommand implementations.

mod common;
mod new;
mod redo;
mod skip;
mod status;

pub use common::apply;
pub use new::new_migration;
pub use redo::redo;
pub use skip::skip;
pub use status::status;
