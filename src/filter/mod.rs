//! Filter graph nodes and their outputs.

pub mod node;
pub mod output;

pub use node::{Filter, FilterId, FilterKind};
pub use output::{FilterOutput, TextureOutput, fold_outputs, ret, safe_return};
