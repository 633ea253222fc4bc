//! Render chain configuration and compilation into a filter graph.

pub mod compile;
pub mod condition;
pub mod presets;
pub mod step;

pub use compile::{Chain, CompileContext};
pub use condition::{ConditionEvaluator, ExprEvaluator, FilterInfo};
pub use presets::PresetRegistry;
pub use step::ChainStep;
