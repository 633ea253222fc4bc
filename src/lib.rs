#![forbid(unsafe_code)]

pub mod chain;
pub mod device;
pub mod filter;
pub mod foundation;
pub mod lending;
pub mod pool;
pub mod renderer;
pub mod script;

pub use chain::{Chain, ChainStep, ConditionEvaluator, ExprEvaluator, FilterInfo, PresetRegistry};
pub use device::cpu::{CpuDevice, CpuDeviceOpts};
pub use device::{RenderDevice, ScalerKind, Shader, Texture, TextureId};
pub use filter::{Filter, FilterOutput, TextureOutput};
pub use foundation::core::{TextureDesc, TextureFormat, TextureSize};
pub use foundation::error::{ChainError, ChainResult};
pub use lending::{Lazy, Lease, Lendable};
pub use pool::{PoolOpts, PoolStats, TexturePool};
pub use renderer::{FrameTargets, Renderer, ScalerSettings, SourceFormat, SourcePlane};
pub use script::{RenderScript, ScriptConfig, ScriptState};
