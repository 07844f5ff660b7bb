//! skill-pipeline - declarative content-generation pipelines executed against pluggable skills

pub mod core;
pub mod execution;
pub mod metering;
pub mod persistence;
pub mod registry;
pub mod skill;
pub mod telemetry;

// Re-export commonly used types
pub use crate::core::{
    ModelTier, PipelineDefinition, PipelineRun, RetryPolicy, RunStatus, StepDefinition,
    StepRunRecord, StepStatus, Value, VariableScope,
};
pub use crate::execution::{EngineConfig, EngineError, ExecutionEngine, ExecutionEvent};
pub use crate::metering::{InMemoryMetering, LimitCheck, MeteringEntry, MeteringSink, NoopMetering};
pub use crate::persistence::{InMemoryRunStore, RunStore, RunSummary};
pub use crate::registry::{PipelineRegistry, TriggerMatch};
pub use crate::skill::{Skill, SkillContext, SkillError, SkillOutput, SkillRegistry, SkillServices};
