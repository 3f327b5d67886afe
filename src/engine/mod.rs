// ==========================================
// PAWS 木材供应仿真系统 - 引擎层
// ==========================================
// 职责: 收获表展开、上层模型、承诺提取、双层分解、滚动时域调度
// 红线: 求解失败只记录状态与告警, 不中断仿真
// ==========================================

pub mod agent;
pub mod bilevel;
pub mod commitment_extractor;
pub mod error;
pub mod lp;
pub mod plugin;
pub mod principal_model;
pub mod registry;
pub mod scheduler;
pub mod yield_expansion;

// 重导出核心引擎
pub use agent::ProfitMaxFlowStub;
pub use bilevel::{
    BilevelIteration, BilevelReport, BilevelSolver, CutGenerator, DecompositionOutcome,
    VolumeCapCut,
};
pub use commitment_extractor::{extract, Extraction, POOLED_STRATUM};
pub use error::{RegistryError, SimError, SimResult};
pub use plugin::{OperationsAgent, PluginArgs, PrincipalEmulator};
pub use principal_model::{Cut, ModelResult, ObjectiveKind, PrincipalModel, PrincipalModelBuilder};
pub use registry::{AgentFactory, PluginRegistry, PrincipalFactory};
pub use scheduler::{
    write_run_summary, RollingHorizonSimulator, RunReport, RunStats, SimState, WindowRecord,
    RUN_SUMMARY_FILE,
};
