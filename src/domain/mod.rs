// ==========================================
// PAWS 木材供应仿真系统 - 领域模型层
// ==========================================
// 职责: 定义领域实体、类型、交换对象
// 红线: 不含数据访问逻辑,不含引擎逻辑
// ==========================================

pub mod commitment;
pub mod forest;
pub mod types;

// 重导出核心类型
pub use commitment::{
    AgentRequest, AgentResponse, BlockRequest, CommitmentSet, InventoryHint, PrincipalDecision,
    PrincipalState,
};
pub use forest::{
    AbsoluteYieldTable, PeriodDemand, PlanningData, ProblemData, RelativeYieldTable, Stratum,
    YieldRow, DEFAULT_PRODUCT,
};
pub use types::{
    AdapterMode, ExtractionMode, Reformulation, SimWarning, SolverDriver, SolverStatus,
    WarningKind,
};
