// ==========================================
// PAWS 木材供应仿真系统 - 核心库
// ==========================================
// 委托方-代理人 (Principal-Agent) 木材供应滚动时域仿真
// 技术栈: Rust + tokio + LP (native 单纯形 / highs)
// 系统定位: 规划仿真工具 (上层战略规划 + 下层作业响应)
// ==========================================

// ==========================================
// 模块声明
// ==========================================

// 领域层 - 实体与类型
pub mod domain;

// 配置层 - 仿真配置
pub mod config;

// 导入层 - 问题数据
pub mod importer;

// 引擎层 - 模型与调度
pub mod engine;

// 适配层 - 外部 CLI 工具
pub mod adapters;

// 日志系统
pub mod logging;

// 性能埋点
pub mod perf;

// ==========================================
// 重导出核心类型
// ==========================================

// 领域类型
pub use domain::{
    AgentRequest, AgentResponse, CommitmentSet, PlanningData, PrincipalDecision, ProblemData,
    SimWarning, SolverStatus, Stratum, WarningKind,
};

// 配置
pub use config::{load_config, ConfigError, SimConfig};

// 导入
pub use importer::{load_problem_data, ImportError};

// 引擎
pub use engine::{
    BilevelSolver, PluginRegistry, PrincipalModelBuilder, RollingHorizonSimulator, RunReport,
    SimError, SimResult,
};

// ==========================================
// 常量定义
// ==========================================

// 系统版本
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// 系统名称
pub const APP_NAME: &str = "PAWS 木材供应仿真系统";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }

    #[test]
    fn test_builtin_registry_has_default_agent() {
        let registry = PluginRegistry::with_builtin();
        assert!(registry.contains_agent(config::AGENT_DEFAULT_STUB));
    }
}
