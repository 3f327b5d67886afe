// ==========================================
// PAWS 木材供应仿真系统 - 配置层
// ==========================================
// 职责: 仿真配置定义、默认值、文件加载与校验
// 存储: TOML / JSON 配置文件
// ==========================================

pub mod error;
pub mod loader;
pub mod sim_config;

// 重导出核心配置类型
pub use error::{ConfigError, ConfigResult};
pub use loader::{load_config, parse_config, to_toml_string};
pub use sim_config::{
    param_f64, param_mode, param_str, AgentBehaviorConfig, BilevelConfig, CutGeneratorKind,
    HorizonConfig, LogLevel, PeriodLength, PolicyParams, PrincipalPolicyConfig, RunConfig,
    SimConfig, SolverConfig, AGENT_DEFAULT_STUB, POLICY_EVEN_FLOW, POLICY_MAX_VOLUME,
};
