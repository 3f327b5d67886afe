// ==========================================
// PAWS 木材供应仿真系统 - 配置错误类型
// ==========================================
// 工具: thiserror 派生宏
// 红线: 配置错误均为致命错误, 必须在任何求解之前抛出
// ==========================================

use thiserror::Error;

/// 配置错误类型
#[derive(Error, Debug)]
pub enum ConfigError {
    // ===== 文件相关错误 =====
    #[error("配置文件读取失败 ({path}): {message}")]
    FileRead { path: String, message: String },

    #[error("配置文件格式不支持: {0}（仅支持 .toml/.json）")]
    UnsupportedFormat(String),

    #[error("配置文件解析失败 ({path}): {message}")]
    Parse { path: String, message: String },

    // ===== 时域配置错误 =====
    #[error("期长单位无法识别: {0}")]
    InvalidPeriodUnit(String),

    #[error("期长无效: {0}")]
    InvalidPeriodLength(String),

    #[error("时域配置无效: {0}")]
    InvalidHorizon(String),

    // ===== 策略配置错误 =====
    #[error("未知委托方策略: {0}")]
    UnknownPrincipalPolicy(String),

    #[error("未知代理行为: {0}")]
    UnknownAgentBehavior(String),

    #[error("策略参数无效 (key: {key}): {message}")]
    InvalidParam { key: String, message: String },

    // ===== 求解/双层配置错误 =====
    #[error("求解器配置无效: {0}")]
    InvalidSolver(String),

    #[error("双层配置无效: {0}")]
    InvalidBilevel(String),
}

/// Result 类型别名
pub type ConfigResult<T> = Result<T, ConfigError>;
