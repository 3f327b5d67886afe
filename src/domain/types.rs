// ==========================================
// PAWS 木材供应仿真系统 - 领域类型定义
// ==========================================
// 职责: 求解状态、驱动、重构方式等枚举
// 序列化格式: snake_case (与配置文件/外部 JSON 一致)
// ==========================================

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ==========================================
// 求解终止状态 (Solver Status)
// ==========================================
// 红线: 求解失败是状态值,不是异常
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SolverStatus {
    Optimal,    // 最优
    Infeasible, // 不可行
    Unbounded,  // 无界
    TimeLimit,  // 超时
    Error,      // 求解器错误/不可用
    Unknown,    // 未知
}

impl SolverStatus {
    /// 是否拿到了可用的原始解
    pub fn has_solution(&self) -> bool {
        matches!(self, SolverStatus::Optimal)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SolverStatus::Optimal => "optimal",
            SolverStatus::Infeasible => "infeasible",
            SolverStatus::Unbounded => "unbounded",
            SolverStatus::TimeLimit => "time_limit",
            SolverStatus::Error => "error",
            SolverStatus::Unknown => "unknown",
        }
    }
}

impl fmt::Display for SolverStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ==========================================
// 求解驱动 (Solver Driver)
// ==========================================
// auto: 先进程内求解,失败再走 highs 可执行文件
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SolverDriver {
    #[default]
    Auto,
    #[serde(alias = "appsi")]
    Native, // 进程内单纯形
    Exec,   // 外部 highs 可执行文件
}

impl SolverDriver {
    pub fn as_str(&self) -> &'static str {
        match self {
            SolverDriver::Auto => "auto",
            SolverDriver::Native => "native",
            SolverDriver::Exec => "exec",
        }
    }
}

impl fmt::Display for SolverDriver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for SolverDriver {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "auto" => Ok(SolverDriver::Auto),
            "native" | "appsi" => Ok(SolverDriver::Native),
            "exec" => Ok(SolverDriver::Exec),
            other => Err(format!("未知求解驱动: {}", other)),
        }
    }
}

// ==========================================
// 双层重构方式 (Bilevel Reformulation)
// ==========================================
// 只有 decomposition 有实际行为; kkt/bigm 仅声明
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Reformulation {
    Kkt,
    Bigm,
    #[default]
    Decomposition,
}

impl fmt::Display for Reformulation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reformulation::Kkt => write!(f, "kkt"),
            Reformulation::Bigm => write!(f, "bigm"),
            Reformulation::Decomposition => write!(f, "decomposition"),
        }
    }
}

// ==========================================
// 外部适配器模式 (Adapter Mode)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdapterMode {
    Import, // 进程内库调用
    Cli,    // 调用本地可执行文件并解析 JSON
}

impl fmt::Display for AdapterMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AdapterMode::Import => write!(f, "import"),
            AdapterMode::Cli => write!(f, "cli"),
        }
    }
}

impl FromStr for AdapterMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "import" => Ok(AdapterMode::Import),
            "cli" => Ok(AdapterMode::Cli),
            other => Err(format!("未知适配器模式: {}", other)),
        }
    }
}

// ==========================================
// 承诺提取方式 (Extraction Mode)
// ==========================================
// PooledFallback 是显式降级路径,测试需能区分
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionMode {
    PerStratum,     // 按林分逐一承诺
    PooledFallback, // 仅有汇总体积, 记为 ALL
    Empty,          // 本期无承诺
}

impl fmt::Display for ExtractionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExtractionMode::PerStratum => write!(f, "per_stratum"),
            ExtractionMode::PooledFallback => write!(f, "pooled_fallback"),
            ExtractionMode::Empty => write!(f, "empty"),
        }
    }
}

// ==========================================
// 仿真告警类型 (Warning Kind)
// ==========================================
// 仅提示,不中断运行
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WarningKind {
    Feasibility,         // 均衡流要求超过可用蓄积
    ConstraintViolation, // 承诺体积超过物理产能
    SolverFailure,       // 求解未得到最优解
    AdapterUnavailable,  // 外部适配器不可用
}

impl fmt::Display for WarningKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WarningKind::Feasibility => write!(f, "FEASIBILITY"),
            WarningKind::ConstraintViolation => write!(f, "CONSTRAINT_VIOLATION"),
            WarningKind::SolverFailure => write!(f, "SOLVER_FAILURE"),
            WarningKind::AdapterUnavailable => write!(f, "ADAPTER_UNAVAILABLE"),
        }
    }
}

/// 仿真告警（记录到窗口轨迹）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimWarning {
    pub kind: WarningKind,
    pub period: u32,
    pub message: String,
}

impl SimWarning {
    pub fn new(kind: WarningKind, period: u32, message: impl Into<String>) -> Self {
        Self {
            kind,
            period,
            message: message.into(),
        }
    }
}
