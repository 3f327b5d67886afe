// ==========================================
// PAWS 木材供应仿真系统 - 仿真配置
// ==========================================
// 职责: 时域/策略/双层/求解器/运行参数及其默认值
// 说明: 所有字段均有默认值, 配置文件可只写需要覆写的部分
// ==========================================

use crate::config::error::{ConfigError, ConfigResult};
use crate::domain::types::{AdapterMode, Reformulation, SolverDriver};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::PathBuf;

/// 一年的天数（儒略年）
const DAYS_PER_YEAR: f64 = 365.25;

// ==========================================
// PeriodLength - 期长
// ==========================================
// 数值: 年; 字符串: "<数值> <单位>" (years/months/weeks/days)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PeriodLength {
    Years(f64),
    Token(String),
}

impl Default for PeriodLength {
    fn default() -> Self {
        PeriodLength::Token("7 days".to_string())
    }
}

impl PeriodLength {
    /// 换算为每期年数
    pub fn years_per_period(&self) -> ConfigResult<f64> {
        let years = match self {
            PeriodLength::Years(v) => *v,
            PeriodLength::Token(token) => parse_period_token(token)?,
        };

        if !years.is_finite() || years <= 0.0 {
            return Err(ConfigError::InvalidPeriodLength(format!(
                "每期年数必须为正: {:?}",
                self
            )));
        }
        Ok(years)
    }
}

/// 解析 "<数值> <单位>" 或 "<数值><单位>"
fn parse_period_token(token: &str) -> ConfigResult<f64> {
    let raw = token.trim();
    let split_at = raw
        .find(|c: char| !(c.is_ascii_digit() || c == '.' || c == '-' || c == '+'))
        .unwrap_or(raw.len());
    let (number, unit) = raw.split_at(split_at);

    let magnitude: f64 = number
        .trim()
        .parse()
        .map_err(|_| ConfigError::InvalidPeriodLength(raw.to_string()))?;

    let unit = unit.trim().to_lowercase();
    let factor = match unit.as_str() {
        // 纯数值字符串按年处理
        "" | "y" | "yr" | "yrs" | "year" | "years" => 1.0,
        "mo" | "month" | "months" => 1.0 / 12.0,
        "w" | "wk" | "wks" | "week" | "weeks" => 7.0 / DAYS_PER_YEAR,
        "d" | "day" | "days" => 1.0 / DAYS_PER_YEAR,
        _ => return Err(ConfigError::InvalidPeriodUnit(unit)),
    };

    Ok(magnitude * factor)
}

// ==========================================
// HorizonConfig - 滚动时域
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HorizonConfig {
    pub period_length: PeriodLength,
    pub horizon_periods: u32, // 优化窗口期数
    pub replanning_step: u32, // 每次重规划前进期数
    pub start_period: u32,
    pub end_period: u32,
}

impl Default for HorizonConfig {
    fn default() -> Self {
        Self {
            period_length: PeriodLength::default(),
            horizon_periods: 12,
            replanning_step: 1,
            start_period: 0,
            end_period: 52,
        }
    }
}

// ==========================================
// PolicyParams - 策略参数
// ==========================================
pub type PolicyParams = BTreeMap<String, Value>;

/// 读取数值参数
pub fn param_f64(params: &PolicyParams, key: &str) -> ConfigResult<Option<f64>> {
    match params.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(v) => v.as_f64().map(Some).ok_or_else(|| ConfigError::InvalidParam {
            key: key.to_string(),
            message: format!("期望数值, 实际 {}", v),
        }),
    }
}

/// 读取字符串参数
pub fn param_str(params: &PolicyParams, key: &str) -> ConfigResult<Option<String>> {
    match params.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(v) => Err(ConfigError::InvalidParam {
            key: key.to_string(),
            message: format!("期望字符串, 实际 {}", v),
        }),
    }
}

/// 读取适配器模式参数（缺省使用 default）
pub fn param_mode(params: &PolicyParams, default: AdapterMode) -> ConfigResult<AdapterMode> {
    match param_str(params, "mode")? {
        None => Ok(default),
        Some(raw) => raw.parse().map_err(|message| ConfigError::InvalidParam {
            key: "mode".to_string(),
            message,
        }),
    }
}

// ==========================================
// PrincipalPolicyConfig - 委托方策略
// ==========================================
pub const POLICY_EVEN_FLOW: &str = "even_flow";
pub const POLICY_MAX_VOLUME: &str = "max_volume";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PrincipalPolicyConfig {
    pub name: String,
    pub params: PolicyParams,
}

impl Default for PrincipalPolicyConfig {
    fn default() -> Self {
        Self {
            name: POLICY_EVEN_FLOW.to_string(),
            params: PolicyParams::new(),
        }
    }
}

impl PrincipalPolicyConfig {
    /// 是否为进程内 LP 策略（非外部仿真器）
    pub fn is_builtin(&self) -> bool {
        matches!(self.name.as_str(), POLICY_EVEN_FLOW | POLICY_MAX_VOLUME)
    }

    pub fn is_even_flow(&self) -> bool {
        self.name == POLICY_EVEN_FLOW
    }

    /// 均衡流下限（仅正值生效）
    pub fn even_flow_min_vol(&self) -> ConfigResult<Option<f64>> {
        if !self.is_even_flow() {
            return Ok(None);
        }
        Ok(param_f64(&self.params, "min_vol")?.filter(|v| *v > 0.0))
    }
}

// ==========================================
// AgentBehaviorConfig - 代理行为
// ==========================================
pub const AGENT_DEFAULT_STUB: &str = "profit_max_flow_stub";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentBehaviorConfig {
    pub name: String,
    pub params: PolicyParams,
}

impl Default for AgentBehaviorConfig {
    fn default() -> Self {
        Self {
            name: AGENT_DEFAULT_STUB.to_string(),
            params: PolicyParams::new(),
        }
    }
}

// ==========================================
// BilevelConfig - 双层分解
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CutGeneratorKind {
    #[default]
    None,
    VolumeCap, // 下层实现量低于承诺时, 收紧首期体积上限
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BilevelConfig {
    pub enabled: bool,
    pub reformulation: Reformulation,
    pub max_iters: u32,
    pub tolerance: f64,
    pub cut_generator: CutGeneratorKind,
}

impl Default for BilevelConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            reformulation: Reformulation::Decomposition,
            max_iters: 1,
            tolerance: 1e-6,
            cut_generator: CutGeneratorKind::None,
        }
    }
}

// ==========================================
// SolverConfig - 求解器
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverConfig {
    pub driver: SolverDriver,
    pub time_limit: u64, // 秒
    pub mip_gap: Option<f64>,
    pub executable: String, // exec 驱动调用的可执行文件
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            driver: SolverDriver::Auto,
            time_limit: 120,
            mip_gap: None,
            executable: "highs".to_string(),
        }
    }
}

// ==========================================
// RunConfig - 运行参数
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogLevel {
    Debug,
    #[default]
    Info,
    Warning,
}

impl LogLevel {
    /// 对应 tracing EnvFilter 指令
    pub fn as_filter(&self) -> &'static str {
        match self {
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warning => "warn",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    pub random_seed: u64,
    pub log_level: LogLevel,
    pub out_dir: Option<PathBuf>,
    pub adapter_timeout_secs: u64,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            random_seed: 42,
            log_level: LogLevel::Info,
            out_dir: Some(PathBuf::from("runs/default")),
            adapter_timeout_secs: 300,
        }
    }
}

// ==========================================
// SimConfig - 仿真总配置
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    pub data_path: PathBuf,
    pub horizon: HorizonConfig,
    pub principal_policy: PrincipalPolicyConfig,
    pub agent_behavior: AgentBehaviorConfig,
    pub bilevel: BilevelConfig,
    pub solver: SolverConfig,
    pub run: RunConfig,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            data_path: PathBuf::from("data/minimal"),
            horizon: HorizonConfig::default(),
            principal_policy: PrincipalPolicyConfig::default(),
            agent_behavior: AgentBehaviorConfig::default(),
            bilevel: BilevelConfig::default(),
            solver: SolverConfig::default(),
            run: RunConfig::default(),
        }
    }
}

impl SimConfig {
    /// 校验配置（不涉及插件注册表）
    ///
    /// start_period > end_period 返回 InvalidHorizon;
    /// start_period == end_period 合法, 仿真 0 个窗口
    ///
    /// # 返回
    /// - Ok(years_per_period)
    /// - Err(ConfigError): 任一校验失败
    pub fn validate(&self) -> ConfigResult<f64> {
        let h = &self.horizon;
        let years_per_period = h.period_length.years_per_period()?;

        if h.horizon_periods == 0 {
            return Err(ConfigError::InvalidHorizon(
                "horizon_periods 必须大于 0".to_string(),
            ));
        }
        if h.replanning_step == 0 {
            return Err(ConfigError::InvalidHorizon(
                "replanning_step 必须大于 0".to_string(),
            ));
        }
        // 起止期倒置视为配置错误, 不静默跑 0 个窗口
        if h.start_period > h.end_period {
            return Err(ConfigError::InvalidHorizon(format!(
                "start_period ({}) 大于 end_period ({})",
                h.start_period, h.end_period
            )));
        }

        if self.solver.time_limit == 0 {
            return Err(ConfigError::InvalidSolver("time_limit 必须大于 0".to_string()));
        }
        if let Some(gap) = self.solver.mip_gap {
            if !(0.0..=1.0).contains(&gap) {
                return Err(ConfigError::InvalidSolver(format!(
                    "mip_gap 超出范围 [0, 1]: {}",
                    gap
                )));
            }
        }

        if self.bilevel.max_iters == 0 {
            return Err(ConfigError::InvalidBilevel("max_iters 必须大于 0".to_string()));
        }
        if !(self.bilevel.tolerance >= 0.0) {
            return Err(ConfigError::InvalidBilevel(format!(
                "tolerance 必须非负: {}",
                self.bilevel.tolerance
            )));
        }

        // 参数类型提前暴露
        self.principal_policy.even_flow_min_vol()?;

        Ok(years_per_period)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_period_length_numeric_years() {
        assert_eq!(PeriodLength::Years(5.0).years_per_period().unwrap(), 5.0);
    }

    #[test]
    fn test_period_length_tokens() {
        let cases = [
            ("1 year", 1.0),
            ("10 years", 10.0),
            ("6 months", 0.5),
            ("2mo", 2.0 / 12.0),
            ("7 days", 7.0 / 365.25),
            ("1 week", 7.0 / 365.25),
            ("3", 3.0),
        ];
        for (token, expected) in cases {
            let ypp = PeriodLength::Token(token.to_string())
                .years_per_period()
                .unwrap();
            assert!((ypp - expected).abs() < 1e-12, "{} -> {}", token, ypp);
        }
    }

    #[test]
    fn test_period_length_unknown_unit() {
        let err = PeriodLength::Token("3 fortnights".to_string())
            .years_per_period()
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidPeriodUnit(u) if u == "fortnights"));
    }

    #[test]
    fn test_period_length_non_positive() {
        assert!(PeriodLength::Years(0.0).years_per_period().is_err());
        assert!(PeriodLength::Token("-1 years".to_string())
            .years_per_period()
            .is_err());
    }

    #[test]
    fn test_default_config_is_valid() {
        let cfg = SimConfig::default();
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.horizon.horizon_periods, 12);
        assert_eq!(cfg.bilevel.max_iters, 1);
        assert!(cfg.principal_policy.is_builtin());
    }

    #[test]
    fn test_zero_step_rejected() {
        let mut cfg = SimConfig::default();
        cfg.horizon.replanning_step = 0;
        assert!(matches!(cfg.validate(), Err(ConfigError::InvalidHorizon(_))));
    }

    #[test]
    fn test_inverted_period_range_rejected() {
        let mut cfg = SimConfig::default();
        cfg.horizon.start_period = 5;
        cfg.horizon.end_period = 2;
        assert!(matches!(cfg.validate(), Err(ConfigError::InvalidHorizon(_))));

        cfg.horizon.end_period = 5;
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_even_flow_min_vol_param() {
        let mut policy = PrincipalPolicyConfig::default();
        assert_eq!(policy.even_flow_min_vol().unwrap(), None);

        policy.params.insert("min_vol".to_string(), serde_json::json!(50.0));
        assert_eq!(policy.even_flow_min_vol().unwrap(), Some(50.0));

        policy.params.insert("min_vol".to_string(), serde_json::json!("lots"));
        assert!(policy.even_flow_min_vol().is_err());

        policy.name = POLICY_MAX_VOLUME.to_string();
        assert_eq!(policy.even_flow_min_vol().unwrap(), None);
    }
}
