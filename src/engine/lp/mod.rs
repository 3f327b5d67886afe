// ==========================================
// PAWS 木材供应仿真系统 - 线性规划求解边界
// ==========================================
// 职责: LP 模型表示 + 求解驱动选择
// 驱动: native (进程内单纯形) / exec (highs 可执行文件)
// 红线: 求解器缺失或失败只体现为 SolverStatus, 不 panic 不返回错误
// ==========================================

pub mod highs_exec;
pub mod simplex;

use crate::config::SolverConfig;
use crate::domain::types::{SolverDriver, SolverStatus};
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, warn};

// ==========================================
// 模型表示
// ==========================================

/// 变量下标（所有变量隐含 >= 0）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VarId(pub usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sense {
    Le,
    Ge,
    Eq,
}

impl Sense {
    pub fn as_lp_str(&self) -> &'static str {
        match self {
            Sense::Le => "<=",
            Sense::Ge => ">=",
            Sense::Eq => "=",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Direction {
    #[default]
    Minimize,
    Maximize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Constraint {
    pub name: String,
    pub terms: Vec<(VarId, f64)>,
    pub sense: Sense,
    pub rhs: f64,
}

/// 线性规划: min/max c·x, s.t. A x (<=|>=|=) b, x >= 0
#[derive(Debug, Clone, Default)]
pub struct LinearProgram {
    var_names: Vec<String>,
    direction: Direction,
    objective: Vec<(VarId, f64)>,
    constraints: Vec<Constraint>,
}

impl LinearProgram {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_var(&mut self, name: impl Into<String>) -> VarId {
        self.var_names.push(name.into());
        VarId(self.var_names.len() - 1)
    }

    pub fn add_constraint(
        &mut self,
        name: impl Into<String>,
        terms: Vec<(VarId, f64)>,
        sense: Sense,
        rhs: f64,
    ) {
        self.constraints.push(Constraint {
            name: name.into(),
            terms,
            sense,
            rhs,
        });
    }

    pub fn set_objective(&mut self, direction: Direction, terms: Vec<(VarId, f64)>) {
        self.direction = direction;
        self.objective = terms;
    }

    pub fn num_vars(&self) -> usize {
        self.var_names.len()
    }

    pub fn var_name(&self, var: VarId) -> &str {
        &self.var_names[var.0]
    }

    pub fn var_names(&self) -> &[String] {
        &self.var_names
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn objective(&self) -> &[(VarId, f64)] {
        &self.objective
    }

    pub fn constraints(&self) -> &[Constraint] {
        &self.constraints
    }

    /// 按给定取值计算目标函数
    pub fn evaluate(&self, values: &[f64]) -> f64 {
        self.objective
            .iter()
            .map(|(v, c)| c * values.get(v.0).copied().unwrap_or(0.0))
            .sum()
    }
}

// ==========================================
// 求解结果
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SolveOutcome {
    pub status: SolverStatus,
    pub driver: SolverDriver, // 实际生效的驱动 (native/exec)
    #[serde(skip)]
    pub values: Vec<f64>, // 非最优时为空
    pub objective: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl SolveOutcome {
    pub fn failed(driver: SolverDriver, status: SolverStatus, message: impl Into<String>) -> Self {
        Self {
            status,
            driver,
            values: Vec::new(),
            objective: None,
            message: Some(message.into()),
        }
    }

    pub fn value(&self, var: VarId) -> f64 {
        self.values.get(var.0).copied().unwrap_or(0.0)
    }
}

/// 求解 LP
///
/// auto: native 返回 Error 时回退到 exec
pub fn solve(program: &LinearProgram, config: &SolverConfig) -> SolveOutcome {
    let time_limit = Duration::from_secs(config.time_limit);
    crate::perf::record_solve();

    let outcome = match config.driver {
        SolverDriver::Native => simplex::solve(program, time_limit),
        SolverDriver::Exec => highs_exec::solve(program, config),
        SolverDriver::Auto => {
            let native = simplex::solve(program, time_limit);
            if native.status == SolverStatus::Error {
                warn!(
                    reason = native.message.as_deref().unwrap_or(""),
                    executable = %config.executable,
                    "进程内求解失败, 回退到外部求解器"
                );
                highs_exec::solve(program, config)
            } else {
                native
            }
        }
    };

    debug!(
        status = %outcome.status,
        driver = %outcome.driver,
        objective = ?outcome.objective,
        vars = program.num_vars(),
        rows = program.constraints().len(),
        "LP 求解结束"
    );
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auto_driver_uses_native_when_it_works() {
        let mut lp = LinearProgram::new();
        let x = lp.add_var("x");
        lp.add_constraint("cap", vec![(x, 1.0)], Sense::Le, 4.0);
        lp.set_objective(Direction::Maximize, vec![(x, 1.0)]);

        let outcome = solve(&lp, &SolverConfig::default());
        assert_eq!(outcome.status, SolverStatus::Optimal);
        assert_eq!(outcome.driver, SolverDriver::Native);
        assert!((outcome.value(x) - 4.0).abs() < 1e-9);
    }

    #[test]
    fn test_exec_driver_missing_executable_is_error_status() {
        let mut lp = LinearProgram::new();
        let x = lp.add_var("x");
        lp.set_objective(Direction::Minimize, vec![(x, 1.0)]);

        let config = SolverConfig {
            driver: SolverDriver::Exec,
            executable: "paws-no-such-solver-binary".to_string(),
            ..SolverConfig::default()
        };
        let outcome = solve(&lp, &config);
        assert_eq!(outcome.status, SolverStatus::Error);
        assert_eq!(outcome.driver, SolverDriver::Exec);
        assert!(outcome.values.is_empty());
    }
}
