// ==========================================
// PAWS 木材供应仿真系统 - 滚动时域调度器
// ==========================================
// 循环: while t < t_end
//   a. 构建并求解窗口 [t, t+H) 上层模型
//   b. 外部委托方仿真器: 状态快照 -> 决策 -> 代理请求 -> 配置的代理
//   c. 否则: 进程内默认代理直接响应上层结果
//   d. 双层模式: 同一窗口运行分解循环
//   e. t += replanning_step
// 红线: 窗口严格串行; t 与统计量只由调度器持有
// ==========================================

use crate::config::{ConfigError, SimConfig};
use crate::domain::commitment::{
    AgentRequest, AgentResponse, CommitmentSet, InventoryHint, PrincipalDecision, PrincipalState,
};
use crate::domain::forest::{PlanningData, ProblemData};
use crate::domain::types::{ExtractionMode, SimWarning, SolverDriver, SolverStatus, WarningKind};
use crate::engine::agent::ProfitMaxFlowStub;
use crate::engine::bilevel::{BilevelReport, BilevelSolver};
use crate::engine::commitment_extractor::extract;
use crate::engine::error::{SimError, SimResult};
use crate::engine::plugin::{OperationsAgent, PluginArgs, PrincipalEmulator};
use crate::engine::principal_model::PrincipalModelBuilder;
use crate::engine::registry::PluginRegistry;
use crate::engine::yield_expansion;
use crate::perf::PerfGuard;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};
use uuid::Uuid;

pub const RUN_SUMMARY_FILE: &str = "run_summary.json";

// ==========================================
// SimState - 调度状态
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SimState {
    pub t0: u32,
    pub t_end: u32,
    pub t: u32,
}

impl SimState {
    pub fn new(t0: u32, t_end: u32) -> Self {
        Self { t0, t_end, t: t0 }
    }

    pub fn is_finished(&self) -> bool {
        self.t >= self.t_end
    }

    pub fn advance(&mut self, step: u32) {
        self.t = self.t.saturating_add(step);
    }
}

// ==========================================
// RunStats - 累计统计（只增不减）
// ==========================================
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RunStats {
    pub windows: u32,
    pub optimal_windows: u32,
    pub solver_failures: u32,
    pub total_committed: f64,
    pub total_realized: f64,
    pub pooled_fallbacks: u32,
    pub bilevel_runs: u32,
    pub warnings: BTreeMap<WarningKind, u32>,
}

impl RunStats {
    fn record(&mut self, window: &WindowRecord) {
        self.windows += 1;
        if window.status.has_solution() {
            self.optimal_windows += 1;
        } else {
            self.solver_failures += 1;
        }
        self.total_committed += window.commitments.total();
        self.total_realized += window
            .agent_response
            .as_ref()
            .and_then(AgentResponse::realized_volume)
            .unwrap_or(0.0);
        if window.extraction_mode == ExtractionMode::PooledFallback {
            self.pooled_fallbacks += 1;
        }
        if window.bilevel.is_some() {
            self.bilevel_runs += 1;
        }
        for w in &window.warnings {
            *self.warnings.entry(w.kind).or_insert(0) += 1;
        }
    }

    pub fn warning_count(&self, kind: WarningKind) -> u32 {
        self.warnings.get(&kind).copied().unwrap_or(0)
    }
}

// ==========================================
// WindowRecord - 单窗口轨迹
// ==========================================
#[derive(Debug, Clone, Serialize)]
pub struct WindowRecord {
    pub t0: u32,
    pub horizon: u32,
    pub status: SolverStatus,
    pub driver: SolverDriver,
    pub objective_value: Option<f64>,
    pub extraction_mode: ExtractionMode,
    pub commitments: CommitmentSet,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub principal_decision: Option<PrincipalDecision>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agent_response: Option<AgentResponse>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bilevel: Option<BilevelReport>,
    pub warnings: Vec<SimWarning>,
}

// ==========================================
// RunReport - 运行结果
// ==========================================
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub status: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub start_period: u32,
    pub end_period: u32,
    pub years_per_period: f64,
    pub principal_policy: String,
    pub agent_behavior: String,
    pub bilevel_enabled: bool,
    pub stats: RunStats,
    pub windows: Vec<WindowRecord>,
}

impl RunReport {
    /// 实际访问的窗口起始期
    pub fn periods_visited(&self) -> Vec<u32> {
        self.windows.iter().map(|w| w.t0).collect()
    }
}

// ==========================================
// RollingHorizonSimulator
// ==========================================
pub struct RollingHorizonSimulator {
    config: SimConfig,
    data: PlanningData,
    years_per_period: f64,
    builder: PrincipalModelBuilder,
    principal: Option<Box<dyn PrincipalEmulator>>,
    agent: Box<dyn OperationsAgent>,
    fallback_agent: ProfitMaxFlowStub,
}

impl RollingHorizonSimulator {
    /// 校验配置、展开收获表、构造插件
    ///
    /// # 返回
    /// - Err(SimError): 配置/注册表错误（任何求解之前）
    pub fn new(
        config: SimConfig,
        problem: ProblemData,
        registry: &PluginRegistry,
    ) -> SimResult<Self> {
        let years_per_period = config.validate()?;

        let principal_name = &config.principal_policy.name;
        if !config.principal_policy.is_builtin() && !registry.contains_principal(principal_name) {
            return Err(ConfigError::UnknownPrincipalPolicy(principal_name.clone()).into());
        }
        let agent_name = &config.agent_behavior.name;
        if !registry.contains_agent(agent_name) {
            return Err(ConfigError::UnknownAgentBehavior(agent_name.clone()).into());
        }

        let timeout = Duration::from_secs(config.run.adapter_timeout_secs);
        let principal = if config.principal_policy.is_builtin() {
            None
        } else {
            let args = PluginArgs::new(&config.principal_policy.params, timeout);
            Some(registry.create_principal(principal_name, &args)?)
        };
        let agent = registry.create_agent(
            agent_name,
            &PluginArgs::new(&config.agent_behavior.params, timeout),
        )?;

        let builder = PrincipalModelBuilder::from_config(&config)?;

        let h = &config.horizon;
        let yields = yield_expansion::expand_with_ypp(
            &problem.yields,
            &problem.strata,
            h.end_period,
            h.horizon_periods,
            years_per_period,
        );
        let data = PlanningData {
            strata: problem.strata,
            yields,
            demand: problem.demand,
            prices: problem.prices,
            costs: problem.costs,
        };

        Ok(Self {
            config,
            data,
            years_per_period,
            builder,
            principal,
            agent,
            fallback_agent: ProfitMaxFlowStub::new(),
        })
    }

    pub fn data(&self) -> &PlanningData {
        &self.data
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    /// 执行滚动时域仿真
    pub async fn run(&self) -> SimResult<RunReport> {
        let started_at = Utc::now();
        let run_id = Uuid::new_v4();
        let h = &self.config.horizon;
        let mut state = SimState::new(h.start_period, h.end_period);
        let mut stats = RunStats::default();
        let mut windows = Vec::new();

        info!(
            %run_id,
            t0 = state.t0,
            t_end = state.t_end,
            horizon = h.horizon_periods,
            step = h.replanning_step,
            years_per_period = self.years_per_period,
            principal = %self.config.principal_policy.name,
            agent = self.agent.name(),
            bilevel = self.config.bilevel.enabled,
            "开始滚动时域仿真"
        );

        while !state.is_finished() {
            let record = self.run_window(state.t).await;
            stats.record(&record);
            windows.push(record);
            state.advance(h.replanning_step);
        }

        let report = RunReport {
            run_id,
            status: "ok".to_string(),
            started_at,
            finished_at: Utc::now(),
            start_period: h.start_period,
            end_period: h.end_period,
            years_per_period: self.years_per_period,
            principal_policy: self.config.principal_policy.name.clone(),
            agent_behavior: self.config.agent_behavior.name.clone(),
            bilevel_enabled: self.config.bilevel.enabled,
            stats,
            windows,
        };

        if let Some(dir) = &self.config.run.out_dir {
            let path = write_run_summary(dir, &report)?;
            info!(path = %path.display(), "运行摘要已写出");
        }

        info!(
            %run_id,
            windows = report.stats.windows,
            optimal = report.stats.optimal_windows,
            committed = report.stats.total_committed,
            "仿真完成"
        );
        Ok(report)
    }

    async fn run_window(&self, t: u32) -> WindowRecord {
        let horizon = self.config.horizon.horizon_periods;
        info!(t0 = t, t_last = window_last_period(t, horizon), "重规划窗口");

        // a) 上层模型（计时不跨 await）
        let (result, mut extraction) = {
            let _perf = PerfGuard::new("window_solve").with_period(t);
            let result = self.builder.build(&self.data, t, horizon);
            let extraction = extract(&result, &self.data, t);
            (result, extraction)
        };
        let mut warnings = result.warnings.clone();

        // b/c) 首期承诺分派
        let (principal_decision, agent_response) = match &self.principal {
            Some(emulator) => {
                let snapshot = self.principal_state(t);
                let decision = emulator.plan_first_period(&snapshot).await;
                if let Some(reason) = &decision.warning {
                    warnings.push(SimWarning::new(
                        WarningKind::AdapterUnavailable,
                        t,
                        format!("{}: {}", emulator.name(), reason),
                    ));
                }
                let request = AgentRequest::from_commitments(t, decision.commitments.clone());
                let response = self.agent.schedule_first_period(&request, &self.data).await;
                (Some(decision), response)
            }
            None => {
                let request = AgentRequest::from_commitments(t, extraction.commitments.clone());
                let response = self.fallback_agent.respond(&request, &self.data);
                (None, response)
            }
        };

        if let Some(reason) = agent_response.unavailable_reason() {
            warn!(t0 = t, agent = self.agent.name(), %reason, "代理不可用");
            warnings.push(SimWarning::new(
                WarningKind::AdapterUnavailable,
                t,
                format!("{}: {}", self.agent.name(), reason),
            ));
        }

        // d) 双层分解
        let mut status = result.status;
        let mut driver = result.driver;
        let mut objective_value = result.objective_value;
        let bilevel = if self.config.bilevel.enabled {
            let solver = BilevelSolver::new(&self.config.bilevel, self.builder.solver());
            let (report, final_result) = solver
                .run(result, &self.data, Some(self.agent.as_ref()), t)
                .await;
            status = final_result.status;
            driver = final_result.driver;
            objective_value = final_result.objective_value;
            extraction = extract(&final_result, &self.data, t);
            warnings.extend(report.warnings.iter().cloned());
            Some(report)
        } else {
            None
        };

        info!(
            t0 = t,
            status = %status,
            mode = %extraction.mode,
            committed = extraction.total(),
            realized = ?agent_response.realized_volume(),
            warnings = warnings.len(),
            "窗口完成"
        );

        WindowRecord {
            t0: t,
            horizon,
            status,
            driver,
            objective_value,
            extraction_mode: extraction.mode,
            commitments: extraction.commitments,
            principal_decision,
            agent_response: Some(agent_response),
            bilevel,
            warnings,
        }
    }

    /// 外部仿真器状态快照 {period, inventory: {s: {area, yield_p1}}}
    pub fn principal_state(&self, period: u32) -> PrincipalState {
        PrincipalState {
            period,
            inventory: self
                .data
                .strata
                .values()
                .map(|s| {
                    (
                        s.id.clone(),
                        InventoryHint {
                            area: s.area,
                            yield_p1: self.data.yield_at(&s.id, period),
                        },
                    )
                })
                .collect(),
        }
    }
}

/// 窗口最后一期 (t0 + horizon - 1, 饱和运算)
fn window_last_period(t0: u32, horizon: u32) -> u32 {
    t0.saturating_add(horizon).saturating_sub(1)
}

/// 写出 run_summary.json
pub fn write_run_summary(dir: &Path, report: &RunReport) -> SimResult<PathBuf> {
    let path = dir.join(RUN_SUMMARY_FILE);
    let output_error = |message: String| SimError::Output {
        path: path.display().to_string(),
        message,
    };

    fs::create_dir_all(dir).map_err(|e| output_error(e.to_string()))?;
    let body = serde_json::to_string_pretty(report).map_err(|e| output_error(e.to_string()))?;
    fs::write(&path, body).map_err(|e| output_error(e.to_string()))?;
    Ok(path)
}
