// ==========================================
// PAWS 木材供应仿真系统 - 双层分解循环
// ==========================================
// 每轮: 提取承诺 -> 产能检查 -> 分派下层 -> (可选) 生成割并重解
// 终止: 无下层 / 无割接受 / 承诺总量收敛 / 达到 max_iters
// 说明: 仅 decomposition 有实际行为, kkt / bigm 为空操作
// ==========================================

use crate::config::{BilevelConfig, CutGeneratorKind, SolverConfig};
use crate::domain::commitment::{AgentRequest, AgentResponse, CommitmentSet};
use crate::domain::forest::PlanningData;
use crate::domain::types::{ExtractionMode, Reformulation, SimWarning, WarningKind};
use crate::engine::commitment_extractor::{extract, Extraction};
use crate::engine::plugin::OperationsAgent;
use crate::engine::principal_model::{Cut, ModelResult};
use serde::Serialize;
use tracing::{debug, info, warn};

/// 产能检查容差 (m³)
pub const CAPACITY_TOLERANCE: f64 = 1e-6;

// ==========================================
// DecompositionOutcome - 终止原因
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DecompositionOutcome {
    NotImplemented, // kkt / bigm
    NoLowerLevel,   // 无外部下层或下层不可用
    Accepted,       // 无割, 接受下层响应
    Converged,      // 相邻两轮承诺总量差 <= tolerance
    CutInfeasible,  // 加割后上层无解, 保留上一轮可行解
    MaxIterations,
}

#[derive(Debug, Clone, Serialize)]
pub struct BilevelIteration {
    pub iteration: u32,
    pub committed: f64,
    pub extraction_mode: ExtractionMode,
    pub realized: Option<f64>,
    pub cut: Option<Cut>,
}

#[derive(Debug, Clone, Serialize)]
pub struct BilevelReport {
    pub reformulation: Reformulation,
    pub outcome: DecompositionOutcome,
    pub iterations: Vec<BilevelIteration>,
    pub commitments: CommitmentSet,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agent_response: Option<AgentResponse>,
    pub warnings: Vec<SimWarning>,
}

// ==========================================
// CutGenerator Trait
// ==========================================
pub trait CutGenerator: Send + Sync {
    fn name(&self) -> &str;

    /// 比较上层承诺与下层响应, 需要时返回一条割
    fn generate(
        &self,
        extraction: &Extraction,
        response: &AgentResponse,
        t0: u32,
        tolerance: f64,
    ) -> Option<Cut>;
}

/// 实现量低于承诺时, 将首期体积上限收紧到实现量
#[derive(Debug, Clone, Copy, Default)]
pub struct VolumeCapCut;

impl CutGenerator for VolumeCapCut {
    fn name(&self) -> &str {
        "volume_cap"
    }

    fn generate(
        &self,
        extraction: &Extraction,
        response: &AgentResponse,
        t0: u32,
        tolerance: f64,
    ) -> Option<Cut> {
        let realized = response.realized_volume()?;
        if realized < extraction.total() - tolerance {
            Some(Cut::VolumeCap {
                period: t0,
                max_vol: realized.max(0.0),
            })
        } else {
            None
        }
    }
}

pub fn cut_generator_for(kind: CutGeneratorKind) -> Option<Box<dyn CutGenerator>> {
    match kind {
        CutGeneratorKind::None => None,
        CutGeneratorKind::VolumeCap => Some(Box::new(VolumeCapCut)),
    }
}

// ==========================================
// BilevelSolver
// ==========================================
pub struct BilevelSolver {
    config: BilevelConfig,
    solver: SolverConfig,
    cut_generator: Option<Box<dyn CutGenerator>>,
}

impl BilevelSolver {
    pub fn new(config: &BilevelConfig, solver: &SolverConfig) -> Self {
        Self {
            config: config.clone(),
            solver: solver.clone(),
            cut_generator: cut_generator_for(config.cut_generator),
        }
    }

    /// 替换割生成器
    pub fn with_cut_generator(mut self, generator: Box<dyn CutGenerator>) -> Self {
        self.cut_generator = Some(generator);
        self
    }

    /// 在同一窗口上运行分解循环
    ///
    /// # 返回
    /// - (报告, 最终上层快照)
    pub async fn run(
        &self,
        result: ModelResult,
        data: &PlanningData,
        agent: Option<&dyn OperationsAgent>,
        t0: u32,
    ) -> (BilevelReport, ModelResult) {
        let mut report = BilevelReport {
            reformulation: self.config.reformulation,
            outcome: DecompositionOutcome::MaxIterations,
            iterations: Vec::new(),
            commitments: CommitmentSet::new(),
            agent_response: None,
            warnings: Vec::new(),
        };

        if self.config.reformulation != Reformulation::Decomposition {
            info!(
                reformulation = %self.config.reformulation,
                t0,
                "双层重构方式尚未实现, 跳过"
            );
            report.outcome = DecompositionOutcome::NotImplemented;
            report.commitments = extract(&result, data, t0).commitments;
            return (report, result);
        }

        let mut current = result;
        let mut previous_total: Option<f64> = None;

        for iteration in 0..self.config.max_iters {
            // 1) 提取承诺
            let extraction = extract(&current, data, t0);
            let committed = extraction.total();
            report.commitments = extraction.commitments.clone();

            // 2) 产能检查
            let capacity = data.capacity(t0);
            if committed > capacity + CAPACITY_TOLERANCE {
                let message = format!(
                    "第 {} 期承诺 {:.6} m³ 超过物理产能 {:.6} m³",
                    t0, committed, capacity
                );
                warn!(t0, committed, capacity, "{}", message);
                report
                    .warnings
                    .push(SimWarning::new(WarningKind::ConstraintViolation, t0, message));
            }

            let mut record = BilevelIteration {
                iteration,
                committed,
                extraction_mode: extraction.mode,
                realized: None,
                cut: None,
            };

            // 收敛判定
            if let Some(previous) = previous_total {
                if (committed - previous).abs() <= self.config.tolerance {
                    debug!(t0, iteration, committed, previous, "承诺总量收敛");
                    report.iterations.push(record);
                    report.outcome = DecompositionOutcome::Converged;
                    break;
                }
            }
            previous_total = Some(committed);

            // 3) 分派下层
            let Some(agent) = agent.filter(|a| a.is_external()) else {
                debug!(t0, iteration, "未配置外部下层, 上层结果直接生效");
                report.iterations.push(record);
                report.outcome = DecompositionOutcome::NoLowerLevel;
                break;
            };

            let request = AgentRequest::from_commitments(t0, extraction.commitments.clone());
            let response = agent.schedule_first_period(&request, data).await;

            if let Some(reason) = response.unavailable_reason() {
                warn!(t0, iteration, agent = agent.name(), %reason, "下层不可用, 视为无下层");
                report.warnings.push(SimWarning::new(
                    WarningKind::AdapterUnavailable,
                    t0,
                    format!("{}: {}", agent.name(), reason),
                ));
                report.iterations.push(record);
                report.agent_response = Some(response);
                report.outcome = DecompositionOutcome::NoLowerLevel;
                break;
            }

            // 4) 记录下层结果; 生成割
            record.realized = response.realized_volume();
            info!(
                t0,
                iteration,
                agent = agent.name(),
                committed,
                realized = ?record.realized,
                summary = %serde_json::Value::Object(response.summary.clone()),
                "下层响应"
            );

            let cut = self.cut_generator.as_ref().and_then(|g| {
                g.generate(&extraction, &response, t0, self.config.tolerance)
            });
            report.agent_response = Some(response);

            let Some(cut) = cut else {
                report.iterations.push(record);
                report.outcome = DecompositionOutcome::Accepted;
                break;
            };

            record.cut = Some(cut.clone());
            report.iterations.push(record);

            let mut model = current.model().clone();
            model.add_cut(cut);
            let resolved = model.solve(&self.solver);
            report.warnings.extend(resolved.warnings.iter().cloned());
            if !resolved.is_optimal() {
                warn!(
                    t0,
                    iteration,
                    status = %resolved.status,
                    "加割后上层无解, 保留上一轮解"
                );
                report.outcome = DecompositionOutcome::CutInfeasible;
                break;
            }
            current = resolved;
        }

        // 承诺集合与返回的上层快照一致
        report.commitments = extract(&current, data, t0).commitments;

        info!(
            t0,
            outcome = ?report.outcome,
            iterations = report.iterations.len(),
            committed = report.commitments.total(),
            "双层分解结束"
        );
        (report, current)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{SimConfig, POLICY_EVEN_FLOW, POLICY_MAX_VOLUME};
    use crate::domain::forest::{AbsoluteYieldTable, Stratum};
    use crate::domain::types::SolverDriver;
    use crate::engine::agent::ProfitMaxFlowStub;
    use crate::engine::principal_model::build;
    use async_trait::async_trait;
    use serde_json::{json, Map};
    use std::collections::BTreeMap;

    /// 外部下层: 固定实现量
    struct FixedAgent(f64);

    #[async_trait]
    impl OperationsAgent for FixedAgent {
        fn name(&self) -> &str {
            "fixed"
        }

        fn is_external(&self) -> bool {
            true
        }

        async fn schedule_first_period(
            &self,
            request: &AgentRequest,
            _data: &PlanningData,
        ) -> AgentResponse {
            let realized = self.0.min(request.requested_volume());
            let mut summary = Map::new();
            summary.insert("realized_volume".to_string(), json!(realized));
            AgentResponse {
                period: request.period,
                summary,
                schedule: Vec::new(),
            }
        }
    }

    fn data() -> PlanningData {
        let mut yields = AbsoluteYieldTable::with_last_period(2);
        for t in 0..=2 {
            yields.insert("S1", t, 2.0);
        }
        PlanningData {
            strata: BTreeMap::from([("S1".to_string(), Stratum::new("S1", 100.0, "PINE", 0))]),
            yields,
            demand: Vec::new(),
            prices: BTreeMap::new(),
            costs: BTreeMap::new(),
        }
    }

    fn config(max_iters: u32, cut: CutGeneratorKind) -> SimConfig {
        let mut cfg = SimConfig::default();
        cfg.principal_policy.name = POLICY_MAX_VOLUME.to_string();
        cfg.solver.driver = SolverDriver::Native;
        cfg.bilevel.enabled = true;
        cfg.bilevel.max_iters = max_iters;
        cfg.bilevel.cut_generator = cut;
        cfg
    }

    #[tokio::test]
    async fn test_no_external_agent_stops_at_iteration_zero() {
        let cfg = config(5, CutGeneratorKind::None);
        let d = data();
        let result = build(&d, &cfg, 0, 1).unwrap();
        let stub = ProfitMaxFlowStub::new();

        let solver = BilevelSolver::new(&cfg.bilevel, &cfg.solver);
        let (report, _) = solver.run(result, &d, Some(&stub), 0).await;

        assert_eq!(report.outcome, DecompositionOutcome::NoLowerLevel);
        assert_eq!(report.iterations.len(), 1);
        assert!((report.commitments.total() - 200.0).abs() < 1e-6);
    }

    #[tokio::test]
    async fn test_accept_without_cut_generator() {
        let cfg = config(5, CutGeneratorKind::None);
        let d = data();
        let result = build(&d, &cfg, 0, 1).unwrap();

        let solver = BilevelSolver::new(&cfg.bilevel, &cfg.solver);
        let (report, _) = solver.run(result, &d, Some(&FixedAgent(80.0)), 0).await;

        assert_eq!(report.outcome, DecompositionOutcome::Accepted);
        assert_eq!(report.iterations.len(), 1);
        assert_eq!(report.iterations[0].realized, Some(80.0));
    }

    #[tokio::test]
    async fn test_volume_cap_cut_converges() {
        let cfg = config(5, CutGeneratorKind::VolumeCap);
        let d = data();
        let result = build(&d, &cfg, 0, 1).unwrap();

        let solver = BilevelSolver::new(&cfg.bilevel, &cfg.solver);
        let (report, final_result) = solver.run(result, &d, Some(&FixedAgent(80.0)), 0).await;

        // 第 0 轮: 200 > 80 加割; 第 1 轮: 80, 下层全部兑现 -> 接受
        assert_eq!(report.outcome, DecompositionOutcome::Accepted);
        assert_eq!(report.iterations.len(), 2);
        assert!(report.iterations[0].cut.is_some());
        assert!((final_result.volume_value(0) - 80.0).abs() < 1e-6);
        assert_eq!(final_result.model().cuts().len(), 1);
    }

    #[tokio::test]
    async fn test_max_iterations_reached() {
        let cfg = config(1, CutGeneratorKind::VolumeCap);
        let d = data();
        let result = build(&d, &cfg, 0, 1).unwrap();

        let solver = BilevelSolver::new(&cfg.bilevel, &cfg.solver);
        let (report, final_result) = solver.run(result, &d, Some(&FixedAgent(80.0)), 0).await;
        assert_eq!(report.outcome, DecompositionOutcome::MaxIterations);
        assert_eq!(report.iterations.len(), 1);

        // 最后一轮加割重解后, 报告承诺取自重解结果
        let expected = extract(&final_result, &d, 0).commitments;
        assert!((final_result.volume_value(0) - 80.0).abs() < 1e-6);
        assert!((report.commitments.total() - 80.0).abs() < 1e-6);
        assert_eq!(report.commitments, expected);
    }

    #[tokio::test]
    async fn test_infeasible_cut_keeps_last_feasible_solution() {
        let mut cfg = config(3, CutGeneratorKind::VolumeCap);
        cfg.principal_policy.name = POLICY_EVEN_FLOW.to_string();
        cfg.principal_policy
            .params
            .insert("min_vol".to_string(), json!(150.0));
        let d = data();
        let result = build(&d, &cfg, 0, 1).unwrap();
        assert!((result.volume_value(0) - 150.0).abs() < 1e-6);

        // vol[0] >= 150 与割 vol[0] <= 80 冲突
        let solver = BilevelSolver::new(&cfg.bilevel, &cfg.solver);
        let (report, final_result) = solver.run(result, &d, Some(&FixedAgent(80.0)), 0).await;

        assert_eq!(report.outcome, DecompositionOutcome::CutInfeasible);
        assert_eq!(report.iterations.len(), 1);
        assert!(report.iterations[0].cut.is_some());
        assert!(final_result.is_optimal());
        assert!(final_result.model().cuts().is_empty());
        assert!((final_result.volume_value(0) - 150.0).abs() < 1e-6);
        assert!((report.commitments.total() - 150.0).abs() < 1e-6);
        assert!(report
            .warnings
            .iter()
            .any(|w| w.kind == WarningKind::SolverFailure));
    }

    #[tokio::test]
    async fn test_over_capacity_commitment_warns_and_continues() {
        let cfg = config(3, CutGeneratorKind::None);
        let d = data();
        let result = build(&d, &cfg, 0, 1).unwrap();

        // 无林分清单: 汇总回退得到 200 m³, 物理产能为 0
        let mut pooled_only = d.clone();
        pooled_only.strata.clear();
        assert_eq!(pooled_only.capacity(0), 0.0);

        let solver = BilevelSolver::new(&cfg.bilevel, &cfg.solver);
        let (report, _) = solver
            .run(result, &pooled_only, Some(&FixedAgent(1000.0)), 0)
            .await;

        let violations: Vec<_> = report
            .warnings
            .iter()
            .filter(|w| w.kind == WarningKind::ConstraintViolation)
            .collect();
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].period, 0);

        // 告警后仍分派下层
        assert_eq!(report.outcome, DecompositionOutcome::Accepted);
        assert_eq!(report.iterations[0].extraction_mode, ExtractionMode::PooledFallback);
        assert_eq!(report.iterations[0].realized, Some(200.0));
        assert!(report.agent_response.is_some());
    }

    #[tokio::test]
    async fn test_kkt_is_noop() {
        let mut cfg = config(3, CutGeneratorKind::None);
        cfg.bilevel.reformulation = Reformulation::Kkt;
        let d = data();
        let result = build(&d, &cfg, 0, 1).unwrap();

        let solver = BilevelSolver::new(&cfg.bilevel, &cfg.solver);
        let (report, _) = solver.run(result, &d, Some(&FixedAgent(1.0)), 0).await;
        assert_eq!(report.outcome, DecompositionOutcome::NotImplemented);
        assert!(report.iterations.is_empty());
    }
}
