// ==========================================
// PAWS 木材供应仿真系统 - 上层（委托方）模型
// ==========================================
// 窗口: [t0, t0+T)
// 变量: X[s,t] 收获面积 >= 0; vol[t] = Σ_s X[s,t]*yield[s,t]
// 约束: 面积守恒 / 产能 / 需求上下限 / 首期均衡流下限
// 目标: even_flow => min Σ(pos+neg) + ε·z ; 其他 => max Σ vol
// 红线: 求解失败只体现为状态值; 模型求解后只读, 加割需取回模型再解
// ==========================================

use crate::config::{ConfigResult, SimConfig, SolverConfig};
use crate::domain::forest::PlanningData;
use crate::domain::types::{SimWarning, SolverDriver, SolverStatus, WarningKind};
use crate::engine::lp::{self, Direction, LinearProgram, Sense, VarId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, info, instrument, warn};

/// 均衡流目标中 z 的打破平局系数
pub const EVEN_FLOW_EPSILON: f64 = 1e-6;

/// 可行性预检的比较容差
const FEASIBILITY_TOL: f64 = 1e-9;

// ==========================================
// ObjectiveKind - 目标类型
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObjectiveKind {
    EvenFlow,  // 最小化各期体积与水平 z 的绝对偏差
    MaxVolume, // 最大化窗口总体积
}

// ==========================================
// Cut - 上层附加约束
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Cut {
    /// vol[period] <= max_vol
    VolumeCap { period: u32, max_vol: f64 },
    /// X[stratum, period] <= max_area
    AreaCap {
        stratum: String,
        period: u32,
        max_area: f64,
    },
}

// ==========================================
// PrincipalModel - 已构建的 LP 及变量索引
// ==========================================
#[derive(Debug, Clone)]
pub struct PrincipalModel {
    program: LinearProgram,
    t0: u32,
    horizon: u32,
    objective: ObjectiveKind,
    area_vars: BTreeMap<(String, u32), VarId>,
    volume_vars: BTreeMap<u32, VarId>,
    cuts: Vec<Cut>,
}

impl PrincipalModel {
    pub fn t0(&self) -> u32 {
        self.t0
    }

    pub fn horizon(&self) -> u32 {
        self.horizon
    }

    pub fn objective(&self) -> ObjectiveKind {
        self.objective
    }

    pub fn program(&self) -> &LinearProgram {
        &self.program
    }

    pub fn cuts(&self) -> &[Cut] {
        &self.cuts
    }

    /// 窗口内的期
    pub fn periods(&self) -> std::ops::Range<u32> {
        self.t0..self.t0 + self.horizon
    }

    /// 添加割; 目标期/林分不在模型中时返回 false
    pub fn add_cut(&mut self, cut: Cut) -> bool {
        let added = match &cut {
            Cut::VolumeCap { period, max_vol } => match self.volume_vars.get(period) {
                Some(&var) => {
                    self.program.add_constraint(
                        format!("cut_vol_cap[{}]#{}", period, self.cuts.len()),
                        vec![(var, 1.0)],
                        Sense::Le,
                        max_vol.max(0.0),
                    );
                    true
                }
                None => false,
            },
            Cut::AreaCap {
                stratum,
                period,
                max_area,
            } => match self.area_vars.get(&(stratum.clone(), *period)) {
                Some(&var) => {
                    self.program.add_constraint(
                        format!("cut_area_cap[{},{}]#{}", stratum, period, self.cuts.len()),
                        vec![(var, 1.0)],
                        Sense::Le,
                        max_area.max(0.0),
                    );
                    true
                }
                None => false,
            },
        };

        if added {
            debug!(?cut, "上层模型添加割");
            self.cuts.push(cut);
        }
        added
    }

    /// 求解并生成只读快照
    pub fn solve(self, solver: &SolverConfig) -> ModelResult {
        let outcome = lp::solve(&self.program, solver);

        let mut warnings = Vec::new();
        if !outcome.status.has_solution() {
            let message = format!(
                "窗口 [{}, {}) 求解未得到最优解: {} ({})",
                self.t0,
                self.t0 + self.horizon,
                outcome.status,
                outcome.message.as_deref().unwrap_or("-")
            );
            warn!(t0 = self.t0, status = %outcome.status, driver = %outcome.driver, "{}", message);
            warnings.push(SimWarning::new(WarningKind::SolverFailure, self.t0, message));
        }

        let (area, volume) = if outcome.status.has_solution() {
            (
                self.area_vars
                    .iter()
                    .map(|(key, var)| (key.clone(), outcome.value(*var)))
                    .collect(),
                self.volume_vars
                    .iter()
                    .map(|(t, var)| (*t, outcome.value(*var)))
                    .collect(),
            )
        } else {
            (BTreeMap::new(), BTreeMap::new())
        };

        ModelResult {
            status: outcome.status,
            driver: outcome.driver,
            objective_value: outcome.objective,
            area,
            volume,
            warnings,
            model: self,
        }
    }
}

// ==========================================
// ModelResult - 上层求解快照
// ==========================================
#[derive(Debug, Clone)]
pub struct ModelResult {
    pub status: SolverStatus,
    pub driver: SolverDriver,
    pub objective_value: Option<f64>,
    area: BTreeMap<(String, u32), f64>,
    volume: BTreeMap<u32, f64>,
    pub warnings: Vec<SimWarning>,
    model: PrincipalModel,
}

impl ModelResult {
    pub fn t0(&self) -> u32 {
        self.model.t0
    }

    pub fn horizon(&self) -> u32 {
        self.model.horizon
    }

    pub fn is_optimal(&self) -> bool {
        self.status.has_solution()
    }

    pub fn model(&self) -> &PrincipalModel {
        &self.model
    }

    /// 取回模型（用于加割重解）
    pub fn into_model(self) -> PrincipalModel {
        self.model
    }

    /// X[s,t]（无解或不存在时为 0）
    pub fn area_value(&self, stratum: &str, period: u32) -> f64 {
        self.area
            .get(&(stratum.to_string(), period))
            .copied()
            .unwrap_or(0.0)
    }

    /// vol[t]（无解或不存在时为 0）
    pub fn volume_value(&self, period: u32) -> f64 {
        self.volume.get(&period).copied().unwrap_or(0.0)
    }

    /// 各林分在窗口内的总收获面积
    pub fn harvested_area(&self, stratum: &str) -> f64 {
        self.area
            .iter()
            .filter(|((s, _), _)| s == stratum)
            .map(|(_, v)| *v)
            .sum()
    }

    pub fn total_volume(&self) -> f64 {
        self.volume.values().sum()
    }
}

// ==========================================
// PrincipalModelBuilder - 上层模型构建器
// ==========================================
#[derive(Debug, Clone)]
pub struct PrincipalModelBuilder {
    objective: ObjectiveKind,
    even_flow_min_vol: Option<f64>,
    solver: SolverConfig,
}

impl PrincipalModelBuilder {
    pub fn from_config(config: &SimConfig) -> ConfigResult<Self> {
        let policy = &config.principal_policy;
        Ok(Self {
            objective: if policy.is_even_flow() {
                ObjectiveKind::EvenFlow
            } else {
                ObjectiveKind::MaxVolume
            },
            even_flow_min_vol: policy.even_flow_min_vol()?,
            solver: config.solver.clone(),
        })
    }

    pub fn solver(&self) -> &SolverConfig {
        &self.solver
    }

    /// 构建 LP（不求解）
    ///
    /// # 返回
    /// - (模型, 可行性告警)
    pub fn formulate(
        &self,
        data: &PlanningData,
        t0: u32,
        horizon: u32,
    ) -> (PrincipalModel, Vec<SimWarning>) {
        let periods = t0..t0 + horizon;
        let mut program = LinearProgram::new();
        let mut area_vars = BTreeMap::new();
        let mut volume_vars = BTreeMap::new();
        let mut warnings = Vec::new();

        // ===== 变量 =====
        for s in data.strata.keys() {
            for t in periods.clone() {
                area_vars.insert((s.clone(), t), program.add_var(format!("X[{},{}]", s, t)));
            }
        }
        for t in periods.clone() {
            volume_vars.insert(t, program.add_var(format!("vol[{}]", t)));
        }

        // ===== 体积定义: vol[t] - Σ_s yield*X = 0 =====
        for t in periods.clone() {
            let mut terms = vec![(volume_vars[&t], 1.0)];
            for s in data.strata.keys() {
                let y = data.yield_at(s, t);
                if y != 0.0 {
                    terms.push((area_vars[&(s.clone(), t)], -y));
                }
            }
            program.add_constraint(format!("vol_def[{}]", t), terms, Sense::Eq, 0.0);
        }

        // ===== 面积守恒: Σ_t X[s,t] <= area[s] =====
        for (s, stratum) in &data.strata {
            let terms = periods
                .clone()
                .map(|t| (area_vars[&(s.clone(), t)], 1.0))
                .collect();
            program.add_constraint(format!("area[{}]", s), terms, Sense::Le, stratum.area);
        }

        // ===== 产能: vol[t] <= Σ_s area*yield =====
        for t in periods.clone() {
            program.add_constraint(
                format!("capacity[{}]", t),
                vec![(volume_vars[&t], 1.0)],
                Sense::Le,
                data.capacity(t),
            );
        }

        // ===== 需求上下限（开放边界不生成约束） =====
        for (idx, d) in data.demand.iter().enumerate() {
            let Some(&var) = volume_vars.get(&d.period) else {
                continue;
            };
            if d.has_lower_bound() {
                program.add_constraint(
                    format!("demand_lo[{}]#{}", d.period, idx),
                    vec![(var, 1.0)],
                    Sense::Ge,
                    d.min_vol,
                );
            }
            if d.has_upper_bound() {
                program.add_constraint(
                    format!("demand_hi[{}]#{}", d.period, idx),
                    vec![(var, 1.0)],
                    Sense::Le,
                    d.max_vol,
                );
            }
        }

        // ===== 首期均衡流下限 + 可行性预检 =====
        if let (Some(min_vol), Some(&first)) = (self.even_flow_min_vol, volume_vars.get(&t0)) {
            program.add_constraint(
                format!("even_flow_floor[{}]", t0),
                vec![(first, 1.0)],
                Sense::Ge,
                min_vol,
            );

            let required = min_vol * horizon as f64;
            let available = data.stock_bound(t0, horizon);
            if required > available + FEASIBILITY_TOL {
                let message = format!(
                    "均衡流需求 {:.3} m³ (min_vol {} × {} 期) 超过窗口可用蓄积 {:.3} m³",
                    required, min_vol, horizon, available
                );
                warn!(t0, required, available, "{}", message);
                warnings.push(SimWarning::new(WarningKind::Feasibility, t0, message));
            }
        }

        // ===== 目标 =====
        match self.objective {
            ObjectiveKind::MaxVolume => {
                let terms = volume_vars.values().map(|v| (*v, 1.0)).collect();
                program.set_objective(Direction::Maximize, terms);
            }
            ObjectiveKind::EvenFlow => {
                let z = program.add_var("z");
                let mut terms = vec![(z, EVEN_FLOW_EPSILON)];
                for t in periods.clone() {
                    let pos = program.add_var(format!("pos[{}]", t));
                    let neg = program.add_var(format!("neg[{}]", t));
                    // vol[t] - z = pos[t] - neg[t]
                    program.add_constraint(
                        format!("even_flow_dev[{}]", t),
                        vec![(volume_vars[&t], 1.0), (z, -1.0), (pos, -1.0), (neg, 1.0)],
                        Sense::Eq,
                        0.0,
                    );
                    terms.push((pos, 1.0));
                    terms.push((neg, 1.0));
                }
                program.set_objective(Direction::Minimize, terms);
            }
        }

        let model = PrincipalModel {
            program,
            t0,
            horizon,
            objective: self.objective,
            area_vars,
            volume_vars,
            cuts: Vec::new(),
        };
        (model, warnings)
    }

    /// 构建并求解窗口模型
    #[instrument(skip(self, data), fields(objective = ?self.objective, driver = %self.solver.driver))]
    pub fn build(&self, data: &PlanningData, t0: u32, horizon: u32) -> ModelResult {
        let (model, mut warnings) = self.formulate(data, t0, horizon);
        let vars = model.program().num_vars();
        let rows = model.program().constraints().len();

        let mut result = model.solve(&self.solver);
        warnings.append(&mut result.warnings);
        result.warnings = warnings;

        info!(
            t0,
            horizon,
            vars,
            rows,
            status = %result.status,
            driver = %result.driver,
            objective = ?result.objective_value,
            first_period_volume = result.volume_value(t0),
            "上层模型求解完成"
        );
        result
    }
}

/// 构建并求解窗口 [t0, t0+T) 的上层模型
pub fn build(
    data: &PlanningData,
    config: &SimConfig,
    t0: u32,
    horizon: u32,
) -> ConfigResult<ModelResult> {
    Ok(PrincipalModelBuilder::from_config(config)?.build(data, t0, horizon))
}
