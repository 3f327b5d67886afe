// ==========================================
// PAWS 木材供应仿真系统 - 进程内单纯形求解器
// ==========================================
// 算法: 稠密表两阶段单纯形, Bland 规则防循环
// 适用: 单窗口规模 (林分数 × 期数) 的小型 LP
// ==========================================

use super::{Direction, LinearProgram, Sense, SolveOutcome};
use crate::domain::types::{SolverDriver, SolverStatus};
use std::time::{Duration, Instant};
use tracing::trace;

const PIVOT_EPS: f64 = 1e-9;
const FEASIBILITY_EPS: f64 = 1e-7;
const MAX_ITERATIONS: usize = 50_000;

/// 单纯形表
struct Tableau {
    rows: Vec<Vec<f64>>, // m × (ncols + 1), 最后一列为右端项
    cost: Vec<f64>,      // 检验数行, 最后一项为 -目标值
    basis: Vec<usize>,
    ncols: usize,
    first_artificial: usize,
}

enum PhaseEnd {
    Optimal,
    Unbounded,
    TimeLimit,
    IterationLimit,
}

impl Tableau {
    fn rhs(&self, row: usize) -> f64 {
        self.rows[row][self.ncols]
    }

    fn pivot(&mut self, row: usize, col: usize) {
        let pivot = self.rows[row][col];
        for v in self.rows[row].iter_mut() {
            *v /= pivot;
        }

        let pivot_row = self.rows[row].clone();
        for (i, r) in self.rows.iter_mut().enumerate() {
            if i == row {
                continue;
            }
            let factor = r[col];
            if factor != 0.0 {
                for (v, p) in r.iter_mut().zip(&pivot_row) {
                    *v -= factor * p;
                }
            }
        }

        let factor = self.cost[col];
        if factor != 0.0 {
            for (v, p) in self.cost.iter_mut().zip(&pivot_row) {
                *v -= factor * p;
            }
        }

        self.basis[row] = col;
    }

    /// 以给定成本向量重置检验数行
    fn price_out(&mut self, costs: &[f64]) {
        self.cost = vec![0.0; self.ncols + 1];
        self.cost[..costs.len()].copy_from_slice(costs);
        for (i, &b) in self.basis.iter().enumerate() {
            let cb = self.cost[b];
            if cb != 0.0 {
                for (v, r) in self.cost.iter_mut().zip(&self.rows[i]) {
                    *v -= cb * r;
                }
            }
        }
    }

    /// 最小化迭代 (Bland: 最小下标入基, 比值相同取最小基变量出基)
    fn run(&mut self, allowed_cols: usize, deadline: Instant, iterations: &mut usize) -> PhaseEnd {
        loop {
            if Instant::now() >= deadline {
                return PhaseEnd::TimeLimit;
            }
            if *iterations >= MAX_ITERATIONS {
                return PhaseEnd::IterationLimit;
            }

            let entering = match (0..allowed_cols).find(|&j| self.cost[j] < -PIVOT_EPS) {
                Some(j) => j,
                None => return PhaseEnd::Optimal,
            };

            let mut leaving: Option<(usize, f64)> = None;
            for i in 0..self.rows.len() {
                let a = self.rows[i][entering];
                if a <= PIVOT_EPS {
                    continue;
                }
                let ratio = self.rhs(i) / a;
                leaving = match leaving {
                    None => Some((i, ratio)),
                    Some((best, best_ratio)) => {
                        if ratio < best_ratio - PIVOT_EPS
                            || (ratio <= best_ratio + PIVOT_EPS
                                && self.basis[i] < self.basis[best])
                        {
                            Some((i, ratio))
                        } else {
                            Some((best, best_ratio))
                        }
                    }
                };
            }

            match leaving {
                Some((row, _)) => self.pivot(row, entering),
                None => return PhaseEnd::Unbounded,
            }
            *iterations += 1;
        }
    }
}

/// 两阶段单纯形求解
pub fn solve(program: &LinearProgram, time_limit: Duration) -> SolveOutcome {
    let started = Instant::now();
    let deadline = started + time_limit;
    let n = program.num_vars();

    // ===== 标准化: 右端项非负 =====
    let mut dense: Vec<(Vec<f64>, Sense, f64)> = Vec::with_capacity(program.constraints().len());
    for c in program.constraints() {
        let mut coeffs = vec![0.0; n];
        for (var, coef) in &c.terms {
            if var.0 >= n || !coef.is_finite() {
                return SolveOutcome::failed(
                    SolverDriver::Native,
                    SolverStatus::Error,
                    format!("约束 {} 含无效项", c.name),
                );
            }
            coeffs[var.0] += coef;
        }
        if !c.rhs.is_finite() {
            return SolveOutcome::failed(
                SolverDriver::Native,
                SolverStatus::Error,
                format!("约束 {} 右端项无效", c.name),
            );
        }

        if c.rhs < 0.0 {
            let flipped = match c.sense {
                Sense::Le => Sense::Ge,
                Sense::Ge => Sense::Le,
                Sense::Eq => Sense::Eq,
            };
            dense.push((coeffs.iter().map(|v| -v).collect(), flipped, -c.rhs));
        } else {
            dense.push((coeffs, c.sense, c.rhs));
        }
    }

    // ===== 列布局: 结构变量 | 松弛/剩余 | 人工 =====
    let slack_count = dense.iter().filter(|(_, s, _)| *s != Sense::Eq).count();
    let artificial_count = dense.iter().filter(|(_, s, _)| *s != Sense::Le).count();
    let first_slack = n;
    let first_artificial = n + slack_count;
    let ncols = first_artificial + artificial_count;

    let mut rows = Vec::with_capacity(dense.len());
    let mut basis = Vec::with_capacity(dense.len());
    let (mut next_slack, mut next_artificial) = (first_slack, first_artificial);
    for (coeffs, sense, rhs) in dense {
        let mut row = vec![0.0; ncols + 1];
        row[..n].copy_from_slice(&coeffs);
        row[ncols] = rhs;
        match sense {
            Sense::Le => {
                row[next_slack] = 1.0;
                basis.push(next_slack);
                next_slack += 1;
            }
            Sense::Ge => {
                row[next_slack] = -1.0;
                next_slack += 1;
                row[next_artificial] = 1.0;
                basis.push(next_artificial);
                next_artificial += 1;
            }
            Sense::Eq => {
                row[next_artificial] = 1.0;
                basis.push(next_artificial);
                next_artificial += 1;
            }
        }
        rows.push(row);
    }

    let mut tableau = Tableau {
        rows,
        cost: Vec::new(),
        basis,
        ncols,
        first_artificial,
    };
    let mut iterations = 0usize;

    // ===== 阶段一: 最小化人工变量之和 =====
    if artificial_count > 0 {
        let mut phase_one = vec![0.0; ncols];
        for c in phase_one.iter_mut().skip(first_artificial) {
            *c = 1.0;
        }
        tableau.price_out(&phase_one);

        match tableau.run(ncols, deadline, &mut iterations) {
            PhaseEnd::Optimal => {}
            PhaseEnd::TimeLimit => return time_limit_outcome(iterations),
            PhaseEnd::IterationLimit => return iteration_limit_outcome(),
            // 阶段一目标有下界 0, 不会无界
            PhaseEnd::Unbounded => {
                return SolveOutcome::failed(
                    SolverDriver::Native,
                    SolverStatus::Error,
                    "阶段一出现无界方向",
                )
            }
        }

        let infeasibility = -tableau.cost[ncols];
        let scale = 1.0 + tableau.rows.iter().map(|r| r[ncols].abs()).fold(0.0, f64::max);
        if infeasibility > FEASIBILITY_EPS * scale {
            trace!(infeasibility, iterations, "阶段一结束: 不可行");
            return SolveOutcome::failed(
                SolverDriver::Native,
                SolverStatus::Infeasible,
                format!("不可行 (人工变量残差 {:.3e})", infeasibility),
            );
        }

        // 人工变量驱离基
        for row in 0..tableau.rows.len() {
            if tableau.basis[row] < tableau.first_artificial {
                continue;
            }
            if let Some(col) =
                (0..tableau.first_artificial).find(|&j| tableau.rows[row][j].abs() > PIVOT_EPS)
            {
                tableau.pivot(row, col);
            }
        }
    }

    // ===== 阶段二: 原目标（统一为最小化） =====
    let sign = match program.direction() {
        Direction::Minimize => 1.0,
        Direction::Maximize => -1.0,
    };
    let mut phase_two = vec![0.0; ncols];
    for (var, coef) in program.objective() {
        phase_two[var.0] += sign * coef;
    }
    tableau.price_out(&phase_two);

    match tableau.run(first_artificial, deadline, &mut iterations) {
        PhaseEnd::Optimal => {}
        PhaseEnd::TimeLimit => return time_limit_outcome(iterations),
        PhaseEnd::IterationLimit => return iteration_limit_outcome(),
        PhaseEnd::Unbounded => {
            return SolveOutcome::failed(SolverDriver::Native, SolverStatus::Unbounded, "目标无界")
        }
    }

    let mut values = vec![0.0; n];
    for (row, &b) in tableau.basis.iter().enumerate() {
        if b < n {
            values[b] = tableau.rhs(row).max(0.0);
        }
    }

    trace!(
        iterations,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "单纯形求解完成"
    );

    SolveOutcome {
        status: SolverStatus::Optimal,
        driver: SolverDriver::Native,
        objective: Some(program.evaluate(&values)),
        values,
        message: None,
    }
}

fn time_limit_outcome(iterations: usize) -> SolveOutcome {
    SolveOutcome::failed(
        SolverDriver::Native,
        SolverStatus::TimeLimit,
        format!("达到时间上限 (迭代 {} 次)", iterations),
    )
}

fn iteration_limit_outcome() -> SolveOutcome {
    SolveOutcome::failed(
        SolverDriver::Native,
        SolverStatus::Error,
        format!("超过最大迭代次数 {}", MAX_ITERATIONS),
    )
}
