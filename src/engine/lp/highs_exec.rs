// ==========================================
// PAWS 木材供应仿真系统 - 外部 HiGHS 求解驱动
// ==========================================
// 流程: 写 CPLEX-LP 文件 -> 调用 highs -> 解析 Model status 与解文件
// 红线: 可执行文件缺失 => SolverStatus::Error
// ==========================================

use super::{simplex, Direction, LinearProgram, SolveOutcome};
use crate::config::SolverConfig;
use crate::domain::types::{SolverDriver, SolverStatus};
use std::fmt::Write as _;
use std::fs;
use std::io::ErrorKind;
use std::path::Path;
use std::process::Command;
use std::time::Duration;
use tracing::{debug, warn};

/// 通过 highs 可执行文件求解
pub fn solve(program: &LinearProgram, config: &SolverConfig) -> SolveOutcome {
    // LP 文件格式至少需要一列
    if program.num_vars() == 0 {
        return simplex::solve(program, Duration::from_secs(config.time_limit));
    }

    match run_highs(program, config) {
        Ok(outcome) => outcome,
        Err(message) => {
            warn!(executable = %config.executable, %message, "外部求解器调用失败");
            SolveOutcome::failed(SolverDriver::Exec, SolverStatus::Error, message)
        }
    }
}

fn run_highs(program: &LinearProgram, config: &SolverConfig) -> Result<SolveOutcome, String> {
    let workdir = tempfile::tempdir().map_err(|e| format!("创建临时目录失败: {}", e))?;
    let model_path = workdir.path().join("model.lp");
    let solution_path = workdir.path().join("model.sol");

    fs::write(&model_path, to_lp_format(program)).map_err(|e| format!("写出 LP 文件失败: {}", e))?;

    let mut command = Command::new(&config.executable);
    command
        .arg("--model_file")
        .arg(&model_path)
        .arg("--solution_file")
        .arg(&solution_path)
        .arg("--time_limit")
        .arg(config.time_limit.to_string());

    if let Some(gap) = config.mip_gap {
        let options_path = workdir.path().join("highs.opt");
        fs::write(&options_path, format!("mip_rel_gap = {}\n", gap))
            .map_err(|e| format!("写出求解器选项失败: {}", e))?;
        command.arg("--options_file").arg(&options_path);
    }

    let output = command.output().map_err(|e| match e.kind() {
        ErrorKind::NotFound => format!("求解器可执行文件不存在: {}", config.executable),
        _ => format!("启动求解器失败: {}", e),
    })?;

    let stdout = String::from_utf8_lossy(&output.stdout);
    if !output.status.success() {
        return Err(format!(
            "求解器退出码 {:?}: {}",
            output.status.code(),
            String::from_utf8_lossy(&output.stderr).trim()
        ));
    }

    let status = parse_model_status(&stdout);
    debug!(status = %status, "highs 返回");

    if !status.has_solution() {
        return Ok(SolveOutcome::failed(
            SolverDriver::Exec,
            status,
            format!("highs 模型状态: {}", status),
        ));
    }

    let values = read_solution(&solution_path, program.num_vars())?;
    Ok(SolveOutcome {
        status,
        driver: SolverDriver::Exec,
        objective: Some(program.evaluate(&values)),
        values,
        message: None,
    })
}

/// 写出 CPLEX-LP 格式（变量统一命名为 x<下标>）
pub fn to_lp_format(program: &LinearProgram) -> String {
    let mut out = String::new();
    let header = match program.direction() {
        Direction::Minimize => "Minimize",
        Direction::Maximize => "Maximize",
    };
    let _ = writeln!(out, "\\ {} 列, {} 行", program.num_vars(), program.constraints().len());
    let _ = writeln!(out, "{}", header);

    let objective: Vec<_> = program.objective().iter().map(|(v, c)| (v.0, *c)).collect();
    let _ = writeln!(out, " obj: {}", linear_expr(&objective));

    let _ = writeln!(out, "Subject To");
    for (idx, c) in program.constraints().iter().enumerate() {
        let terms: Vec<_> = c.terms.iter().map(|(v, coef)| (v.0, *coef)).collect();
        let _ = writeln!(
            out,
            " r{}: {} {} {}",
            idx,
            linear_expr(&terms),
            c.sense.as_lp_str(),
            c.rhs
        );
    }

    let _ = writeln!(out, "Bounds");
    for idx in 0..program.num_vars() {
        let _ = writeln!(out, " x{} >= 0", idx);
    }
    let _ = writeln!(out, "End");
    out
}

fn linear_expr(terms: &[(usize, f64)]) -> String {
    if terms.is_empty() {
        return "0 x0".to_string();
    }
    let mut expr = String::new();
    for (i, (var, coef)) in terms.iter().enumerate() {
        if i == 0 {
            let _ = write!(expr, "{} x{}", coef, var);
        } else if *coef < 0.0 {
            let _ = write!(expr, " - {} x{}", -coef, var);
        } else {
            let _ = write!(expr, " + {} x{}", coef, var);
        }
    }
    expr
}

/// 解析 stdout 中的 "Model status : ..." 行
pub fn parse_model_status(stdout: &str) -> SolverStatus {
    let status = stdout
        .lines()
        .find_map(|line| {
            let line = line.trim();
            line.strip_prefix("Model status")
                .and_then(|rest| rest.split_once(':'))
                .map(|(_, value)| value.trim().to_lowercase())
        })
        .unwrap_or_default();

    if status == "optimal" {
        SolverStatus::Optimal
    } else if status.contains("infeasible") {
        SolverStatus::Infeasible
    } else if status.contains("unbounded") {
        SolverStatus::Unbounded
    } else if status.contains("time limit") {
        SolverStatus::TimeLimit
    } else {
        SolverStatus::Unknown
    }
}

/// 读取解文件 "# Columns N" 段
fn read_solution(path: &Path, num_vars: usize) -> Result<Vec<f64>, String> {
    let raw = fs::read_to_string(path).map_err(|e| format!("读取解文件失败: {}", e))?;
    parse_solution(&raw, num_vars)
}

pub fn parse_solution(raw: &str, num_vars: usize) -> Result<Vec<f64>, String> {
    let mut lines = raw.lines();
    let count = lines
        .by_ref()
        .find_map(|line| line.trim().strip_prefix("# Columns"))
        .and_then(|n| n.trim().parse::<usize>().ok())
        .ok_or_else(|| "解文件缺少 '# Columns' 段".to_string())?;

    let mut values = vec![0.0; num_vars];
    for line in lines.take(count) {
        let mut parts = line.split_whitespace();
        let (Some(name), Some(value)) = (parts.next(), parts.next()) else {
            continue;
        };
        let idx = name
            .strip_prefix('x')
            .and_then(|i| i.parse::<usize>().ok())
            .filter(|i| *i < num_vars)
            .ok_or_else(|| format!("解文件含未知列: {}", name))?;
        values[idx] = value
            .parse::<f64>()
            .map_err(|e| format!("列 {} 取值无法解析: {}", name, e))?
            .max(0.0);
    }
    Ok(values)
}
