// ==========================================
// PAWS 木材供应仿真系统 - 命令行入口
// ==========================================
// 子命令:
// - init [TARGET]        生成最小配置与数据目录
// - run-sim -c CONFIG    运行滚动时域仿真
// - solve-bilevel -c ... 强制开启双层分解后运行
// ==========================================

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use paws_sim::config::{load_config, to_toml_string, LogLevel, PeriodLength, SimConfig};
use paws_sim::domain::SolverDriver;
use paws_sim::{load_problem_data, logging, PluginRegistry, RollingHorizonSimulator};
use std::fs;
use std::path::{Path, PathBuf};

/// PAWS - 委托-代理木材供应仿真
#[derive(Parser, Debug)]
#[command(name = "paws-sim")]
#[command(version)]
#[command(about = "Principal-Agent Wood Supply simulation", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// 在目标目录生成示例配置与数据目录
    Init {
        #[arg(default_value = "demos/minimal")]
        target: PathBuf,
    },

    /// 运行滚动时域仿真
    RunSim(RunArgs),

    /// 开启双层分解运行仿真
    SolveBilevel(RunArgs),
}

#[derive(Args, Debug)]
struct RunArgs {
    /// 配置文件 (.toml / .json)
    #[arg(short, long)]
    config: PathBuf,

    /// DEBUG 日志
    #[arg(short, long, conflicts_with = "quiet")]
    verbose: bool,

    /// 仅 WARN 及以上
    #[arg(short, long)]
    quiet: bool,
}

impl RunArgs {
    fn log_level(&self, configured: LogLevel) -> LogLevel {
        if self.verbose {
            LogLevel::Debug
        } else if self.quiet {
            LogLevel::Warning
        } else {
            configured
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Init { target } => {
            logging::init(LogLevel::Info.as_filter());
            init_examples(&target)?;
            println!("已在 {} 生成示例", target.display());
            Ok(())
        }
        Commands::RunSim(args) => run(args, false).await,
        Commands::SolveBilevel(args) => run(args, true).await,
    }
}

async fn run(args: RunArgs, force_bilevel: bool) -> Result<()> {
    let mut cfg = load_config(&args.config)
        .with_context(|| format!("加载配置失败: {}", args.config.display()))?;
    logging::init(args.log_level(cfg.run.log_level).as_filter());

    tracing::info!("==================================================");
    tracing::info!("{} v{}", paws_sim::APP_NAME, paws_sim::VERSION);
    tracing::info!("==================================================");

    if force_bilevel {
        cfg.bilevel.enabled = true;
    }

    let problem = load_problem_data(&cfg.data_path)
        .with_context(|| format!("加载问题数据失败: {}", cfg.data_path.display()))?;
    let registry = PluginRegistry::with_builtin();
    let simulator = RollingHorizonSimulator::new(cfg, problem, &registry)?;
    let report = simulator.run().await?;

    let label = if force_bilevel {
        "双层分解运行完成"
    } else {
        "仿真完成"
    };
    println!(
        "{}: run_id={} windows={} optimal={} committed={:.3} realized={:.3}",
        label,
        report.run_id,
        report.stats.windows,
        report.stats.optimal_windows,
        report.stats.total_committed,
        report.stats.total_realized,
    );
    Ok(())
}

/// 写出 configs/minimal.toml, configs/bilevel_stub.toml 与 data/ 目录
fn init_examples(target: &Path) -> Result<()> {
    let configs = target.join("configs");
    let data = target.join("data");
    fs::create_dir_all(&configs).with_context(|| format!("创建目录失败: {}", configs.display()))?;
    fs::create_dir_all(&data).with_context(|| format!("创建目录失败: {}", data.display()))?;

    let mut minimal = SimConfig::default();
    minimal.data_path = data;
    minimal.horizon.period_length = PeriodLength::Token("7 days".to_string());
    minimal.horizon.horizon_periods = 12;
    minimal.horizon.replanning_step = 1;
    minimal.horizon.start_period = 0;
    minimal.horizon.end_period = 24;
    minimal.solver.driver = SolverDriver::Auto;
    minimal.solver.time_limit = 30;
    minimal.run.out_dir = Some(target.join("runs"));

    let mut bilevel = minimal.clone();
    bilevel.bilevel.enabled = true;
    bilevel.run.out_dir = Some(target.join("runs").join("bilevel_stub"));

    for (name, cfg) in [("minimal.toml", &minimal), ("bilevel_stub.toml", &bilevel)] {
        let path = configs.join(name);
        fs::write(&path, to_toml_string(cfg)?)
            .with_context(|| format!("写入配置失败: {}", path.display()))?;
        tracing::info!(path = %path.display(), "配置已生成");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_init_examples_reads_back_weekly_periods() {
        let dir = TempDir::new().unwrap();
        init_examples(dir.path()).unwrap();

        let minimal = load_config(dir.path().join("configs").join("minimal.toml")).unwrap();
        assert_eq!(
            minimal.horizon.period_length,
            PeriodLength::Token("7 days".to_string())
        );
        let ypp = minimal.validate().unwrap();
        assert!((ypp - 7.0 / 365.25).abs() < 1e-12);
        assert_eq!(minimal.horizon.horizon_periods, 12);
        assert_eq!(minimal.horizon.end_period, 24);
        assert!(!minimal.bilevel.enabled);
        assert!(minimal.data_path.is_dir());

        let bilevel = load_config(dir.path().join("configs").join("bilevel_stub.toml")).unwrap();
        assert!(bilevel.bilevel.enabled);
        assert_eq!(bilevel.horizon.period_length, minimal.horizon.period_length);
        assert_eq!(
            bilevel.run.out_dir,
            Some(dir.path().join("runs").join("bilevel_stub"))
        );
    }
}
