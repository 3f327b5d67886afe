// ==========================================
// 滚动时域调度器集成测试
// ==========================================
// 测试目标:
// - 窗口起点序列 start, start+step, ... (< end)
// - 外部代理缺失时双层循环视为无下层, 运行正常结束
// - 关闭双层与省略双层配置结果一致
// - 外部委托方仿真器路径 + 插件名校验
// - run_summary.json 写出
// ==========================================


use async_trait::async_trait;
use paws_sim::adapters::{FHOPS_EXEC, WS3_EMULATOR};
use paws_sim::config::{parse_config, ConfigError, CutGeneratorKind};
use paws_sim::domain::{
    CommitmentSet, PrincipalDecision, PrincipalState, WarningKind, DEFAULT_PRODUCT,
};
use paws_sim::engine::{
    DecompositionOutcome, PluginRegistry, PrincipalEmulator, RollingHorizonSimulator, SimError,
    RUN_SUMMARY_FILE,
};
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};
use tempfile::tempdir;
use test_helpers::{approx_eq, even_flow_config, single_stratum_problem, ProblemBuilder};

const MISSING_EXECUTABLE: &str = "paws-test-missing-executable";

#[tokio::test]
async fn test_windows_follow_replanning_step() {
    let mut cfg = even_flow_config(2, 9, 3, 10.0);
    cfg.horizon.replanning_step = 3;

    let sim = RollingHorizonSimulator::new(
        cfg,
        single_stratum_problem(),
        &PluginRegistry::with_builtin(),
    )
    .unwrap();
    let report = sim.run().await.unwrap();

    assert_eq!(report.status, "ok");
    assert_eq!(report.periods_visited(), vec![2, 5, 8]);
    assert_eq!(report.stats.windows, 3);
    assert!(report.windows.iter().all(|w| w.horizon == 3));
}

#[tokio::test]
async fn test_empty_range_runs_no_windows() {
    let cfg = even_flow_config(4, 4, 2, 10.0);
    let sim = RollingHorizonSimulator::new(
        cfg,
        single_stratum_problem(),
        &PluginRegistry::with_builtin(),
    )
    .unwrap();
    let report = sim.run().await.unwrap();

    assert!(report.windows.is_empty());
    assert_eq!(report.stats.windows, 0);
}

#[tokio::test]
async fn test_default_path_commits_and_stub_realizes() {
    let cfg = even_flow_config(0, 1, 1, 50.0);
    let sim = RollingHorizonSimulator::new(
        cfg,
        single_stratum_problem(),
        &PluginRegistry::with_builtin(),
    )
    .unwrap();
    let report = sim.run().await.unwrap();

    let window = &report.windows[0];
    assert!(window.principal_decision.is_none());
    let committed = window.commitments.get("S1", DEFAULT_PRODUCT).unwrap();
    assert!(approx_eq(committed, 50.0));

    let realized = window
        .agent_response
        .as_ref()
        .and_then(|r| r.realized_volume())
        .unwrap();
    assert!(approx_eq(realized, 50.0));
    assert!(approx_eq(report.stats.total_committed, 50.0));
    assert!(approx_eq(report.stats.total_realized, 50.0));
}

#[tokio::test]
async fn test_missing_agent_executable_is_no_lower_level() {
    let mut cfg = even_flow_config(0, 2, 2, 20.0);
    cfg.agent_behavior.name = FHOPS_EXEC.to_string();
    cfg.agent_behavior
        .params
        .insert("cli".to_string(), json!(MISSING_EXECUTABLE));
    cfg.bilevel.enabled = true;

    let sim = RollingHorizonSimulator::new(
        cfg,
        single_stratum_problem(),
        &PluginRegistry::with_builtin(),
    )
    .unwrap();
    let report = sim.run().await.unwrap();

    assert_eq!(report.stats.windows, 2);
    assert_eq!(report.stats.bilevel_runs, 2);
    for window in &report.windows {
        let bilevel = window.bilevel.as_ref().unwrap();
        assert_eq!(bilevel.outcome, DecompositionOutcome::NoLowerLevel);
        assert_eq!(bilevel.iterations.len(), 1);

        let reason = bilevel
            .agent_response
            .as_ref()
            .and_then(|r| r.unavailable_reason())
            .unwrap();
        assert_eq!(reason, format!("executable not found: {}", MISSING_EXECUTABLE));

        // 上层承诺照常生效
        assert!(approx_eq(window.commitments.total(), 20.0));
    }
    assert!(report.stats.warning_count(WarningKind::AdapterUnavailable) >= 2);
}

#[tokio::test]
async fn test_bilevel_disabled_matches_omitted() {
    let base = r#"
        data_path = "unused"

        [horizon]
        period_length = 1
        horizon_periods = 3
        start_period = 0
        end_period = 4

        [principal_policy]
        name = "even_flow"
        params = { min_vol = 30.0 }

        [solver]
        driver = "native"
        time_limit = 30

        [run]
        log_level = "INFO"
    "#;
    let disabled = format!(
        "{}\n[bilevel]\nenabled = false\nmax_iters = 5\ncut_generator = \"volume_cap\"\n",
        base
    );

    let mut omitted_cfg = parse_config(base, "toml").unwrap();
    let mut disabled_cfg = parse_config(&disabled, "toml").unwrap();
    assert_eq!(disabled_cfg.bilevel.cut_generator, CutGeneratorKind::VolumeCap);
    omitted_cfg.run.out_dir = None;
    disabled_cfg.run.out_dir = None;

    let problem = ProblemBuilder::new()
        .flat_stratum("A", 80.0, 2.0)
        .flat_stratum("B", 40.0, 3.5)
        .build();
    let registry = PluginRegistry::with_builtin();

    let omitted = RollingHorizonSimulator::new(omitted_cfg, problem.clone(), &registry)
        .unwrap()
        .run()
        .await
        .unwrap();
    let disabled = RollingHorizonSimulator::new(disabled_cfg, problem, &registry)
        .unwrap()
        .run()
        .await
        .unwrap();

    assert_eq!(omitted.stats, disabled.stats);
    assert_eq!(omitted.stats.bilevel_runs, 0);
    assert_eq!(
        serde_json::to_value(&omitted.windows).unwrap(),
        serde_json::to_value(&disabled.windows).unwrap()
    );
}

/// 记录收到的状态快照, 固定承诺 30 m³
struct RecordingPrincipal {
    seen: Arc<Mutex<Vec<PrincipalState>>>,
}

#[async_trait]
impl PrincipalEmulator for RecordingPrincipal {
    fn name(&self) -> &str {
        "recording"
    }

    async fn plan_first_period(&self, state: &PrincipalState) -> PrincipalDecision {
        if let Ok(mut seen) = self.seen.lock() {
            seen.push(state.clone());
        }
        let mut commitments = CommitmentSet::new();
        commitments.insert("S1", DEFAULT_PRODUCT, 30.0);
        PrincipalDecision {
            period: state.period,
            commitments,
            warning: None,
        }
    }
}

#[tokio::test]
async fn test_external_principal_path_dispatches_to_agent() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let mut registry = PluginRegistry::with_builtin();
    let handle = seen.clone();
    registry.register_principal("recording", move |_args| {
        Ok(Box::new(RecordingPrincipal {
            seen: handle.clone(),
        }) as Box<dyn PrincipalEmulator>)
    });

    let mut cfg = even_flow_config(0, 2, 2, 0.0);
    cfg.principal_policy.name = "recording".to_string();
    let sim = RollingHorizonSimulator::new(cfg, single_stratum_problem(), &registry).unwrap();
    let report = sim.run().await.unwrap();

    assert_eq!(report.windows.len(), 2);
    for window in &report.windows {
        let decision = window.principal_decision.as_ref().unwrap();
        assert!(approx_eq(decision.commitments.total(), 30.0));
        let realized = window
            .agent_response
            .as_ref()
            .and_then(|r| r.realized_volume())
            .unwrap();
        assert!(approx_eq(realized, 30.0));
    }

    let seen = seen.lock().unwrap();
    assert_eq!(seen.iter().map(|s| s.period).collect::<Vec<_>>(), vec![0, 1]);
    let hint = seen[0].inventory["S1"];
    assert!(approx_eq(hint.area, 100.0));
    assert!(approx_eq(hint.yield_p1, 2.0));
}

#[tokio::test]
async fn test_missing_ws3_cli_records_adapter_warning() {
    let mut cfg = even_flow_config(0, 1, 1, 0.0);
    cfg.principal_policy.name = WS3_EMULATOR.to_string();
    cfg.principal_policy.params.insert("mode".to_string(), json!("cli"));
    cfg.principal_policy
        .params
        .insert("cli".to_string(), json!(MISSING_EXECUTABLE));

    let sim = RollingHorizonSimulator::new(
        cfg,
        single_stratum_problem(),
        &PluginRegistry::with_builtin(),
    )
    .unwrap();
    let report = sim.run().await.unwrap();

    let window = &report.windows[0];
    let decision = window.principal_decision.as_ref().unwrap();
    assert!(decision.commitments.is_empty());
    assert!(decision.warning.is_some());
    assert_eq!(report.stats.warning_count(WarningKind::AdapterUnavailable), 1);
}

#[test]
fn test_unknown_principal_is_config_error() {
    let mut cfg = even_flow_config(0, 1, 1, 0.0);
    cfg.principal_policy.name = "no_such_policy".to_string();

    let err = RollingHorizonSimulator::new(
        cfg,
        single_stratum_problem(),
        &PluginRegistry::with_builtin(),
    )
    .err()
    .unwrap();
    assert!(matches!(
        err,
        SimError::Config(ConfigError::UnknownPrincipalPolicy(name)) if name == "no_such_policy"
    ));
}

#[test]
fn test_unknown_agent_is_config_error() {
    let mut cfg = even_flow_config(0, 1, 1, 0.0);
    cfg.agent_behavior.name = "no_such_agent".to_string();

    let err = RollingHorizonSimulator::new(
        cfg,
        single_stratum_problem(),
        &PluginRegistry::with_builtin(),
    )
    .err()
    .unwrap();
    assert!(matches!(
        err,
        SimError::Config(ConfigError::UnknownAgentBehavior(name)) if name == "no_such_agent"
    ));
}

#[tokio::test]
async fn test_run_summary_written_to_out_dir() {
    let dir = tempdir().unwrap();
    let out_dir = dir.path().join("runs").join("nested");
    let mut cfg = even_flow_config(0, 3, 2, 10.0);
    cfg.run.out_dir = Some(out_dir.clone());

    let sim = RollingHorizonSimulator::new(
        cfg,
        single_stratum_problem(),
        &PluginRegistry::with_builtin(),
    )
    .unwrap();
    let report = sim.run().await.unwrap();

    let raw = std::fs::read_to_string(out_dir.join(RUN_SUMMARY_FILE)).unwrap();
    let summary: Value = serde_json::from_str(&raw).unwrap();
    assert_eq!(summary["status"], "ok");
    assert_eq!(summary["run_id"], report.run_id.to_string());
    assert_eq!(summary["windows"].as_array().unwrap().len(), 3);
    assert_eq!(summary["stats"]["windows"], 3);
}
