// ==========================================
// 配置加载集成测试
// ==========================================
// 测试目标: TOML/JSON 加载、默认值、校验错误、init 输出可回读
// ==========================================

use paws_sim::config::{
    load_config, parse_config, to_toml_string, ConfigError, PeriodLength, SimConfig,
    AGENT_DEFAULT_STUB, POLICY_EVEN_FLOW,
};
use paws_sim::domain::{Reformulation, SolverDriver};
use std::fs;
use tempfile::tempdir;

#[test]
fn test_load_toml_overrides_defaults() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("sim.toml");
    fs::write(
        &path,
        r#"
data_path = "data/forest"

[horizon]
period_length = "6 months"
horizon_periods = 4
end_period = 10

[principal_policy]
name = "max_volume"

[bilevel]
enabled = true
reformulation = "kkt"
"#,
    )
    .unwrap();

    let cfg = load_config(&path).unwrap();

    assert_eq!(cfg.data_path, std::path::PathBuf::from("data/forest"));
    assert_eq!(
        cfg.horizon.period_length,
        PeriodLength::Token("6 months".to_string())
    );
    assert_eq!(cfg.horizon.horizon_periods, 4);
    // 未写的字段取默认值
    assert_eq!(cfg.horizon.replanning_step, 1);
    assert_eq!(cfg.agent_behavior.name, AGENT_DEFAULT_STUB);
    assert_eq!(cfg.solver.driver, SolverDriver::Auto);
    assert!(cfg.bilevel.enabled);
    assert_eq!(cfg.bilevel.reformulation, Reformulation::Kkt);
    assert_eq!(cfg.bilevel.max_iters, 1);
    assert_eq!(cfg.run.adapter_timeout_secs, 300);
}

#[test]
fn test_load_json_config() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("sim.json");
    fs::write(
        &path,
        r#"{
            "horizon": {"period_length": 5, "horizon_periods": 2, "end_period": 3},
            "principal_policy": {"name": "even_flow", "params": {"min_vol": 12.5}},
            "solver": {"driver": "exec", "executable": "/opt/highs/bin/highs"}
        }"#,
    )
    .unwrap();

    let cfg = load_config(&path).unwrap();
    assert_eq!(cfg.horizon.period_length, PeriodLength::Years(5.0));
    assert_eq!(cfg.principal_policy.name, POLICY_EVEN_FLOW);
    assert_eq!(cfg.principal_policy.even_flow_min_vol().unwrap(), Some(12.5));
    assert_eq!(cfg.solver.driver, SolverDriver::Exec);
    assert_eq!(cfg.solver.executable, "/opt/highs/bin/highs");
}

#[test]
fn test_validation_errors_are_reported_before_running() {
    let cases = [
        ("[horizon]\nhorizon_periods = 0\n", "horizon"),
        ("[horizon]\nreplanning_step = 0\n", "horizon"),
        ("[horizon]\nstart_period = 5\nend_period = 2\n", "horizon"),
        ("[horizon]\nperiod_length = \"3 fortnights\"\n", "unit"),
        ("[horizon]\nperiod_length = -1\n", "length"),
        ("[solver]\nmip_gap = 2.0\n", "solver"),
        ("[bilevel]\nmax_iters = 0\n", "bilevel"),
        ("[principal_policy]\nparams = { min_vol = \"lots\" }\n", "param"),
    ];

    for (raw, expected) in cases {
        let cfg = parse_config(raw, "toml").unwrap();
        let err = cfg.validate().unwrap_err();
        let matched = match expected {
            "horizon" => matches!(err, ConfigError::InvalidHorizon(_)),
            "unit" => matches!(err, ConfigError::InvalidPeriodUnit(_)),
            "length" => matches!(err, ConfigError::InvalidPeriodLength(_)),
            "solver" => matches!(err, ConfigError::InvalidSolver(_)),
            "bilevel" => matches!(err, ConfigError::InvalidBilevel(_)),
            "param" => matches!(err, ConfigError::InvalidParam { .. }),
            _ => false,
        };
        assert!(matched, "{:?} -> {:?}", raw, err);
    }
}

#[test]
fn test_unsupported_extension_and_missing_file() {
    let dir = tempdir().unwrap();
    let yaml = dir.path().join("sim.yaml");
    fs::write(&yaml, "horizon: {}\n").unwrap();

    assert!(matches!(
        load_config(&yaml),
        Err(ConfigError::UnsupportedFormat(ext)) if ext == "yaml"
    ));
    assert!(matches!(
        load_config(dir.path().join("absent.toml")),
        Err(ConfigError::FileRead { .. })
    ));
}

#[test]
fn test_written_toml_reads_back() {
    let mut cfg = SimConfig::default();
    cfg.horizon.period_length = PeriodLength::Years(7.0);
    cfg.horizon.end_period = 24;
    cfg.bilevel.enabled = true;
    cfg.principal_policy
        .params
        .insert("min_vol".to_string(), serde_json::json!(40.0));

    let raw = to_toml_string(&cfg).unwrap();
    let back = parse_config(&raw, "toml").unwrap();

    assert_eq!(back.horizon.period_length, PeriodLength::Years(7.0));
    assert_eq!(back.horizon.end_period, 24);
    assert!(back.bilevel.enabled);
    assert_eq!(back.principal_policy.even_flow_min_vol().unwrap(), Some(40.0));
    assert_eq!(back.validate().unwrap(), 7.0);
}
