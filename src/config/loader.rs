// ==========================================
// PAWS 木材供应仿真系统 - 配置文件加载
// ==========================================
// 支持: TOML (.toml) / JSON (.json), 根据扩展名自动选择
// ==========================================

use crate::config::error::{ConfigError, ConfigResult};
use crate::config::sim_config::SimConfig;
use std::fs;
use std::path::Path;
use tracing::debug;

/// 加载并校验配置文件
pub fn load_config<P: AsRef<Path>>(path: P) -> ConfigResult<SimConfig> {
    let path = path.as_ref();
    let shown = path.display().to_string();

    let raw = fs::read_to_string(path).map_err(|e| ConfigError::FileRead {
        path: shown.clone(),
        message: e.to_string(),
    })?;

    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase();

    let cfg = parse_config(&raw, &ext).map_err(|e| match e {
        ConfigError::Parse { message, .. } => ConfigError::Parse {
            path: shown.clone(),
            message,
        },
        other => other,
    })?;

    cfg.validate()?;
    debug!(path = %shown, "配置加载完成");
    Ok(cfg)
}

/// 按格式解析配置文本（不做校验）
pub fn parse_config(raw: &str, format: &str) -> ConfigResult<SimConfig> {
    match format {
        "toml" => toml::from_str(raw).map_err(|e| ConfigError::Parse {
            path: String::new(),
            message: e.to_string(),
        }),
        "json" => serde_json::from_str(raw).map_err(|e| ConfigError::Parse {
            path: String::new(),
            message: e.to_string(),
        }),
        other => Err(ConfigError::UnsupportedFormat(other.to_string())),
    }
}

/// 将配置写成 TOML 文本（init 命令使用）
pub fn to_toml_string(cfg: &SimConfig) -> ConfigResult<String> {
    toml::to_string_pretty(cfg).map_err(|e| ConfigError::Parse {
        path: String::new(),
        message: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::sim_config::{CutGeneratorKind, PeriodLength};
    use crate::domain::types::{Reformulation, SolverDriver};
    use std::io::Write;
    use tempfile::Builder;

    #[test]
    fn test_load_toml_config() {
        let mut file = Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
data_path = "data"

[horizon]
period_length = "1 year"
horizon_periods = 4
end_period = 8

[principal_policy]
name = "even_flow"
params = {{ min_vol = 50.0 }}

[bilevel]
enabled = true
reformulation = "decomposition"
cut_generator = "volume_cap"

[solver]
driver = "native"
time_limit = 30
"#
        )
        .unwrap();

        let cfg = load_config(file.path()).unwrap();
        assert_eq!(cfg.horizon.horizon_periods, 4);
        assert_eq!(cfg.horizon.replanning_step, 1);
        assert_eq!(cfg.horizon.period_length, PeriodLength::Token("1 year".into()));
        assert_eq!(cfg.principal_policy.even_flow_min_vol().unwrap(), Some(50.0));
        assert!(cfg.bilevel.enabled);
        assert_eq!(cfg.bilevel.reformulation, Reformulation::Decomposition);
        assert_eq!(cfg.bilevel.cut_generator, CutGeneratorKind::VolumeCap);
        assert_eq!(cfg.solver.driver, SolverDriver::Native);
    }

    #[test]
    fn test_load_json_numeric_period_length() {
        let mut file = Builder::new().suffix(".json").tempfile().unwrap();
        writeln!(file, r#"{{"horizon": {{"period_length": 5}}}}"#).unwrap();

        let cfg = load_config(file.path()).unwrap();
        assert_eq!(cfg.horizon.period_length, PeriodLength::Years(5.0));
    }

    #[test]
    fn test_unknown_reformulation_is_config_error() {
        let err = parse_config(
            r#"
[bilevel]
reformulation = "benders"
"#,
            "toml",
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn test_bad_unit_fails_on_load() {
        let mut file = Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "[horizon]\nperiod_length = \"3 eons\"").unwrap();

        let err = load_config(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidPeriodUnit(_)));
    }

    #[test]
    fn test_unsupported_extension() {
        let file = Builder::new().suffix(".yaml").tempfile().unwrap();
        let err = load_config(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::UnsupportedFormat(ext) if ext == "yaml"));
    }

    #[test]
    fn test_toml_round_trip_of_defaults() {
        let text = to_toml_string(&SimConfig::default()).unwrap();
        let parsed = parse_config(&text, "toml").unwrap();
        assert_eq!(parsed.horizon.end_period, 52);
        assert_eq!(parsed.agent_behavior.name, "profit_max_flow_stub");
    }
}
