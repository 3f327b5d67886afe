// ==========================================
// PAWS 木材供应仿真系统 - ws3 上层仿真器适配
// ==========================================
// import: 进程内近似, 每个林分承诺 fraction × area × yield_p1
// cli:    <cli> run --recipe <recipe>, 读取 p1_commitments
// ==========================================

use crate::adapters::cli_runner::{payload_failure, run_cli_json};
use crate::config::{param_f64, param_mode, param_str, ConfigError, ConfigResult};
use crate::domain::commitment::{CommitmentSet, PrincipalDecision, PrincipalState};
use crate::domain::forest::DEFAULT_PRODUCT;
use crate::domain::types::AdapterMode;
use crate::engine::plugin::{PluginArgs, PrincipalEmulator};
use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, warn};

pub const WS3_EMULATOR: &str = "ws3_emulator";

const DEFAULT_CLI: &str = "ws3";
const DEFAULT_RECIPE: &str = "baseline.json";
const DEFAULT_FRACTION: f64 = 0.01;

#[derive(Debug, Clone)]
pub struct Ws3Emulator {
    mode: AdapterMode,
    cli: String,
    recipe: String,
    fraction: f64,
    timeout: Duration,
}

impl Ws3Emulator {
    pub fn from_args(args: &PluginArgs<'_>) -> ConfigResult<Self> {
        let fraction = param_f64(args.params, "fraction")?.unwrap_or(DEFAULT_FRACTION);
        if !(0.0..=1.0).contains(&fraction) {
            return Err(ConfigError::InvalidParam {
                key: "fraction".to_string(),
                message: format!("必须位于 [0, 1]: {}", fraction),
            });
        }

        Ok(Self {
            mode: param_mode(args.params, AdapterMode::Import)?,
            cli: param_str(args.params, "cli")?.unwrap_or_else(|| DEFAULT_CLI.to_string()),
            recipe: param_str(args.params, "recipe")?
                .unwrap_or_else(|| DEFAULT_RECIPE.to_string()),
            fraction,
            timeout: args.adapter_timeout,
        })
    }

    pub fn mode(&self) -> AdapterMode {
        self.mode
    }

    fn plan_in_process(&self, state: &PrincipalState) -> PrincipalDecision {
        let commitments = state
            .inventory
            .iter()
            .map(|(stratum, hint)| {
                (
                    (stratum.clone(), DEFAULT_PRODUCT.to_string()),
                    self.fraction * hint.area * hint.yield_p1,
                )
            })
            .filter(|(_, volume)| *volume > 0.0)
            .collect();

        PrincipalDecision {
            period: state.period,
            commitments,
            warning: None,
        }
    }

    async fn plan_via_cli(&self, state: &PrincipalState) -> PrincipalDecision {
        let args = vec![
            "run".to_string(),
            "--recipe".to_string(),
            self.recipe.clone(),
        ];
        let payload = serde_json::to_value(state).unwrap_or(Value::Null);
        let out = run_cli_json(&self.cli, &args, Some(&payload), self.timeout).await;

        if let Some(reason) = payload_failure(&out) {
            warn!(cli = %self.cli, %reason, "ws3 不可用");
            return PrincipalDecision {
                period: state.period,
                commitments: CommitmentSet::new(),
                warning: Some(reason),
            };
        }

        PrincipalDecision {
            period: state.period,
            commitments: parse_p1_commitments(&out),
            warning: None,
        }
    }
}

/// 解析 {"p1_commitments": [{stratum, product?, vol}]}
pub fn parse_p1_commitments(out: &Value) -> CommitmentSet {
    out.get("p1_commitments")
        .and_then(Value::as_array)
        .map(|rows| {
            rows.iter()
                .filter_map(|row| {
                    let stratum = row.get("stratum")?.as_str()?;
                    let product = row
                        .get("product")
                        .and_then(Value::as_str)
                        .unwrap_or(DEFAULT_PRODUCT);
                    let vol = row.get("vol")?.as_f64()?;
                    Some(((stratum.to_string(), product.to_string()), vol))
                })
                .collect()
        })
        .unwrap_or_default()
}

#[async_trait]
impl PrincipalEmulator for Ws3Emulator {
    fn name(&self) -> &str {
        WS3_EMULATOR
    }

    async fn plan_first_period(&self, state: &PrincipalState) -> PrincipalDecision {
        let decision = match self.mode {
            AdapterMode::Import => self.plan_in_process(state),
            AdapterMode::Cli => self.plan_via_cli(state).await,
        };
        debug!(
            period = decision.period,
            mode = %self.mode,
            commitments = decision.commitments.len(),
            total = decision.commitments.total(),
            "ws3 首期规划"
        );
        decision
    }
}
