// ==========================================
// PAWS 木材供应仿真系统 - FHOPS 作业代理适配
// ==========================================
// cli:    <cli> solve-mip --profile <profile>, 请求经 stdin 传入
// import: 进程内近似, 每个作业块按上限兑现
// 红线: 外部不可用时返回 {warning|error} 摘要, 不抛错
// ==========================================

use crate::adapters::cli_runner::{payload_failure, run_cli_json};
use crate::config::{param_mode, param_str, ConfigResult};
use crate::domain::commitment::{AgentRequest, AgentResponse};
use crate::domain::forest::PlanningData;
use crate::domain::types::AdapterMode;
use crate::engine::plugin::{OperationsAgent, PluginArgs};
use async_trait::async_trait;
use serde_json::{json, Map, Value};
use std::time::Duration;
use tracing::{info, warn};

pub const FHOPS_EXEC: &str = "fhops_exec";

const DEFAULT_CLI: &str = "fhops";
const DEFAULT_PROFILE: &str = "default";

#[derive(Debug, Clone)]
pub struct FhopsAgent {
    mode: AdapterMode,
    cli: String,
    profile: String,
    timeout: Duration,
}

impl FhopsAgent {
    pub fn from_args(args: &PluginArgs<'_>) -> ConfigResult<Self> {
        Ok(Self {
            mode: param_mode(args.params, AdapterMode::Cli)?,
            cli: param_str(args.params, "cli")?.unwrap_or_else(|| DEFAULT_CLI.to_string()),
            profile: param_str(args.params, "profile")?
                .unwrap_or_else(|| DEFAULT_PROFILE.to_string()),
            timeout: args.adapter_timeout,
        })
    }

    pub fn mode(&self) -> AdapterMode {
        self.mode
    }

    fn schedule_in_process(&self, request: &AgentRequest) -> AgentResponse {
        let schedule: Vec<Value> = request
            .blocks
            .iter()
            .map(|b| {
                json!({
                    "stratum": b.stratum,
                    "product": b.product,
                    "volume": b.ub_vol.max(0.0),
                })
            })
            .collect();
        let realized: f64 = request.blocks.iter().map(|b| b.ub_vol.max(0.0)).sum();

        let mut summary = Map::new();
        summary.insert("status".to_string(), Value::from("ok(import)"));
        summary.insert("realized_volume".to_string(), Value::from(realized));

        AgentResponse {
            period: request.period,
            summary,
            schedule,
        }
    }

    async fn schedule_via_cli(&self, request: &AgentRequest) -> AgentResponse {
        let args = vec![
            "solve-mip".to_string(),
            "--profile".to_string(),
            self.profile.clone(),
        ];
        let payload = serde_json::to_value(request).unwrap_or(Value::Null);
        let out = run_cli_json(&self.cli, &args, Some(&payload), self.timeout).await;

        let mut summary = Map::new();
        if let Some(reason) = payload_failure(&out) {
            let key = if out.get("warning").is_some() {
                "warning"
            } else {
                "error"
            };
            summary.insert(key.to_string(), Value::from(reason));
            return AgentResponse {
                period: request.period,
                summary,
                schedule: Vec::new(),
            };
        }

        summary.insert("status".to_string(), Value::from("ok(cli)"));
        summary.insert(
            "solver".to_string(),
            out.get("solver").cloned().unwrap_or_else(|| Value::from("highs")),
        );
        if let Some(realized) = out.get("realized_volume").and_then(Value::as_f64) {
            summary.insert("realized_volume".to_string(), Value::from(realized));
        }
        if let Some(raw) = out.get("stdout") {
            summary.insert("stdout".to_string(), raw.clone());
        }

        AgentResponse {
            period: request.period,
            summary,
            schedule: out
                .get("schedule")
                .and_then(Value::as_array)
                .cloned()
                .unwrap_or_default(),
        }
    }
}

#[async_trait]
impl OperationsAgent for FhopsAgent {
    fn name(&self) -> &str {
        FHOPS_EXEC
    }

    fn is_external(&self) -> bool {
        true
    }

    async fn schedule_first_period(
        &self,
        request: &AgentRequest,
        _data: &PlanningData,
    ) -> AgentResponse {
        let response = match self.mode {
            AdapterMode::Import => self.schedule_in_process(request),
            AdapterMode::Cli => self.schedule_via_cli(request).await,
        };

        match response.unavailable_reason() {
            Some(reason) => warn!(period = request.period, cli = %self.cli, %reason, "FHOPS 不可用"),
            None => info!(
                period = request.period,
                mode = %self.mode,
                blocks = request.blocks.len(),
                realized = ?response.realized_volume(),
                "FHOPS 作业安排完成"
            ),
        }
        response
    }
}
