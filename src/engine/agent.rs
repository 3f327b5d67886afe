// ==========================================
// PAWS 木材供应仿真系统 - 默认代理仿真
// ==========================================
// 行为: 利润最大化存根, 承诺全部兑现（受当期物理产能约束）
// 输出: realized_volume / revenue / cost / profit + 逐林分作业
// ==========================================

use crate::config::{ConfigResult, AGENT_DEFAULT_STUB};
use crate::domain::commitment::{AgentRequest, AgentResponse};
use crate::domain::forest::PlanningData;
use crate::engine::commitment_extractor::POOLED_STRATUM;
use crate::engine::plugin::{OperationsAgent, PluginArgs};
use async_trait::async_trait;
use serde_json::{json, Map, Value};
use tracing::debug;

/// 进程内利润最大化代理
#[derive(Debug, Clone, Default)]
pub struct ProfitMaxFlowStub;

impl ProfitMaxFlowStub {
    pub fn new() -> Self {
        Self
    }

    pub fn from_args(_args: &PluginArgs<'_>) -> ConfigResult<Self> {
        Ok(Self)
    }

    /// 同步版本（调度器默认路径使用）
    pub fn respond(&self, request: &AgentRequest, data: &PlanningData) -> AgentResponse {
        let mut schedule = Vec::new();
        let mut realized = 0.0;
        let mut revenue = 0.0;

        for block in &request.blocks {
            // 可兑现量: 不超过该林分当期全部面积的蓄积
            let available = if block.stratum == POOLED_STRATUM {
                data.capacity(request.period)
            } else {
                data.strata
                    .get(&block.stratum)
                    .map(|s| s.area * data.yield_at(&s.id, request.period))
                    .unwrap_or(0.0)
            };
            let volume = block.ub_vol.min(available).max(0.0);

            let species = data
                .strata
                .get(&block.stratum)
                .map(|s| s.species.as_str())
                .unwrap_or("PINE");
            let block_revenue = volume * data.price_of(species);

            realized += volume;
            revenue += block_revenue;
            schedule.push(json!({
                "stratum": block.stratum,
                "product": block.product,
                "volume": volume,
                "revenue": block_revenue,
            }));
        }

        let cost = realized * data.cost_of("harvest");
        let mut summary = Map::new();
        summary.insert("status".to_string(), Value::from("ok(stub)"));
        summary.insert("requested_volume".to_string(), Value::from(request.requested_volume()));
        summary.insert("realized_volume".to_string(), Value::from(realized));
        summary.insert("revenue".to_string(), Value::from(revenue));
        summary.insert("cost".to_string(), Value::from(cost));
        summary.insert("profit".to_string(), Value::from(revenue - cost));

        debug!(
            period = request.period,
            blocks = request.blocks.len(),
            realized,
            profit = revenue - cost,
            "代理仿真完成"
        );

        AgentResponse {
            period: request.period,
            summary,
            schedule,
        }
    }
}

#[async_trait]
impl OperationsAgent for ProfitMaxFlowStub {
    fn name(&self) -> &str {
        AGENT_DEFAULT_STUB
    }

    async fn schedule_first_period(
        &self,
        request: &AgentRequest,
        data: &PlanningData,
    ) -> AgentResponse {
        self.respond(request, data)
    }
}
