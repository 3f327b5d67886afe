// ==========================================
// PAWS 木材供应仿真系统 - 委托方/代理插件接口
// ==========================================
// 职责: 定义上层仿真器与下层作业代理的能力接口（不包含实现）
// 实现者: adapters::ws3 / adapters::fhops / engine::agent
// 红线: 外部失败以载荷字段表达, 接口方法不返回错误
// ==========================================

use crate::config::PolicyParams;
use crate::domain::commitment::{AgentRequest, AgentResponse, PrincipalDecision, PrincipalState};
use crate::domain::forest::PlanningData;
use async_trait::async_trait;
use std::time::Duration;

// ==========================================
// PluginArgs - 插件构造参数
// ==========================================
#[derive(Debug, Clone, Copy)]
pub struct PluginArgs<'a> {
    pub params: &'a PolicyParams,
    pub adapter_timeout: Duration, // 外部调用超时
}

impl<'a> PluginArgs<'a> {
    pub fn new(params: &'a PolicyParams, adapter_timeout: Duration) -> Self {
        Self {
            params,
            adapter_timeout,
        }
    }
}

// ==========================================
// PrincipalEmulator Trait
// ==========================================
// 用途: 外部上层规划器, 给出首期承诺
#[async_trait]
pub trait PrincipalEmulator: Send + Sync {
    /// 注册名
    fn name(&self) -> &str;

    /// 依据状态快照规划首期承诺
    async fn plan_first_period(&self, state: &PrincipalState) -> PrincipalDecision;
}

// ==========================================
// OperationsAgent Trait
// ==========================================
// 用途: 下层作业执行, 对承诺给出实现量反馈
#[async_trait]
pub trait OperationsAgent: Send + Sync {
    fn name(&self) -> &str;

    /// 是否为外部下层执行器（双层循环只向外部执行器分派）
    fn is_external(&self) -> bool {
        false
    }

    /// 安排首期作业
    async fn schedule_first_period(
        &self,
        request: &AgentRequest,
        data: &PlanningData,
    ) -> AgentResponse;
}
