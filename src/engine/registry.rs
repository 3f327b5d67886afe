// ==========================================
// PAWS 木材供应仿真系统 - 插件注册表
// ==========================================
// 职责: 名称 -> 构造工厂, 分上层仿真器 / 下层代理两个命名空间
// 说明: 显式对象, 启动时构造后以引用传入调度器; 不使用全局状态
// 规则: 重复注册允许覆盖（后注册者生效）; 查找未注册名称 => NotFound
// ==========================================

use crate::adapters::{FhopsAgent, Ws3Emulator, FHOPS_EXEC, WS3_EMULATOR};
use crate::config::{ConfigResult, AGENT_DEFAULT_STUB};
use crate::engine::agent::ProfitMaxFlowStub;
use crate::engine::error::{RegistryError, SimResult};
use crate::engine::plugin::{OperationsAgent, PluginArgs, PrincipalEmulator};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

pub type PrincipalFactory =
    Arc<dyn Fn(&PluginArgs<'_>) -> ConfigResult<Box<dyn PrincipalEmulator>> + Send + Sync>;

pub type AgentFactory =
    Arc<dyn Fn(&PluginArgs<'_>) -> ConfigResult<Box<dyn OperationsAgent>> + Send + Sync>;

const PRINCIPAL_NAMESPACE: &str = "principal";
const AGENT_NAMESPACE: &str = "agent";

#[derive(Clone, Default)]
pub struct PluginRegistry {
    principals: BTreeMap<String, PrincipalFactory>,
    agents: BTreeMap<String, AgentFactory>,
}

impl PluginRegistry {
    /// 空注册表
    pub fn new() -> Self {
        Self::default()
    }

    /// 注册内置插件: ws3_emulator / fhops_exec / profit_max_flow_stub
    pub fn with_builtin() -> Self {
        let mut registry = Self::new();
        registry.register_principal(WS3_EMULATOR, |args| {
            Ok(Box::new(Ws3Emulator::from_args(args)?) as Box<dyn PrincipalEmulator>)
        });
        registry.register_agent(FHOPS_EXEC, |args| {
            Ok(Box::new(FhopsAgent::from_args(args)?) as Box<dyn OperationsAgent>)
        });
        registry.register_agent(AGENT_DEFAULT_STUB, |args| {
            Ok(Box::new(ProfitMaxFlowStub::from_args(args)?) as Box<dyn OperationsAgent>)
        });
        registry
    }

    pub fn register_principal<F>(&mut self, name: &str, factory: F)
    where
        F: Fn(&PluginArgs<'_>) -> ConfigResult<Box<dyn PrincipalEmulator>> + Send + Sync + 'static,
    {
        if self
            .principals
            .insert(name.to_string(), Arc::new(factory))
            .is_some()
        {
            debug!(namespace = PRINCIPAL_NAMESPACE, name, "覆盖已注册插件");
        }
    }

    pub fn register_agent<F>(&mut self, name: &str, factory: F)
    where
        F: Fn(&PluginArgs<'_>) -> ConfigResult<Box<dyn OperationsAgent>> + Send + Sync + 'static,
    {
        if self
            .agents
            .insert(name.to_string(), Arc::new(factory))
            .is_some()
        {
            debug!(namespace = AGENT_NAMESPACE, name, "覆盖已注册插件");
        }
    }

    pub fn lookup_principal(&self, name: &str) -> Result<&PrincipalFactory, RegistryError> {
        self.principals
            .get(name)
            .ok_or_else(|| not_found(PRINCIPAL_NAMESPACE, name))
    }

    pub fn lookup_agent(&self, name: &str) -> Result<&AgentFactory, RegistryError> {
        self.agents
            .get(name)
            .ok_or_else(|| not_found(AGENT_NAMESPACE, name))
    }

    /// 查找并构造上层仿真器
    pub fn create_principal(
        &self,
        name: &str,
        args: &PluginArgs<'_>,
    ) -> SimResult<Box<dyn PrincipalEmulator>> {
        let factory = self.lookup_principal(name)?;
        Ok(factory(args)?)
    }

    /// 查找并构造下层代理
    pub fn create_agent(
        &self,
        name: &str,
        args: &PluginArgs<'_>,
    ) -> SimResult<Box<dyn OperationsAgent>> {
        let factory = self.lookup_agent(name)?;
        Ok(factory(args)?)
    }

    pub fn contains_principal(&self, name: &str) -> bool {
        self.principals.contains_key(name)
    }

    pub fn contains_agent(&self, name: &str) -> bool {
        self.agents.contains_key(name)
    }

    pub fn principal_names(&self) -> Vec<&str> {
        self.principals.keys().map(String::as_str).collect()
    }

    pub fn agent_names(&self) -> Vec<&str> {
        self.agents.keys().map(String::as_str).collect()
    }
}

impl std::fmt::Debug for PluginRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginRegistry")
            .field("principals", &self.principal_names())
            .field("agents", &self.agent_names())
            .finish()
    }
}

fn not_found(namespace: &str, name: &str) -> RegistryError {
    RegistryError::NotFound {
        namespace: namespace.to_string(),
        name: name.to_string(),
    }
}
