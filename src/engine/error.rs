// ==========================================
// PAWS 木材供应仿真系统 - 引擎错误类型
// ==========================================
// 红线: 求解失败/适配器失败不走错误通道 (状态值/告警载荷)
//       只有配置、数据、注册表错误会中止运行
// ==========================================

use crate::config::ConfigError;
use crate::importer::ImportError;
use thiserror::Error;

/// 插件注册表错误
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("插件未注册 ({namespace}): {name}")]
    NotFound { namespace: String, name: String },
}

/// 仿真运行错误（顶层）
#[derive(Error, Debug)]
pub enum SimError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Import(#[from] ImportError),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error("运行结果写出失败 ({path}): {message}")]
    Output { path: String, message: String },
}

/// Result 类型别名
pub type SimResult<T> = Result<T, SimError>;
