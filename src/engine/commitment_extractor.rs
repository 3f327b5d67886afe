// ==========================================
// PAWS 木材供应仿真系统 - 首期承诺提取
// ==========================================
// 规则: X[s,t0] > 1e-9 且 X*yield > 1e-6 => (s, "sawlog")
// 降级: 无逐林分承诺时, vol[t0] > 0 记为 ("ALL", "sawlog")
// 红线: 纯函数, 同一快照重复提取结果完全一致
// ==========================================

use crate::domain::commitment::CommitmentSet;
use crate::domain::forest::{PlanningData, DEFAULT_PRODUCT};
use crate::domain::types::ExtractionMode;
use crate::engine::principal_model::ModelResult;
use serde::Serialize;

pub const AREA_TOLERANCE: f64 = 1e-9;
pub const VOLUME_TOLERANCE: f64 = 1e-6;

/// 汇总降级使用的林分键
pub const POOLED_STRATUM: &str = "ALL";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Extraction {
    pub commitments: CommitmentSet,
    pub mode: ExtractionMode,
}

impl Extraction {
    pub fn total(&self) -> f64 {
        self.commitments.total()
    }
}

/// 提取 t0 期承诺
pub fn extract(result: &ModelResult, data: &PlanningData, t0: u32) -> Extraction {
    let mut commitments = CommitmentSet::new();

    for s in data.strata.keys() {
        let area = result.area_value(s, t0);
        if area <= AREA_TOLERANCE {
            continue;
        }
        let volume = area * data.yield_at(s, t0);
        if volume > VOLUME_TOLERANCE {
            commitments.insert(s, DEFAULT_PRODUCT, volume);
        }
    }

    if !commitments.is_empty() {
        return Extraction {
            commitments,
            mode: ExtractionMode::PerStratum,
        };
    }

    let pooled = result.volume_value(t0);
    if pooled > VOLUME_TOLERANCE {
        commitments.insert(POOLED_STRATUM, DEFAULT_PRODUCT, pooled);
        return Extraction {
            commitments,
            mode: ExtractionMode::PooledFallback,
        };
    }

    Extraction {
        commitments,
        mode: ExtractionMode::Empty,
    }
}
