// ==========================================
// PAWS 木材供应仿真系统 - 合成数据集
// ==========================================
// 用途: 数据目录缺失时的确定性兜底数据
// 规模: 5 个林分, 52 个龄级
// ==========================================

use crate::domain::forest::{
    default_costs, default_prices, PeriodDemand, ProblemData, RelativeYieldTable, Stratum,
};
use std::collections::BTreeMap;

const SYNTHETIC_STRATA: u32 = 5;
const SYNTHETIC_BINS: u32 = 52;

/// 生成合成问题数据
pub fn synthesize_problem_data() -> ProblemData {
    let mut strata = BTreeMap::new();
    let mut yields = RelativeYieldTable::new();

    for i in 0..SYNTHETIC_STRATA {
        let id = format!("S{}", i);
        let area = 100.0 + 10.0 * i as f64;
        strata.insert(id.clone(), Stratum::new(&id, area, "PINE", 60 + 3 * i));

        let per_ha = 2.0 + (i % 3) as f64 * 0.1;
        for bin in 0..SYNTHETIC_BINS {
            yields.insert(&id, bin, per_ha);
        }
    }

    let demand = (0..SYNTHETIC_BINS)
        .map(|period| PeriodDemand {
            period,
            species: "PINE".to_string(),
            min_vol: 0.0,
            max_vol: 1e6,
        })
        .collect();

    ProblemData {
        strata,
        yields,
        demand,
        prices: default_prices(),
        costs: default_costs(),
    }
}
