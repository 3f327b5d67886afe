// ==========================================
// PAWS 木材供应仿真系统 - 收获表展开
// ==========================================
// 职责: 相对收获表 (林分, 龄级) -> 绝对收获表 (林分, 仿真期)
// 公式: bin = floor((age0 + t*ypp) / ypp), 截断到最大龄级
// 红线: 运行开始前执行一次, 之后只读
// ==========================================

use crate::config::{ConfigResult, PeriodLength};
use crate::domain::forest::{AbsoluteYieldTable, RelativeYieldTable, Stratum};
use std::collections::BTreeMap;
use tracing::debug;

/// 展开收获表
///
/// # 参数
/// - end_period / horizon_periods: 覆盖 [0, end_period + horizon_periods]
/// - period_length: 期长（换算每期年数）
///
/// # 返回
/// - Err(ConfigError): 期长无法解析或非正
pub fn expand(
    relative: &RelativeYieldTable,
    strata: &BTreeMap<String, Stratum>,
    end_period: u32,
    horizon_periods: u32,
    period_length: &PeriodLength,
) -> ConfigResult<AbsoluteYieldTable> {
    let ypp = period_length.years_per_period()?;
    Ok(expand_with_ypp(relative, strata, end_period, horizon_periods, ypp))
}

/// 以已换算的每期年数展开（ypp 必须为正）
pub fn expand_with_ypp(
    relative: &RelativeYieldTable,
    strata: &BTreeMap<String, Stratum>,
    end_period: u32,
    horizon_periods: u32,
    ypp: f64,
) -> AbsoluteYieldTable {
    let last_period = end_period.saturating_add(horizon_periods);
    let mut table = AbsoluteYieldTable::with_last_period(last_period);

    for stratum in strata.values() {
        let max_bin = relative.max_bin(&stratum.id);
        for t in 0..=last_period {
            let bin = age_bin(stratum.age, t, ypp).min(max_bin);
            let value = relative.get(&stratum.id, bin).unwrap_or(0.0);
            table.insert(&stratum.id, t, value);
        }
    }

    debug!(
        strata = strata.len(),
        last_period,
        years_per_period = ypp,
        entries = table.len(),
        "收获表展开完成"
    );
    table
}

/// 第 t 期的龄级
pub fn age_bin(age0: u32, t: u32, ypp: f64) -> u32 {
    let age_years = age0 as f64 + t as f64 * ypp;
    let bin = (age_years / ypp).floor();
    if bin <= 0.0 {
        0
    } else if bin >= u32::MAX as f64 {
        u32::MAX
    } else {
        bin as u32
    }
}
