// ==========================================
// PAWS 木材供应仿真系统 - 森林资源领域模型
// ==========================================
// 职责: 林分、收获表、需求、价格/成本
// 红线: 纯数据,不含求解逻辑; 加载后只读
// ==========================================

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// 默认产品标签
pub const DEFAULT_PRODUCT: &str = "sawlog";

/// 需求上限缺省值（视为不设上限）
pub const OPEN_MAX_VOL: f64 = 1e12;

// ==========================================
// Stratum - 林分
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stratum {
    pub id: String,      // 林分编号（唯一）
    pub area: f64,       // 面积 (公顷)
    pub species: String, // 树种
    pub age: u32,        // 当前林龄 (年)
}

impl Stratum {
    pub fn new(id: &str, area: f64, species: &str, age: u32) -> Self {
        Self {
            id: id.to_string(),
            area,
            species: species.to_string(),
            age,
        }
    }
}

// ==========================================
// PeriodDemand - 分期需求
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeriodDemand {
    pub period: u32,
    #[serde(default = "default_species")]
    pub species: String,
    #[serde(default)]
    pub min_vol: f64,
    #[serde(default = "default_max_vol")]
    pub max_vol: f64,
}

fn default_species() -> String {
    "PINE".to_string()
}

fn default_max_vol() -> f64 {
    OPEN_MAX_VOL
}

impl PeriodDemand {
    /// 下限是否生效
    pub fn has_lower_bound(&self) -> bool {
        self.min_vol > 0.0
    }

    /// 上限是否生效
    pub fn has_upper_bound(&self) -> bool {
        self.max_vol.is_finite() && self.max_vol < OPEN_MAX_VOL
    }
}

// ==========================================
// 收获表行（外部 JSON 交换格式）
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct YieldRow {
    pub stratum: String,
    #[serde(alias = "age_bin")]
    pub period: u32,
    #[serde(rename = "yield", alias = "yield_m3_per_ha", alias = "m3_per_ha")]
    pub value: f64,
}

// ==========================================
// RelativeYieldTable - 相对收获表
// ==========================================
// 索引: (林分, 龄级) -> 单位面积蓄积 (m³/ha)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "Vec<YieldRow>", into = "Vec<YieldRow>")]
pub struct RelativeYieldTable {
    entries: BTreeMap<(String, u32), f64>,
}

impl RelativeYieldTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, stratum: &str, age_bin: u32, value: f64) {
        self.entries.insert((stratum.to_string(), age_bin), value);
    }

    pub fn get(&self, stratum: &str, age_bin: u32) -> Option<f64> {
        self.entries.get(&(stratum.to_string(), age_bin)).copied()
    }

    /// 林分最大龄级（未出现时为 0）
    pub fn max_bin(&self, stratum: &str) -> u32 {
        self.entries
            .keys()
            .filter(|(s, _)| s == stratum)
            .map(|(_, bin)| *bin)
            .max()
            .unwrap_or(0)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&(String, u32), &f64)> {
        self.entries.iter()
    }
}

impl From<Vec<YieldRow>> for RelativeYieldTable {
    fn from(rows: Vec<YieldRow>) -> Self {
        let mut table = RelativeYieldTable::new();
        for row in rows {
            table.insert(&row.stratum, row.period, row.value);
        }
        table
    }
}

impl From<RelativeYieldTable> for Vec<YieldRow> {
    fn from(table: RelativeYieldTable) -> Self {
        table
            .entries
            .into_iter()
            .map(|((stratum, period), value)| YieldRow {
                stratum,
                period,
                value,
            })
            .collect()
    }
}

// ==========================================
// AbsoluteYieldTable - 绝对收获表
// ==========================================
// 索引: (林分, 仿真期) -> 单位面积蓄积
// 只能由 yield_expansion 生成
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AbsoluteYieldTable {
    entries: HashMap<(String, u32), f64>,
    last_period: u32,
}

impl AbsoluteYieldTable {
    pub(crate) fn with_last_period(last_period: u32) -> Self {
        Self {
            entries: HashMap::new(),
            last_period,
        }
    }

    pub(crate) fn insert(&mut self, stratum: &str, period: u32, value: f64) {
        self.entries.insert((stratum.to_string(), period), value);
    }

    /// 查询蓄积（缺失视为 0）
    pub fn get(&self, stratum: &str, period: u32) -> f64 {
        self.entries
            .get(&(stratum.to_string(), period))
            .copied()
            .unwrap_or(0.0)
    }

    pub fn contains(&self, stratum: &str, period: u32) -> bool {
        self.entries.contains_key(&(stratum.to_string(), period))
    }

    /// 覆盖的最后一期（含）
    pub fn last_period(&self) -> u32 {
        self.last_period
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// ==========================================
// ProblemData - 原始问题数据（相对收获表）
// ==========================================
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProblemData {
    #[serde(default)]
    pub strata: BTreeMap<String, Stratum>,
    #[serde(default)]
    pub yields: RelativeYieldTable,
    #[serde(default)]
    pub demand: Vec<PeriodDemand>,
    #[serde(default = "default_prices")]
    pub prices: BTreeMap<String, f64>,
    #[serde(default = "default_costs")]
    pub costs: BTreeMap<String, f64>,
}

pub fn default_prices() -> BTreeMap<String, f64> {
    BTreeMap::from([("PINE".to_string(), 100.0)])
}

pub fn default_costs() -> BTreeMap<String, f64> {
    BTreeMap::from([("harvest".to_string(), 50.0)])
}

// ==========================================
// PlanningData - 仿真期间使用的只读数据
// ==========================================
// 由 ProblemData 经收获表展开得到
#[derive(Debug, Clone)]
pub struct PlanningData {
    pub strata: BTreeMap<String, Stratum>,
    pub yields: AbsoluteYieldTable,
    pub demand: Vec<PeriodDemand>,
    pub prices: BTreeMap<String, f64>,
    pub costs: BTreeMap<String, f64>,
}

impl PlanningData {
    pub fn yield_at(&self, stratum: &str, period: u32) -> f64 {
        self.yields.get(stratum, period)
    }

    /// 物理产能: Σ_s area[s] * yield[s,t]
    pub fn capacity(&self, period: u32) -> f64 {
        self.strata
            .values()
            .map(|s| s.area * self.yield_at(&s.id, period))
            .sum()
    }

    /// 窗口内可用蓄积上界: Σ_s area[s] * max_t yield[s,t]
    pub fn stock_bound(&self, t0: u32, horizon: u32) -> f64 {
        self.strata
            .values()
            .map(|s| {
                let best = (t0..t0 + horizon)
                    .map(|t| self.yield_at(&s.id, t))
                    .fold(0.0_f64, f64::max);
                s.area * best
            })
            .sum()
    }

    pub fn total_area(&self) -> f64 {
        self.strata.values().map(|s| s.area).sum()
    }

    pub fn price_of(&self, species: &str) -> f64 {
        self.prices.get(species).copied().unwrap_or(0.0)
    }

    pub fn cost_of(&self, name: &str) -> f64 {
        self.costs.get(name).copied().unwrap_or(0.0)
    }
}
