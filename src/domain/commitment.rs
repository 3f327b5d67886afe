// ==========================================
// PAWS 木材供应仿真系统 - 委托/代理交换对象
// ==========================================
// 职责: 承诺集合、委托方决策、代理请求/响应
// 说明: 承诺集合只描述"从哪里取多少什么", 不含成本/路线
// ==========================================

use serde::de::{self, Deserializer, MapAccess, Visitor};
use serde::ser::{SerializeMap, Serializer};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;

// ==========================================
// CommitmentSet - 首期承诺集合
// ==========================================
// 键: (林分, 产品) -> 体积 (m³)
// 外部 JSON 键格式: "<stratum>|<product>"
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CommitmentSet {
    entries: BTreeMap<(String, String), f64>,
}

impl CommitmentSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, stratum: &str, product: &str, volume: f64) {
        self.entries
            .insert((stratum.to_string(), product.to_string()), volume);
    }

    pub fn get(&self, stratum: &str, product: &str) -> Option<f64> {
        self.entries
            .get(&(stratum.to_string(), product.to_string()))
            .copied()
    }

    /// 承诺总体积
    pub fn total(&self) -> f64 {
        self.entries.values().sum()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&(String, String), &f64)> {
        self.entries.iter()
    }

    /// 外部键 "<stratum>|<product>"
    pub fn wire_key(stratum: &str, product: &str) -> String {
        format!("{}|{}", stratum, product)
    }
}

impl FromIterator<((String, String), f64)> for CommitmentSet {
    fn from_iter<I: IntoIterator<Item = ((String, String), f64)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

impl Serialize for CommitmentSet {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for ((stratum, product), volume) in &self.entries {
            map.serialize_entry(&Self::wire_key(stratum, product), volume)?;
        }
        map.end()
    }
}

struct CommitmentSetVisitor;

impl<'de> Visitor<'de> for CommitmentSetVisitor {
    type Value = CommitmentSet;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "a map keyed by \"<stratum>|<product>\"")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
        let mut set = CommitmentSet::new();
        while let Some((key, volume)) = access.next_entry::<String, f64>()? {
            let (stratum, product) = key
                .rsplit_once('|')
                .ok_or_else(|| de::Error::custom(format!("承诺键缺少 '|': {}", key)))?;
            set.insert(stratum, product, volume);
        }
        Ok(set)
    }
}

impl<'de> Deserialize<'de> for CommitmentSet {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_map(CommitmentSetVisitor)
    }
}

// ==========================================
// PrincipalDecision - 委托方决策
// ==========================================
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PrincipalDecision {
    pub period: u32,
    #[serde(default)]
    pub commitments: CommitmentSet,
    /// 外部仿真器不可用时的说明（此时承诺为空）
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

// ==========================================
// PrincipalState - 外部委托方仿真器输入快照
// ==========================================
// 形如 {period, inventory: {stratum: {area, yield_p1}}}
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct InventoryHint {
    pub area: f64,
    pub yield_p1: f64, // 当期单位面积蓄积
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PrincipalState {
    pub period: u32,
    #[serde(default)]
    pub inventory: BTreeMap<String, InventoryHint>,
}

// ==========================================
// BlockRequest - 作业块请求
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockRequest {
    pub stratum: String,
    pub product: String,
    pub ub_vol: f64, // 体积上限
}

// ==========================================
// AgentRequest - 代理请求
// ==========================================
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AgentRequest {
    pub period: u32,
    #[serde(default)]
    pub blocks: Vec<BlockRequest>,
    #[serde(default)]
    pub commitments: CommitmentSet,
}

impl AgentRequest {
    /// 由承诺集合生成请求（每个承诺对应一个作业块）
    pub fn from_commitments(period: u32, commitments: CommitmentSet) -> Self {
        let blocks = commitments
            .iter()
            .map(|((stratum, product), volume)| BlockRequest {
                stratum: stratum.clone(),
                product: product.clone(),
                ub_vol: *volume,
            })
            .collect();
        Self {
            period,
            blocks,
            commitments,
        }
    }

    pub fn requested_volume(&self) -> f64 {
        self.blocks.iter().map(|b| b.ub_vol).sum()
    }
}

// ==========================================
// AgentResponse - 代理响应
// ==========================================
// 仅为反馈, 不构成约束性合同
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AgentResponse {
    pub period: u32,
    #[serde(default)]
    pub summary: Map<String, Value>,
    #[serde(default)]
    pub schedule: Vec<Value>,
}

/// 载荷中的 warning/error 字段 (warning 优先)
pub fn failure_reason(fields: &Map<String, Value>) -> Option<String> {
    ["warning", "error"].iter().find_map(|key| {
        fields
            .get(*key)
            .map(|v| v.as_str().map(str::to_string).unwrap_or_else(|| v.to_string()))
    })
}

impl AgentResponse {
    /// 实现/消耗体积（summary.realized_volume）
    pub fn realized_volume(&self) -> Option<f64> {
        self.summary.get("realized_volume").and_then(Value::as_f64)
    }

    /// 适配器返回 warning/error 时视为下层不可用
    pub fn unavailable_reason(&self) -> Option<String> {
        failure_reason(&self.summary)
    }

    pub fn is_unavailable(&self) -> bool {
        self.unavailable_reason().is_some()
    }
}
