// ==========================================
// PAWS 木材供应仿真系统 - 问题数据加载
// ==========================================
// 加载顺序:
// 1) <dir>/problem.json
// 2) 表格目录: strata / yields / demand (+ 可选 prices / costs)
// 3) 均不存在时生成合成数据集
// ==========================================

use crate::domain::forest::{
    default_costs, default_prices, PeriodDemand, ProblemData, RelativeYieldTable, Stratum,
    OPEN_MAX_VOL,
};
use crate::importer::error::{ImportError, ImportResult};
use crate::importer::file_parser::{RawRecord, UniversalFileParser};
use crate::importer::synthetic::synthesize_problem_data;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

const TABLE_EXTENSIONS: [&str; 3] = ["csv", "xlsx", "xls"];

/// 加载问题数据
pub fn load_problem_data<P: AsRef<Path>>(data_path: P) -> ImportResult<ProblemData> {
    let dir = data_path.as_ref();

    let json_path = dir.join("problem.json");
    if json_path.exists() {
        let raw = fs::read_to_string(&json_path)?;
        let data: ProblemData =
            serde_json::from_str(&raw).map_err(|e| ImportError::JsonParseError {
                path: json_path.display().to_string(),
                message: e.to_string(),
            })?;
        log_loaded("json", &data);
        return Ok(data);
    }

    if find_table(dir, "strata").is_some() {
        let data = load_problem_data_from_tables(dir)?;
        log_loaded("tables", &data);
        return Ok(data);
    }

    warn!(path = %dir.display(), "未找到问题数据, 使用合成数据集");
    Ok(synthesize_problem_data())
}

/// 从表格目录加载（strata/yields/demand 必需）
pub fn load_problem_data_from_tables(dir: &Path) -> ImportResult<ProblemData> {
    let parser = UniversalFileParser;
    let read = |name: &str| -> ImportResult<Vec<RawRecord>> {
        let path = find_table(dir, name)
            .ok_or_else(|| ImportError::FileNotFound(dir.join(name).display().to_string()))?;
        parser.parse(path)
    };

    // strata: id,species,area,age
    let mut strata = BTreeMap::new();
    for (idx, row) in read("strata")?.iter().enumerate() {
        let id = text(row, "strata", idx, &["id", "stratum", "stratum_id"])?;
        let area = number(row, "strata", idx, &["area"])?;
        let area = non_negative("strata", idx, "area", area)?;
        let species = optional_text(row, &["species"]).unwrap_or_else(|| "PINE".to_string());
        let age = optional_number(row, "strata", idx, &["age"])?.unwrap_or(0.0);
        let age = non_negative("strata", idx, "age", age)?;

        if strata.contains_key(&id) {
            return Err(ImportError::DuplicateStratum(id));
        }
        strata.insert(id.clone(), Stratum::new(&id, area, &species, age.floor() as u32));
    }

    // yields: stratum,period|age_bin,yield_m3_per_ha|m3_per_ha|yield
    let mut yields = RelativeYieldTable::new();
    for (idx, row) in read("yields")?.iter().enumerate() {
        let stratum = text(row, "yields", idx, &["stratum", "id", "stratum_id"])?;
        let bin = number(row, "yields", idx, &["period", "age_bin"])?;
        let bin = non_negative("yields", idx, "period", bin)?;
        let value = number(row, "yields", idx, &["yield_m3_per_ha", "m3_per_ha", "yield"])?;
        let value = non_negative("yields", idx, "yield", value)?;
        yields.insert(&stratum, bin.floor() as u32, value);
    }

    // demand: period,species,min_vol,max_vol
    let mut demand = Vec::new();
    for (idx, row) in read("demand")?.iter().enumerate() {
        let period = number(row, "demand", idx, &["period"])?;
        let period = non_negative("demand", idx, "period", period)?;
        demand.push(PeriodDemand {
            period: period.floor() as u32,
            species: optional_text(row, &["species"]).unwrap_or_else(|| "PINE".to_string()),
            min_vol: optional_number(row, "demand", idx, &["min_vol"])?.unwrap_or(0.0),
            max_vol: optional_number(row, "demand", idx, &["max_vol"])?.unwrap_or(OPEN_MAX_VOL),
        });
    }

    // 可选: prices (species,price) / costs (name,value)
    let prices = match find_table(dir, "prices") {
        Some(path) => {
            let mut prices = BTreeMap::new();
            for (idx, row) in parser.parse(path)?.iter().enumerate() {
                prices.insert(
                    text(row, "prices", idx, &["species"])?,
                    number(row, "prices", idx, &["price"])?,
                );
            }
            prices
        }
        None => default_prices(),
    };

    let costs = match find_table(dir, "costs") {
        Some(path) => {
            let mut costs = BTreeMap::new();
            for (idx, row) in parser.parse(path)?.iter().enumerate() {
                costs.insert(
                    text(row, "costs", idx, &["name"])?,
                    number(row, "costs", idx, &["value"])?,
                );
            }
            costs
        }
        None => default_costs(),
    };

    Ok(ProblemData {
        strata,
        yields,
        demand,
        prices,
        costs,
    })
}

// ==========================================
// 辅助函数
// ==========================================

fn find_table(dir: &Path, name: &str) -> Option<PathBuf> {
    TABLE_EXTENSIONS
        .iter()
        .map(|ext| dir.join(format!("{}.{}", name, ext)))
        .find(|p| p.exists())
}

fn optional_text(row: &RawRecord, fields: &[&str]) -> Option<String> {
    fields
        .iter()
        .filter_map(|f| row.get(*f))
        .find(|v| !v.is_empty())
        .cloned()
}

fn text(row: &RawRecord, table: &str, idx: usize, fields: &[&str]) -> ImportResult<String> {
    optional_text(row, fields).ok_or_else(|| ImportError::MissingField {
        table: table.to_string(),
        row: idx + 1,
        fields: fields.join("|"),
    })
}

fn optional_number(
    row: &RawRecord,
    table: &str,
    idx: usize,
    fields: &[&str],
) -> ImportResult<Option<f64>> {
    for field in fields {
        if let Some(raw) = row.get(*field).filter(|v| !v.is_empty()) {
            let value = raw
                .parse::<f64>()
                .map_err(|e| ImportError::TypeConversionError {
                    table: table.to_string(),
                    row: idx + 1,
                    field: field.to_string(),
                    message: format!("{} ({})", e, raw),
                })?;
            return Ok(Some(value));
        }
    }
    Ok(None)
}

fn number(row: &RawRecord, table: &str, idx: usize, fields: &[&str]) -> ImportResult<f64> {
    optional_number(row, table, idx, fields)?.ok_or_else(|| ImportError::MissingField {
        table: table.to_string(),
        row: idx + 1,
        fields: fields.join("|"),
    })
}

fn non_negative(table: &str, idx: usize, field: &str, value: f64) -> ImportResult<f64> {
    if value < 0.0 || !value.is_finite() {
        return Err(ImportError::NegativeValue {
            table: table.to_string(),
            row: idx + 1,
            field: field.to_string(),
            value,
        });
    }
    Ok(value)
}

fn log_loaded(source: &str, data: &ProblemData) {
    let bins: Vec<u32> = data.yields.iter().map(|((_, bin), _)| *bin).collect();
    info!(
        source,
        strata = data.strata.len(),
        yields = data.yields.len(),
        min_bin = ?bins.iter().min(),
        max_bin = ?bins.iter().max(),
        demand = data.demand.len(),
        prices = ?data.prices,
        costs = ?data.costs,
        "问题数据加载完成"
    );
}
