// ==========================================
// PAWS 木材供应仿真系统 - 导入层
// ==========================================
// 职责: 外部数据导入, 生成 ProblemData
// 支持: problem.json, Excel, CSV, 合成数据
// ==========================================

pub mod error;
pub mod file_parser;
pub mod problem_loader;
pub mod synthetic;

// 重导出核心类型
pub use error::{ImportError, ImportResult};
pub use file_parser::{CsvParser, ExcelParser, FileParser, RawRecord, UniversalFileParser};
pub use problem_loader::{load_problem_data, load_problem_data_from_tables};
pub use synthetic::synthesize_problem_data;
