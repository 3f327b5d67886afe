// ==========================================
// PAWS 木材供应仿真系统 - 数据导入错误类型
// ==========================================
// 工具: thiserror 派生宏
// ==========================================

use thiserror::Error;

/// 导入模块错误类型
#[derive(Error, Debug)]
pub enum ImportError {
    // ===== 文件相关错误 =====
    #[error("文件不存在: {0}")]
    FileNotFound(String),

    #[error("文件格式不支持: {0}（仅支持 .xlsx/.xls/.csv）")]
    UnsupportedFormat(String),

    #[error("文件读取失败: {0}")]
    FileReadError(String),

    #[error("Excel 解析失败: {0}")]
    ExcelParseError(String),

    #[error("CSV 解析失败: {0}")]
    CsvParseError(String),

    #[error("JSON 解析失败 ({path}): {message}")]
    JsonParseError { path: String, message: String },

    // ===== 数据映射错误 =====
    #[error("必填字段缺失 ({table} 行 {row}): 期望字段之一 {fields}")]
    MissingField {
        table: String,
        row: usize,
        fields: String,
    },

    #[error("类型转换失败 ({table} 行 {row}, 字段 {field}): {message}")]
    TypeConversionError {
        table: String,
        row: usize,
        field: String,
        message: String,
    },

    // ===== 数据质量错误 =====
    #[error("林分编号重复: {0}")]
    DuplicateStratum(String),

    #[error("数值范围错误 ({table} 行 {row}, 字段 {field}): 值 {value} 必须非负")]
    NegativeValue {
        table: String,
        row: usize,
        field: String,
        value: f64,
    },
}

impl From<std::io::Error> for ImportError {
    fn from(err: std::io::Error) -> Self {
        ImportError::FileReadError(err.to_string())
    }
}

impl From<csv::Error> for ImportError {
    fn from(err: csv::Error) -> Self {
        ImportError::CsvParseError(err.to_string())
    }
}

impl From<calamine::Error> for ImportError {
    fn from(err: calamine::Error) -> Self {
        ImportError::ExcelParseError(err.to_string())
    }
}

/// Result 类型别名
pub type ImportResult<T> = Result<T, ImportError>;
