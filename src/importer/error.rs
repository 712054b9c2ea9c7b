// ==========================================
// 费用导入系统 - 导入模块错误类型
// ==========================================
// 分类:
// - 请求级: MIME/大小/提交人 → 同步拒绝,不创建任务
// - 文件级: 解析失败 → 任务 FAILED
// 行级校验/物化错误不走此类型,记录在 ImportJob.errors
// ==========================================

use crate::domain::import_job::InvalidTransition;
use crate::repository::RepositoryError;
use thiserror::Error;

/// 导入模块错误类型
#[derive(Error, Debug)]
pub enum ImportError {
    // ===== 请求级错误 =====
    #[error("文件类型不支持: {0}（仅支持 CSV / Excel）")]
    UnsupportedMimeType(String),

    #[error("文件格式不支持: {0}（仅支持 .xlsx/.xls/.csv）")]
    UnsupportedFormat(String),

    #[error("文件过大: {size} 字节，上限 {limit} 字节")]
    FileTooLarge { size: u64, limit: u64 },

    #[error("提交人不存在: {0}")]
    ActorNotFound(String),

    #[error("导入任务不存在: {0}")]
    JobNotFound(String),

    #[error("导入任务已在执行: {0}")]
    JobAlreadyRunning(String),

    // ===== 文件级错误 =====
    #[error("Excel 解析失败: {0}")]
    ExcelParseError(String),

    #[error("CSV 解析失败: {0}")]
    CsvParseError(String),

    // ===== 下层错误 =====
    #[error(transparent)]
    Repository(#[from] RepositoryError),

    #[error(transparent)]
    InvalidTransition(#[from] InvalidTransition),

    // ===== 通用错误 =====
    #[error("内部错误: {0}")]
    InternalError(String),
}

// 实现 From<csv::Error>
impl From<csv::Error> for ImportError {
    fn from(err: csv::Error) -> Self {
        ImportError::CsvParseError(err.to_string())
    }
}

// 实现 From<calamine::Error>
impl From<calamine::Error> for ImportError {
    fn from(err: calamine::Error) -> Self {
        ImportError::ExcelParseError(err.to_string())
    }
}

/// Result 类型别名
pub type ImportResult<T> = Result<T, ImportError>;
