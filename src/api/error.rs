// ==========================================
// 费用导入系统 - API层错误类型
// ==========================================
// 职责: 定义API层错误类型，转换下层错误为用户友好的错误消息
// ==========================================

use crate::importer::ImportError;
use crate::repository::error::RepositoryError;
use thiserror::Error;

/// API层错误类型
#[derive(Error, Debug)]
pub enum ApiError {
    // ==========================================
    // 请求错误
    // ==========================================
    #[error("无效输入: {0}")]
    InvalidInput(String),

    #[error("资源未找到: {0}")]
    NotFound(String),

    #[error("业务规则违反: {0}")]
    BusinessRuleViolation(String),

    #[error("无效的状态转换: from={from} to={to}")]
    InvalidStateTransition { from: String, to: String },

    // ==========================================
    // 并发控制错误
    // ==========================================
    #[error("任务冲突: {0}")]
    Conflict(String),

    // ==========================================
    // 数据访问错误
    // ==========================================
    #[error("数据库错误: {0}")]
    DatabaseError(String),

    #[error("数据库连接失败: {0}")]
    DatabaseConnectionError(String),

    // ==========================================
    // 导入错误
    // ==========================================
    #[error("文件导入失败: {0}")]
    ImportError(String),

    // ==========================================
    // 通用错误
    // ==========================================
    #[error("内部错误: {0}")]
    InternalError(String),
}

// ==========================================
// 从 RepositoryError 转换
// ==========================================
impl From<RepositoryError> for ApiError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::NotFound { entity, id } => {
                ApiError::NotFound(format!("{}(id={})不存在", entity, id))
            }
            RepositoryError::DatabaseConnectionError(msg) => ApiError::DatabaseConnectionError(msg),
            RepositoryError::LockError(msg) => {
                ApiError::DatabaseConnectionError(format!("数据库锁获取失败: {}", msg))
            }
            RepositoryError::DatabaseQueryError(msg) => ApiError::DatabaseError(msg),
            RepositoryError::UniqueConstraintViolation(msg) => {
                ApiError::BusinessRuleViolation(format!("唯一约束违反: {}", msg))
            }
            RepositoryError::ForeignKeyViolation(msg) => {
                ApiError::BusinessRuleViolation(format!("外键约束违反: {}", msg))
            }
            RepositoryError::FieldValueError { field, message } => {
                ApiError::InvalidInput(format!("字段{}错误: {}", field, message))
            }
            RepositoryError::SerializationError(msg) => ApiError::InternalError(msg),
        }
    }
}

// ==========================================
// 从 ImportError 转换
// ==========================================
impl From<ImportError> for ApiError {
    fn from(err: ImportError) -> Self {
        match err {
            ImportError::UnsupportedMimeType(_)
            | ImportError::UnsupportedFormat(_)
            | ImportError::FileTooLarge { .. } => ApiError::InvalidInput(err.to_string()),
            ImportError::ActorNotFound(_) | ImportError::JobNotFound(_) => {
                ApiError::NotFound(err.to_string())
            }
            ImportError::JobAlreadyRunning(_) => ApiError::Conflict(err.to_string()),
            ImportError::ExcelParseError(_)
            | ImportError::CsvParseError(_) => ApiError::ImportError(err.to_string()),
            ImportError::Repository(repo_err) => repo_err.into(),
            ImportError::InvalidTransition(t) => ApiError::InvalidStateTransition {
                from: t.from.to_string(),
                to: t.to.to_string(),
            },
            ImportError::InternalError(msg) => ApiError::InternalError(msg),
        }
    }
}

/// Result 类型别名
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repository_error_conversion() {
        let repo_err = RepositoryError::NotFound {
            entity: "ImportJob".to_string(),
            id: "J001".to_string(),
        };
        let api_err: ApiError = repo_err.into();
        match api_err {
            ApiError::NotFound(msg) => {
                assert!(msg.contains("ImportJob"));
                assert!(msg.contains("J001"));
            }
            _ => panic!("Expected NotFound"),
        }

        let api_err: ApiError = RepositoryError::LockError("poisoned".to_string()).into();
        assert!(matches!(api_err, ApiError::DatabaseConnectionError(_)));
    }

    #[test]
    fn test_import_error_conversion() {
        let api_err: ApiError = ImportError::FileTooLarge { size: 20, limit: 10 }.into();
        assert!(matches!(api_err, ApiError::InvalidInput(_)));

        let api_err: ApiError = ImportError::ActorNotFound("u9".to_string()).into();
        match api_err {
            ApiError::NotFound(msg) => assert!(msg.contains("u9")),
            _ => panic!("Expected NotFound"),
        }

        let api_err: ApiError = ImportError::JobAlreadyRunning("J1".to_string()).into();
        assert!(matches!(api_err, ApiError::Conflict(_)));

        let api_err: ApiError = ImportError::Repository(RepositoryError::DatabaseQueryError(
            "disk I/O".to_string(),
        ))
        .into();
        assert!(matches!(api_err, ApiError::DatabaseError(_)));
    }
}
