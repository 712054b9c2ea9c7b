// ==========================================
// 费用导入系统 - 导入任务领域模型
// ==========================================
// 职责: 一次上传对应一个 ImportJob,记录生命周期/计数/错误明细
// 红线: 终态 (COMPLETED / FAILED) 后不再修改任何字段
// ==========================================

use crate::domain::types::ImportStatus;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use thiserror::Error;
use uuid::Uuid;

/// 文件级失败时使用的字段名
pub const GENERAL_FIELD: &str = "general";

// ==========================================
// ValidationError - 行级错误
// ==========================================
// 行号: 1-based,按解析后的数据行计数（不含表头,不含被跳过的空行）
// row = 0 仅用于文件级失败的合成错误
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationError {
    pub row: usize,
    pub field: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}

impl ValidationError {
    pub fn new(row: usize, field: &str, message: impl Into<String>, value: Option<&str>) -> Self {
        Self {
            row,
            field: field.to_string(),
            message: message.into(),
            value: value.map(str::to_string),
        }
    }

    /// 文件级失败的合成错误 `{row: 0, field: "general"}`
    pub fn general(message: impl Into<String>) -> Self {
        Self::new(0, GENERAL_FIELD, message, None)
    }
}

// ==========================================
// ImportJobMeta - 上传文件元信息
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportJobMeta {
    pub file_name: String,
    pub file_size: u64,
    pub mime_type: String,
}

/// 非法状态转换
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("导入任务 {job_id} 非法状态转换: {from} -> {to}")]
pub struct InvalidTransition {
    pub job_id: String,
    pub from: ImportStatus,
    pub to: ImportStatus,
}

// ==========================================
// ImportJob - 导入任务
// ==========================================
// 创建: 上传请求内同步创建 (PENDING)
// 修改: 仅由后台任务修改
// 删除: 本系统不删除
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportJob {
    // ===== 标识 =====
    pub id: String,

    // ===== 文件描述 =====
    pub file_name: String,
    pub file_size: u64,
    pub mime_type: String,

    // ===== 生命周期 =====
    pub status: ImportStatus,
    pub progress: u8,              // 百分比 0-100, PROCESSING 期间单调不减
    pub total_rows: usize,
    pub processed_rows: usize,
    pub successful_rows: usize,
    pub error_rows: usize,         // 出错的不同行数（非错误条数）
    pub errors: Vec<ValidationError>,

    // ===== 归属与审计 =====
    pub owner_id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl ImportJob {
    /// 创建 PENDING 状态的新任务
    pub fn new(meta: ImportJobMeta, owner_id: &str) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            file_name: meta.file_name,
            file_size: meta.file_size,
            mime_type: meta.mime_type,
            status: ImportStatus::Pending,
            progress: 0,
            total_rows: 0,
            processed_rows: 0,
            successful_rows: 0,
            error_rows: 0,
            errors: Vec::new(),
            owner_id: owner_id.to_string(),
            created_at: now,
            updated_at: now,
            completed_at: None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    fn transition(&self, to: ImportStatus) -> InvalidTransition {
        InvalidTransition {
            job_id: self.id.clone(),
            from: self.status,
            to,
        }
    }

    fn ensure_processing(&self) -> Result<(), InvalidTransition> {
        if self.status != ImportStatus::Processing {
            return Err(self.transition(ImportStatus::Processing));
        }
        Ok(())
    }

    /// PENDING → PROCESSING
    pub fn start_processing(&mut self) -> Result<(), InvalidTransition> {
        if self.status != ImportStatus::Pending {
            return Err(self.transition(ImportStatus::Processing));
        }
        self.status = ImportStatus::Processing;
        self.updated_at = Utc::now();
        Ok(())
    }

    /// 解析完成后设定总行数（仅 PROCESSING）
    pub fn set_total_rows(&mut self, total_rows: usize) -> Result<(), InvalidTransition> {
        self.ensure_processing()?;
        self.total_rows = total_rows;
        self.updated_at = Utc::now();
        Ok(())
    }

    /// 处理完一行: processed_rows + 1,重算进度
    pub fn record_row_processed(&mut self) -> Result<(), InvalidTransition> {
        self.ensure_processing()?;
        self.processed_rows += 1;
        let progress = percent(self.processed_rows, self.total_rows);
        self.progress = self.progress.max(progress);
        self.updated_at = Utc::now();
        Ok(())
    }

    /// PROCESSING → COMPLETED
    ///
    /// error_rows 取 errors 中不同行号的数量,单行多字段错误只计一次
    pub fn complete(
        &mut self,
        successful_rows: usize,
        errors: Vec<ValidationError>,
    ) -> Result<(), InvalidTransition> {
        if self.status != ImportStatus::Processing {
            return Err(self.transition(ImportStatus::Completed));
        }
        let now = Utc::now();
        self.status = ImportStatus::Completed;
        self.progress = 100;
        self.successful_rows = successful_rows;
        self.error_rows = distinct_error_rows(&errors);
        self.errors = errors;
        self.updated_at = now;
        self.completed_at = Some(now);
        Ok(())
    }

    /// PENDING | PROCESSING → FAILED,写入单条合成错误
    pub fn fail(&mut self, message: impl Into<String>) -> Result<(), InvalidTransition> {
        if self.is_terminal() {
            return Err(self.transition(ImportStatus::Failed));
        }
        let now = Utc::now();
        self.status = ImportStatus::Failed;
        self.errors = vec![ValidationError::general(message)];
        self.updated_at = now;
        self.completed_at = Some(now);
        Ok(())
    }
}

/// round(processed / total * 100)，total 为 0 时视为 100
pub fn percent(processed: usize, total: usize) -> u8 {
    if total == 0 {
        return 100;
    }
    let pct = (processed as f64 / total as f64 * 100.0).round();
    pct.clamp(0.0, 100.0) as u8
}

/// 错误明细中不同行号的数量（忽略 row = 0 的文件级错误）
pub fn distinct_error_rows(errors: &[ValidationError]) -> usize {
    errors
        .iter()
        .filter(|e| e.row > 0)
        .map(|e| e.row)
        .collect::<HashSet<_>>()
        .len()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_job() -> ImportJob {
        ImportJob::new(
            ImportJobMeta {
                file_name: "expenses.csv".to_string(),
                file_size: 128,
                mime_type: "text/csv".to_string(),
            },
            "user-1",
        )
    }

    #[test]
    fn test_new_job_is_pending() {
        let job = new_job();
        assert_eq!(job.status, ImportStatus::Pending);
        assert_eq!(job.progress, 0);
        assert!(job.completed_at.is_none());
    }

    #[test]
    fn test_progress_is_rounded_and_monotonic() {
        let mut job = new_job();
        job.start_processing().unwrap();
        job.set_total_rows(3).unwrap();

        let mut seen = Vec::new();
        for _ in 0..3 {
            job.record_row_processed().unwrap();
            seen.push(job.progress);
        }
        assert_eq!(seen, vec![33, 67, 100]);
    }

    #[test]
    fn test_complete_counts_distinct_error_rows() {
        let mut job = new_job();
        job.start_processing().unwrap();
        job.set_total_rows(2).unwrap();
        job.record_row_processed().unwrap();
        job.record_row_processed().unwrap();

        let errors = vec![
            ValidationError::new(1, "vendor", "Vendor is required", None),
            ValidationError::new(1, "category", "Category is required", None),
            ValidationError::new(2, "currency", "Currency is required", None),
        ];
        job.complete(0, errors).unwrap();

        assert_eq!(job.status, ImportStatus::Completed);
        assert_eq!(job.errors.len(), 3);
        assert_eq!(job.error_rows, 2);
        assert!(job.completed_at.is_some());
    }

    #[test]
    fn test_terminal_job_rejects_mutation() {
        let mut job = new_job();
        job.fail("broken workbook").unwrap();
        assert_eq!(job.errors, vec![ValidationError::general("broken workbook")]);

        assert!(job.start_processing().is_err());
        assert!(job.record_row_processed().is_err());
        assert!(job.fail("again").is_err());
        assert_eq!(job.errors.len(), 1);
    }

    #[test]
    fn test_empty_file_completes_at_full_progress() {
        let mut job = new_job();
        job.start_processing().unwrap();
        job.set_total_rows(0).unwrap();
        job.complete(0, Vec::new()).unwrap();
        assert_eq!(job.progress, 100);
        assert_eq!(job.processed_rows, job.total_rows);
    }
}
