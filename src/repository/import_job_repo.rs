// ==========================================
// 费用导入系统 - 导入任务 Repository
// ==========================================
// 职责: ImportJob 的持久化（create / load / save / list_by_owner）
// 红线: Repository 不含业务规则，只做数据 CRUD
// 说明: 状态轮询方与后台任务可并发读写,共享连接由 Mutex 串行化
// ==========================================

use crate::db::{format_timestamp, parse_timestamp};
use crate::domain::import_job::{ImportJob, ValidationError};
use crate::domain::types::ImportStatus;
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::{lock_connection, SharedConnection};
use async_trait::async_trait;
use rusqlite::{params, OptionalExtension, Row};

// ==========================================
// ImportJobRepository Trait
// ==========================================
#[async_trait]
pub trait ImportJobRepository: Send + Sync {
    /// 插入新任务（调用方负责构造 PENDING 状态）
    async fn create(&self, job: &ImportJob) -> RepositoryResult<()>;

    /// 按 ID 读取任务快照
    async fn load(&self, job_id: &str) -> RepositoryResult<Option<ImportJob>>;

    /// 覆盖写入任务的可变字段
    async fn save(&self, job: &ImportJob) -> RepositoryResult<()>;

    /// 按提交人查询,按创建时间倒序
    async fn list_by_owner(&self, owner_id: &str) -> RepositoryResult<Vec<ImportJob>>;
}

// ==========================================
// ImportJobRepositoryImpl（rusqlite）
// ==========================================
pub struct ImportJobRepositoryImpl {
    conn: SharedConnection,
}

impl ImportJobRepositoryImpl {
    pub fn new(conn: SharedConnection) -> Self {
        Self { conn }
    }

    fn map_row(row: &Row<'_>) -> rusqlite::Result<RawJobRow> {
        Ok(RawJobRow {
            id: row.get(0)?,
            file_name: row.get(1)?,
            file_size: row.get(2)?,
            mime_type: row.get(3)?,
            status: row.get(4)?,
            progress: row.get(5)?,
            total_rows: row.get(6)?,
            processed_rows: row.get(7)?,
            successful_rows: row.get(8)?,
            error_rows: row.get(9)?,
            errors_json: row.get(10)?,
            owner_id: row.get(11)?,
            created_at: row.get(12)?,
            updated_at: row.get(13)?,
            completed_at: row.get(14)?,
        })
    }
}

const SELECT_COLUMNS: &str = r#"
    SELECT id, file_name, file_size, mime_type, status, progress,
           total_rows, processed_rows, successful_rows, error_rows,
           errors_json, owner_id, created_at, updated_at, completed_at
    FROM import_job
"#;

/// 数据库原始行（类型转换前）
struct RawJobRow {
    id: String,
    file_name: String,
    file_size: i64,
    mime_type: String,
    status: String,
    progress: i64,
    total_rows: i64,
    processed_rows: i64,
    successful_rows: i64,
    error_rows: i64,
    errors_json: String,
    owner_id: String,
    created_at: String,
    updated_at: String,
    completed_at: Option<String>,
}

impl RawJobRow {
    fn into_job(self) -> RepositoryResult<ImportJob> {
        let status = ImportStatus::parse(&self.status).ok_or_else(|| {
            RepositoryError::FieldValueError {
                field: "status".to_string(),
                message: format!("未知的任务状态: {}", self.status),
            }
        })?;
        let errors: Vec<ValidationError> = serde_json::from_str(&self.errors_json)?;
        let created_at = parse_timestamp(&self.created_at).ok_or_else(|| bad_timestamp("created_at"))?;
        let updated_at = parse_timestamp(&self.updated_at).ok_or_else(|| bad_timestamp("updated_at"))?;

        Ok(ImportJob {
            id: self.id,
            file_name: self.file_name,
            file_size: self.file_size.max(0) as u64,
            mime_type: self.mime_type,
            status,
            progress: self.progress.clamp(0, 100) as u8,
            total_rows: self.total_rows.max(0) as usize,
            processed_rows: self.processed_rows.max(0) as usize,
            successful_rows: self.successful_rows.max(0) as usize,
            error_rows: self.error_rows.max(0) as usize,
            errors,
            owner_id: self.owner_id,
            created_at,
            updated_at,
            completed_at: self.completed_at.as_deref().and_then(parse_timestamp),
        })
    }
}

fn bad_timestamp(field: &str) -> RepositoryError {
    RepositoryError::FieldValueError {
        field: field.to_string(),
        message: "时间戳格式错误".to_string(),
    }
}

#[async_trait]
impl ImportJobRepository for ImportJobRepositoryImpl {
    async fn create(&self, job: &ImportJob) -> RepositoryResult<()> {
        let errors_json = serde_json::to_string(&job.errors)?;
        let conn = lock_connection(&self.conn)?;

        conn.execute(
            r#"
            INSERT INTO import_job (
                id, file_name, file_size, mime_type, status, progress,
                total_rows, processed_rows, successful_rows, error_rows,
                errors_json, owner_id, created_at, updated_at, completed_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)
            "#,
            params![
                job.id,
                job.file_name,
                job.file_size as i64,
                job.mime_type,
                job.status.as_str(),
                job.progress as i64,
                job.total_rows as i64,
                job.processed_rows as i64,
                job.successful_rows as i64,
                job.error_rows as i64,
                errors_json,
                job.owner_id,
                format_timestamp(&job.created_at),
                format_timestamp(&job.updated_at),
                job.completed_at.as_ref().map(format_timestamp),
            ],
        )?;

        Ok(())
    }

    async fn load(&self, job_id: &str) -> RepositoryResult<Option<ImportJob>> {
        let raw = {
            let conn = lock_connection(&self.conn)?;
            let sql = format!("{} WHERE id = ?1", SELECT_COLUMNS);
            conn.query_row(&sql, params![job_id], Self::map_row)
                .optional()?
        };

        raw.map(RawJobRow::into_job).transpose()
    }

    async fn save(&self, job: &ImportJob) -> RepositoryResult<()> {
        let errors_json = serde_json::to_string(&job.errors)?;
        let conn = lock_connection(&self.conn)?;

        let updated = conn.execute(
            r#"
            UPDATE import_job
            SET status = ?2,
                progress = ?3,
                total_rows = ?4,
                processed_rows = ?5,
                successful_rows = ?6,
                error_rows = ?7,
                errors_json = ?8,
                updated_at = ?9,
                completed_at = ?10
            WHERE id = ?1
            "#,
            params![
                job.id,
                job.status.as_str(),
                job.progress as i64,
                job.total_rows as i64,
                job.processed_rows as i64,
                job.successful_rows as i64,
                job.error_rows as i64,
                errors_json,
                format_timestamp(&job.updated_at),
                job.completed_at.as_ref().map(format_timestamp),
            ],
        )?;

        if updated == 0 {
            return Err(RepositoryError::NotFound {
                entity: "ImportJob".to_string(),
                id: job.id.clone(),
            });
        }

        Ok(())
    }

    async fn list_by_owner(&self, owner_id: &str) -> RepositoryResult<Vec<ImportJob>> {
        let raws = {
            let conn = lock_connection(&self.conn)?;
            let sql = format!(
                "{} WHERE owner_id = ?1 ORDER BY created_at DESC, rowid DESC",
                SELECT_COLUMNS
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(params![owner_id], Self::map_row)?
                .collect::<Result<Vec<_>, _>>()?;
            rows
        };

        raws.into_iter().map(RawJobRow::into_job).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::import_job::ImportJobMeta;
    use crate::repository::open_shared_connection;

    fn repo() -> ImportJobRepositoryImpl {
        ImportJobRepositoryImpl::new(open_shared_connection(":memory:").unwrap())
    }

    fn job(owner: &str, name: &str) -> ImportJob {
        ImportJob::new(
            ImportJobMeta {
                file_name: name.to_string(),
                file_size: 42,
                mime_type: "text/csv".to_string(),
            },
            owner,
        )
    }

    #[tokio::test]
    async fn test_create_then_load() {
        let repo = repo();
        let job = job("u1", "a.csv");
        repo.create(&job).await.unwrap();

        let loaded = repo.load(&job.id).await.unwrap().unwrap();
        assert_eq!(loaded.file_name, "a.csv");
        assert_eq!(loaded.status, ImportStatus::Pending);
        assert!(repo.load("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_save_persists_errors_and_counters() {
        let repo = repo();
        let mut job = job("u1", "a.csv");
        repo.create(&job).await.unwrap();

        job.start_processing().unwrap();
        job.set_total_rows(1).unwrap();
        job.record_row_processed().unwrap();
        job.complete(
            0,
            vec![ValidationError::new(1, "vendor", "Vendor is required", Some(""))],
        )
        .unwrap();
        repo.save(&job).await.unwrap();

        let loaded = repo.load(&job.id).await.unwrap().unwrap();
        assert_eq!(loaded.status, ImportStatus::Completed);
        assert_eq!(loaded.progress, 100);
        assert_eq!(loaded.errors, job.errors);
        assert_eq!(loaded.error_rows, 1);
        assert!(loaded.completed_at.is_some());
    }

    #[tokio::test]
    async fn test_save_unknown_job_is_not_found() {
        let repo = repo();
        let job = job("u1", "a.csv");
        assert!(matches!(
            repo.save(&job).await,
            Err(RepositoryError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_list_by_owner_newest_first() {
        let repo = repo();
        let first = job("u1", "first.csv");
        let second = job("u1", "second.csv");
        let other = job("u2", "other.csv");
        for j in [&first, &second, &other] {
            repo.create(j).await.unwrap();
        }

        let jobs = repo.list_by_owner("u1").await.unwrap();
        let names: Vec<_> = jobs.iter().map(|j| j.file_name.as_str()).collect();
        assert_eq!(names, vec!["second.csv", "first.csv"]);
    }
}
