// ==========================================
// 费用导入系统 - 数据仓储层
// ==========================================
// 红线: Repository 不含业务逻辑
// ==========================================
// 职责: 提供数据访问接口,屏蔽数据库细节
// 约束: 所有查询使用参数化,防止 SQL 注入
// ==========================================

pub mod actor_repo;
pub mod error;
pub mod expense_repo;
pub mod import_job_repo;
pub mod reference_repo;

use rusqlite::Connection;
use std::sync::{Arc, Mutex, MutexGuard};

// 重导出核心仓储
pub use actor_repo::{ActorRepository, ActorRepositoryImpl};
pub use error::{RepositoryError, RepositoryResult};
pub use expense_repo::{ExpenseRepository, ExpenseRepositoryImpl};
pub use import_job_repo::{ImportJobRepository, ImportJobRepositoryImpl};
pub use reference_repo::{ReferenceDataRepository, ReferenceDataRepositoryImpl};

/// 各仓储共享的 SQLite 连接
pub type SharedConnection = Arc<Mutex<Connection>>;

/// 打开连接、应用统一 PRAGMA 并确保 schema 存在
pub fn open_shared_connection(db_path: &str) -> RepositoryResult<SharedConnection> {
    let conn = crate::db::open_sqlite_connection(db_path)
        .map_err(|e| RepositoryError::DatabaseConnectionError(e.to_string()))?;
    crate::db::ensure_schema(&conn)?;
    Ok(Arc::new(Mutex::new(conn)))
}

/// 获取连接锁（锁中毒转换为 LockError）
pub(crate) fn lock_connection(conn: &SharedConnection) -> RepositoryResult<MutexGuard<'_, Connection>> {
    conn.lock()
        .map_err(|e| RepositoryError::LockError(format!("锁获取失败: {}", e)))
}
