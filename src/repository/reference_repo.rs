// ==========================================
// 费用导入系统 - 参考数据 Repository（供应商 / 费用类别）
// ==========================================
// 职责: 名称列表（校验用）、精确名称查找、创建（物化用）
// 说明: 名称比较使用 SQLite 默认 BINARY 排序,即大小写敏感
// 已知: 并发导入同一新名称时可能重复创建（未加唯一约束,保持现状）
// ==========================================

use crate::db::format_timestamp;
use crate::domain::expense::ReferenceEntity;
use crate::domain::types::ReferenceKind;
use crate::repository::error::RepositoryResult;
use crate::repository::{lock_connection, SharedConnection};
use async_trait::async_trait;
use chrono::Utc;
use rusqlite::{params, OptionalExtension};
use uuid::Uuid;

#[async_trait]
pub trait ReferenceDataRepository: Send + Sync {
    /// 列出全部名称（原始大小写）
    async fn list_names(&self, kind: ReferenceKind) -> RepositoryResult<Vec<String>>;

    /// 按名称精确匹配（大小写敏感）
    async fn find_by_exact_name(
        &self,
        kind: ReferenceKind,
        name: &str,
    ) -> RepositoryResult<Option<ReferenceEntity>>;

    /// 创建新记录
    async fn create(&self, kind: ReferenceKind, name: &str) -> RepositoryResult<ReferenceEntity>;
}

pub struct ReferenceDataRepositoryImpl {
    conn: SharedConnection,
}

impl ReferenceDataRepositoryImpl {
    pub fn new(conn: SharedConnection) -> Self {
        Self { conn }
    }
}

#[async_trait]
impl ReferenceDataRepository for ReferenceDataRepositoryImpl {
    async fn list_names(&self, kind: ReferenceKind) -> RepositoryResult<Vec<String>> {
        let conn = lock_connection(&self.conn)?;
        let sql = format!("SELECT name FROM {} ORDER BY name", kind.table());
        let mut stmt = conn.prepare(&sql)?;
        let names = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(names)
    }

    async fn find_by_exact_name(
        &self,
        kind: ReferenceKind,
        name: &str,
    ) -> RepositoryResult<Option<ReferenceEntity>> {
        let conn = lock_connection(&self.conn)?;
        let sql = format!(
            "SELECT id, name FROM {} WHERE name = ?1 ORDER BY created_at LIMIT 1",
            kind.table()
        );
        let entity = conn
            .query_row(&sql, params![name], |row| {
                Ok(ReferenceEntity {
                    id: row.get(0)?,
                    name: row.get(1)?,
                })
            })
            .optional()?;
        Ok(entity)
    }

    async fn create(&self, kind: ReferenceKind, name: &str) -> RepositoryResult<ReferenceEntity> {
        let conn = lock_connection(&self.conn)?;
        let entity = ReferenceEntity {
            id: Uuid::new_v4().to_string(),
            name: name.to_string(),
        };
        let sql = format!(
            "INSERT INTO {} (id, name, created_at) VALUES (?1, ?2, ?3)",
            kind.table()
        );
        conn.execute(&sql, params![entity.id, entity.name, format_timestamp(&Utc::now())])?;
        Ok(entity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::open_shared_connection;

    #[tokio::test]
    async fn test_exact_name_lookup_is_case_sensitive() {
        let repo = ReferenceDataRepositoryImpl::new(open_shared_connection(":memory:").unwrap());
        let created = repo.create(ReferenceKind::Vendor, "Acme").await.unwrap();

        let hit = repo
            .find_by_exact_name(ReferenceKind::Vendor, "Acme")
            .await
            .unwrap();
        assert_eq!(hit, Some(created));

        let miss = repo
            .find_by_exact_name(ReferenceKind::Vendor, "ACME")
            .await
            .unwrap();
        assert!(miss.is_none());
    }

    #[tokio::test]
    async fn test_kinds_are_separate_tables() {
        let repo = ReferenceDataRepositoryImpl::new(open_shared_connection(":memory:").unwrap());
        repo.create(ReferenceKind::Category, "Travel").await.unwrap();

        assert!(repo.list_names(ReferenceKind::Vendor).await.unwrap().is_empty());
        assert_eq!(
            repo.list_names(ReferenceKind::Category).await.unwrap(),
            vec!["Travel".to_string()]
        );
    }
}
