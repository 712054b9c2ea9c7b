// ==========================================
// 费用导入系统 - 提交人 Repository
// ==========================================
// 职责: 按 ID 解析上传人（请求级校验）
// ==========================================

use crate::domain::expense::Actor;
use crate::repository::error::RepositoryResult;
use crate::repository::{lock_connection, SharedConnection};
use async_trait::async_trait;
use rusqlite::{params, OptionalExtension};

#[async_trait]
pub trait ActorRepository: Send + Sync {
    async fn find_by_id(&self, actor_id: &str) -> RepositoryResult<Option<Actor>>;

    /// 新增或更新（初始化数据 / 命令行使用）
    async fn upsert(&self, actor: &Actor) -> RepositoryResult<()>;
}

pub struct ActorRepositoryImpl {
    conn: SharedConnection,
}

impl ActorRepositoryImpl {
    pub fn new(conn: SharedConnection) -> Self {
        Self { conn }
    }
}

#[async_trait]
impl ActorRepository for ActorRepositoryImpl {
    async fn find_by_id(&self, actor_id: &str) -> RepositoryResult<Option<Actor>> {
        let conn = lock_connection(&self.conn)?;
        let actor = conn
            .query_row(
                "SELECT user_id, display_name FROM app_user WHERE user_id = ?1",
                params![actor_id],
                |row| {
                    Ok(Actor {
                        id: row.get(0)?,
                        display_name: row.get(1)?,
                    })
                },
            )
            .optional()?;
        Ok(actor)
    }

    async fn upsert(&self, actor: &Actor) -> RepositoryResult<()> {
        let conn = lock_connection(&self.conn)?;
        conn.execute(
            r#"
            INSERT INTO app_user (user_id, display_name) VALUES (?1, ?2)
            ON CONFLICT(user_id) DO UPDATE SET display_name = excluded.display_name
            "#,
            params![actor.id, actor.display_name],
        )?;
        Ok(())
    }
}
