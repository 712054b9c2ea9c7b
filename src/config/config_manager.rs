// ==========================================
// 费用导入系统 - 配置管理器
// ==========================================
// 职责: 配置查询、覆写、导入参数装配
// 存储: config_kv 表 (key-value + scope)
// ==========================================

use crate::config::import_settings::ImportSettings;
use crate::repository::{lock_connection, RepositoryResult, SharedConnection};
use rusqlite::{params, OptionalExtension};
use std::str::FromStr;
use tracing::warn;

/// 全局作用域
pub const GLOBAL_SCOPE: &str = "global";

// ==========================================
// ConfigManager - 配置管理器
// ==========================================
pub struct ConfigManager {
    conn: SharedConnection,
}

impl ConfigManager {
    /// 从已有连接创建 ConfigManager
    ///
    /// 说明：为保证连接行为一致，会对传入连接再次应用统一 PRAGMA（幂等）。
    pub fn from_connection(conn: SharedConnection) -> RepositoryResult<Self> {
        {
            let guard = lock_connection(&conn)?;
            crate::db::configure_sqlite_connection(&guard)?;
        }
        Ok(Self { conn })
    }

    /// 从 config_kv 表读取配置值（scope_id='global'）
    ///
    /// # 返回
    /// - Some(String): 配置值
    /// - None: 配置不存在
    pub fn get_config_value(&self, key: &str) -> RepositoryResult<Option<String>> {
        let conn = lock_connection(&self.conn)?;
        let value = conn
            .query_row(
                "SELECT value FROM config_kv WHERE scope_id = ?1 AND key = ?2",
                params![GLOBAL_SCOPE, key],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        Ok(value)
    }

    /// 写入 global 配置（UPSERT）
    pub fn set_config_value(&self, key: &str, value: &str) -> RepositoryResult<()> {
        let conn = lock_connection(&self.conn)?;
        conn.execute(
            "INSERT INTO config_kv (scope_id, key, value) VALUES (?1, ?2, ?3)
             ON CONFLICT(scope_id, key) DO UPDATE SET value = ?3, updated_at = datetime('now')",
            params![GLOBAL_SCOPE, key, value],
        )?;
        Ok(())
    }

    /// 读取导入参数
    ///
    /// 缺失使用默认值；格式错误记录告警后同样回退默认值
    pub fn load_import_settings(&self) -> RepositoryResult<ImportSettings> {
        let defaults = ImportSettings::default();
        Ok(ImportSettings {
            max_file_size_bytes: self.get_parsed_or_default(
                config_keys::MAX_FILE_SIZE_BYTES,
                defaults.max_file_size_bytes,
            )?,
            progress_flush_every: self.get_parsed_or_default(
                config_keys::PROGRESS_FLUSH_EVERY,
                defaults.progress_flush_every,
            )?,
            preview_sample_rows: self.get_parsed_or_default(
                config_keys::PREVIEW_SAMPLE_ROWS,
                defaults.preview_sample_rows,
            )?,
        })
    }

    fn get_parsed_or_default<T>(&self, key: &str, default: T) -> RepositoryResult<T>
    where
        T: FromStr + PartialOrd + Default + Copy,
    {
        let raw = match self.get_config_value(key)? {
            Some(v) => v,
            None => return Ok(default),
        };
        match raw.trim().parse::<T>() {
            // 0 对这几个参数都无意义
            Ok(v) if v > T::default() => Ok(v),
            _ => {
                warn!(key = %key, value = %raw, "配置值非法，使用默认值");
                Ok(default)
            }
        }
    }
}

// ==========================================
// 配置键常量
// ==========================================
pub mod config_keys {
    pub const MAX_FILE_SIZE_BYTES: &str = "import/max_file_size_bytes";
    pub const PROGRESS_FLUSH_EVERY: &str = "import/progress_flush_every";
    pub const PREVIEW_SAMPLE_ROWS: &str = "import/preview_sample_rows";
}
