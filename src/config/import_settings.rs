// ==========================================
// 费用导入系统 - 导入参数
// ==========================================
// 职责: 导入管道的可调参数（带默认值）
// 红线: 不包含配置读取逻辑（见 ConfigManager）
// ==========================================

use crate::importer::file_parser::DEFAULT_MAX_FILE_SIZE_BYTES;
use serde::{Deserialize, Serialize};

/// 默认进度落库间隔（行）
pub const DEFAULT_PROGRESS_FLUSH_EVERY: usize = 10;

/// 默认预览样例行数
pub const DEFAULT_PREVIEW_SAMPLE_ROWS: usize = 5;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportSettings {
    /// 上传文件大小上限（字节）
    pub max_file_size_bytes: u64,
    /// 每处理 N 行持久化一次任务快照（结束时总会再写一次）
    pub progress_flush_every: usize,
    /// 预览返回的样例行数
    pub preview_sample_rows: usize,
}

impl Default for ImportSettings {
    fn default() -> Self {
        Self {
            max_file_size_bytes: DEFAULT_MAX_FILE_SIZE_BYTES,
            progress_flush_every: DEFAULT_PROGRESS_FLUSH_EVERY,
            preview_sample_rows: DEFAULT_PREVIEW_SAMPLE_ROWS,
        }
    }
}
