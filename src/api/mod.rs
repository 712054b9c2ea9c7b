// ==========================================
// 费用导入系统 - API 层
// ==========================================
// 职责: 提供业务 API 接口,供命令行及上层服务调用
// ==========================================

pub mod error;
pub mod import_api;

// 重导出核心类型
pub use error::{ApiError, ApiResult};
pub use import_api::ImportApi;
