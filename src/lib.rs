// ==========================================
// 费用导入系统 - 核心库
// ==========================================
// 技术栈: Rust + SQLite + tokio
// 系统定位: 费用明细批量导入（CSV / Excel → 费用草稿）
// ==========================================

// ==========================================
// 模块声明
// ==========================================

// 领域层 - 实体与类型
pub mod domain;

// 数据仓储层 - 数据访问
pub mod repository;

// 导入层 - 外部数据
pub mod importer;

// 配置层 - 导入参数
pub mod config;

// 数据库基础设施（连接初始化/PRAGMA 统一/建表）
pub mod db;

// 日志系统
pub mod logging;

// API 层 - 业务接口
pub mod api;

// ==========================================
// 重导出核心类型
// ==========================================

// 领域类型
pub use domain::types::{
    ExpenseDirection, ExpenseStatus, ImportStatus, PaymentMethod, ReferenceKind, IMPORT_COLUMNS,
};

// 领域实体
pub use domain::{Actor, Expense, ImportJob, ParsedRow, ReferenceEntity, ValidationError};

// 导入
pub use importer::{ImportError, ImportOrchestrator, PreviewResult, UploadedFile};

// API
pub use api::{ApiError, ImportApi};

// ==========================================
// 常量定义
// ==========================================

// 系统版本
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// 系统名称
pub const APP_NAME: &str = "费用导入系统";
