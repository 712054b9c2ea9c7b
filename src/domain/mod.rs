// ==========================================
// 费用导入系统 - 领域模型层
// ==========================================
// 职责: 定义领域实体、类型、状态转换规则
// 红线: 不含数据访问逻辑,不含导入流程逻辑
// ==========================================

pub mod expense;
pub mod import_job;
pub mod types;

// 重导出核心类型
pub use expense::{Actor, Expense, ParsedRow, ReferenceEntity};
pub use import_job::{ImportJob, ImportJobMeta, InvalidTransition, ValidationError};
pub use types::{
    ExpenseDirection, ExpenseStatus, ImportStatus, PaymentMethod, ReferenceKind, IMPORT_COLUMNS,
};
