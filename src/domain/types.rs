// ==========================================
// 费用导入系统 - 领域类型定义
// ==========================================
// 职责: 导入任务状态、收支方向、支付方式、费用状态、列契约
// 序列化格式: SCREAMING_SNAKE_CASE (与数据库一致)
// ==========================================

use serde::{Deserialize, Serialize};
use std::fmt;

// ==========================================
// 导入任务状态 (Import Status)
// ==========================================
// 状态机: PENDING → PROCESSING → COMPLETED | FAILED
// COMPLETED / FAILED 为终态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ImportStatus {
    Pending,    // 已创建,后台任务未开始
    Processing, // 后台任务处理中
    Completed,  // 全部候选行处理完毕
    Failed,     // 文件级失败
}

impl ImportStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ImportStatus::Pending => "PENDING",
            ImportStatus::Processing => "PROCESSING",
            ImportStatus::Completed => "COMPLETED",
            ImportStatus::Failed => "FAILED",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "PENDING" => Some(ImportStatus::Pending),
            "PROCESSING" => Some(ImportStatus::Processing),
            "COMPLETED" => Some(ImportStatus::Completed),
            "FAILED" => Some(ImportStatus::Failed),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, ImportStatus::Completed | ImportStatus::Failed)
    }
}

impl fmt::Display for ImportStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ==========================================
// 收支方向 (Direction)
// ==========================================
// 文件中的 Type 列: In / Out（大小写敏感）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExpenseDirection {
    Inflow,
    Outflow,
}

impl ExpenseDirection {
    /// 按文件原值解析,只接受精确的 "In" / "Out"
    pub fn from_file_value(value: &str) -> Option<Self> {
        match value {
            "In" => Some(ExpenseDirection::Inflow),
            "Out" => Some(ExpenseDirection::Outflow),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ExpenseDirection::Inflow => "INFLOW",
            ExpenseDirection::Outflow => "OUTFLOW",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "INFLOW" => Some(ExpenseDirection::Inflow),
            "OUTFLOW" => Some(ExpenseDirection::Outflow),
            _ => None,
        }
    }
}

impl fmt::Display for ExpenseDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ==========================================
// 支付方式 (Payment Method)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentMethod {
    BankTransfer,
    PettyCash,
    CreditCard,
}

impl PaymentMethod {
    pub const ALL: [PaymentMethod; 3] = [
        PaymentMethod::BankTransfer,
        PaymentMethod::PettyCash,
        PaymentMethod::CreditCard,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::BankTransfer => "BANK_TRANSFER",
            PaymentMethod::PettyCash => "PETTY_CASH",
            PaymentMethod::CreditCard => "CREDIT_CARD",
        }
    }

    /// 大小写不敏感解析（文件输入）
    pub fn parse_case_insensitive(value: &str) -> Option<Self> {
        let upper = value.trim().to_uppercase();
        Self::ALL.into_iter().find(|m| m.as_str() == upper)
    }
}

impl fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ==========================================
// 费用记录状态 (Expense Status)
// ==========================================
// 导入生成的记录一律为 DRAFT,后续审批流程不在本系统内
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExpenseStatus {
    Draft,
    Submitted,
    Approved,
    Rejected,
}

impl ExpenseStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExpenseStatus::Draft => "DRAFT",
            ExpenseStatus::Submitted => "SUBMITTED",
            ExpenseStatus::Approved => "APPROVED",
            ExpenseStatus::Rejected => "REJECTED",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "DRAFT" => Some(ExpenseStatus::Draft),
            "SUBMITTED" => Some(ExpenseStatus::Submitted),
            "APPROVED" => Some(ExpenseStatus::Approved),
            "REJECTED" => Some(ExpenseStatus::Rejected),
            _ => None,
        }
    }
}

// ==========================================
// 参考数据类型 (Reference Kind)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReferenceKind {
    Vendor,
    Category,
}

impl ReferenceKind {
    /// 对应的表名
    pub fn table(&self) -> &'static str {
        match self {
            ReferenceKind::Vendor => "vendor",
            ReferenceKind::Category => "category",
        }
    }
}

impl fmt::Display for ReferenceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReferenceKind::Vendor => write!(f, "vendor"),
            ReferenceKind::Category => write!(f, "category"),
        }
    }
}

// ==========================================
// 列契约 (Column Contract)
// ==========================================
// 顺序有意义: Excel 按列位置解析, CSV 按表头文本解析
pub const IMPORT_COLUMNS: [&str; 13] = [
    "Parent ID",
    "Sub-ID",
    "Vendor",
    "Description",
    "Type",
    "Amount (Before VAT)",
    "VAT Amount",
    "Amount (After VAT)",
    "Currency",
    "Transaction Date",
    "Category",
    "Payment Method",
    "Invoice Link",
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_direction_is_case_sensitive() {
        assert_eq!(ExpenseDirection::from_file_value("In"), Some(ExpenseDirection::Inflow));
        assert_eq!(ExpenseDirection::from_file_value("Out"), Some(ExpenseDirection::Outflow));
        assert_eq!(ExpenseDirection::from_file_value("out"), None);
        assert_eq!(ExpenseDirection::from_file_value(""), None);
    }

    #[test]
    fn test_payment_method_case_insensitive() {
        assert_eq!(
            PaymentMethod::parse_case_insensitive("petty_cash"),
            Some(PaymentMethod::PettyCash)
        );
        assert_eq!(
            PaymentMethod::parse_case_insensitive("Credit_Card"),
            Some(PaymentMethod::CreditCard)
        );
        assert_eq!(PaymentMethod::parse_case_insensitive("CASH"), None);
    }

    #[test]
    fn test_import_status_round_trip_and_terminal() {
        for status in [
            ImportStatus::Pending,
            ImportStatus::Processing,
            ImportStatus::Completed,
            ImportStatus::Failed,
        ] {
            assert_eq!(ImportStatus::parse(status.as_str()), Some(status));
        }
        assert!(!ImportStatus::Processing.is_terminal());
        assert!(ImportStatus::Failed.is_terminal());
    }
}
