// ==========================================
// 费用导入系统 - 费用领域模型
// ==========================================
// ParsedRow: 导入中间结构体（仅在导入流程内存在）
// Expense: 落库后的费用记录
// Actor / ReferenceEntity: 外部协作方实体（只读 + 导入时按需创建）
// ==========================================

use crate::domain::types::{ExpenseDirection, ExpenseStatus, PaymentMethod, IMPORT_COLUMNS};
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

// ==========================================
// ParsedRow - 导入中间结构体
// ==========================================
// 用途: 文件解析 → 校验 → 物化
// 字段为单元格原值（已 trim）,None 表示单元格缺失/空
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedRow {
    pub parent_id: Option<String>,         // Parent ID
    pub sub_id: Option<String>,            // Sub-ID
    pub vendor: Option<String>,            // Vendor
    pub description: Option<String>,       // Description
    pub direction: Option<String>,         // Type (In/Out)
    pub amount_before_vat: Option<String>, // Amount (Before VAT)
    pub vat_amount: Option<String>,        // VAT Amount
    pub amount_after_vat: Option<String>,  // Amount (After VAT)
    pub currency: Option<String>,          // Currency
    pub transaction_date: Option<String>,  // Transaction Date
    pub category: Option<String>,          // Category
    pub payment_method: Option<String>,    // Payment Method
    pub invoice_link: Option<String>,      // Invoice Link
}

impl ParsedRow {
    /// 按列契约顺序构造（缺失的尾部列视为 None）
    pub fn from_columns<I>(cells: I) -> Self
    where
        I: IntoIterator<Item = Option<String>>,
    {
        let mut row = ParsedRow::default();
        for (idx, cell) in cells.into_iter().enumerate().take(IMPORT_COLUMNS.len()) {
            *row.slot_mut(idx) = cell;
        }
        row
    }

    fn slot_mut(&mut self, idx: usize) -> &mut Option<String> {
        match idx {
            0 => &mut self.parent_id,
            1 => &mut self.sub_id,
            2 => &mut self.vendor,
            3 => &mut self.description,
            4 => &mut self.direction,
            5 => &mut self.amount_before_vat,
            6 => &mut self.vat_amount,
            7 => &mut self.amount_after_vat,
            8 => &mut self.currency,
            9 => &mut self.transaction_date,
            10 => &mut self.category,
            11 => &mut self.payment_method,
            _ => &mut self.invoice_link,
        }
    }

    /// 按列契约顺序输出单元格
    pub fn columns(&self) -> [Option<&str>; 13] {
        [
            self.parent_id.as_deref(),
            self.sub_id.as_deref(),
            self.vendor.as_deref(),
            self.description.as_deref(),
            self.direction.as_deref(),
            self.amount_before_vat.as_deref(),
            self.vat_amount.as_deref(),
            self.amount_after_vat.as_deref(),
            self.currency.as_deref(),
            self.transaction_date.as_deref(),
            self.category.as_deref(),
            self.payment_method.as_deref(),
            self.invoice_link.as_deref(),
        ]
    }

    /// 表头 → 值 映射（预览样例数据用,按列契约顺序,缺失值输出空串）
    pub fn to_header_map(&self) -> Map<String, Value> {
        IMPORT_COLUMNS
            .iter()
            .zip(self.columns())
            .map(|(header, value)| {
                (
                    header.to_string(),
                    Value::String(value.unwrap_or_default().to_string()),
                )
            })
            .collect()
    }
}

// ==========================================
// Expense - 费用记录
// ==========================================
// 导入生成: status = DRAFT, owner = 上传人
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Expense {
    pub id: String,
    pub parent_id: Option<String>,
    pub sub_id: Option<String>,
    pub vendor_id: String,
    pub category_id: String,
    pub description: String,
    pub direction: ExpenseDirection,
    pub amount_before_vat: Option<Decimal>,
    pub vat_amount: Option<Decimal>,
    pub vat_percentage: Option<Decimal>, // vat / before * 100,两者均非零时计算
    pub amount_after_vat: Decimal,
    pub currency: String,
    pub transaction_date: NaiveDate,
    pub payment_method: PaymentMethod,
    pub invoice_link: Option<String>,
    pub status: ExpenseStatus,
    pub owner_id: String,
    pub source_import_job_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

// ==========================================
// Actor - 提交人
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub id: String,
    pub display_name: String,
}

// ==========================================
// ReferenceEntity - 供应商 / 费用类别
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferenceEntity {
    pub id: String,
    pub name: String,
}
