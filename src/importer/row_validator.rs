// ==========================================
// 费用导入系统 - 行校验器
// ==========================================
// 职责: 对解析后的行做字段级校验 + 参考数据存在性校验
// 约束:
// - 批量执行: 参考数据只加载一次,收集全部行的全部错误,不短路
// - 纯函数: 结果只取决于 (rows, ReferenceSnapshot),预览与提交结果一致
// - 候选列表按下标与原始行一一对应,出错行置为 None
// ==========================================

use crate::domain::expense::ParsedRow;
use crate::domain::import_job::ValidationError;
use crate::domain::types::{ExpenseDirection, PaymentMethod, ReferenceKind};
use crate::repository::{ReferenceDataRepository, RepositoryResult};
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use std::collections::{BTreeSet, HashSet};
use std::str::FromStr;

// ===== 错误字段名 =====
pub const FIELD_VENDOR: &str = "vendor";
pub const FIELD_DESCRIPTION: &str = "description";
pub const FIELD_TYPE: &str = "type";
pub const FIELD_AMOUNT_AFTER_VAT: &str = "amountAfterVat";
pub const FIELD_CURRENCY: &str = "currency";
pub const FIELD_TRANSACTION_DATE: &str = "transactionDate";
pub const FIELD_CATEGORY: &str = "category";
pub const FIELD_PAYMENT_METHOD: &str = "paymentMethod";

// ==========================================
// ReferenceSnapshot - 参考数据快照（小写名称集合）
// ==========================================
#[derive(Debug, Clone, Default)]
pub struct ReferenceSnapshot {
    vendors: HashSet<String>,
    categories: HashSet<String>,
}

impl ReferenceSnapshot {
    pub fn new<V, C, S>(vendors: V, categories: C) -> Self
    where
        V: IntoIterator<Item = S>,
        C: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            vendors: vendors.into_iter().map(|v| v.as_ref().to_lowercase()).collect(),
            categories: categories
                .into_iter()
                .map(|c| c.as_ref().to_lowercase())
                .collect(),
        }
    }

    /// 从仓储加载（每批次一次）
    pub async fn load(repo: &dyn ReferenceDataRepository) -> RepositoryResult<Self> {
        let vendors = repo.list_names(ReferenceKind::Vendor).await?;
        let categories = repo.list_names(ReferenceKind::Category).await?;
        Ok(Self::new(vendors, categories))
    }

    pub fn has_vendor(&self, name: &str) -> bool {
        self.vendors.contains(&name.to_lowercase())
    }

    pub fn has_category(&self, name: &str) -> bool {
        self.categories.contains(&name.to_lowercase())
    }
}

// ==========================================
// ValidationOutcome - 校验结果
// ==========================================
#[derive(Debug, Clone, Default)]
pub struct ValidationOutcome {
    pub candidates: Vec<Option<ParsedRow>>,
    pub errors: Vec<ValidationError>,
}

impl ValidationOutcome {
    pub fn total_rows(&self) -> usize {
        self.candidates.len()
    }

    pub fn valid_rows(&self) -> usize {
        self.candidates.iter().filter(|c| c.is_some()).count()
    }

    /// 出错的不同行号（升序）
    pub fn invalid_row_numbers(&self) -> BTreeSet<usize> {
        self.errors.iter().map(|e| e.row).collect()
    }
}

// ==========================================
// RowValidator
// ==========================================
pub struct RowValidator;

impl RowValidator {
    /// 批量校验
    ///
    /// 行号为 1-based 数据行号（下标 + 1）
    pub fn validate(&self, rows: Vec<ParsedRow>, refs: &ReferenceSnapshot) -> ValidationOutcome {
        let mut outcome = ValidationOutcome {
            candidates: Vec::with_capacity(rows.len()),
            errors: Vec::new(),
        };

        for (idx, row) in rows.into_iter().enumerate() {
            let row_errors = self.validate_row(&row, idx + 1, refs);
            if row_errors.is_empty() {
                outcome.candidates.push(Some(row));
            } else {
                outcome.candidates.push(None);
                outcome.errors.extend(row_errors);
            }
        }

        outcome
    }

    /// 单行校验,每个字段最多一条错误
    pub fn validate_row(
        &self,
        row: &ParsedRow,
        row_number: usize,
        refs: &ReferenceSnapshot,
    ) -> Vec<ValidationError> {
        let mut errors = Vec::new();
        let err = |field: &str, message: String, value: Option<&str>| {
            ValidationError::new(row_number, field, message, value)
        };

        // 供应商
        match row.vendor.as_deref() {
            None => errors.push(err(FIELD_VENDOR, "Vendor is required".to_string(), None)),
            Some(v) if !refs.has_vendor(v) => errors.push(err(
                FIELD_VENDOR,
                format!("Vendor \"{}\" does not exist", v),
                Some(v),
            )),
            Some(_) => {}
        }

        // 描述
        if row.description.is_none() {
            errors.push(err(FIELD_DESCRIPTION, "Description is required".to_string(), None));
        }

        // 收支方向（精确匹配 In / Out）
        let direction = row.direction.as_deref();
        if direction.and_then(ExpenseDirection::from_file_value).is_none() {
            errors.push(err(
                FIELD_TYPE,
                "Type must be either \"In\" or \"Out\"".to_string(),
                direction,
            ));
        }

        // 税后金额
        match row.amount_after_vat.as_deref() {
            None => errors.push(err(
                FIELD_AMOUNT_AFTER_VAT,
                "Amount (After VAT) is required".to_string(),
                None,
            )),
            Some(a) if parse_amount(a).is_none() => errors.push(err(
                FIELD_AMOUNT_AFTER_VAT,
                "Amount (After VAT) must be a valid number".to_string(),
                Some(a),
            )),
            Some(_) => {}
        }

        // 币种（此阶段不做枚举校验）
        if row.currency.is_none() {
            errors.push(err(FIELD_CURRENCY, "Currency is required".to_string(), None));
        }

        // 交易日期
        match row.transaction_date.as_deref() {
            None => errors.push(err(
                FIELD_TRANSACTION_DATE,
                "Transaction date is required".to_string(),
                None,
            )),
            Some(d) if parse_transaction_date(d).is_none() => errors.push(err(
                FIELD_TRANSACTION_DATE,
                "Transaction date is not a valid date".to_string(),
                Some(d),
            )),
            Some(_) => {}
        }

        // 费用类别
        match row.category.as_deref() {
            None => errors.push(err(FIELD_CATEGORY, "Category is required".to_string(), None)),
            Some(c) if !refs.has_category(c) => errors.push(err(
                FIELD_CATEGORY,
                format!("Category \"{}\" does not exist", c),
                Some(c),
            )),
            Some(_) => {}
        }

        // 支付方式
        match row.payment_method.as_deref() {
            None => errors.push(err(
                FIELD_PAYMENT_METHOD,
                "Payment method is required".to_string(),
                None,
            )),
            Some(p) if PaymentMethod::parse_case_insensitive(p).is_none() => {
                let allowed: Vec<&str> = PaymentMethod::ALL.iter().map(|m| m.as_str()).collect();
                errors.push(err(
                    FIELD_PAYMENT_METHOD,
                    format!("Payment method must be one of: {}", allowed.join(", ")),
                    Some(p),
                ))
            }
            Some(_) => {}
        }

        errors
    }
}

/// 金额解析: 去除千分位逗号与空白后按十进制解析
pub fn parse_amount(raw: &str) -> Option<Decimal> {
    let cleaned: String = raw
        .chars()
        .filter(|c| *c != ',' && !c.is_whitespace())
        .collect();
    if cleaned.is_empty() {
        return None;
    }
    Decimal::from_str(&cleaned).ok()
}

/// 交易日期解析（ISO 优先,兼容常见写法）
pub fn parse_transaction_date(raw: &str) -> Option<NaiveDate> {
    let s = raw.trim();

    const DATE_FORMATS: [&str; 4] = ["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y", "%d.%m.%Y"];
    for fmt in &DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(s, fmt) {
            return Some(date);
        }
    }

    const DATETIME_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];
    for fmt in &DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(dt.date());
        }
    }

    DateTime::parse_from_rfc3339(s).ok().map(|dt| dt.date_naive())
}
