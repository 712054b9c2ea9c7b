// ==========================================
// 费用导入系统 - 费用记录 Repository
// ==========================================
// 职责: 物化阶段写入费用记录,供查询/测试读取
// 存储: 金额以 Decimal 文本存储,避免浮点误差
// ==========================================

use crate::db::{format_timestamp, parse_timestamp};
use crate::domain::expense::Expense;
use crate::domain::types::{ExpenseDirection, ExpenseStatus, PaymentMethod};
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::{lock_connection, SharedConnection};
use async_trait::async_trait;
use chrono::NaiveDate;
use rusqlite::{params, Row};
use rust_decimal::Decimal;
use std::str::FromStr;

#[async_trait]
pub trait ExpenseRepository: Send + Sync {
    /// 插入单条费用记录
    async fn insert(&self, expense: &Expense) -> RepositoryResult<()>;

    /// 按归属人查询
    async fn list_by_owner(&self, owner_id: &str) -> RepositoryResult<Vec<Expense>>;

    /// 统计某导入任务生成的记录数
    async fn count_by_import_job(&self, job_id: &str) -> RepositoryResult<usize>;
}

pub struct ExpenseRepositoryImpl {
    conn: SharedConnection,
}

impl ExpenseRepositoryImpl {
    pub fn new(conn: SharedConnection) -> Self {
        Self { conn }
    }
}

fn field_error(field: &str, raw: &str) -> RepositoryError {
    RepositoryError::FieldValueError {
        field: field.to_string(),
        message: format!("无法解析: {}", raw),
    }
}

fn parse_decimal(field: &str, raw: &str) -> RepositoryResult<Decimal> {
    Decimal::from_str(raw).map_err(|_| field_error(field, raw))
}

fn parse_optional_decimal(field: &str, raw: Option<String>) -> RepositoryResult<Option<Decimal>> {
    raw.map(|v| parse_decimal(field, &v)).transpose()
}

/// 数据库原始行
struct RawExpenseRow {
    id: String,
    parent_id: Option<String>,
    sub_id: Option<String>,
    vendor_id: String,
    category_id: String,
    description: String,
    direction: String,
    amount_before_vat: Option<String>,
    vat_amount: Option<String>,
    vat_percentage: Option<String>,
    amount_after_vat: String,
    currency: String,
    transaction_date: String,
    payment_method: String,
    invoice_link: Option<String>,
    status: String,
    owner_id: String,
    source_import_job_id: Option<String>,
    created_at: String,
}

impl RawExpenseRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            parent_id: row.get(1)?,
            sub_id: row.get(2)?,
            vendor_id: row.get(3)?,
            category_id: row.get(4)?,
            description: row.get(5)?,
            direction: row.get(6)?,
            amount_before_vat: row.get(7)?,
            vat_amount: row.get(8)?,
            vat_percentage: row.get(9)?,
            amount_after_vat: row.get(10)?,
            currency: row.get(11)?,
            transaction_date: row.get(12)?,
            payment_method: row.get(13)?,
            invoice_link: row.get(14)?,
            status: row.get(15)?,
            owner_id: row.get(16)?,
            source_import_job_id: row.get(17)?,
            created_at: row.get(18)?,
        })
    }

    fn into_expense(self) -> RepositoryResult<Expense> {
        let direction = ExpenseDirection::parse(&self.direction)
            .ok_or_else(|| field_error("direction", &self.direction))?;
        let payment_method = PaymentMethod::parse_case_insensitive(&self.payment_method)
            .ok_or_else(|| field_error("payment_method", &self.payment_method))?;
        let status = ExpenseStatus::parse(&self.status)
            .ok_or_else(|| field_error("status", &self.status))?;
        let transaction_date = NaiveDate::parse_from_str(&self.transaction_date, "%Y-%m-%d")
            .map_err(|_| field_error("transaction_date", &self.transaction_date))?;
        let created_at = parse_timestamp(&self.created_at)
            .ok_or_else(|| field_error("created_at", &self.created_at))?;

        Ok(Expense {
            id: self.id,
            parent_id: self.parent_id,
            sub_id: self.sub_id,
            vendor_id: self.vendor_id,
            category_id: self.category_id,
            description: self.description,
            direction,
            amount_before_vat: parse_optional_decimal("amount_before_vat", self.amount_before_vat)?,
            vat_amount: parse_optional_decimal("vat_amount", self.vat_amount)?,
            vat_percentage: parse_optional_decimal("vat_percentage", self.vat_percentage)?,
            amount_after_vat: parse_decimal("amount_after_vat", &self.amount_after_vat)?,
            currency: self.currency,
            transaction_date,
            payment_method,
            invoice_link: self.invoice_link,
            status,
            owner_id: self.owner_id,
            source_import_job_id: self.source_import_job_id,
            created_at,
        })
    }
}

#[async_trait]
impl ExpenseRepository for ExpenseRepositoryImpl {
    async fn insert(&self, expense: &Expense) -> RepositoryResult<()> {
        let conn = lock_connection(&self.conn)?;

        conn.execute(
            r#"
            INSERT INTO expense (
                id, parent_id, sub_id, vendor_id, category_id, description,
                direction, amount_before_vat, vat_amount, vat_percentage,
                amount_after_vat, currency, transaction_date, payment_method,
                invoice_link, status, owner_id, source_import_job_id, created_at
            ) VALUES (
                ?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10,
                ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19
            )
            "#,
            params![
                expense.id,
                expense.parent_id,
                expense.sub_id,
                expense.vendor_id,
                expense.category_id,
                expense.description,
                expense.direction.as_str(),
                expense.amount_before_vat.map(|d| d.to_string()),
                expense.vat_amount.map(|d| d.to_string()),
                expense.vat_percentage.map(|d| d.to_string()),
                expense.amount_after_vat.to_string(),
                expense.currency,
                expense.transaction_date.format("%Y-%m-%d").to_string(),
                expense.payment_method.as_str(),
                expense.invoice_link,
                expense.status.as_str(),
                expense.owner_id,
                expense.source_import_job_id,
                format_timestamp(&expense.created_at),
            ],
        )?;

        Ok(())
    }

    async fn list_by_owner(&self, owner_id: &str) -> RepositoryResult<Vec<Expense>> {
        let raws = {
            let conn = lock_connection(&self.conn)?;
            let mut stmt = conn.prepare(
                r#"
                SELECT id, parent_id, sub_id, vendor_id, category_id, description,
                       direction, amount_before_vat, vat_amount, vat_percentage,
                       amount_after_vat, currency, transaction_date, payment_method,
                       invoice_link, status, owner_id, source_import_job_id, created_at
                FROM expense
                WHERE owner_id = ?1
                ORDER BY created_at, rowid
                "#,
            )?;
            let rows = stmt
                .query_map(params![owner_id], RawExpenseRow::from_row)?
                .collect::<Result<Vec<_>, _>>()?;
            rows
        };

        raws.into_iter().map(RawExpenseRow::into_expense).collect()
    }

    async fn count_by_import_job(&self, job_id: &str) -> RepositoryResult<usize> {
        let conn = lock_connection(&self.conn)?;

        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM expense WHERE source_import_job_id = ?1",
            params![job_id],
            |row| row.get(0),
        )?;

        Ok(count as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::types::ReferenceKind;
    use crate::repository::{open_shared_connection, ReferenceDataRepository, ReferenceDataRepositoryImpl};
    use chrono::Utc;

    fn expense(vendor_id: &str, category_id: &str) -> Expense {
        Expense {
            id: "e1".to_string(),
            parent_id: Some("P1".to_string()),
            sub_id: Some("S1".to_string()),
            vendor_id: vendor_id.to_string(),
            category_id: category_id.to_string(),
            description: "Paper".to_string(),
            direction: ExpenseDirection::Outflow,
            amount_before_vat: Some(Decimal::from_str("100.10").unwrap()),
            vat_amount: None,
            vat_percentage: None,
            amount_after_vat: Decimal::from_str("120.12").unwrap(),
            currency: "USD".to_string(),
            transaction_date: NaiveDate::from_ymd_opt(2024, 1, 15).unwrap(),
            payment_method: PaymentMethod::BankTransfer,
            invoice_link: None,
            status: ExpenseStatus::Draft,
            owner_id: "u1".to_string(),
            source_import_job_id: Some("job-1".to_string()),
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_insert_then_list_preserves_values() {
        let conn = open_shared_connection(":memory:").unwrap();
        let refs = ReferenceDataRepositoryImpl::new(conn.clone());
        let vendor = refs.create(ReferenceKind::Vendor, "Acme").await.unwrap();
        let category = refs.create(ReferenceKind::Category, "Office").await.unwrap();
        let repo = ExpenseRepositoryImpl::new(conn);

        let original = expense(&vendor.id, &category.id);
        repo.insert(&original).await.unwrap();

        let listed = repo.list_by_owner("u1").await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].amount_after_vat, original.amount_after_vat);
        assert_eq!(listed[0].amount_before_vat, original.amount_before_vat);
        assert_eq!(listed[0].transaction_date, original.transaction_date);
        assert_eq!(listed[0].payment_method, PaymentMethod::BankTransfer);
        assert_eq!(listed[0].status, ExpenseStatus::Draft);
        assert_eq!(repo.count_by_import_job("job-1").await.unwrap(), 1);
        assert!(repo.list_by_owner("someone-else").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_vendor_is_foreign_key_violation() {
        let repo = ExpenseRepositoryImpl::new(open_shared_connection(":memory:").unwrap());
        let result = repo.insert(&expense("missing", "missing")).await;
        assert!(matches!(result, Err(RepositoryError::ForeignKeyViolation(_))));
    }
}
