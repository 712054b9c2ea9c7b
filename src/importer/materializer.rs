// ==========================================
// 费用导入系统 - 行物化器
// ==========================================
// 职责: 已通过校验的行 → 持久化的费用记录（DRAFT）
// 约束:
// - 供应商/类别按名称精确匹配（区分大小写）,不存在则新建
// - 新建动作不与其他导入任务串行化,并发导入可能产生同名重复记录
// ==========================================

use crate::domain::expense::{Actor, Expense, ParsedRow};
use crate::domain::types::{ExpenseDirection, ExpenseStatus, PaymentMethod, ReferenceKind};
use crate::importer::error::{ImportError, ImportResult};
use crate::importer::row_validator::{parse_amount, parse_transaction_date};
use crate::repository::{ExpenseRepository, ReferenceDataRepository};
use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

// ==========================================
// RowMaterializer Trait
// ==========================================
#[async_trait]
pub trait RowMaterializer: Send + Sync {
    /// 物化一行；失败由编排器转换为行级错误
    async fn materialize(&self, row: &ParsedRow, actor: &Actor, job_id: &str)
        -> ImportResult<Expense>;
}

// ==========================================
// ExpenseMaterializer
// ==========================================
pub struct ExpenseMaterializer {
    reference_repo: Arc<dyn ReferenceDataRepository>,
    expense_repo: Arc<dyn ExpenseRepository>,
}

impl ExpenseMaterializer {
    pub fn new(
        reference_repo: Arc<dyn ReferenceDataRepository>,
        expense_repo: Arc<dyn ExpenseRepository>,
    ) -> Self {
        Self {
            reference_repo,
            expense_repo,
        }
    }

    /// 精确名称查找,不存在则新建,返回实体 ID
    async fn resolve_or_create(&self, kind: ReferenceKind, name: &str) -> ImportResult<String> {
        if let Some(entity) = self.reference_repo.find_by_exact_name(kind, name).await? {
            return Ok(entity.id);
        }
        let created = self.reference_repo.create(kind, name).await?;
        debug!(table = kind.table(), name = %name, id = %created.id, "参考数据不存在，已新建");
        Ok(created.id)
    }
}

#[async_trait]
impl RowMaterializer for ExpenseMaterializer {
    async fn materialize(
        &self,
        row: &ParsedRow,
        actor: &Actor,
        job_id: &str,
    ) -> ImportResult<Expense> {
        // 必填字段缺失按内部错误处理
        let vendor = required(&row.vendor, "vendor")?;
        let category = required(&row.category, "category")?;
        let description = required(&row.description, "description")?;
        let currency = required(&row.currency, "currency")?;

        let direction = ExpenseDirection::from_file_value(required(&row.direction, "type")?)
            .ok_or_else(|| ImportError::InternalError("收支方向非法".to_string()))?;
        let amount_after_vat = parse_amount(required(&row.amount_after_vat, "amountAfterVat")?)
            .ok_or_else(|| ImportError::InternalError("税后金额非法".to_string()))?;
        let transaction_date =
            parse_transaction_date(required(&row.transaction_date, "transactionDate")?)
                .ok_or_else(|| ImportError::InternalError("交易日期非法".to_string()))?;
        let payment_method =
            PaymentMethod::parse_case_insensitive(required(&row.payment_method, "paymentMethod")?)
                .ok_or_else(|| ImportError::InternalError("支付方式非法".to_string()))?;

        // 可选金额: 无法解析时按缺失处理
        let amount_before_vat = row.amount_before_vat.as_deref().and_then(parse_amount);
        let vat_amount = row.vat_amount.as_deref().and_then(parse_amount);

        let vendor_id = self.resolve_or_create(ReferenceKind::Vendor, vendor).await?;
        let category_id = self.resolve_or_create(ReferenceKind::Category, category).await?;

        let expense = Expense {
            id: Uuid::new_v4().to_string(),
            parent_id: row.parent_id.clone(),
            sub_id: row.sub_id.clone(),
            vendor_id,
            category_id,
            description: description.to_string(),
            direction,
            amount_before_vat,
            vat_amount,
            vat_percentage: vat_percentage(amount_before_vat, vat_amount),
            amount_after_vat,
            currency: currency.to_string(),
            transaction_date,
            payment_method,
            invoice_link: row.invoice_link.clone(),
            status: ExpenseStatus::Draft,
            owner_id: actor.id.clone(),
            source_import_job_id: Some(job_id.to_string()),
            created_at: Utc::now(),
        };

        self.expense_repo.insert(&expense).await?;
        Ok(expense)
    }
}

fn required<'a>(value: &'a Option<String>, field: &str) -> ImportResult<&'a str> {
    value
        .as_deref()
        .ok_or_else(|| ImportError::InternalError(format!("缺少必填字段: {}", field)))
}

/// vat / before * 100,保留两位小数
///
/// 任一缺失、为零或结果超出 Decimal 范围时不计算
pub fn vat_percentage(before: Option<Decimal>, vat: Option<Decimal>) -> Option<Decimal> {
    match (before, vat) {
        (Some(b), Some(v)) if !b.is_zero() && !v.is_zero() => v
            .checked_div(b)
            .and_then(|ratio| ratio.checked_mul(Decimal::ONE_HUNDRED))
            .map(|pct| pct.round_dp(2).normalize()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::{
        open_shared_connection, ExpenseRepositoryImpl, ReferenceDataRepositoryImpl,
    };
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn setup() -> (ExpenseMaterializer, Arc<ReferenceDataRepositoryImpl>, Arc<ExpenseRepositoryImpl>) {
        let conn = open_shared_connection(":memory:").unwrap();
        let refs = Arc::new(ReferenceDataRepositoryImpl::new(conn.clone()));
        let expenses = Arc::new(ExpenseRepositoryImpl::new(conn));
        (
            ExpenseMaterializer::new(refs.clone(), expenses.clone()),
            refs,
            expenses,
        )
    }

    fn actor() -> Actor {
        Actor {
            id: "u1".to_string(),
            display_name: "Alice".to_string(),
        }
    }

    fn row() -> ParsedRow {
        ParsedRow {
            sub_id: Some("S1".to_string()),
            vendor: Some("Acme Ltd".to_string()),
            description: Some("Paper".to_string()),
            direction: Some("In".to_string()),
            amount_before_vat: Some("100".to_string()),
            vat_amount: Some("20".to_string()),
            amount_after_vat: Some("120".to_string()),
            currency: Some("USD".to_string()),
            transaction_date: Some("2024-01-15".to_string()),
            category: Some("Office".to_string()),
            payment_method: Some("petty_cash".to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_vat_percentage() {
        assert_eq!(vat_percentage(Some(dec("100")), Some(dec("20"))), Some(dec("20")));
        assert_eq!(vat_percentage(Some(dec("3")), Some(dec("1"))), Some(dec("33.33")));
        assert_eq!(vat_percentage(Some(dec("0")), Some(dec("20"))), None);
        assert_eq!(vat_percentage(Some(dec("100")), Some(dec("0"))), None);
        assert_eq!(vat_percentage(None, Some(dec("20"))), None);
    }

    #[test]
    fn test_vat_percentage_out_of_range_is_absent() {
        // 比值本身可表示,乘 100 溢出
        assert_eq!(
            vat_percentage(Some(dec("1")), Some(dec("7922816251426433759354395033"))),
            None
        );
        // 除法即溢出
        assert_eq!(vat_percentage(Some(dec("0.0001")), Some(Decimal::MAX)), None);
    }

    #[tokio::test]
    async fn test_materialize_creates_draft_expense() {
        let (materializer, refs, expenses) = setup();
        refs.create(ReferenceKind::Vendor, "Acme Ltd").await.unwrap();

        let expense = materializer.materialize(&row(), &actor(), "job-1").await.unwrap();

        assert_eq!(expense.status, ExpenseStatus::Draft);
        assert_eq!(expense.direction, ExpenseDirection::Inflow);
        assert_eq!(expense.payment_method, PaymentMethod::PettyCash);
        assert_eq!(expense.vat_percentage, Some(dec("20")));
        assert_eq!(expense.owner_id, "u1");
        assert_eq!(expense.source_import_job_id.as_deref(), Some("job-1"));
        assert_eq!(expenses.count_by_import_job("job-1").await.unwrap(), 1);

        // 类别不存在 → 已新建
        assert!(refs
            .find_by_exact_name(ReferenceKind::Category, "Office")
            .await
            .unwrap()
            .is_some());
    }

    #[tokio::test]
    async fn test_exact_match_creates_case_variant_vendor() {
        let (materializer, refs, _) = setup();
        refs.create(ReferenceKind::Vendor, "acme ltd").await.unwrap();

        materializer.materialize(&row(), &actor(), "job-1").await.unwrap();

        let vendors = refs.list_names(ReferenceKind::Vendor).await.unwrap();
        assert_eq!(vendors.len(), 2);
    }

    #[tokio::test]
    async fn test_unparseable_optional_amount_is_absent() {
        let (materializer, _, _) = setup();
        let row = ParsedRow {
            vat_amount: Some("n/a".to_string()),
            ..row()
        };
        let expense = materializer.materialize(&row, &actor(), "job-1").await.unwrap();
        assert_eq!(expense.vat_amount, None);
        assert_eq!(expense.vat_percentage, None);
    }

    #[tokio::test]
    async fn test_extreme_vat_ratio_still_materializes() {
        let (materializer, _, expenses) = setup();
        let row = ParsedRow {
            amount_before_vat: Some("1".to_string()),
            vat_amount: Some("7922816251426433759354395033".to_string()),
            ..row()
        };
        let expense = materializer.materialize(&row, &actor(), "job-1").await.unwrap();
        assert_eq!(expense.vat_amount, Some(dec("7922816251426433759354395033")));
        assert_eq!(expense.vat_percentage, None);
        assert_eq!(expenses.count_by_import_job("job-1").await.unwrap(), 1);
    }
}
