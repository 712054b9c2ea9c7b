// ==========================================
// 费用导入API
// ==========================================
// 职责: 封装费用导入相关功能（预览/提交/状态/历史）及参考数据登记
// ==========================================

use crate::api::error::{ApiError, ApiResult};
use crate::config::ConfigManager;
use crate::domain::expense::{Actor, Expense, ReferenceEntity};
use crate::domain::import_job::ImportJob;
use crate::domain::types::ReferenceKind;
use crate::importer::{
    ExpenseMaterializer, ImportError, ImportOrchestrator, PreviewResult, RowMaterializer,
    UploadedFile,
};
use crate::repository::{
    open_shared_connection, ActorRepository, ActorRepositoryImpl, ExpenseRepository,
    ExpenseRepositoryImpl, ImportJobRepositoryImpl, ReferenceDataRepository,
    ReferenceDataRepositoryImpl, SharedConnection,
};
use std::sync::Arc;
use tracing::info;

/// 导入API
pub struct ImportApi {
    orchestrator: ImportOrchestrator,
    actor_repo: Arc<dyn ActorRepository>,
    reference_repo: Arc<dyn ReferenceDataRepository>,
    expense_repo: Arc<dyn ExpenseRepository>,
}

impl ImportApi {
    /// 按数据库路径创建（自动建表）
    pub fn new(db_path: &str) -> ApiResult<Self> {
        let conn = open_shared_connection(db_path)?;
        Self::from_connection(conn)
    }

    /// 从已有连接创建
    pub fn from_connection(conn: SharedConnection) -> ApiResult<Self> {
        let reference_repo: Arc<dyn ReferenceDataRepository> =
            Arc::new(ReferenceDataRepositoryImpl::new(conn.clone()));
        let expense_repo: Arc<dyn ExpenseRepository> =
            Arc::new(ExpenseRepositoryImpl::new(conn.clone()));
        let materializer = Arc::new(ExpenseMaterializer::new(
            reference_repo.clone(),
            expense_repo.clone(),
        ));
        Self::with_materializer(conn, materializer)
    }

    /// 指定行物化器创建
    pub fn with_materializer(
        conn: SharedConnection,
        materializer: Arc<dyn RowMaterializer>,
    ) -> ApiResult<Self> {
        let settings = ConfigManager::from_connection(conn.clone())?.load_import_settings()?;
        info!(
            max_file_size_bytes = settings.max_file_size_bytes,
            progress_flush_every = settings.progress_flush_every,
            "导入参数已加载"
        );

        let actor_repo: Arc<dyn ActorRepository> = Arc::new(ActorRepositoryImpl::new(conn.clone()));
        let reference_repo: Arc<dyn ReferenceDataRepository> =
            Arc::new(ReferenceDataRepositoryImpl::new(conn.clone()));
        let expense_repo: Arc<dyn ExpenseRepository> =
            Arc::new(ExpenseRepositoryImpl::new(conn.clone()));
        let job_repo = Arc::new(ImportJobRepositoryImpl::new(conn));

        let orchestrator = ImportOrchestrator::new(
            job_repo,
            reference_repo.clone(),
            actor_repo.clone(),
            materializer,
            settings,
        );

        Ok(Self {
            orchestrator,
            actor_repo,
            reference_repo,
            expense_repo,
        })
    }

    pub fn orchestrator(&self) -> &ImportOrchestrator {
        &self.orchestrator
    }

    // ==========================================
    // 导入操作
    // ==========================================

    /// 预览导入（不落库）
    pub async fn preview_import(
        &self,
        file: &UploadedFile,
        actor_id: &str,
    ) -> ApiResult<PreviewResult> {
        let actor_id = require_non_empty(actor_id, "actor_id")?;
        Ok(self.orchestrator.preview(file, actor_id).await?)
    }

    /// 提交导入，立即返回 PENDING 任务
    pub async fn commit_import(&self, file: UploadedFile, actor_id: &str) -> ApiResult<ImportJob> {
        let actor_id = require_non_empty(actor_id, "actor_id")?;
        Ok(self.orchestrator.commit(file, actor_id).await?)
    }

    /// 查询任务状态
    pub async fn get_import_job(&self, job_id: &str) -> ApiResult<ImportJob> {
        self.orchestrator
            .status(job_id)
            .await?
            .ok_or_else(|| ImportError::JobNotFound(job_id.to_string()).into())
    }

    /// 查询导入历史（新的在前）
    pub async fn list_import_history(&self, actor_id: &str) -> ApiResult<Vec<ImportJob>> {
        let actor_id = require_non_empty(actor_id, "actor_id")?;
        Ok(self.orchestrator.history(actor_id).await?)
    }

    /// 等待后台处理结束并返回最终快照
    pub async fn wait_for_job(&self, job_id: &str) -> ApiResult<ImportJob> {
        self.orchestrator.wait_for_job(job_id).await?;
        self.get_import_job(job_id).await
    }

    // ==========================================
    // 参考数据登记
    // ==========================================

    pub async fn register_actor(&self, actor_id: &str, display_name: &str) -> ApiResult<Actor> {
        let actor = Actor {
            id: require_non_empty(actor_id, "actor_id")?.to_string(),
            display_name: require_non_empty(display_name, "display_name")?.to_string(),
        };
        self.actor_repo.upsert(&actor).await?;
        Ok(actor)
    }

    pub async fn register_vendor(&self, name: &str) -> ApiResult<ReferenceEntity> {
        self.register_reference(ReferenceKind::Vendor, name).await
    }

    pub async fn register_category(&self, name: &str) -> ApiResult<ReferenceEntity> {
        self.register_reference(ReferenceKind::Category, name).await
    }

    /// 同名（精确匹配）已存在时直接返回
    async fn register_reference(
        &self,
        kind: ReferenceKind,
        name: &str,
    ) -> ApiResult<ReferenceEntity> {
        let name = require_non_empty(name, "name")?;
        if let Some(existing) = self.reference_repo.find_by_exact_name(kind, name).await? {
            return Ok(existing);
        }
        Ok(self.reference_repo.create(kind, name).await?)
    }

    /// 查询提交人名下的费用记录
    pub async fn list_expenses(&self, owner_id: &str) -> ApiResult<Vec<Expense>> {
        let owner_id = require_non_empty(owner_id, "owner_id")?;
        Ok(self.expense_repo.list_by_owner(owner_id).await?)
    }
}

fn require_non_empty<'a>(value: &'a str, field: &str) -> ApiResult<&'a str> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ApiError::InvalidInput(format!("{}不能为空", field)));
    }
    Ok(trimmed)
}
