// ==========================================
// 费用导入系统 - 导入编排器
// ==========================================
// 流程: 请求校验 → 解析 → 校验 → 物化 → 任务落库
// 状态机: PENDING → PROCESSING → COMPLETED | FAILED（不重入,不自动重试）
// 约束:
// - 提交同步创建任务,处理在后台任务中进行,调用方不等待
// - 每个任务至多一个后台执行者（进程内登记表保证,登记位保留到后台任务退出）
// - 后台任务 panic 时补记 FAILED
// - 行级失败只记录错误并继续；仅文件级/存储级失败使任务 FAILED
// - 进度每 N 行落库一次,结束时必写一次
// ==========================================

use crate::config::ImportSettings;
use crate::domain::expense::{Actor, ParsedRow};
use crate::domain::import_job::{
    ImportJob, ImportJobMeta, InvalidTransition, ValidationError, GENERAL_FIELD,
};
use crate::domain::types::{ImportStatus, IMPORT_COLUMNS};
use crate::importer::error::{ImportError, ImportResult};
use crate::importer::file_parser::{is_accepted_mime_type, FileFormat, UniversalFileParser};
use crate::importer::materializer::RowMaterializer;
use crate::importer::row_validator::{ReferenceSnapshot, RowValidator};
use crate::repository::{ActorRepository, ImportJobRepository, ReferenceDataRepository};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::watch;
use tracing::{debug, error, info, instrument, warn};

// ==========================================
// UploadedFile - 上传文件
// ==========================================
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub file_name: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

impl UploadedFile {
    pub fn new(file_name: impl Into<String>, mime_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            file_name: file_name.into(),
            mime_type: mime_type.into(),
            bytes,
        }
    }

    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }
}

// ==========================================
// PreviewResult - 预览结果（不落库）
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreviewResult {
    pub file_name: String,
    pub total_rows: usize,
    pub headers: Vec<String>,
    pub sample_data: Vec<Map<String, Value>>,
    pub errors: Vec<ValidationError>,
}

// ==========================================
// ImportOrchestrator
// ==========================================
#[derive(Clone)]
pub struct ImportOrchestrator {
    parser: Arc<UniversalFileParser>,
    job_repo: Arc<dyn ImportJobRepository>,
    reference_repo: Arc<dyn ReferenceDataRepository>,
    actor_repo: Arc<dyn ActorRepository>,
    materializer: Arc<dyn RowMaterializer>,
    settings: ImportSettings,
    // job_id → 完成信号（后台任务退出时置 true 并移除）
    running: Arc<Mutex<HashMap<String, watch::Receiver<bool>>>>,
}

impl ImportOrchestrator {
    pub fn new(
        job_repo: Arc<dyn ImportJobRepository>,
        reference_repo: Arc<dyn ReferenceDataRepository>,
        actor_repo: Arc<dyn ActorRepository>,
        materializer: Arc<dyn RowMaterializer>,
        settings: ImportSettings,
    ) -> Self {
        Self {
            parser: Arc::new(UniversalFileParser::new(settings.max_file_size_bytes)),
            job_repo,
            reference_repo,
            actor_repo,
            materializer,
            settings,
            running: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn settings(&self) -> &ImportSettings {
        &self.settings
    }

    // ==========================================
    // 对外操作
    // ==========================================

    /// 预览: 解析 + 校验,不持久化任何数据
    #[instrument(skip(self, file), fields(file_name = %file.file_name, size = file.bytes.len()))]
    pub async fn preview(&self, file: &UploadedFile, actor_id: &str) -> ImportResult<PreviewResult> {
        self.check_request(file)?;
        self.resolve_actor(actor_id).await?;

        let rows = self
            .parse_in_background(file.bytes.clone(), file.file_name.clone())
            .await?;
        let refs = ReferenceSnapshot::load(self.reference_repo.as_ref()).await?;

        let sample_data = rows
            .iter()
            .take(self.settings.preview_sample_rows)
            .map(ParsedRow::to_header_map)
            .collect();
        let outcome = RowValidator.validate(rows, &refs);

        info!(
            total_rows = outcome.total_rows(),
            valid_rows = outcome.valid_rows(),
            errors = outcome.errors.len(),
            "预览完成"
        );

        Ok(PreviewResult {
            file_name: file.file_name.clone(),
            total_rows: outcome.total_rows(),
            headers: IMPORT_COLUMNS.iter().map(|c| c.to_string()).collect(),
            sample_data,
            errors: outcome.errors,
        })
    }

    /// 提交: 同步创建 PENDING 任务并调度后台处理
    #[instrument(skip(self, file), fields(file_name = %file.file_name, size = file.bytes.len()))]
    pub async fn commit(&self, file: UploadedFile, actor_id: &str) -> ImportResult<ImportJob> {
        self.check_request(&file)?;
        let actor = self.resolve_actor(actor_id).await?;

        let meta = ImportJobMeta {
            file_name: file.file_name.clone(),
            file_size: file.size(),
            mime_type: file.mime_type.clone(),
        };
        let job = ImportJob::new(meta, &actor.id);

        // 先占登记位再落库: 任务落库后不再有失败返回
        let done = self.reserve(&job.id)?;
        if let Err(e) = self.job_repo.create(&job).await {
            self.release(&job.id);
            return Err(e.into());
        }
        info!(job_id = %job.id, owner_id = %actor.id, "导入任务已创建");

        self.launch(job.clone(), actor, file.bytes, done);
        Ok(job)
    }

    /// 查询任务快照
    pub async fn status(&self, job_id: &str) -> ImportResult<Option<ImportJob>> {
        Ok(self.job_repo.load(job_id).await?)
    }

    /// 查询提交人的导入历史（新的在前）
    pub async fn history(&self, actor_id: &str) -> ImportResult<Vec<ImportJob>> {
        Ok(self.job_repo.list_by_owner(actor_id).await?)
    }

    /// 调度已落库的 PENDING 任务
    ///
    /// 以落库状态为准: 任务不存在返回 JobNotFound,非 PENDING 返回 InvalidTransition；
    /// 同一任务已有执行者时返回 JobAlreadyRunning
    pub async fn start_job(&self, job: ImportJob, actor: Actor, bytes: Vec<u8>) -> ImportResult<()> {
        let done = self.reserve(&job.id)?;
        match self.load_pending(&job.id).await {
            Ok(persisted) => {
                self.launch(persisted, actor, bytes, done);
                Ok(())
            }
            Err(e) => {
                self.release(&job.id);
                Err(e)
            }
        }
    }

    /// 等待后台任务结束（未登记时立即返回）
    pub async fn wait_for_job(&self, job_id: &str) -> ImportResult<()> {
        let done = self.lock_running()?.get(job_id).cloned();
        if let Some(mut done) = done {
            // 发送端提前释放同样视为结束
            let _ = done.wait_for(|finished| *finished).await;
        }
        Ok(())
    }

    // ==========================================
    // 后台处理
    // ==========================================

    /// 占用登记位
    fn reserve(&self, job_id: &str) -> ImportResult<watch::Sender<bool>> {
        let mut running = self.lock_running()?;
        if running.contains_key(job_id) {
            return Err(ImportError::JobAlreadyRunning(job_id.to_string()));
        }
        let (done_tx, done_rx) = watch::channel(false);
        running.insert(job_id.to_string(), done_rx);
        Ok(done_tx)
    }

    fn release(&self, job_id: &str) {
        self.running
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(job_id);
    }

    async fn load_pending(&self, job_id: &str) -> ImportResult<ImportJob> {
        let job = self
            .job_repo
            .load(job_id)
            .await?
            .ok_or_else(|| ImportError::JobNotFound(job_id.to_string()))?;
        if job.status != ImportStatus::Pending {
            return Err(ImportError::InvalidTransition(InvalidTransition {
                job_id: job.id,
                from: job.status,
                to: ImportStatus::Processing,
            }));
        }
        Ok(job)
    }

    /// 启动后台任务: 执行体结束（含 panic）后发出完成信号并释放登记位
    fn launch(&self, job: ImportJob, actor: Actor, bytes: Vec<u8>, done: watch::Sender<bool>) {
        let this = self.clone();
        tokio::spawn(async move {
            let job_id = job.id.clone();
            let worker = {
                let this = this.clone();
                tokio::spawn(async move { this.run_job(job, actor, bytes).await })
            };
            if let Err(e) = worker.await {
                this.fail_abandoned(&job_id, format!("后台任务异常终止: {}", e))
                    .await;
            }
            done.send_replace(true);
            this.release(&job_id);
        });
    }

    /// 执行体异常退出后,将仍未结束的任务标记为 FAILED
    async fn fail_abandoned(&self, job_id: &str, message: String) {
        error!(job_id, error = %message, "导入任务异常终止");
        let mut job = match self.job_repo.load(job_id).await {
            Ok(Some(job)) => job,
            Ok(None) => return,
            Err(e) => {
                error!(job_id, error = %e, "加载异常终止任务失败");
                return;
            }
        };
        if job.fail(message).is_err() {
            return;
        }
        if let Err(e) = self.job_repo.save(&job).await {
            error!(job_id, error = %e, "失败状态落库失败");
        }
    }

    #[instrument(skip(self, job, actor, bytes), fields(job_id = %job.id))]
    async fn run_job(&self, mut job: ImportJob, actor: Actor, bytes: Vec<u8>) {
        match self.process_job(&mut job, &actor, bytes).await {
            Ok(()) => info!(
                total_rows = job.total_rows,
                successful_rows = job.successful_rows,
                error_rows = job.error_rows,
                "导入任务完成"
            ),
            Err(e) => {
                error!(error = %e, "导入任务失败");
                if let Err(transition) = job.fail(e.to_string()) {
                    warn!(error = %transition, "任务已结束，忽略失败标记");
                    return;
                }
                if let Err(save_err) = self.job_repo.save(&job).await {
                    error!(error = %save_err, "失败状态落库失败");
                }
            }
        }
    }

    async fn process_job(
        &self,
        job: &mut ImportJob,
        actor: &Actor,
        bytes: Vec<u8>,
    ) -> ImportResult<()> {
        job.start_processing()?;
        self.job_repo.save(job).await?;

        // === 步骤 1: 解析 ===
        let rows = self
            .parse_in_background(bytes, job.file_name.clone())
            .await?;

        // === 步骤 2: 校验（参考数据每批次加载一次） ===
        let refs = ReferenceSnapshot::load(self.reference_repo.as_ref()).await?;
        let outcome = RowValidator.validate(rows, &refs);
        job.set_total_rows(outcome.total_rows())?;
        self.job_repo.save(job).await?;
        debug!(
            total_rows = outcome.total_rows(),
            valid_rows = outcome.valid_rows(),
            "校验完成"
        );

        // === 步骤 3: 逐行物化 ===
        let flush_every = self.settings.progress_flush_every.max(1);
        let mut errors = outcome.errors;
        let mut successful_rows = 0usize;

        for (idx, candidate) in outcome.candidates.iter().enumerate() {
            let row_number = idx + 1;
            if let Some(row) = candidate {
                match self.materializer.materialize(row, actor, &job.id).await {
                    Ok(expense) => {
                        successful_rows += 1;
                        debug!(row = row_number, expense_id = %expense.id, "行已物化");
                    }
                    Err(e) => {
                        warn!(row = row_number, error = %e, "行物化失败");
                        errors.push(ValidationError::new(
                            row_number,
                            GENERAL_FIELD,
                            format!("Failed to create expense: {}", e),
                            None,
                        ));
                    }
                }
            }

            job.record_row_processed()?;
            if job.processed_rows % flush_every == 0 {
                self.job_repo.save(job).await?;
            }
        }

        // === 步骤 4: 终态落库 ===
        job.complete(successful_rows, errors)?;
        self.job_repo.save(job).await?;
        Ok(())
    }

    // ==========================================
    // 内部辅助
    // ==========================================

    /// 请求级校验: MIME → 扩展名 → 大小
    fn check_request(&self, file: &UploadedFile) -> ImportResult<()> {
        if !is_accepted_mime_type(&file.mime_type) {
            return Err(ImportError::UnsupportedMimeType(file.mime_type.clone()));
        }
        FileFormat::from_file_name(&file.file_name)?;
        self.parser.check_size(file.size())
    }

    async fn resolve_actor(&self, actor_id: &str) -> ImportResult<Actor> {
        self.actor_repo
            .find_by_id(actor_id)
            .await?
            .ok_or_else(|| ImportError::ActorNotFound(actor_id.to_string()))
    }

    /// 解析在阻塞线程池执行,避免占用异步工作线程
    async fn parse_in_background(
        &self,
        bytes: Vec<u8>,
        file_name: String,
    ) -> ImportResult<Vec<ParsedRow>> {
        let parser = self.parser.clone();
        tokio::task::spawn_blocking(move || parser.parse(&bytes, &file_name))
            .await
            .map_err(|e| ImportError::InternalError(format!("解析任务异常终止: {}", e)))?
    }

    fn lock_running(&self) -> ImportResult<MutexGuard<'_, HashMap<String, watch::Receiver<bool>>>> {
        self.running
            .lock()
            .map_err(|e| ImportError::InternalError(format!("锁获取失败: {}", e)))
    }
}
