// ==========================================
// 费用导入系统 - 命令行入口
// ==========================================
// 子命令: preview / commit / status / history / seed
// 输出: 结果以 JSON 打印到 stdout,日志写入 stderr
// ==========================================

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use expense_import::importer::file_parser::mime_type_from_extension;
use expense_import::logging::{self, LogFormat};
use expense_import::{ImportApi, UploadedFile};
use serde::Serialize;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "expense-import")]
#[command(about = "Bulk import expenses from CSV / Excel files")]
#[command(version)]
struct Cli {
    /// SQLite database path
    #[arg(long, env = "EXPENSE_IMPORT_DB", global = true)]
    db: Option<PathBuf>,

    /// Log output format
    #[arg(long, value_enum, default_value_t = LogFormatArg::Text, global = true)]
    log_format: LogFormatArg,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum LogFormatArg {
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse and validate a file without persisting anything
    Preview {
        /// Path to .csv / .xlsx / .xls file
        file: PathBuf,

        /// Submitting user id
        #[arg(short, long)]
        actor: String,

        /// Declared MIME type (inferred from the extension when omitted)
        #[arg(long)]
        mime_type: Option<String>,
    },

    /// Create an import job and process the file in the background
    Commit {
        /// Path to .csv / .xlsx / .xls file
        file: PathBuf,

        /// Submitting user id
        #[arg(short, long)]
        actor: String,

        /// Declared MIME type (inferred from the extension when omitted)
        #[arg(long)]
        mime_type: Option<String>,

        /// Block until the job reaches a terminal state
        #[arg(short, long)]
        wait: bool,
    },

    /// Show one import job
    Status {
        job_id: String,
    },

    /// List import jobs of a user, newest first
    History {
        #[arg(short, long)]
        actor: String,
    },

    /// Register reference data (user, vendors, categories)
    Seed {
        /// User id to register
        #[arg(long)]
        actor: Option<String>,

        /// Display name for --actor
        #[arg(long, requires = "actor")]
        display_name: Option<String>,

        /// Vendor name (repeatable)
        #[arg(long = "vendor")]
        vendors: Vec<String>,

        /// Category name (repeatable)
        #[arg(long = "category")]
        categories: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    logging::init_with_format(match cli.log_format {
        LogFormatArg::Text => LogFormat::Text,
        LogFormatArg::Json => LogFormat::Json,
    });

    let db_path = match cli.db {
        Some(path) => path,
        None => default_db_path()?,
    };
    tracing::info!(db = %db_path.display(), version = expense_import::VERSION, "使用数据库");

    let api = ImportApi::new(&db_path.to_string_lossy())?;

    match cli.command {
        Commands::Preview {
            file,
            actor,
            mime_type,
        } => {
            let upload = read_upload(&file, mime_type)?;
            let preview = api.preview_import(&upload, &actor).await?;
            print_json(&preview)?;
        }
        Commands::Commit {
            file,
            actor,
            mime_type,
            wait,
        } => {
            let upload = read_upload(&file, mime_type)?;
            let job = api.commit_import(upload, &actor).await?;
            // 进程退出会中断后台任务,不等待时仅返回 PENDING 快照
            let job = if wait {
                api.wait_for_job(&job.id).await?
            } else {
                job
            };
            print_json(&job)?;
        }
        Commands::Status { job_id } => {
            print_json(&api.get_import_job(&job_id).await?)?;
        }
        Commands::History { actor } => {
            print_json(&api.list_import_history(&actor).await?)?;
        }
        Commands::Seed {
            actor,
            display_name,
            vendors,
            categories,
        } => {
            if let Some(actor_id) = actor {
                let name = display_name.unwrap_or_else(|| actor_id.clone());
                api.register_actor(&actor_id, &name).await?;
            }
            for vendor in &vendors {
                api.register_vendor(vendor).await?;
            }
            for category in &categories {
                api.register_category(category).await?;
            }
            tracing::info!(
                vendors = vendors.len(),
                categories = categories.len(),
                "参考数据已登记"
            );
        }
    }

    Ok(())
}

fn read_upload(path: &Path, mime_type: Option<String>) -> Result<UploadedFile> {
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| anyhow!("无效的文件路径: {}", path.display()))?
        .to_string();

    let mime_type = match mime_type {
        Some(m) => m,
        None => mime_type_from_extension(&file_name)
            .ok_or_else(|| anyhow!("无法根据扩展名推断文件类型: {}", file_name))?
            .to_string(),
    };

    let bytes =
        std::fs::read(path).with_context(|| format!("读取文件失败: {}", path.display()))?;
    Ok(UploadedFile::new(file_name, mime_type, bytes))
}

/// 默认数据库路径: <data_dir>/expense-import/expense_import.db
fn default_db_path() -> Result<PathBuf> {
    let dir = dirs::data_dir()
        .map(|d| d.join("expense-import"))
        .unwrap_or_else(|| PathBuf::from("."));
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("创建数据目录失败: {}", dir.display()))?;
    Ok(dir.join("expense_import.db"))
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
