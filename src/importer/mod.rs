// ==========================================
// 费用导入系统 - 导入层
// ==========================================
// 职责: 费用文件批量导入,生成费用草稿记录
// 支持: Excel (.xlsx/.xls), CSV
// 流程: 单元格解码 → 文件解析 → 行校验 → 行物化 → 任务编排
// ==========================================

// 模块声明
pub mod cell_decoder;
pub mod error;
pub mod file_parser;
pub mod materializer;
pub mod orchestrator;
pub mod row_validator;

// 重导出核心类型
pub use cell_decoder::{decode_cell, CellValue};
pub use error::{ImportError, ImportResult};
pub use file_parser::{CsvParser, ExcelParser, FileFormat, FileParser, UniversalFileParser};
pub use materializer::{ExpenseMaterializer, RowMaterializer};
pub use orchestrator::{ImportOrchestrator, PreviewResult, UploadedFile};
pub use row_validator::{ReferenceSnapshot, RowValidator, ValidationOutcome};
