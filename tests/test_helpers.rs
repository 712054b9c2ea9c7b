// ==========================================
// 测试辅助函数
// ==========================================
// 职责: 提供测试所需的数据库初始化、参考数据、上传文件构造等功能
// ==========================================
#![allow(dead_code)]

use expense_import::domain::types::IMPORT_COLUMNS;
use expense_import::importer::file_parser::{MIME_CSV, MIME_XLSX};
use expense_import::{ImportApi, UploadedFile};
use rust_xlsxwriter::Workbook;
use std::error::Error;
use tempfile::NamedTempFile;

pub const ACTOR_ID: &str = "u-alice";

/// 创建临时测试数据库
///
/// # 返回
/// - NamedTempFile: 临时数据库文件（需要保持存活）
/// - String: 数据库文件路径
pub fn create_test_db() -> Result<(NamedTempFile, String), Box<dyn Error>> {
    let temp_file = NamedTempFile::new()?;
    let db_path = temp_file
        .path()
        .to_str()
        .ok_or("临时文件路径非 UTF-8")?
        .to_string();
    Ok((temp_file, db_path))
}

/// 创建 ImportApi 并登记默认参考数据
pub async fn create_seeded_api(db_path: &str) -> Result<ImportApi, Box<dyn Error>> {
    let api = ImportApi::new(db_path)?;
    seed_reference_data(&api).await?;
    Ok(api)
}

/// 默认参考数据: 一个提交人、两个供应商、三个类别
pub async fn seed_reference_data(api: &ImportApi) -> Result<(), Box<dyn Error>> {
    api.register_actor(ACTOR_ID, "Alice").await?;
    for vendor in ["Acme Ltd", "Globex"] {
        api.register_vendor(vendor).await?;
    }
    for category in ["Office", "Travel", "Misc"] {
        api.register_category(category).await?;
    }
    Ok(())
}

/// 一行合法的 CSV 数据
pub fn expense_line(sub_id: &str, vendor: &str, category: &str) -> String {
    format!(
        "P1,{},{},Office supplies,Out,100,20,120,USD,2024-01-15,{},BANK_TRANSFER,https://invoices.example/1",
        sub_id, vendor, category
    )
}

/// 表头 + 数据行 → CSV 上传文件
pub fn csv_upload(file_name: &str, lines: &[String]) -> UploadedFile {
    let mut content = IMPORT_COLUMNS.join(",");
    content.push('\n');
    for line in lines {
        content.push_str(line);
        content.push('\n');
    }
    UploadedFile::new(file_name, MIME_CSV, content.into_bytes())
}

/// 表头 + 数据行 → xlsx 上传文件
///
/// 单元格为 None 时不写入；可解析为数字的金额列按数值写入
pub fn xlsx_upload(
    file_name: &str,
    rows: &[Vec<Option<&str>>],
) -> Result<UploadedFile, Box<dyn Error>> {
    let mut workbook = Workbook::new();
    let worksheet = workbook.add_worksheet();

    for (col, header) in IMPORT_COLUMNS.iter().enumerate() {
        worksheet.write_string(0, col as u16, *header)?;
    }

    for (idx, row) in rows.iter().enumerate() {
        let row_idx = (idx + 1) as u32;
        for (col, cell) in row.iter().enumerate() {
            let Some(value) = cell else { continue };
            match value.parse::<f64>() {
                Ok(number) if (5..=7).contains(&col) => {
                    worksheet.write_number(row_idx, col as u16, number)?;
                }
                _ => {
                    worksheet.write_string(row_idx, col as u16, *value)?;
                }
            }
        }
    }

    let bytes = workbook.save_to_buffer()?;
    Ok(UploadedFile::new(file_name, MIME_XLSX, bytes))
}

/// 一行合法的 xlsx 数据
pub fn expense_cells<'a>(sub_id: Option<&'a str>, vendor: &'a str) -> Vec<Option<&'a str>> {
    vec![
        Some("P1"),
        sub_id,
        Some(vendor),
        Some("Taxi to airport"),
        Some("Out"),
        Some("50"),
        Some("10"),
        Some("60"),
        Some("EUR"),
        Some("2024-02-01"),
        Some("Travel"),
        Some("credit_card"),
        None,
    ]
}
