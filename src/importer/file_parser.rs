// ==========================================
// 费用导入系统 - 文件解析器实现
// ==========================================
// 支持: Excel (.xlsx/.xls) / CSV (.csv)
// 列契约: domain::types::IMPORT_COLUMNS
// - CSV: 按表头文本取列,一行输入对应一行输出,不跳过空白行
// - Excel: 仅第一个工作表,跳过第 1 行表头,按固定列位置取值,
//          第二列（Sub-ID）为空的行视为空行整体跳过
// ==========================================

use crate::domain::expense::ParsedRow;
use crate::domain::types::IMPORT_COLUMNS;
use crate::importer::cell_decoder::{decode_cell, CellValue};
use crate::importer::error::{ImportError, ImportResult};
use calamine::{open_workbook_auto_from_rs, Reader};
use csv::ReaderBuilder;
use std::io::Cursor;
use std::path::Path;
use tracing::debug;

/// 默认文件大小上限: 10 MiB
pub const DEFAULT_MAX_FILE_SIZE_BYTES: u64 = 10 * 1024 * 1024;

pub const MIME_CSV: &str = "text/csv";
pub const MIME_XLS: &str = "application/vnd.ms-excel";
pub const MIME_XLSX: &str = "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

/// 允许的 MIME 类型
pub const ACCEPTED_MIME_TYPES: [&str; 3] = [MIME_CSV, MIME_XLS, MIME_XLSX];

/// Excel 空行探测列（0-based,即第二列）
const BLANK_ROW_PROBE_COLUMN: usize = 1;

/// 文件格式（按扩展名判定）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileFormat {
    Csv,
    Spreadsheet,
}

impl FileFormat {
    pub fn from_file_name(file_name: &str) -> ImportResult<Self> {
        let ext = Path::new(file_name)
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_lowercase();

        match ext.as_str() {
            "csv" => Ok(FileFormat::Csv),
            "xlsx" | "xls" => Ok(FileFormat::Spreadsheet),
            _ => Err(ImportError::UnsupportedFormat(if ext.is_empty() {
                file_name.to_string()
            } else {
                ext
            })),
        }
    }
}

/// 按扩展名推断 MIME 类型（命令行上传时使用）
pub fn mime_type_from_extension(file_name: &str) -> Option<&'static str> {
    let ext = Path::new(file_name)
        .extension()
        .and_then(|e| e.to_str())?
        .to_lowercase();
    match ext.as_str() {
        "csv" => Some(MIME_CSV),
        "xls" => Some(MIME_XLS),
        "xlsx" => Some(MIME_XLSX),
        _ => None,
    }
}

/// MIME 类型是否在白名单内（忽略参数部分,如 `; charset=utf-8`）
pub fn is_accepted_mime_type(mime_type: &str) -> bool {
    let essence = mime_type
        .split(';')
        .next()
        .unwrap_or("")
        .trim()
        .to_lowercase();
    ACCEPTED_MIME_TYPES.contains(&essence.as_str())
}

// ==========================================
// FileParser Trait
// ==========================================
pub trait FileParser: Send + Sync {
    /// 解析文件内容为有序的行记录
    fn parse_rows(&self, bytes: &[u8]) -> ImportResult<Vec<ParsedRow>>;
}

// ==========================================
// CSV Parser 实现
// ==========================================
pub struct CsvParser;

impl FileParser for CsvParser {
    fn parse_rows(&self, bytes: &[u8]) -> ImportResult<Vec<ParsedRow>> {
        let mut reader = ReaderBuilder::new()
            .has_headers(true)
            .flexible(true) // 允许行长度不一致
            .from_reader(bytes);

        // 读取表头（去除 BOM 与首尾空白）
        let headers: Vec<String> = reader
            .headers()?
            .iter()
            .map(|h| h.trim_start_matches('\u{feff}').trim().to_string())
            .collect();

        // 列契约 → 文件列下标
        let column_positions: Vec<Option<usize>> = IMPORT_COLUMNS
            .iter()
            .map(|name| headers.iter().position(|h| h == name))
            .collect();

        let missing: Vec<&str> = IMPORT_COLUMNS
            .iter()
            .zip(&column_positions)
            .filter(|(_, pos)| pos.is_none())
            .map(|(name, _)| *name)
            .collect();
        if !missing.is_empty() {
            debug!(missing = ?missing, "CSV 缺少部分列，对应字段按空值处理");
        }

        let mut rows = Vec::new();
        for result in reader.records() {
            let record = result?;
            let cells = column_positions.iter().map(|pos| {
                pos.and_then(|idx| record.get(idx))
                    .and_then(|raw| decode_cell(&CellValue::Text(raw.to_string())))
            });
            rows.push(ParsedRow::from_columns(cells));
        }

        debug!(rows = rows.len(), "CSV 解析完成");
        Ok(rows)
    }
}

// ==========================================
// Excel Parser 实现
// ==========================================
pub struct ExcelParser;

impl FileParser for ExcelParser {
    fn parse_rows(&self, bytes: &[u8]) -> ImportResult<Vec<ParsedRow>> {
        let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes.to_vec()))?;

        // 读取第一个 sheet
        let range = workbook
            .worksheet_range_at(0)
            .ok_or_else(|| ImportError::ExcelParseError("Excel 文件无工作表".to_string()))??;

        // Range 从第一个非空单元格开始,换算回绝对行列
        let (start_row, start_col) = range
            .start()
            .map(|(r, c)| (r as usize, c as usize))
            .unwrap_or((0, 0));

        let mut rows = Vec::new();
        let mut skipped = 0usize;
        for (offset, cells) in range.rows().enumerate() {
            // 第 1 行为表头
            if start_row + offset == 0 {
                continue;
            }

            let decoded: Vec<Option<String>> = (0..IMPORT_COLUMNS.len())
                .map(|col| {
                    col.checked_sub(start_col)
                        .and_then(|idx| cells.get(idx))
                        .and_then(|cell| decode_cell(&CellValue::from(cell)))
                })
                .collect();

            if decoded[BLANK_ROW_PROBE_COLUMN].is_none() {
                skipped += 1;
                continue;
            }

            rows.push(ParsedRow::from_columns(decoded));
        }

        debug!(rows = rows.len(), skipped = skipped, "Excel 解析完成");
        Ok(rows)
    }
}

// ==========================================
// 通用文件解析器（大小检查 + 按扩展名选择解析器）
// ==========================================
pub struct UniversalFileParser {
    max_file_size_bytes: u64,
}

impl UniversalFileParser {
    pub fn new(max_file_size_bytes: u64) -> Self {
        Self {
            max_file_size_bytes,
        }
    }

    pub fn max_file_size_bytes(&self) -> u64 {
        self.max_file_size_bytes
    }

    /// 大小检查（在产生任何行之前失败）
    pub fn check_size(&self, size: u64) -> ImportResult<()> {
        if size > self.max_file_size_bytes {
            return Err(ImportError::FileTooLarge {
                size,
                limit: self.max_file_size_bytes,
            });
        }
        Ok(())
    }

    pub fn parse(&self, bytes: &[u8], file_name: &str) -> ImportResult<Vec<ParsedRow>> {
        self.check_size(bytes.len() as u64)?;

        match FileFormat::from_file_name(file_name)? {
            FileFormat::Csv => CsvParser.parse_rows(bytes),
            FileFormat::Spreadsheet => ExcelParser.parse_rows(bytes),
        }
    }
}

impl Default for UniversalFileParser {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_FILE_SIZE_BYTES)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER: &str = "Parent ID,Sub-ID,Vendor,Description,Type,Amount (Before VAT),VAT Amount,Amount (After VAT),Currency,Transaction Date,Category,Payment Method,Invoice Link";

    #[test]
    fn test_csv_parser_maps_by_header() {
        let csv = format!(
            "{}\nP1,S1,Acme,Paper,Out,100,20,120,USD,2024-01-15,Office,BANK_TRANSFER,http://x\n",
            HEADER
        );
        let rows = CsvParser.parse_rows(csv.as_bytes()).unwrap();

        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].vendor.as_deref(), Some("Acme"));
        assert_eq!(rows[0].amount_after_vat.as_deref(), Some("120"));
        assert_eq!(rows[0].invoice_link.as_deref(), Some("http://x"));
    }

    #[test]
    fn test_csv_parser_header_order_independent() {
        let csv = "Vendor,Currency,Amount (After VAT)\n Acme ,EUR,5\n";
        let rows = CsvParser.parse_rows(csv.as_bytes()).unwrap();

        assert_eq!(rows[0].vendor.as_deref(), Some("Acme"));
        assert_eq!(rows[0].currency.as_deref(), Some("EUR"));
        assert_eq!(rows[0].amount_after_vat.as_deref(), Some("5"));
        assert_eq!(rows[0].description, None);
    }

    #[test]
    fn test_csv_parser_keeps_blank_rows() {
        let csv = format!(
            "{}\nP1,S1,Acme,Paper,Out,,,120,USD,2024-01-15,Office,BANK_TRANSFER,\n,,,,,,,,,,,,\n",
            HEADER
        );
        let rows = CsvParser.parse_rows(csv.as_bytes()).unwrap();

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1], ParsedRow::default());
    }

    #[test]
    fn test_csv_parser_strips_bom() {
        let csv = "\u{feff}Vendor\nAcme\n";
        let rows = CsvParser.parse_rows(csv.as_bytes()).unwrap();
        assert_eq!(rows[0].vendor.as_deref(), Some("Acme"));
    }

    #[test]
    fn test_format_detection() {
        assert_eq!(FileFormat::from_file_name("a.CSV").unwrap(), FileFormat::Csv);
        assert_eq!(FileFormat::from_file_name("a.xlsx").unwrap(), FileFormat::Spreadsheet);
        assert_eq!(FileFormat::from_file_name("a.xls").unwrap(), FileFormat::Spreadsheet);
        assert!(matches!(
            FileFormat::from_file_name("a.pdf"),
            Err(ImportError::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn test_mime_whitelist() {
        assert!(is_accepted_mime_type("text/csv"));
        assert!(is_accepted_mime_type("text/csv; charset=utf-8"));
        assert!(is_accepted_mime_type(MIME_XLSX));
        assert!(!is_accepted_mime_type("application/pdf"));

        assert_eq!(mime_type_from_extension("x.XLSX"), Some(MIME_XLSX));
        assert_eq!(mime_type_from_extension("x.xls"), Some(MIME_XLS));
        assert_eq!(mime_type_from_extension("x.txt"), None);
    }

    #[test]
    fn test_oversized_file_fails_fast() {
        let parser = UniversalFileParser::new(8);
        let result = parser.parse(b"Vendor\nAcme\n", "a.csv");
        assert!(matches!(
            result,
            Err(ImportError::FileTooLarge { size: 12, limit: 8 })
        ));
    }

    #[test]
    fn test_corrupt_workbook_is_excel_error() {
        let result = UniversalFileParser::default().parse(b"not a workbook", "a.xlsx");
        assert!(matches!(result, Err(ImportError::ExcelParseError(_))));
    }
}
