// ==========================================
// 费用导入系统 - 单元格解码器
// ==========================================
// 职责: 任意形态的单元格 → trim 后的字符串 或 None
// 红线: 全函数,不 panic,不返回错误（异常单元格是预期输入）
// ==========================================

use calamine::Data;
use chrono::{NaiveDate, NaiveDateTime};
use tracing::warn;

// ==========================================
// CellValue - 原始单元格形态
// ==========================================
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Empty,
    Text(String),
    Number(f64),
    Bool(bool),
    Date(NaiveDateTime),
    /// 富文本（只取纯文本部分）
    RichText { text: String },
    /// 公式（取缓存结果）
    Formula { result: Option<Box<CellValue>> },
    /// 其他对象；Some 为其字符串表示,None 表示无可用表示
    Object(Option<String>),
    /// 单元格错误值（#DIV/0! 等）
    Error(String),
}

/// 解码单元格
pub fn decode_cell(cell: &CellValue) -> Option<String> {
    match cell {
        CellValue::Empty => None,
        CellValue::Text(s) => normalize_text(s),
        CellValue::Number(n) => {
            if n.is_finite() {
                Some(n.to_string())
            } else {
                warn!(value = %n, "单元格数值非有限值，按缺失处理");
                None
            }
        }
        CellValue::Bool(b) => Some(b.to_string()),
        CellValue::Date(dt) => Some(dt.date().format("%Y-%m-%d").to_string()),
        CellValue::RichText { text } => normalize_text(text),
        CellValue::Formula { result } => result.as_deref().and_then(decode_cell),
        CellValue::Object(Some(repr)) => normalize_text(repr),
        CellValue::Object(None) => {
            warn!("无法识别的单元格对象，按缺失处理");
            None
        }
        CellValue::Error(e) => {
            warn!(error = %e, "单元格为错误值，按缺失处理");
            None
        }
    }
}

/// TRIM + 空串标准化为 None
pub fn normalize_text(value: &str) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

impl From<&Data> for CellValue {
    fn from(cell: &Data) -> Self {
        match cell {
            Data::Empty => CellValue::Empty,
            Data::String(s) => CellValue::Text(s.clone()),
            Data::Float(f) => CellValue::Number(*f),
            Data::Int(i) => CellValue::Number(*i as f64),
            Data::Bool(b) => CellValue::Bool(*b),
            Data::DateTime(dt) => match dt.as_datetime() {
                Some(value) => CellValue::Date(value),
                None => CellValue::Number(dt.as_f64()),
            },
            Data::DateTimeIso(s) => parse_iso_datetime(s)
                .map(CellValue::Date)
                .unwrap_or_else(|| CellValue::Text(s.clone())),
            Data::DurationIso(s) => CellValue::Text(s.clone()),
            Data::Error(e) => CellValue::Error(format!("{:?}", e)),
        }
    }
}

fn parse_iso_datetime(raw: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .or_else(|| {
            NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_and_blank_are_absent() {
        assert_eq!(decode_cell(&CellValue::Empty), None);
        assert_eq!(decode_cell(&CellValue::Text("   ".to_string())), None);
    }

    #[test]
    fn test_text_is_trimmed() {
        assert_eq!(
            decode_cell(&CellValue::Text("  Acme Ltd \t".to_string())),
            Some("Acme Ltd".to_string())
        );
    }

    #[test]
    fn test_numbers_render_as_decimal_strings() {
        assert_eq!(decode_cell(&CellValue::Number(100.0)), Some("100".to_string()));
        assert_eq!(decode_cell(&CellValue::Number(12.5)), Some("12.5".to_string()));
        assert_eq!(decode_cell(&CellValue::Number(f64::NAN)), None);
    }

    #[test]
    fn test_date_renders_iso_day() {
        let dt = NaiveDate::from_ymd_opt(2024, 3, 9)
            .unwrap()
            .and_hms_opt(13, 45, 0)
            .unwrap();
        assert_eq!(decode_cell(&CellValue::Date(dt)), Some("2024-03-09".to_string()));
    }

    #[test]
    fn test_bool_rich_text_and_formula() {
        assert_eq!(decode_cell(&CellValue::Bool(true)), Some("true".to_string()));
        assert_eq!(
            decode_cell(&CellValue::RichText { text: " bold ".to_string() }),
            Some("bold".to_string())
        );
        let formula = CellValue::Formula {
            result: Some(Box::new(CellValue::Formula {
                result: Some(Box::new(CellValue::Number(42.0))),
            })),
        };
        assert_eq!(decode_cell(&formula), Some("42".to_string()));
        assert_eq!(decode_cell(&CellValue::Formula { result: None }), None);
    }

    #[test]
    fn test_objects_and_errors() {
        assert_eq!(
            decode_cell(&CellValue::Object(Some("INV-7".to_string()))),
            Some("INV-7".to_string())
        );
        assert_eq!(decode_cell(&CellValue::Object(None)), None);
        assert_eq!(decode_cell(&CellValue::Error("Div0".to_string())), None);
    }

    #[test]
    fn test_from_calamine_data() {
        assert_eq!(CellValue::from(&Data::Empty), CellValue::Empty);
        assert_eq!(CellValue::from(&Data::Int(7)), CellValue::Number(7.0));
        assert_eq!(
            decode_cell(&CellValue::from(&Data::DateTimeIso("2024-01-31T00:00:00".to_string()))),
            Some("2024-01-31".to_string())
        );
        assert_eq!(
            decode_cell(&CellValue::from(&Data::String(" x ".to_string()))),
            Some("x".to_string())
        );
    }
}
