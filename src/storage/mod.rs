//! 存储模块 - 规则数据源、配置与数据库

pub mod config;
pub mod database;
pub mod rule_file;
pub mod spreadsheet;

use crate::core::error::LoadError;
use crate::core::models::EquivalenceRule;
use spreadsheet::RuleWorkbook;
use std::path::Path;

/// 按扩展名加载规则，返回（机构名, 规则）
///
/// 表格文件未指定机构时，取第一个包含全部必需列的工作表；
/// JSON文件以文件名作为机构名。
pub fn load_rules(
    path: &Path,
    institution: Option<&str>,
) -> Result<(String, Vec<EquivalenceRule>), LoadError> {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();

    match extension.as_str() {
        "xlsx" | "xlsm" | "xls" | "ods" => {
            let workbook = RuleWorkbook::open(path)?;
            workbook.validate()?;

            let name = match institution {
                Some(name) => name.to_string(),
                None => workbook
                    .first_valid_sheet()
                    .map(|s| s.name.clone())
                    .ok_or(LoadError::EmptyWorkbook)?,
            };
            let rules = workbook.rules_for(&name)?;
            Ok((name, rules))
        }
        "json" => {
            let name = institution
                .map(str::to_string)
                .or_else(|| path.file_stem().map(|s| s.to_string_lossy().into_owned()))
                .unwrap_or_default();
            Ok((name, rule_file::load_rule_file(path)?))
        }
        _ => Err(LoadError::UnsupportedFormat(path.to_path_buf())),
    }
}
