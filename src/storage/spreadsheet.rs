//! 表格规则适配器
//!
//! 一个工作簿包含多个工作表，每个工作表对应一所来源机构。
//! 第一行非空行是表头，其余每行是一条等效规则。

use crate::core::error::{LoadError, RuleError};
use crate::core::models::{CourseCode, EquivalenceRule, Grant, RuleSource, Verdict};
use crate::core::normalizer::{split_combo, split_combo_ordered};
use calamine::{open_workbook_auto, Data, Reader, Sheets};
use std::path::Path;

pub const COL_ORIGIN_CODES: &str = "Códigos Origem";
pub const COL_ORIGIN_NAMES: &str = "Nomes Origem";
pub const COL_EQUIVALENT: &str = "Equivalente?";
pub const COL_DEST_CODES: &str = "Códigos UFRJ Destino";
pub const COL_DEST_NAMES: &str = "Nomes UFRJ Destino";
pub const COL_JUSTIFICATION: &str = "Justificativa Parecer";
/// 可选列
pub const COL_PRIORITY: &str = "Prioridade";

/// 必需列
pub const REQUIRED_COLUMNS: [&str; 6] = [
    COL_ORIGIN_CODES,
    COL_ORIGIN_NAMES,
    COL_EQUIVALENT,
    COL_DEST_CODES,
    COL_DEST_NAMES,
    COL_JUSTIFICATION,
];

/// 一个工作表（已转为文本）
#[derive(Debug, Clone, Default)]
pub struct RuleSheet {
    pub name: String,
    pub headers: Vec<String>,
    /// 数据行，(表内行号从1开始, 单元格)
    pub rows: Vec<(usize, Vec<String>)>,
}

impl RuleSheet {
    /// 缺少的必需列
    pub fn missing_columns(&self) -> Vec<String> {
        REQUIRED_COLUMNS
            .iter()
            .filter(|c| self.column(c).is_none())
            .map(|c| c.to_string())
            .collect()
    }

    fn column(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h.trim() == name)
    }

    /// 把数据行转换为规则，空行跳过
    pub fn rules(&self) -> Result<Vec<EquivalenceRule>, LoadError> {
        let missing = self.missing_columns();
        if !missing.is_empty() {
            return Err(LoadError::SheetMissingColumns {
                sheet: self.name.clone(),
                missing,
            });
        }

        let col = |name: &str| self.column(name).unwrap_or(usize::MAX);
        let origin_codes = col(COL_ORIGIN_CODES);
        let origin_names = col(COL_ORIGIN_NAMES);
        let equivalent = col(COL_EQUIVALENT);
        let dest_codes = col(COL_DEST_CODES);
        let dest_names = col(COL_DEST_NAMES);
        let justification = col(COL_JUSTIFICATION);
        let priority = self.column(COL_PRIORITY);

        let mut rules = Vec::new();
        for (row, cells) in &self.rows {
            if cells.iter().all(|c| c.trim().is_empty()) {
                continue;
            }

            let get = |idx: usize| cells.get(idx).map(|s| s.trim()).unwrap_or("");
            let source = RuleSource::Spreadsheet {
                sheet: self.name.clone(),
                row: *row,
            };

            // 名称按书写顺序与代码对应，目标代码不能先排序
            let grants = pair_names(split_combo_ordered(get(dest_codes)), get(dest_names));

            let mut rule = EquivalenceRule::new(source.clone(), split_combo(get(origin_codes)), grants)
                .with_origin_names(get(origin_names))
                .with_verdict(Verdict::from_cell(get(equivalent)))
                .with_justification(get(justification));

            if let Some(idx) = priority {
                let raw = get(idx);
                if !raw.is_empty() {
                    let value = raw.parse::<u8>().map_err(|_| RuleError::MalformedRule {
                        location: source,
                        reason: format!("优先级无效: '{}'", raw),
                    })?;
                    rule = rule.with_priority(value);
                }
            }

            rule.validate()?;
            rules.push(rule);
        }

        Ok(rules)
    }
}

/// 目标名称按 '+' 拆分后与代码一一对应；数量不一致时整段名称挂在第一个代码上
fn pair_names(codes: Vec<CourseCode>, names: &str) -> Vec<Grant> {
    let parts: Vec<&str> = names.split('+').map(str::trim).collect();

    if parts.len() == codes.len() {
        return codes
            .into_iter()
            .zip(parts)
            .map(|(code, name)| Grant::named(code, name))
            .collect();
    }

    codes
        .into_iter()
        .enumerate()
        .map(|(i, code)| if i == 0 { Grant::named(code, names) } else { Grant::new(code) })
        .collect()
}

/// 规则工作簿
#[derive(Debug, Clone, Default)]
pub struct RuleWorkbook {
    sheets: Vec<RuleSheet>,
}

impl RuleWorkbook {
    /// 打开 .xlsx / .xls / .ods 工作簿，读取全部工作表
    pub fn open(path: &Path) -> Result<Self, LoadError> {
        let spreadsheet_error = |message: String| LoadError::Spreadsheet {
            path: path.to_path_buf(),
            message,
        };

        let mut workbook: Sheets<_> =
            open_workbook_auto(path).map_err(|e| spreadsheet_error(e.to_string()))?;
        let sheet_names: Vec<String> = workbook.sheet_names().to_vec();

        let mut sheets = Vec::with_capacity(sheet_names.len());
        for name in &sheet_names {
            let range = workbook
                .worksheet_range(name)
                .map_err(|e| spreadsheet_error(format!("工作表 '{}': {}", name, e)))?;

            let mut rows = range
                .rows()
                .enumerate()
                .map(|(i, row)| (i + 1, row.iter().map(cell_text).collect::<Vec<_>>()))
                .skip_while(|(_, cells)| cells.iter().all(|c| c.is_empty()));

            let headers = rows.next().map(|(_, cells)| cells).unwrap_or_default();
            sheets.push(RuleSheet {
                name: name.clone(),
                headers,
                rows: rows.collect(),
            });
        }

        tracing::info!("表格 '{}' 加载成功，共 {} 个工作表", path.display(), sheets.len());
        Ok(Self { sheets })
    }

    pub fn from_sheets(sheets: Vec<RuleSheet>) -> Self {
        Self { sheets }
    }

    /// 机构列表（工作表顺序）
    pub fn institutions(&self) -> Vec<&str> {
        self.sheets.iter().map(|s| s.name.as_str()).collect()
    }

    /// 至少一个工作表包含全部必需列时有效
    pub fn validate(&self) -> Result<(), LoadError> {
        if self.sheets.is_empty() {
            return Err(LoadError::EmptyWorkbook);
        }

        if self.sheets.iter().any(|s| s.missing_columns().is_empty()) {
            return Ok(());
        }

        Err(LoadError::MissingColumns {
            missing: REQUIRED_COLUMNS.iter().map(|c| c.to_string()).collect(),
        })
    }

    /// 第一个包含全部必需列的工作表
    pub fn first_valid_sheet(&self) -> Option<&RuleSheet> {
        self.sheets.iter().find(|s| s.missing_columns().is_empty())
    }

    pub fn sheet(&self, institution: &str) -> Option<&RuleSheet> {
        let wanted = institution.trim();
        self.sheets
            .iter()
            .find(|s| s.name == wanted)
            .or_else(|| self.sheets.iter().find(|s| s.name.trim().eq_ignore_ascii_case(wanted)))
    }

    /// 某机构的规则（表格行序）
    pub fn rules_for(&self, institution: &str) -> Result<Vec<EquivalenceRule>, LoadError> {
        let sheet = self
            .sheet(institution)
            .ok_or_else(|| LoadError::UnknownInstitution(institution.to_string()))?;
        sheet.rules()
    }
}

/// 单元格转文本：整数不带小数
fn cell_text(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) => s.trim().to_string(),
        Data::Float(n) => {
            if n.fract() == 0.0 && n.abs() < 1e15 {
                format!("{}", *n as i64)
            } else {
                format!("{}", n)
            }
        }
        Data::Int(n) => n.to_string(),
        Data::Bool(b) => b.to_string(),
        other => other.to_string(),
    }
}
