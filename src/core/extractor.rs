//! 成绩单提取模块
//!
//! 从学业指导公报（BOA）的文本中提取学生姓名、学业数值字段和已通过课程。
//! 此模块只做文本解析，不做任何等效判断。

use crate::core::error::ExtractError;
use crate::core::models::{AcademicFields, CourseCode, StudentRecord};
use regex::Regex;
use std::collections::BTreeSet;
use std::path::Path;
use std::sync::LazyLock;

/// 公报首页的标题
const TRANSCRIPT_HEADER: &str = "BOLETIM DE ORIENTAÇÃO ACADÊMICA";

static NAME_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"Emissão[ \t]*\r?\n\s*([A-ZÀ-Ý][A-ZÀ-Ý ]*[A-ZÀ-Ý])")
        .expect("Invalid student name regex")
});

/// 数值字段：(标签, 在 AcademicFields 中的位置)
const FIELD_LABELS: &[(&str, FieldSlot)] = &[
    ("Períodos Integralizados (RES 10/2004 - CEG):", FieldSlot::CompletedPeriods),
    ("Prazo máximo de integralização:", FieldSlot::MaxPeriods),
    ("Carga horária obtida acumulada:", FieldSlot::WorkloadHours),
    ("Créditos obtidos acumulados:", FieldSlot::Credits),
    ("CR acumulado:", FieldSlot::CumulativeGpa),
    ("Carga horária acumulada extensão:", FieldSlot::ExtensionHours),
];

#[derive(Debug, Clone, Copy)]
enum FieldSlot {
    CompletedPeriods,
    MaxPeriods,
    WorkloadHours,
    Credits,
    CumulativeGpa,
    ExtensionHours,
}

impl FieldSlot {
    fn slot<'a>(&self, fields: &'a mut AcademicFields) -> &'a mut Option<f64> {
        match self {
            FieldSlot::CompletedPeriods => &mut fields.completed_periods,
            FieldSlot::MaxPeriods => &mut fields.max_periods,
            FieldSlot::WorkloadHours => &mut fields.workload_hours,
            FieldSlot::Credits => &mut fields.credits,
            FieldSlot::CumulativeGpa => &mut fields.cumulative_gpa,
            FieldSlot::ExtensionHours => &mut fields.extension_hours,
        }
    }
}

/// 成绩单提取器
pub struct TranscriptExtractor {
    /// 已通过课程行的匹配模式（由院系前缀生成）
    approved_pattern: Regex,
    /// 数值字段的匹配模式
    field_patterns: Vec<(Regex, FieldSlot)>,
    /// 忽略的课程代码
    excluded: BTreeSet<CourseCode>,
}

impl TranscriptExtractor {
    /// 创建提取器
    ///
    /// `prefixes` 为院系前缀白名单（如 "ICP"、"MAB"），`excluded` 为需要忽略的课程代码。
    pub fn new<S: AsRef<str>>(prefixes: &[S], excluded: &[S]) -> Result<Self, ExtractError> {
        let alternatives = prefixes
            .iter()
            .map(|p| regex::escape(p.as_ref().trim()))
            .filter(|p| !p.is_empty())
            .collect::<Vec<_>>()
            .join("|");

        // 空的分支会让任意单词开头的行都被当成课程
        if alternatives.is_empty() {
            return Err(ExtractError::NoCoursePrefixes);
        }

        // 行首是课程代码，中间任意文本，行尾是数字成绩
        let approved_pattern = Regex::new(&format!(
            r"(?m)^((?:{})\w+)\s+.*?\s+[\d.]+\s*$",
            alternatives
        ))?;

        let field_patterns = FIELD_LABELS
            .iter()
            .map(|(label, slot)| {
                Regex::new(&format!(r"{}\s*([\d.]+)", regex::escape(label))).map(|re| (re, *slot))
            })
            .collect::<Result<Vec<_>, _>>()?;

        let excluded = excluded.iter().filter_map(|c| CourseCode::parse(c.as_ref())).collect();

        Ok(Self {
            approved_pattern,
            field_patterns,
            excluded,
        })
    }

    /// 判断文本是否为学业指导公报
    pub fn looks_like_transcript(text: &str) -> bool {
        text.contains(TRANSCRIPT_HEADER)
    }

    /// 从文本提取学生记录，不检查公报标题
    pub fn extract(&self, text: &str) -> Result<StudentRecord, ExtractError> {
        if text.trim().is_empty() {
            return Err(ExtractError::EmptyDocument);
        }

        let student_name = NAME_REGEX
            .captures(text)
            .and_then(|c| c.get(1))
            .map(|m| title_case(m.as_str()));

        let mut fields = AcademicFields::default();
        for (pattern, slot) in &self.field_patterns {
            *slot.slot(&mut fields) = pattern
                .captures(text)
                .and_then(|c| c.get(1))
                .and_then(|m| m.as_str().parse::<f64>().ok());
        }

        let approved_codes: BTreeSet<CourseCode> = self
            .approved_pattern
            .captures_iter(text)
            .filter_map(|c| c.get(1))
            .filter_map(|m| CourseCode::parse(m.as_str()))
            .filter(|code| !self.excluded.contains(code))
            .collect();

        tracing::info!(
            "成绩单提取完成: {} 门已通过课程",
            approved_codes.len()
        );

        Ok(StudentRecord {
            student_name,
            approved_codes,
            fields,
        })
    }

    /// 从文本提取学生记录，要求带有公报标题
    pub fn extract_document(&self, text: &str) -> Result<StudentRecord, ExtractError> {
        if text.trim().is_empty() {
            return Err(ExtractError::EmptyDocument);
        }
        if !Self::looks_like_transcript(text) {
            return Err(ExtractError::NotATranscript);
        }
        self.extract(text)
    }

    /// 读取PDF全部页面的文本并提取
    pub fn extract_from_pdf(&self, path: &Path) -> Result<StudentRecord, ExtractError> {
        let text = pdf_extract::extract_text(path).map_err(|e| ExtractError::Unreadable {
            path: path.to_path_buf(),
            message: format!("{:?}", e),
        })?;
        self.extract_document(&text)
    }

    /// 按扩展名读取成绩单文件（.pdf 或纯文本）
    pub fn extract_from_file(&self, path: &Path) -> Result<StudentRecord, ExtractError> {
        let is_pdf = path
            .extension()
            .map(|e| e.eq_ignore_ascii_case("pdf"))
            .unwrap_or(false);

        if is_pdf {
            return self.extract_from_pdf(path);
        }

        let text = std::fs::read_to_string(path).map_err(|e| ExtractError::Unreadable {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        self.extract_document(&text)
    }
}

/// 姓名转为首字母大写形式，如 "MARIA DA SILVA" -> "Maria Da Silva"
fn title_case(raw: &str) -> String {
    raw.split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first
                    .to_uppercase()
                    .chain(chars.flat_map(char::to_lowercase))
                    .collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
