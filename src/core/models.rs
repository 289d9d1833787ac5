//! 核心数据模型定义
//!
//! 规则、课程代码、分析结果都在这里定义。引擎只依赖这些规范形态，
//! 数据来源（表格、JSON）的差异由各自的适配器消化。

use crate::core::error::RuleError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// 课程代码
/// 规范化后的代码：去除首尾空白、全部大写、不含内部空白
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CourseCode(String);

impl CourseCode {
    /// 解析原始文本，空白或含内部空白的输入返回 None
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() || trimmed.chars().any(char::is_whitespace) {
            return None;
        }
        Some(Self(trimmed.to_uppercase()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CourseCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for CourseCode {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value).ok_or_else(|| format!("无效的课程代码: '{}'", value))
    }
}

impl From<CourseCode> for String {
    fn from(code: CourseCode) -> Self {
        code.0
    }
}

/// 等效性结论
/// 表格中的"Equivalente?"列；只有JSON规则（没有此列）记为 Unstated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum Verdict {
    /// 有利（等效）
    Favorable,
    /// 不利（不等效）
    Unfavorable,
    /// 未注明
    #[default]
    Unstated,
}

impl Verdict {
    /// 从表格单元格解析结论
    ///
    /// 只有明确的肯定值才算有利；空单元格也按不利处理，委员会未给出结论时不免修。
    pub fn from_cell(raw: &str) -> Self {
        match raw.trim().to_lowercase().as_str() {
            "sim" | "s" | "true" | "1" | "verdadeiro" => Verdict::Favorable,
            _ => Verdict::Unfavorable,
        }
    }

    /// 该结论是否批准免修
    pub fn grants_waiver(&self) -> bool {
        !matches!(self, Verdict::Unfavorable)
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Verdict::Favorable => write!(f, "Favorável"),
            Verdict::Unfavorable => write!(f, "Desfavorável"),
            Verdict::Unstated => write!(f, "Não informado"),
        }
    }
}

/// 免修授予项：目标课程代码及可选名称
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Grant {
    pub code: CourseCode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl Grant {
    pub fn new(code: CourseCode) -> Self {
        Self { code, name: None }
    }

    pub fn named(code: CourseCode, name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            code,
            name: if name.trim().is_empty() { None } else { Some(name) },
        }
    }
}

/// 规则来源标签
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RuleSource {
    /// 表格中的一行（行号从1开始，含表头）
    Spreadsheet { sheet: String, row: usize },
    /// JSON规则文件中的第 index 条（从0开始）
    JsonFile { index: usize },
}

impl fmt::Display for RuleSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuleSource::Spreadsheet { sheet, row } => write!(f, "工作表 '{}' 第 {} 行", sheet, row),
            RuleSource::JsonFile { index } => write!(f, "JSON规则 #{}", index + 1),
        }
    }
}

/// 等效规则
/// 学生同时具备全部 required_codes 时，授予 granted 中的全部免修
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EquivalenceRule {
    /// 规则ID（基于来源课程和目标课程的hash）
    pub id: String,
    /// 优先级（数字越大优先级越高，0-100）
    pub priority: u8,
    /// 来源课程代码（非空）
    pub required_codes: BTreeSet<CourseCode>,
    /// 目标课程（非空）
    pub granted: Vec<Grant>,
    /// 来源课程名称
    #[serde(default)]
    pub origin_names: String,
    /// 等效性结论
    #[serde(default)]
    pub verdict: Verdict,
    /// 意见理由
    #[serde(default)]
    pub justification: String,
    /// 规则来源
    pub source: RuleSource,
}

impl EquivalenceRule {
    /// 默认优先级
    pub const DEFAULT_PRIORITY: u8 = 50;

    /// 创建新规则
    pub fn new(source: RuleSource, required_codes: BTreeSet<CourseCode>, granted: Vec<Grant>) -> Self {
        let id = rule_id(&required_codes, &granted);
        Self {
            id,
            priority: Self::DEFAULT_PRIORITY,
            required_codes,
            granted,
            origin_names: String::new(),
            verdict: Verdict::Unstated,
            justification: String::new(),
            source,
        }
    }

    pub fn with_priority(mut self, priority: u8) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_verdict(mut self, verdict: Verdict) -> Self {
        self.verdict = verdict;
        self
    }

    pub fn with_origin_names(mut self, names: impl Into<String>) -> Self {
        self.origin_names = names.into();
        self
    }

    pub fn with_justification(mut self, justification: impl Into<String>) -> Self {
        self.justification = justification.into();
        self
    }

    /// 检查规则是否良构：来源和目标都不能为空
    pub fn validate(&self) -> Result<(), RuleError> {
        if self.required_codes.is_empty() {
            return Err(RuleError::MalformedRule {
                location: self.source.clone(),
                reason: "来源课程代码为空".to_string(),
            });
        }
        if self.granted.is_empty() {
            return Err(RuleError::MalformedRule {
                location: self.source.clone(),
                reason: "目标课程为空".to_string(),
            });
        }
        Ok(())
    }

    /// 组合规则：需要多门来源课程
    pub fn is_combo(&self) -> bool {
        self.required_codes.len() > 1
    }

    /// 给定课程集合是否满足此规则
    pub fn is_satisfied_by(&self, codes: &BTreeSet<CourseCode>) -> bool {
        self.required_codes.is_subset(codes)
    }

    pub fn granted_codes(&self) -> impl Iterator<Item = &CourseCode> {
        self.granted.iter().map(|g| &g.code)
    }

    /// 来源代码的显示形式，如 "INF01107+INF01108"
    pub fn origin_label(&self) -> String {
        join_codes(self.required_codes.iter(), "+")
    }

    /// 目标代码的显示形式
    pub fn destination_label(&self) -> String {
        join_codes(self.granted_codes(), ", ")
    }

    /// 目标名称的显示形式
    pub fn destination_names(&self) -> String {
        self.granted
            .iter()
            .filter_map(|g| g.name.as_deref())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

fn join_codes<'a>(codes: impl Iterator<Item = &'a CourseCode>, sep: &str) -> String {
    codes.map(CourseCode::as_str).collect::<Vec<_>>().join(sep)
}

/// 生成稳定规则ID
fn rule_id(required: &BTreeSet<CourseCode>, granted: &[Grant]) -> String {
    use sha2::{Digest, Sha256};

    let mut hasher = Sha256::new();
    for code in required {
        hasher.update(code.as_str().as_bytes());
        hasher.update(b"+");
    }
    hasher.update(b">");
    for grant in granted {
        hasher.update(grant.code.as_str().as_bytes());
        hasher.update(b",");
    }
    hex::encode(&hasher.finalize()[..8])
}

/// 成绩单中的学业数值字段
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AcademicFields {
    /// 已完成学期数
    pub completed_periods: Option<f64>,
    /// 最长修业期限
    pub max_periods: Option<f64>,
    /// 累计学时
    pub workload_hours: Option<f64>,
    /// 累计学分
    pub credits: Option<f64>,
    /// 累计绩点（CR）
    pub cumulative_gpa: Option<f64>,
    /// 累计拓展学时
    pub extension_hours: Option<f64>,
}

/// 学生记录
/// 来自成绩单提取或手工输入，引擎只读不写
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StudentRecord {
    pub student_name: Option<String>,
    pub approved_codes: BTreeSet<CourseCode>,
    #[serde(default)]
    pub fields: AcademicFields,
}

impl StudentRecord {
    /// 仅由课程代码构成的记录（手工输入）
    pub fn from_codes(approved_codes: BTreeSet<CourseCode>) -> Self {
        Self {
            approved_codes,
            ..Default::default()
        }
    }
}

/// 消耗式解析的单项结果
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Outcome {
    /// 规则命中，并消耗了这些代码
    Matched {
        rule: EquivalenceRule,
        consumed: BTreeSet<CourseCode>,
    },
    /// 没有任何规则用到的输入代码
    Unmatched { code: CourseCode },
}

/// 消耗式解析结果（有序）
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolutionResult {
    pub outcomes: Vec<Outcome>,
}

impl ResolutionResult {
    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    /// 命中的规则，按解析顺序
    pub fn matched_rules(&self) -> impl Iterator<Item = &EquivalenceRule> {
        self.outcomes.iter().filter_map(|o| match o {
            Outcome::Matched { rule, .. } => Some(rule),
            Outcome::Unmatched { .. } => None,
        })
    }

    /// 未匹配的代码，已排序
    pub fn unmatched_codes(&self) -> Vec<&CourseCode> {
        self.outcomes
            .iter()
            .filter_map(|o| match o {
                Outcome::Unmatched { code } => Some(code),
                Outcome::Matched { .. } => None,
            })
            .collect()
    }

    /// 被规则消耗的全部代码
    pub fn consumed_codes(&self) -> BTreeSet<&CourseCode> {
        self.outcomes
            .iter()
            .flat_map(|o| match o {
                Outcome::Matched { consumed, .. } => consumed.iter().collect::<Vec<_>>(),
                Outcome::Unmatched { .. } => Vec::new(),
            })
            .collect()
    }

    /// 命中规则授予的免修代码（不含结论为不利的规则）
    pub fn waived_codes(&self) -> BTreeSet<CourseCode> {
        self.matched_rules()
            .filter(|r| r.verdict.grants_waiver())
            .flat_map(|r| r.granted_codes().cloned())
            .collect()
    }
}

/// 单代码查表结果
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LookupEntry {
    Found { code: CourseCode, rule: EquivalenceRule },
    NotFound { code: CourseCode },
}

impl LookupEntry {
    pub fn code(&self) -> &CourseCode {
        match self {
            LookupEntry::Found { code, .. } | LookupEntry::NotFound { code } => code,
        }
    }
}

/// 解析策略
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum Strategy {
    /// 消耗式：按优先级顺序，一门课只能被一条规则使用
    #[default]
    Consume,
    /// 独立授予：所有满足的规则都授予免修
    GrantAll,
    /// 查表：逐个代码查找所在规则
    Lookup,
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Strategy::Consume => write!(f, "consume"),
            Strategy::GrantAll => write!(f, "grant-all"),
            Strategy::Lookup => write!(f, "lookup"),
        }
    }
}

impl FromStr for Strategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "consume" => Ok(Strategy::Consume),
            "grant-all" | "grant_all" => Ok(Strategy::GrantAll),
            "lookup" => Ok(Strategy::Lookup),
            other => Err(format!("未知的解析策略: '{}' (可选: consume, grant-all, lookup)", other)),
        }
    }
}

/// 分析请求
#[derive(Debug, Clone)]
pub struct AnalysisRequest {
    /// 来源机构（表格中的工作表名）
    pub institution: String,
    pub strategy: Strategy,
    pub record: StudentRecord,
}

/// 各策略的分析结果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "strategy", content = "result", rename_all = "kebab-case")]
pub enum AnalysisOutcome {
    Consume(ResolutionResult),
    /// 满足的规则和它们目标课程的并集（不看结论）
    GrantAll {
        satisfied: Vec<EquivalenceRule>,
        granted: BTreeSet<CourseCode>,
    },
    Lookup(Vec<LookupEntry>),
}

/// 分析报告
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisReport {
    /// 分析ID
    pub id: String,
    pub institution: String,
    pub student_name: Option<String>,
    pub approved_codes: BTreeSet<CourseCode>,
    /// 创建时间
    pub created_at: DateTime<Utc>,
    pub outcome: AnalysisOutcome,
}

impl AnalysisReport {
    pub fn strategy(&self) -> Strategy {
        match self.outcome {
            AnalysisOutcome::Consume(_) => Strategy::Consume,
            AnalysisOutcome::GrantAll { .. } => Strategy::GrantAll,
            AnalysisOutcome::Lookup(_) => Strategy::Lookup,
        }
    }
}

/// 应用配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// 默认规则文件（.xlsx 或 .json）
    pub default_rules_path: Option<PathBuf>,
    /// 默认来源机构
    pub default_institution: Option<String>,
    /// 默认解析策略
    pub default_strategy: Strategy,
    /// 成绩单中识别课程的院系前缀
    pub course_prefixes: Vec<String>,
    /// 成绩单中忽略的课程代码
    pub excluded_codes: Vec<String>,
    /// 数据库路径（为空时使用默认数据目录）
    pub database_path: Option<PathBuf>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            default_rules_path: None,
            default_institution: None,
            default_strategy: Strategy::Consume,
            course_prefixes: ["CMT", "FIM", "FIT", "FIW", "ICP", "MAB", "MAC", "MAE", "MAW"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            excluded_codes: vec!["ICPZ55".to_string(), "ICPX06".to_string()],
            database_path: None,
        }
    }
}
