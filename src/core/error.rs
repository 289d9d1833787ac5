//! 错误类型
//!
//! 解析本身是全函数，不会失败；这里只有规则加载和成绩单提取两类错误。

use crate::core::models::RuleSource;
use std::path::PathBuf;
use thiserror::Error;

/// 规则错误
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RuleError {
    /// 来源或目标为空的规则，必须在加载时拒绝
    #[error("规则格式错误（{location}）: {reason}")]
    MalformedRule { location: RuleSource, reason: String },
}

/// 规则加载错误
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("无法读取文件 {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("无法读取表格 {path}: {message}")]
    Spreadsheet { path: PathBuf, message: String },

    #[error("JSON规则文件无效 {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// 表格中没有工作表包含全部必需列
    #[error("没有任何工作表包含全部必需列: {}", .missing.join(", "))]
    MissingColumns { missing: Vec<String> },

    /// 工作表存在但缺少必需列
    #[error("工作表 '{sheet}' 缺少必需列: {}", .missing.join(", "))]
    SheetMissingColumns { sheet: String, missing: Vec<String> },

    #[error("表格中没有工作表")]
    EmptyWorkbook,

    #[error("未找到机构 '{0}' 的规则")]
    UnknownInstitution(String),

    #[error("不支持的规则文件类型: {0}")]
    UnsupportedFormat(PathBuf),

    #[error(transparent)]
    Rule(#[from] RuleError),
}

/// 成绩单提取错误
/// 出现时不调用引擎，错误原样上报
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("无法读取文档 {path}: {message}")]
    Unreadable { path: PathBuf, message: String },

    #[error("文档没有可提取的文本")]
    EmptyDocument,

    #[error("文档不是学业指导公报（BOLETIM DE ORIENTAÇÃO ACADÊMICA）")]
    NotATranscript,

    /// 前缀白名单为空，无法识别课程行
    #[error("未配置课程前缀，无法识别成绩单中的课程")]
    NoCoursePrefixes,

    #[error("课程前缀无效: {0}")]
    Pattern(#[from] regex::Error),
}
