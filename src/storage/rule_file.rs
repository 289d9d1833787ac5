//! JSON规则适配器
//!
//! 文件内容为规则数组：`[{ "requires": [...], "grants": [...], "priority": 60 }]`，
//! `priority` 可省略。

use crate::core::error::{LoadError, RuleError};
use crate::core::models::{CourseCode, EquivalenceRule, Grant, RuleSource};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// JSON中的一条规则
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRule {
    pub requires: Vec<String>,
    pub grants: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<u8>,
}

impl JsonRule {
    /// 转换为规范规则，index 为在文件中的位置
    pub fn into_rule(self, index: usize) -> Result<EquivalenceRule, RuleError> {
        let source = RuleSource::JsonFile { index };
        let required = self.requires.iter().filter_map(|c| CourseCode::parse(c)).collect();
        let granted = self
            .grants
            .iter()
            .filter_map(|c| CourseCode::parse(c))
            .map(Grant::new)
            .collect();

        let mut rule = EquivalenceRule::new(source, required, granted);
        if let Some(priority) = self.priority {
            rule = rule.with_priority(priority);
        }
        rule.validate()?;
        Ok(rule)
    }
}

/// 按文件顺序转换全部规则
pub fn into_rules(entries: Vec<JsonRule>) -> Result<Vec<EquivalenceRule>, RuleError> {
    entries
        .into_iter()
        .enumerate()
        .map(|(i, r)| r.into_rule(i))
        .collect()
}

/// 从文件加载规则
pub fn load_rule_file(path: &Path) -> Result<Vec<EquivalenceRule>, LoadError> {
    let content = std::fs::read_to_string(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let entries: Vec<JsonRule> = serde_json::from_str(&content).map_err(|source| LoadError::Json {
        path: path.to_path_buf(),
        source,
    })?;

    let rules = into_rules(entries)?;

    tracing::info!("规则文件 '{}' 加载成功，共 {} 条规则", path.display(), rules.len());
    Ok(rules)
}

/// 导出规则为JSON（仅保留来源、目标和优先级）
pub fn export_rules_to_json(rules: &[EquivalenceRule]) -> anyhow::Result<String> {
    let entries: Vec<JsonRule> = rules
        .iter()
        .map(|r| JsonRule {
            requires: r.required_codes.iter().map(|c| c.to_string()).collect(),
            grants: r.granted_codes().map(|c| c.to_string()).collect(),
            priority: (r.priority != EquivalenceRule::DEFAULT_PRIORITY).then_some(r.priority),
        })
        .collect();

    Ok(serde_json::to_string_pretty(&entries)?)
}
