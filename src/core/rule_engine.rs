//! 规则引擎模块
//!
//! 负责规则的排序和三种解析策略：
//! - 消耗式（consume）：按优先级单遍贪心匹配，命中的代码立即移出工作集
//! - 独立授予（grant-all）：所有满足的规则都授予免修，互不影响
//! - 查表（lookup）：逐个代码找出包含它的第一条规则
//!
//! 引擎只持有只读的规则列表，所有方法都是 `&self`，可以在多线程间共享。

use crate::core::error::RuleError;
use crate::core::models::{
    AnalysisOutcome, AnalysisReport, AnalysisRequest, CourseCode, EquivalenceRule, LookupEntry,
    Outcome, ResolutionResult, Strategy,
};
use chrono::Utc;
use std::collections::BTreeSet;

/// 规则引擎
#[derive(Debug, Clone)]
pub struct RuleEngine {
    /// 规则列表（按优先级排序）
    rules: Vec<EquivalenceRule>,
}

impl RuleEngine {
    /// 创建新的规则引擎
    ///
    /// 每条规则先做良构检查。排序按优先级降序，且是稳定排序：
    /// 优先级相同的规则保持加载顺序（表格行序 / JSON下标）。
    pub fn new(rules: Vec<EquivalenceRule>) -> Result<Self, RuleError> {
        for rule in &rules {
            rule.validate()?;
        }

        let mut engine = Self { rules };
        engine.sort_rules();
        tracing::debug!("规则引擎已加载 {} 条规则", engine.rules.len());
        Ok(engine)
    }

    /// 按优先级排序规则
    fn sort_rules(&mut self) {
        self.rules.sort_by(|a, b| b.priority.cmp(&a.priority));
    }

    /// 获取所有规则（已排序）
    pub fn rules(&self) -> &[EquivalenceRule] {
        &self.rules
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// 消耗式解析
    ///
    /// 单遍、贪心、依赖顺序，不回溯。先出现的规则占用代码后，
    /// 后面的规则只能在剩余代码上判断。最后剩余的代码按字典序报告为未匹配。
    pub fn resolve(&self, approved: &BTreeSet<CourseCode>) -> ResolutionResult {
        self.resolve_with(approved, |_, _| {})
    }

    /// 消耗式解析，每处理完一条规则回调一次（参数：规则、当前剩余代码）
    pub(crate) fn resolve_with<F>(&self, approved: &BTreeSet<CourseCode>, mut on_step: F) -> ResolutionResult
    where
        F: FnMut(&EquivalenceRule, &BTreeSet<CourseCode>),
    {
        let mut remaining = approved.clone();
        let mut outcomes = Vec::new();

        for (i, rule) in self.rules.iter().enumerate() {
            if rule.is_satisfied_by(&remaining) {
                tracing::debug!(
                    "规则 #{} ({}) 命中，消耗: {}",
                    i + 1,
                    rule.source,
                    rule.origin_label()
                );
                for code in &rule.required_codes {
                    remaining.remove(code);
                }
                outcomes.push(Outcome::Matched {
                    rule: rule.clone(),
                    consumed: rule.required_codes.clone(),
                });
            } else {
                tracing::debug!(
                    "规则 #{} ({}) 未命中，缺少: {:?}",
                    i + 1,
                    rule.source,
                    rule.required_codes
                        .difference(&remaining)
                        .map(CourseCode::as_str)
                        .collect::<Vec<_>>()
                );
            }
            on_step(rule, &remaining);
        }

        // BTreeSet 迭代即为字典序
        outcomes.extend(remaining.into_iter().map(|code| Outcome::Unmatched { code }));

        ResolutionResult { outcomes }
    }

    /// 独立授予：所有满足的规则的目标课程并集（有序）
    pub fn grant_all(&self, approved: &BTreeSet<CourseCode>) -> BTreeSet<CourseCode> {
        self.satisfied_rules(approved)
            .into_iter()
            .flat_map(|rule| rule.granted_codes().cloned())
            .collect()
    }

    /// 被给定课程集合满足的全部规则（按优先级顺序，互不消耗）
    pub fn satisfied_rules(&self, approved: &BTreeSet<CourseCode>) -> Vec<&EquivalenceRule> {
        self.rules
            .iter()
            .enumerate()
            .filter(|(_, rule)| rule.is_satisfied_by(approved))
            .map(|(i, rule)| {
                tracing::debug!("规则 #{} 满足，授予: {}", i + 1, rule.destination_label());
                rule
            })
            .collect()
    }

    /// 查表：每个输入代码对应包含它的第一条规则
    pub fn lookup(&self, codes: &BTreeSet<CourseCode>) -> Vec<LookupEntry> {
        codes
            .iter()
            .map(|code| {
                match self.rules.iter().find(|r| r.required_codes.contains(code)) {
                    Some(rule) => LookupEntry::Found {
                        code: code.clone(),
                        rule: rule.clone(),
                    },
                    None => LookupEntry::NotFound { code: code.clone() },
                }
            })
            .collect()
    }

    /// 按请求的策略执行一次分析
    pub fn analyze(&self, request: &AnalysisRequest) -> AnalysisReport {
        let approved = &request.record.approved_codes;

        let outcome = match request.strategy {
            Strategy::Consume => AnalysisOutcome::Consume(self.resolve(approved)),
            Strategy::GrantAll => AnalysisOutcome::GrantAll {
                satisfied: self.satisfied_rules(approved).into_iter().cloned().collect(),
                granted: self.grant_all(approved),
            },
            Strategy::Lookup => AnalysisOutcome::Lookup(self.lookup(approved)),
        };

        tracing::info!(
            "分析完成: 机构 {}，策略 {}，输入 {} 门课程",
            request.institution,
            request.strategy,
            approved.len()
        );

        AnalysisReport {
            id: uuid::Uuid::new_v4().to_string(),
            institution: request.institution.clone(),
            student_name: request.record.student_name.clone(),
            approved_codes: approved.clone(),
            created_at: Utc::now(),
            outcome,
        }
    }
}
