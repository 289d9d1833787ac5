//! 分析结果汇总
//!
//! 把引擎输出分为三组：等效、不等效、未找到。

use crate::core::models::{
    AnalysisOutcome, AnalysisReport, CourseCode, EquivalenceRule, LookupEntry, ResolutionResult,
    Strategy, Verdict,
};
use serde::Serialize;
use std::collections::{BTreeSet, HashSet};

/// 汇总中的一条规则
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SummaryItem {
    pub origin_codes: String,
    pub origin_names: String,
    pub dest_codes: String,
    pub dest_names: String,
    pub verdict: Verdict,
    pub justification: String,
}

impl SummaryItem {
    pub fn from_rule(rule: &EquivalenceRule) -> Self {
        Self {
            origin_codes: rule.origin_label(),
            origin_names: rule.origin_names.clone(),
            dest_codes: rule.destination_label(),
            dest_names: rule.destination_names(),
            verdict: rule.verdict,
            justification: rule.justification.clone(),
        }
    }
}

/// 分析汇总
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Summary {
    pub institution: String,
    pub student_name: Option<String>,
    pub strategy: Strategy,
    /// 结论为有利或未注明的命中规则
    pub equivalent: Vec<SummaryItem>,
    /// 结论为不利的命中规则
    pub not_equivalent: Vec<SummaryItem>,
    /// 未在规则表中找到的代码
    pub not_found: Vec<CourseCode>,
    /// 可以免修的目标课程
    pub waived: BTreeSet<CourseCode>,
}

impl Summary {
    /// 从分析报告生成汇总
    pub fn from_report(report: &AnalysisReport) -> Self {
        let mut summary = Self {
            institution: report.institution.clone(),
            student_name: report.student_name.clone(),
            strategy: report.strategy(),
            equivalent: Vec::new(),
            not_equivalent: Vec::new(),
            not_found: Vec::new(),
            waived: BTreeSet::new(),
        };

        match &report.outcome {
            AnalysisOutcome::Consume(result) => summary.add_resolution(result),
            AnalysisOutcome::Lookup(entries) => summary.add_lookup(entries),
            AnalysisOutcome::GrantAll { satisfied, .. } => summary.add_satisfied(satisfied),
        }

        summary
    }

    fn add_resolution(&mut self, result: &ResolutionResult) {
        for rule in result.matched_rules() {
            self.add_rule(rule);
        }
        self.not_found = result.unmatched_codes().into_iter().cloned().collect();
        self.waived = result.waived_codes();
    }

    /// 独立授予：每条满足的规则都列出，免修只来自结论允许的规则
    fn add_satisfied(&mut self, rules: &[EquivalenceRule]) {
        for rule in rules {
            self.add_rule(rule);
            if rule.verdict.grants_waiver() {
                self.waived.extend(rule.granted_codes().cloned());
            }
        }
    }

    fn add_lookup(&mut self, entries: &[LookupEntry]) {
        // 组合规则会被它的每个代码各报告一次，这里只保留一次
        let mut seen = HashSet::new();

        for entry in entries {
            match entry {
                LookupEntry::Found { rule, .. } => {
                    if seen.insert(rule.id.clone()) {
                        self.add_rule(rule);
                        if rule.verdict.grants_waiver() {
                            self.waived.extend(rule.granted_codes().cloned());
                        }
                    }
                }
                LookupEntry::NotFound { code } => self.not_found.push(code.clone()),
            }
        }
    }

    fn add_rule(&mut self, rule: &EquivalenceRule) {
        let item = SummaryItem::from_rule(rule);
        if rule.verdict.grants_waiver() {
            self.equivalent.push(item);
        } else {
            self.not_equivalent.push(item);
        }
    }

    /// 所有输入代码都在规则表中找到
    pub fn all_found(&self) -> bool {
        self.not_found.is_empty()
    }
}
