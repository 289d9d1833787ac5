//! 规则引擎的属性测试
//!
//! 覆盖：确定性、输入划分、剩余集合单调收缩、规范化幂等、规则顺序敏感

use crate::core::models::{CourseCode, EquivalenceRule, Grant, Outcome, RuleSource};
use crate::core::normalizer::{normalize, render_codes};
use crate::core::rule_engine::RuleEngine;
use proptest::prelude::*;
use std::collections::BTreeSet;

// ============================================================================
// 生成器
// ============================================================================

/// 小代码池，保证规则与输入之间有足够的交集
fn arb_code() -> impl Strategy<Value = CourseCode> {
    prop::sample::select(vec![
        "MAB120", "MAB240", "MAC118", "MAC128", "ICP131", "ICP141", "MAE111", "FIT112",
    ])
    .prop_map(|s| CourseCode::parse(s).unwrap())
}

fn arb_codes(max: usize) -> impl Strategy<Value = BTreeSet<CourseCode>> {
    prop::collection::btree_set(arb_code(), 0..=max)
}

/// 规则生成时先不带来源编号，组装引擎时按位置补上
fn arb_rule_parts() -> impl Strategy<Value = (BTreeSet<CourseCode>, BTreeSet<CourseCode>, u8)> {
    (
        prop::collection::btree_set(arb_code(), 1..=3),
        prop::collection::btree_set(arb_code(), 1..=2),
        prop_oneof![Just(EquivalenceRule::DEFAULT_PRIORITY), 0u8..=100],
    )
}

fn build_rules(parts: Vec<(BTreeSet<CourseCode>, BTreeSet<CourseCode>, u8)>) -> Vec<EquivalenceRule> {
    parts
        .into_iter()
        .enumerate()
        .map(|(index, (required, granted, priority))| {
            EquivalenceRule::new(
                RuleSource::JsonFile { index },
                required,
                granted.into_iter().map(Grant::new).collect(),
            )
            .with_priority(priority)
        })
        .collect()
}

fn arb_engine() -> impl Strategy<Value = RuleEngine> {
    prop::collection::vec(arb_rule_parts(), 0..8)
        .prop_map(|parts| RuleEngine::new(build_rules(parts)).unwrap())
}

/// 原始输入：大小写、空白、逗号随机混合
fn arb_raw_input() -> impl Strategy<Value = String> {
    prop::collection::vec(
        (
            prop::sample::select(vec!["mab120", "MAC118", " icp131 ", "Mae111", ""]),
            prop::sample::select(vec![",", " ", ", ", "\t", "\n"]),
        ),
        0..8,
    )
    .prop_map(|items| items.into_iter().map(|(code, sep)| format!("{}{}", code, sep)).collect())
}

// ============================================================================
// 属性
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    /// 同样的规则和输入，结果完全相同
    #[test]
    fn resolve_is_deterministic(engine in arb_engine(), approved in arb_codes(6)) {
        prop_assert_eq!(engine.resolve(&approved), engine.resolve(&approved));
        prop_assert_eq!(engine.grant_all(&approved), engine.grant_all(&approved));
    }

    /// 每个输入代码恰好出现一次：要么被某条规则消耗，要么报告为未匹配
    #[test]
    fn resolve_partitions_input(engine in arb_engine(), approved in arb_codes(6)) {
        let result = engine.resolve(&approved);

        let mut seen = BTreeSet::new();
        for outcome in &result.outcomes {
            match outcome {
                Outcome::Matched { consumed, .. } => {
                    for code in consumed {
                        prop_assert!(seen.insert(code.clone()), "代码被消耗两次: {}", code);
                    }
                }
                Outcome::Unmatched { code } => {
                    prop_assert!(seen.insert(code.clone()), "代码重复报告: {}", code);
                }
            }
        }
        prop_assert_eq!(seen, approved);
    }

    /// 未匹配代码按字典序排列
    #[test]
    fn unmatched_codes_are_sorted(engine in arb_engine(), approved in arb_codes(6)) {
        let result = engine.resolve(&approved);
        let unmatched = result.unmatched_codes();
        let mut sorted = unmatched.clone();
        sorted.sort();
        prop_assert_eq!(unmatched, sorted);
    }

    /// 剩余代码集合逐步收缩，命中的规则在命中时刻必然被满足
    #[test]
    fn remaining_shrinks_monotonically(engine in arb_engine(), approved in arb_codes(6)) {
        let mut previous = approved.clone();
        let result = engine.resolve_with(&approved, |rule, remaining| {
            assert!(remaining.is_subset(&previous));
            if remaining.len() < previous.len() {
                assert!(rule.is_satisfied_by(&previous));
                assert!(rule.required_codes.is_disjoint(remaining));
            }
            previous = remaining.clone();
        });

        let consumed: usize = result.consumed_codes().len();
        prop_assert_eq!(consumed + result.unmatched_codes().len(), approved.len());
    }

    /// 消耗式的免修结果不会超出独立授予的范围
    #[test]
    fn consume_is_bounded_by_grant_all(engine in arb_engine(), approved in arb_codes(6)) {
        let granted = engine.grant_all(&approved);
        for rule in engine.resolve(&approved).matched_rules() {
            for code in rule.granted_codes() {
                prop_assert!(granted.contains(code));
            }
        }
    }

    /// 规范化幂等：渲染后再规范化结果不变
    #[test]
    fn normalize_is_idempotent(raw in arb_raw_input()) {
        let once = normalize(&raw);
        let twice = normalize(&render_codes(&once));
        prop_assert_eq!(once, twice);
    }
}

/// 同优先级时规则顺序决定结果
#[test]
fn rule_order_changes_outcome() {
    let parts = |a: &str, b: &str| (normalize(a), normalize(b), EquivalenceRule::DEFAULT_PRIORITY);
    let approved = normalize("MAB120 MAB240");

    let forward = RuleEngine::new(build_rules(vec![
        parts("MAB120", "MAC118"),
        parts("MAB120 MAB240", "MAC128"),
    ]))
    .unwrap();
    let backward = RuleEngine::new(build_rules(vec![
        parts("MAB120 MAB240", "MAC128"),
        parts("MAB120", "MAC118"),
    ]))
    .unwrap();

    assert_eq!(forward.resolve(&approved).waived_codes(), normalize("MAC118"));
    assert_eq!(backward.resolve(&approved).waived_codes(), normalize("MAC128"));
    // 独立授予不受顺序影响
    assert_eq!(forward.grant_all(&approved), backward.grant_all(&approved));
}
