//! 课程代码规范化
//!
//! 把手工输入的自由文本拆分成课程代码集合。纯函数，无副作用。

use crate::core::models::CourseCode;
use std::collections::BTreeSet;

/// 按逗号、空白、换行拆分并规范化，重复代码自动合并
pub fn normalize(raw: &str) -> BTreeSet<CourseCode> {
    raw.split(|c: char| c == ',' || c.is_whitespace())
        .filter_map(CourseCode::parse)
        .collect()
}

/// 拆分表格中的组合代码，如 "INF01108+INF01107"
pub fn split_combo(raw: &str) -> BTreeSet<CourseCode> {
    split_combo_ordered(raw).into_iter().collect()
}

/// 同 `split_combo`，但保持单元格中的书写顺序，重复代码只保留第一次出现
pub fn split_combo_ordered(raw: &str) -> Vec<CourseCode> {
    let mut seen = BTreeSet::new();
    raw.split(|c: char| c == '+' || c == ',')
        .filter_map(CourseCode::parse)
        .filter(|code| seen.insert(code.clone()))
        .collect()
}

/// 代码集合转回文本（有序，逗号分隔），可以再次被 normalize 解析
pub fn render_codes<'a>(codes: impl IntoIterator<Item = &'a CourseCode>) -> String {
    codes
        .into_iter()
        .map(CourseCode::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn codes(list: &[&str]) -> BTreeSet<CourseCode> {
        list.iter().filter_map(|c| CourseCode::parse(c)).collect()
    }

    #[test]
    fn test_normalize_mixed_separators() {
        let parsed = normalize("inf01202, INF01107\n abc123\t,, ");
        assert_eq!(parsed, codes(&["INF01202", "INF01107", "ABC123"]));
    }

    #[test]
    fn test_normalize_collapses_duplicates() {
        assert_eq!(normalize("MAB120 mab120,MAB120"), codes(&["MAB120"]));
    }

    #[test]
    fn test_normalize_empty_input() {
        assert!(normalize("").is_empty());
        assert!(normalize(" ,\n, ").is_empty());
    }

    #[test]
    fn test_split_combo() {
        assert_eq!(split_combo("INF01108+INF01107"), codes(&["INF01107", "INF01108"]));
        assert_eq!(split_combo("QUI003, QUI004"), codes(&["QUI003", "QUI004"]));
        assert_eq!(split_combo(" cex001 "), codes(&["CEX001"]));
        assert!(split_combo(" + ").is_empty());
    }

    #[test]
    fn test_split_combo_ordered_keeps_cell_order() {
        let ordered = split_combo_ordered("MAC128 + mac118, MAC128");
        let rendered: Vec<&str> = ordered.iter().map(CourseCode::as_str).collect();
        assert_eq!(rendered, vec!["MAC128", "MAC118"]);
    }

    #[test]
    fn test_render_roundtrip() {
        let parsed = normalize("c b, a");
        assert_eq!(render_codes(&parsed), "A, B, C");
        assert_eq!(normalize(&render_codes(&parsed)), parsed);
    }
}
