//! Markdown 报告渲染（葡萄牙语，供评审委员会使用）

use crate::core::normalizer::render_codes;
use crate::core::models::Strategy;
use crate::report::summary::{Summary, SummaryItem};

pub fn render_markdown(summary: &Summary) -> String {
    let mut out = String::new();

    out.push_str("# Parecer de Análise de Equivalência de Disciplinas\n\n");
    out.push_str(&format!("- Instituição de origem: **{}**\n", summary.institution));
    if let Some(name) = &summary.student_name {
        out.push_str(&format!("- Aluno: {}\n", name));
    }
    out.push_str(&format!("- Estratégia: `{}`\n\n", summary.strategy));

    let nothing_matched = summary.equivalent.is_empty() && summary.not_equivalent.is_empty();
    if nothing_matched && summary.not_found.is_empty() {
        if summary.strategy == Strategy::GrantAll {
            render_waived(&mut out, summary);
        } else {
            out.push_str("Nenhuma disciplina foi processada.\n");
        }
        return out;
    }

    if !summary.equivalent.is_empty() {
        out.push_str(&format!("## Disciplinas Equivalentes ({})\n\n", summary.equivalent.len()));
        render_table(&mut out, &summary.equivalent);
    }

    if !summary.not_equivalent.is_empty() {
        out.push_str(&format!(
            "## Disciplinas Não Equivalentes ({})\n\n",
            summary.not_equivalent.len()
        ));
        render_table(&mut out, &summary.not_equivalent);
    }

    if !summary.not_found.is_empty() {
        out.push_str(&format!("## Disciplinas Não Encontradas ({})\n\n", summary.not_found.len()));
        out.push_str("Os seguintes códigos não foram localizados na base de equivalências:\n\n");
        let codes: Vec<String> = summary.not_found.iter().map(|c| format!("`{}`", c)).collect();
        out.push_str(&codes.join(", "));
        out.push_str("\n\n");
    }

    render_waived(&mut out, summary);
    out
}

fn render_table(out: &mut String, items: &[SummaryItem]) {
    out.push_str("| Destino | Nome (destino) | Origem | Nome (origem) | Parecer |\n");
    out.push_str("|---|---|---|---|---|\n");
    for item in items {
        out.push_str(&format!(
            "| {} | {} | {} | {} | {} |\n",
            cell(&item.dest_codes),
            cell(&item.dest_names),
            cell(&item.origin_codes),
            cell(&item.origin_names),
            item.verdict
        ));
    }
    out.push('\n');

    for item in items.iter().filter(|i| !i.justification.trim().is_empty()) {
        out.push_str(&format!("- `{}`: {}\n", item.origin_codes, item.justification.trim()));
    }
    if items.iter().any(|i| !i.justification.trim().is_empty()) {
        out.push('\n');
    }
}

fn render_waived(out: &mut String, summary: &Summary) {
    if summary.waived.is_empty() {
        out.push_str("Nenhuma disciplina pode ser dispensada.\n");
    } else {
        out.push_str("## Disciplinas a Serem Dispensadas\n\n");
        out.push_str(&render_codes(&summary.waived));
        out.push('\n');
    }
}

/// 表格单元格：空值显示 N/A，竖线转义
fn cell(value: &str) -> String {
    let value = value.trim();
    if value.is_empty() {
        "N/A".to_string()
    } else {
        value.replace('|', "\\|")
    }
}
