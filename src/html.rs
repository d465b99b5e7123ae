//! 把报告渲染成 HTML 片段, 网页前端把它们直接插入页面.

use std::fmt::Write;

use serde::Serialize;

use crate::report::{AnalysisReport, CollectionReport, FirstFollowReport, TableReport, braced};

/// `POST /parse` 成功时的四个展示字段.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HtmlReport {
    /// 规范化的文法, 纯文本.
    pub grammar: String,
    pub first_follow_sets: String,
    pub canonical_collection: String,
    pub parsing_table: String,
}

impl From<&AnalysisReport> for HtmlReport {
    fn from(report: &AnalysisReport) -> Self {
        Self {
            grammar: report.grammar.text.clone(),
            first_follow_sets: sets_html(&report.first_follow_sets),
            canonical_collection: collection_html(&report.canonical_collection),
            parsing_table: table_html(&report.parsing_table),
        }
    }
}

/// 转义文法符号中可能出现的 HTML 特殊字符.
pub fn escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}

fn sets_html(sets: &FirstFollowReport) -> String {
    let mut html = String::from(r#"<div class="sets-container">"#);
    html += r#"<div class="first-sets"><h3>FIRST Sets:</h3><ul>"#;
    for entry in &sets.first {
        let _ = write!(
            html,
            "<li>FIRST({}) = {}</li>",
            escape(&entry.symbol),
            escape(&braced(&entry.terminals, entry.nullable))
        );
    }
    html += r#"</ul></div><div class="follow-sets"><h3>FOLLOW Sets:</h3><ul>"#;
    for entry in &sets.follow {
        let _ = write!(
            html,
            "<li>FOLLOW({}) = {}</li>",
            escape(&entry.symbol),
            escape(&braced(&entry.terminals, false))
        );
    }
    html += "</ul></div></div>";
    html
}

fn collection_html(collection: &CollectionReport) -> String {
    let mut html = String::from(r#"<div class="canonical-collection">"#);
    for state in &collection.states {
        let _ = write!(html, r#"<div class="item-set"><h3>I{}:</h3><ul>"#, state.id);
        for item in &state.items {
            let _ = write!(html, "<li>{}</li>", escape(item));
        }
        html += "</ul></div>";
    }
    html += "</div>";
    html
}

fn table_html(table: &TableReport) -> String {
    let mut html = String::from(r#"<table class="parsing-table"><tr><th>State</th>"#);
    for col in table.action_columns.iter().chain(&table.goto_columns) {
        let _ = write!(html, "<th>{}</th>", escape(col));
    }
    html += "</tr>";
    for row in &table.rows {
        let _ = write!(html, "<tr><td>{}</td>", row.state);
        for action in &row.actions {
            if action.contains('/') {
                let _ = write!(html, r#"<td class="conflict">{action}</td>"#);
            } else {
                let _ = write!(html, "<td>{action}</td>");
            }
        }
        for to in &row.gotos {
            match to {
                Some(to) => {
                    let _ = write!(html, "<td>{to}</td>");
                }
                None => html += "<td></td>",
            }
        }
        html += "</tr>";
    }
    html += "</table>";
    if !table.is_slr1 {
        html += r#"<ul class="conflicts">"#;
        for c in &table.conflicts {
            let _ = write!(
                html,
                "<li>{} conflict in I{} on {}: {}</li>",
                c.kind,
                c.state,
                escape(&c.terminal),
                c.actions.join(", ")
            );
        }
        html += "</ul>";
    }
    html
}
