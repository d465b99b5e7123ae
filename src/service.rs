//! `POST /parse` 和 `GET /example` 的请求/响应约定, 与具体的传输方式无关.

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::{analysis::analyze, html::HtmlReport, limits::Limits, report::AnalysisReport};

/// 示例文法: 经典的表达式文法, 是 SLR(1) 的.
pub const EXAMPLE_GRAMMAR: &str = "E -> E + T | T\nT -> T * F | F\nF -> ( E ) | id";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ParseRequest {
    #[serde(default)]
    pub grammar: String,
}

/// 分析成功时展开四个已经渲染好的展示字段, 失败时只带错误信息.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParseResponse {
    pub success: bool,
    #[serde(flatten, skip_serializing_if = "Option::is_none")]
    pub rendered: Option<HtmlReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<&AnalysisReport> for ParseResponse {
    fn from(report: &AnalysisReport) -> Self {
        Self {
            success: true,
            rendered: Some(HtmlReport::from(report)),
            error: None,
        }
    }
}

impl ParseResponse {
    pub fn failure(error: impl ToString) -> Self {
        Self {
            success: false,
            rendered: None,
            error: Some(error.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExampleResponse {
    pub grammar: &'static str,
}

/// 分析一段提交的文法. 分析失败不是传输层面的错误, 总是得到一个响应.
pub fn handle_parse(grammar: &str, limits: &Limits) -> ParseResponse {
    match analyze(grammar, limits) {
        Ok(report) => ParseResponse::from(&report),
        Err(e) => {
            warn!("rejected grammar: {e}");
            ParseResponse::failure(e)
        }
    }
}

pub fn example() -> ExampleResponse {
    ExampleResponse {
        grammar: EXAMPLE_GRAMMAR,
    }
}

#[cfg(test)]
mod test {
    use serde_json::json;

    use crate::{
        limits::Limits,
        service::{EXAMPLE_GRAMMAR, example, handle_parse},
    };
    use pretty_assertions::assert_eq;

    #[test]
    fn example_grammar_is_slr1() {
        let resp = handle_parse(example().grammar, &Limits::default());
        assert!(resp.success);
        let rendered = resp.rendered.unwrap();
        assert_eq!(rendered.grammar, EXAMPLE_GRAMMAR);
        assert!(rendered.canonical_collection.contains("<h3>I11:</h3>"));
        assert!(!rendered.canonical_collection.contains("<h3>I12:</h3>"));
        assert!(!rendered.parsing_table.contains("conflict"));
        assert_eq!(
            serde_json::to_value(example()).unwrap(),
            json!({ "grammar": EXAMPLE_GRAMMAR })
        );
    }

    #[test]
    fn success_fields_are_strings() {
        let value = serde_json::to_value(handle_parse("S -> a", &Limits::default())).unwrap();
        assert_eq!(value["success"], true);
        assert!(value.get("error").is_none());
        for key in [
            "grammar",
            "first_follow_sets",
            "canonical_collection",
            "parsing_table",
        ] {
            assert!(value[key].is_string(), "{key} is not a string");
        }
        assert_eq!(value["grammar"], "S -> a");
        assert!(
            value["parsing_table"]
                .as_str()
                .unwrap()
                .starts_with(r#"<table class="parsing-table">"#)
        );
    }

    #[test]
    fn failure_carries_message() {
        let value = serde_json::to_value(handle_parse("  \n", &Limits::default())).unwrap();
        assert_eq!(value["success"], false);
        assert!(value["error"].as_str().is_some());
        assert!(value.get("parsing_table").is_none());

        let value = serde_json::to_value(handle_parse("S a b", &Limits::default())).unwrap();
        assert_eq!(value["success"], false);
        assert!(value["error"].as_str().unwrap().contains("line: 1"));
    }
}
