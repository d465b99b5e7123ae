//! 把分析结果转换成可以直接展示的结构, 序列化为 JSON 或者输出为文本.

use std::{collections::BTreeSet, fmt::Display};

use serde::Serialize;

use crate::{Terminal, analysis::Analysis, error::Error, table::ActionCell};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AnalysisReport {
    pub grammar: GrammarReport,
    pub first_follow_sets: FirstFollowReport,
    pub canonical_collection: CollectionReport,
    pub parsing_table: TableReport,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GrammarReport {
    /// 规范化之后的文法文本, 每个非终结符一行.
    pub text: String,
    pub start: String,
    pub augmented_start: String,
    pub productions: Vec<ProductionReport>,
    pub terminals: Vec<String>,
    pub non_terminals: Vec<String>,
    /// 从起始符无法到达的非终结符.
    pub unreachable: Vec<String>,
    /// 推导不出终结符串的非终结符.
    pub unproductive: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProductionReport {
    pub id: usize,
    pub head: String,
    pub body: Vec<String>,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FirstFollowReport {
    pub first: Vec<FirstEntry>,
    pub follow: Vec<FollowEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FirstEntry {
    pub symbol: String,
    pub terminals: Vec<String>,
    pub nullable: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FollowEntry {
    pub symbol: String,
    pub terminals: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CollectionReport {
    pub states: Vec<StateReport>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StateReport {
    pub id: usize,
    pub items: Vec<String>,
    pub transitions: Vec<TransitionReport>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransitionReport {
    pub symbol: String,
    pub target: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableReport {
    pub action_columns: Vec<String>,
    pub goto_columns: Vec<String>,
    pub rows: Vec<RowReport>,
    pub conflicts: Vec<ConflictReport>,
    pub is_slr1: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RowReport {
    pub state: usize,
    /// 与 `action_columns` 一一对应, 空格子为空字符串.
    pub actions: Vec<String>,
    /// 与 `goto_columns` 一一对应.
    pub gotos: Vec<Option<usize>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConflictReport {
    pub state: usize,
    pub terminal: String,
    pub kind: String,
    pub actions: Vec<String>,
}

/// 按分析表列的顺序列出集合中的终结符.
fn ordered(set: &BTreeSet<Terminal<'_>>, columns: &[Terminal<'_>]) -> Vec<String> {
    columns
        .iter()
        .filter(|t| set.contains(*t))
        .map(ToString::to_string)
        .collect()
}

fn strings<T: ToString>(it: impl IntoIterator<Item = T>) -> Vec<String> {
    it.into_iter().map(|t| t.to_string()).collect()
}

/// 报告的大小与状态数成正比, 每生成一个状态或一行都会检查分析的截止时间.
impl TryFrom<&Analysis<'_>> for AnalysisReport {
    type Error = Error;

    fn try_from(analysis: &Analysis<'_>) -> Result<Self, Error> {
        let deadline = analysis.deadline();
        let grammar = analysis.grammar();
        let sets = analysis.sets();
        let family = analysis.family();
        let table = analysis.table();
        let columns = table.terminals();

        let grammar_report = GrammarReport {
            text: grammar.to_string(),
            start: grammar.symbol_start().to_string(),
            augmented_start: grammar.augmented_start().to_string(),
            productions: grammar
                .prods()
                .iter()
                .enumerate()
                .map(|(id, prod)| ProductionReport {
                    id,
                    head: prod.head().to_string(),
                    body: strings(prod.tail()),
                    text: prod.to_string(),
                })
                .collect(),
            terminals: strings(grammar.terminals()),
            non_terminals: strings(grammar.non_terminals()),
            unreachable: strings(grammar.unreachable_non_terminals()),
            unproductive: strings(grammar.unproductive_non_terminals()),
        };

        let non_terms: Vec<_> = std::iter::once(grammar.augmented_start())
            .chain(grammar.non_terminals())
            .collect();
        let first_follow_sets = FirstFollowReport {
            first: non_terms
                .iter()
                .filter_map(|&nt| {
                    let fs = sets.first_of(nt)?;
                    Some(FirstEntry {
                        symbol: nt.to_string(),
                        terminals: ordered(fs.terms(), columns),
                        nullable: fs.nullable(),
                    })
                })
                .collect(),
            follow: non_terms
                .iter()
                .filter_map(|&nt| {
                    Some(FollowEntry {
                        symbol: nt.to_string(),
                        terminals: ordered(sets.follow_of(nt)?, columns),
                    })
                })
                .collect(),
        };

        let canonical_collection = CollectionReport {
            states: family
                .item_sets()
                .enumerate()
                .map(|(id, is)| {
                    deadline.check()?;
                    Ok(StateReport {
                        id,
                        items: strings(is.items()),
                        transitions: family
                            .gotos_of(id)
                            .into_iter()
                            .flatten()
                            .map(|(tok, target)| TransitionReport {
                                symbol: tok.to_string(),
                                target,
                            })
                            .collect(),
                    })
                })
                .collect::<Result<_, Error>>()?,
        };

        let parsing_table = TableReport {
            action_columns: strings(table.terminals()),
            goto_columns: strings(table.non_terminals()),
            rows: (0..table.rows())
                .map(|state| {
                    deadline.check()?;
                    Ok(RowReport {
                        state,
                        actions: strings(table.action_row(state)),
                        gotos: table.goto_row(state).to_vec(),
                    })
                })
                .collect::<Result<_, Error>>()?,
            conflicts: table
                .conflicts()
                .iter()
                .map(|c| ConflictReport {
                    state: c.state,
                    terminal: c.terminal.to_string(),
                    kind: c.kind.to_string(),
                    actions: strings(c.actions.iter().map(ActionCell::to_string)),
                })
                .collect(),
            is_slr1: table.is_slr1(),
        };

        Ok(Self {
            grammar: grammar_report,
            first_follow_sets,
            canonical_collection,
            parsing_table,
        })
    }
}

pub(crate) fn braced(terminals: &[String], nullable: bool) -> String {
    let mut members: Vec<&str> = terminals.iter().map(String::as_str).collect();
    if nullable {
        members.push(crate::token::EPSILON);
    }
    if members.is_empty() {
        "∅".to_string()
    } else {
        format!("{{{}}}", members.join(", "))
    }
}

impl Display for GrammarReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for prod in &self.productions {
            writeln!(f, "{:>4} {}", prod.id, prod.text)?;
        }
        if !self.unreachable.is_empty() {
            writeln!(f, "unreachable: {}", self.unreachable.join(", "))?;
        }
        if !self.unproductive.is_empty() {
            writeln!(f, "unproductive: {}", self.unproductive.join(", "))?;
        }
        Ok(())
    }
}

impl Display for FirstFollowReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for entry in &self.first {
            writeln!(
                f,
                "FIRST({}) = {}",
                entry.symbol,
                braced(&entry.terminals, entry.nullable)
            )?;
        }
        for entry in &self.follow {
            writeln!(
                f,
                "FOLLOW({}) = {}",
                entry.symbol,
                braced(&entry.terminals, false)
            )?;
        }
        Ok(())
    }
}

impl Display for CollectionReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for state in &self.states {
            writeln!(f, "I_{}:", state.id)?;
            for item in &state.items {
                writeln!(f, "    {item}")?;
            }
            for tr in &state.transitions {
                writeln!(f, "    I_{} -- {} --> I_{}", state.id, tr.symbol, tr.target)?;
            }
        }
        Ok(())
    }
}

/// 以对齐的纯文本表格输出.
impl Display for TableReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let header: Vec<String> = std::iter::once("state".to_string())
            .chain(self.action_columns.iter().cloned())
            .chain(self.goto_columns.iter().cloned())
            .collect();
        let body: Vec<Vec<String>> = self
            .rows
            .iter()
            .map(|row| {
                std::iter::once(row.state.to_string())
                    .chain(row.actions.iter().cloned())
                    .chain(
                        row.gotos
                            .iter()
                            .map(|g| g.map(|to| to.to_string()).unwrap_or_default()),
                    )
                    .collect()
            })
            .collect();
        let widths: Vec<usize> = (0..header.len())
            .map(|col| {
                std::iter::once(&header)
                    .chain(&body)
                    .map(|line| line[col].chars().count())
                    .max()
                    .unwrap_or_default()
            })
            .collect();
        for line in std::iter::once(&header).chain(&body) {
            let cells: Vec<String> = line
                .iter()
                .zip(&widths)
                .map(|(cell, &w)| format!("{cell:<w$}"))
                .collect();
            writeln!(f, "{}", cells.join(" | ").trim_end())?;
        }
        if self.is_slr1 {
            writeln!(f, "grammar is SLR(1)")?;
        } else {
            writeln!(f, "grammar is not SLR(1):")?;
            for c in &self.conflicts {
                writeln!(
                    f,
                    "    {} conflict in I_{} on `{}`: {}",
                    c.kind,
                    c.state,
                    c.terminal,
                    c.actions.join(", ")
                )?;
            }
        }
        Ok(())
    }
}

impl Display for AnalysisReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "--- Grammar ---")?;
        writeln!(f, "{}", self.grammar)?;
        writeln!(f, "--- FIRST / FOLLOW ---")?;
        writeln!(f, "{}", self.first_follow_sets)?;
        writeln!(f, "--- Canonical LR(0) collection ---")?;
        writeln!(f, "{}", self.canonical_collection)?;
        writeln!(f, "--- SLR(1) table ---")?;
        write!(f, "{}", self.parsing_table)
    }
}

#[cfg(test)]
mod test {
    use bumpalo::Bump;

    use crate::{analysis::Analysis, limits::Limits, report::AnalysisReport};
    use pretty_assertions::assert_eq;

    fn report(input: &str) -> AnalysisReport {
        let bump = Bump::new();
        let analysis = Analysis::new(input, None, &Limits::default(), &bump).unwrap();
        AnalysisReport::try_from(&analysis).unwrap()
    }

    #[test]
    fn nested_grammar_report() {
        let report = report("S -> a S b | ε");
        assert_eq!(report.grammar.text, "S -> a S b | ε");
        assert_eq!(
            report
                .grammar
                .productions
                .iter()
                .map(|p| p.text.as_str())
                .collect::<Vec<_>>(),
            ["S' -> S", "S -> a S b", "S -> ε"]
        );
        assert_eq!(report.grammar.productions[2].body, Vec::<String>::new());
        assert_eq!(
            report.first_follow_sets.to_string(),
            "FIRST(S') = {a, ε}\nFIRST(S) = {a, ε}\nFOLLOW(S') = {$}\nFOLLOW(S) = {b, $}\n"
        );
        assert_eq!(
            report.canonical_collection.states[0].items,
            ["S' -> • S", "S -> • a S b", "S -> •"]
        );
        let table = &report.parsing_table;
        assert_eq!(table.action_columns, ["a", "b", "$"]);
        assert_eq!(table.goto_columns, ["S"]);
        assert_eq!(table.rows[0].actions, ["s2", "r2", "r2"]);
        assert_eq!(table.rows[0].gotos, [Some(1)]);
        assert!(table.is_slr1);
        assert_eq!(
            table.to_string(),
            "state | a  | b  | $   | S
0     | s2 | r2 | r2  | 1
1     |    |    | acc |
2     | s2 | r2 | r2  | 3
3     |    | s4 |     |
4     |    | r1 | r1  |
grammar is SLR(1)
"
        );
    }

    #[test]
    fn conflicts_in_report() {
        let report = report("S -> S + S | id");
        let table = &report.parsing_table;
        assert!(!table.is_slr1);
        assert_eq!(table.conflicts.len(), 1);
        assert_eq!(table.conflicts[0].kind, "shift/reduce");
        assert_eq!(table.conflicts[0].actions, ["s3", "r1"]);
        assert_eq!(table.rows[4].actions, ["s3/r1", "", "r1"]);
    }

    #[test]
    fn json_shape() {
        let value = serde_json::to_value(report("S -> a")).unwrap();
        for key in [
            "grammar",
            "first_follow_sets",
            "canonical_collection",
            "parsing_table",
        ] {
            assert!(value.get(key).is_some(), "missing {key}");
        }
        assert_eq!(value["parsing_table"]["is_slr1"], true);
        assert_eq!(
            value["canonical_collection"]["states"][0]["transitions"][0]["symbol"],
            "S"
        );
    }
}
