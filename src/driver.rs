//! 使用构建好的分析表驱动一段终结符输入.
//!
//! 标准的 LR 驱动过程:
//! ```text
//! 令 a 为 w$ 的第一个符号;
//! while (1) {
//!     令 s 是栈顶的状态;
//!     if (ACTION[s, a] = 移入 t) {
//!         将 t 压入栈中;
//!         令 a 为下一个输入符号;
//!     } else if (ACTION[s, a] = 归约 A -> beta) {
//!         从栈中弹出 | beta | 个符号;
//!         令 t 为当前的栈顶状态;
//!         将 GOTO[t, A] 压入栈中;
//!     } else if (ACTION[s, a] = 接受) break;
//!     else 报告错误;
//! }
//! ```

use std::fmt::Display;

use tracing::trace;

use crate::{ActionCell, Grammar, Table, Terminal, error::DriveError, token::EOF};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step<'a> {
    /// (移入的终结符, 压入的新状态)
    Shift(Terminal<'a>, usize),
    /// (归约的产生式编号, GOTO 之后压入的新状态)
    Reduce(usize, usize),
    Accept,
}

impl Display for Step<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Shift(t, to) => f.pad(&format!("shift `{t}`, goto I_{to}")),
            Self::Reduce(prod, to) => f.pad(&format!("reduce r{prod}, goto I_{to}")),
            Self::Accept => f.pad("accept"),
        }
    }
}

impl<'a> Table<'a> {
    /// 用分析表驱动 `input`, 返回每一步的动作.
    ///
    /// `input` 中的每一项都必须是文法中的终结符, 末尾的 `$` 会自动补上.
    /// # Errors
    /// - [`DriveError::UnknownTerminal`] 输入中有文法之外的符号.
    /// - [`DriveError::UnexpectedTerminal`] 当前状态不接受这个终结符.
    /// - [`DriveError::Conflict`] 走到了冲突的格子.
    pub fn drive<'s>(
        &self,
        grammar: &Grammar<'a>,
        input: impl IntoIterator<Item = &'s str>,
    ) -> Result<Vec<Step<'a>>, DriveError> {
        let terms: Vec<Terminal<'a>> = input
            .into_iter()
            .map(|s| {
                self.terminals()
                    .iter()
                    .copied()
                    .find(|t| t.as_str() == s && *t != EOF)
                    .ok_or_else(|| DriveError::UnknownTerminal(s.to_string()))
            })
            .collect::<Result<_, _>>()?;
        let mut stack = vec![0];
        let mut steps = Vec::new();
        let mut position = 0;
        loop {
            let top = stack.last().copied().unwrap_or_default();
            let term = terms.get(position).copied().unwrap_or(EOF);
            let unexpected = move || DriveError::UnexpectedTerminal {
                state: top,
                terminal: term.to_string(),
                position,
            };
            let action = self.action(top, term).ok_or_else(unexpected)?;
            trace!("I_{top}, `{term}`: {action}");
            match action {
                ActionCell::Shift(to) => {
                    stack.push(*to);
                    position += 1;
                    steps.push(Step::Shift(term, *to));
                }
                ActionCell::Reduce(prod_idx) => {
                    let prod = grammar.prods().get(*prod_idx).ok_or_else(unexpected)?;
                    stack.truncate(stack.len().saturating_sub(prod.len()));
                    let below = stack.last().copied().ok_or_else(unexpected)?;
                    let to = self
                        .goto(below, prod.head())
                        .flatten()
                        .ok_or_else(unexpected)?;
                    stack.push(to);
                    steps.push(Step::Reduce(*prod_idx, to));
                }
                ActionCell::Accept => {
                    steps.push(Step::Accept);
                    return Ok(steps);
                }
                ActionCell::Conflict(_) => Err(DriveError::Conflict {
                    state: top,
                    terminal: term.to_string(),
                })?,
                ActionCell::Empty => Err(unexpected())?,
            }
        }
    }
}
