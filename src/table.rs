use std::{collections::HashMap, convert::Infallible, fmt::Display};

use tracing::debug;

use crate::{Family, FirstFollow, Grammar, NonTerminal, Terminal, Token, token::EOF};

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ActionCell {
    /// 移入项集状态编号.
    Shift(usize),
    /// 规约产生式编号.
    Reduce(usize),
    /// 接受
    Accept,
    /// 同一个格子里被提出的两个或者多个不同动作, 按提出顺序排列.
    Conflict(Vec<ActionCell>),
    #[default]
    Empty,
}

impl Display for ActionCell {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(&match self {
            Self::Shift(s) => format!("s{s}"),
            Self::Reduce(r) => format!("r{r}"),
            Self::Accept => "acc".to_string(),
            Self::Conflict(candidates) => candidates
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join("/"),
            Self::Empty => "".to_string(),
        })
    }
}

impl ActionCell {
    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Empty)
    }

    /// 放入新的动作, 返回放入之后格子是否冲突.
    ///
    /// 重复提出相同的动作不算冲突.
    fn update(&mut self, cell: ActionCell) -> bool {
        match self {
            Self::Empty => {
                *self = cell;
                false
            }
            Self::Conflict(candidates) => {
                if !candidates.contains(&cell) {
                    candidates.push(cell);
                }
                true
            }
            this if *this == cell => false,
            this => {
                let prev = std::mem::take(this);
                *this = Self::Conflict(vec![prev, cell]);
                true
            }
        }
    }

    /// 展开格子中的所有候选动作, 非冲突格子只产生自身.
    pub fn flatten(&self) -> impl Iterator<Item = &ActionCell> {
        match self {
            Self::Conflict(candidates) => candidates.iter(),
            _ => std::slice::from_ref(self).iter(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictKind {
    ShiftReduce,
    ReduceReduce,
}

impl Display for ConflictKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(match self {
            Self::ShiftReduce => "shift/reduce",
            Self::ReduceReduce => "reduce/reduce",
        })
    }
}

/// ACTION 表中一个冲突的格子.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Conflict<'a> {
    pub state: usize,
    pub terminal: Terminal<'a>,
    pub kind: ConflictKind,
    pub actions: Vec<ActionCell>,
}

impl Display for Conflict<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let actions: Vec<String> = self.actions.iter().map(ToString::to_string).collect();
        f.pad(&format!(
            "{} conflict in I_{} on `{}`: {}",
            self.kind,
            self.state,
            self.terminal,
            actions.join(", ")
        ))
    }
}

/// SLR(1) 分析表.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Table<'a> {
    /// ACTION 表
    action: Vec<Vec<ActionCell>>,
    /// GOTO 表, 每个格子表示 GOTO 到的项集状态编号.
    goto: Vec<Vec<Option<usize>>>,
    /// ACTION 表中的终结符, 下标即为 ACTION 表中的列, `$` 总是最后一列.
    terms: Vec<Terminal<'a>>,
    /// GOTO 表中的非终结符, 下标即为 GOTO 表中的列, 不含增广起始符.
    non_terms: Vec<NonTerminal<'a>>,
    term_idxes: HashMap<Terminal<'a>, usize>,
    non_term_idxes: HashMap<NonTerminal<'a>, usize>,
    /// 按 (状态, 列) 顺序排列的冲突.
    conflicts: Vec<Conflict<'a>>,
}

impl<'a> Table<'a> {
    /// 由项集族和 FOLLOW 集构建 SLR(1) 分析表.
    ///
    /// - `[A -> α • t β]`, GOTO(I, t) = J: ACTION[I, t] 提出 `s J`.
    /// - `[A -> α •]`, A 不是增广起始符: 对 FOLLOW(A) 中每个 t, ACTION[I, t] 提出 `r (A -> α)`.
    /// - `[S' -> S •]`: ACTION[I, $] 提出 `acc`.
    /// - `[A -> α • B β]`, GOTO(I, B) = J: GOTO[I, B] = J.
    ///
    /// 冲突不会被消解, 所有候选动作都保留在格子中.
    #[must_use]
    pub fn build_from(family: &Family<'a>, grammar: &Grammar<'a>, sets: &FirstFollow<'a>) -> Self {
        let Ok(table) = Self::build(family, grammar, sets, || Ok::<_, Infallible>(()));
        table
    }

    /// 构建分析表, 每处理一行之前调用一次 `check`, 出错时立即停止.
    pub(crate) fn build<E>(
        family: &Family<'a>,
        grammar: &Grammar<'a>,
        sets: &FirstFollow<'a>,
        mut check: impl FnMut() -> Result<(), E>,
    ) -> Result<Self, E> {
        let terms: Vec<_> = grammar.terminals().chain([EOF]).collect();
        let non_terms: Vec<_> = grammar.non_terminals().collect();
        let term_idxes: HashMap<Terminal<'a>, usize> =
            terms.iter().enumerate().map(|(a, b)| (*b, a)).collect();
        let non_term_idxes: HashMap<NonTerminal<'a>, usize> =
            non_terms.iter().enumerate().map(|(a, b)| (*b, a)).collect();
        let rows = family.len();
        let mut action = vec![vec![ActionCell::Empty; terms.len()]; rows];
        let mut goto = vec![vec![None; non_terms.len()]; rows];
        let eof_idx = terms.len() - 1;
        for (row, is) in family.item_sets().enumerate() {
            check()?;
            for item in is.items() {
                let mut proposals = Vec::new();
                match item.expected() {
                    Some(tok @ Token::Terminal(t)) => {
                        if let (Some(to), Some(&col)) = (family.goto(row, tok), term_idxes.get(&t))
                        {
                            proposals.push((col, ActionCell::Shift(to)));
                        }
                    }
                    Some(tok @ Token::NonTerminal(nt)) => {
                        if let (Some(to), Some(&col)) =
                            (family.goto(row, tok), non_term_idxes.get(&nt))
                        {
                            goto[row][col] = Some(to);
                        }
                    }
                    None if item.prod().head() == grammar.augmented_start() => {
                        proposals.push((eof_idx, ActionCell::Accept));
                    }
                    None => {
                        let follow = sets.follow_of(item.prod().head()).into_iter().flatten();
                        for t in follow {
                            if let Some(&col) = term_idxes.get(t) {
                                proposals.push((col, ActionCell::Reduce(item.prod_index())));
                            }
                        }
                    }
                }
                for (col, cell) in proposals {
                    if action[row][col].update(cell) {
                        debug!("conflict at I_{row} on `{}`: {}", terms[col], action[row][col]);
                    }
                }
            }
        }
        let conflicts = collect_conflicts(&action, &terms);
        Ok(Self {
            action,
            goto,
            terms,
            non_terms,
            term_idxes,
            non_term_idxes,
            conflicts,
        })
    }

    #[must_use]
    pub fn rows(&self) -> usize {
        self.action.len()
    }

    /// ACTION 表的列, `$` 在最后.
    #[must_use]
    pub fn terminals(&self) -> &[Terminal<'a>] {
        &self.terms
    }

    /// GOTO 表的列.
    #[must_use]
    pub fn non_terminals(&self) -> &[NonTerminal<'a>] {
        &self.non_terms
    }

    #[must_use]
    pub fn conflicts(&self) -> &[Conflict<'a>] {
        &self.conflicts
    }

    /// 文法是否为 SLR(1) 文法, 也就是分析表中没有冲突.
    #[must_use]
    pub fn is_slr1(&self) -> bool {
        self.conflicts.is_empty()
    }

    /// 使用 markdown 形式输出表格.
    #[must_use]
    pub fn to_markdown(&self) -> String {
        let mut header_line = "| |".to_string();
        header_line += &self
            .terms
            .iter()
            .map(|t| format!(" `{}` |", t.as_str()))
            .chain(
                self.non_terms
                    .iter()
                    .map(|nt| format!(" `{}` |", nt.as_str())),
            )
            .collect::<String>();
        let sep_line: String = String::from("| - |")
            + &std::iter::repeat_n(" - |", self.terms.len() + self.non_terms.len())
                .collect::<String>();
        let mut data_lines = String::new();
        for (i, (action_row, goto_row)) in self.action.iter().zip(self.goto.iter()).enumerate() {
            let line = format!("| $I_{{{i}}}$ |")
                + &action_row
                    .iter()
                    .map(|act| format!(" {act} |"))
                    .chain(goto_row.iter().map(|to| {
                        if let Some(to) = to {
                            format!(" {to} |")
                        } else {
                            "  |".to_string()
                        }
                    }))
                    .collect::<String>();
            data_lines += &line;
            data_lines += "\n";
        }
        format!("{header_line}\n{sep_line}\n{}", data_lines.trim_end())
    }

    /// 查询 ACTION 表, 获取当前项集状态在某个终结符下的动作.
    /// # Returns
    /// 如果项集族中没有这个状态或者文法中没有这个终结符, 那么返回 [`None`].
    #[must_use]
    pub fn action(&self, state: usize, term: Terminal) -> Option<&ActionCell> {
        let term_idx = *self.term_idxes.get(&term)?;
        let row = self.action.get(state)?;
        Some(&row[term_idx])
    }

    /// 遍历一个项集状态的所有非 [`ActionCell::Empty`] actions.
    /// 如果这个项集状态不存在, 那么返回 [`None`].
    #[must_use]
    pub fn actions(
        &self,
        state: usize,
    ) -> Option<impl Iterator<Item = (Terminal<'a>, &ActionCell)>> {
        let v = self.action.get(state)?;
        Some(v.iter().enumerate().filter_map(|(i, a)| {
            if a.is_empty() {
                None
            } else {
                Some((self.terms[i], a))
            }
        }))
    }

    /// 查询 GOTO(state, non_term), 如果 state 或者 non_term 在 GOTO 表中不存在, 那么返回 [`None`].
    /// 如果 state 没有 non_term 这个出边, 那么返回 `Some(None)`.
    #[must_use]
    pub fn goto(&self, state: usize, non_term: NonTerminal) -> Option<Option<usize>> {
        let non_term_idx = *self.non_term_idxes.get(&non_term)?;
        let row = self.goto.get(state)?;
        Some(row[non_term_idx])
    }

    /// 按列遍历一行 GOTO 表.
    pub(crate) fn goto_row(&self, state: usize) -> &[Option<usize>] {
        self.goto.get(state).map_or(&[], Vec::as_slice)
    }

    /// 按列遍历一行 ACTION 表.
    pub(crate) fn action_row(&self, state: usize) -> &[ActionCell] {
        self.action.get(state).map_or(&[], Vec::as_slice)
    }
}

fn collect_conflicts<'a>(action: &[Vec<ActionCell>], terms: &[Terminal<'a>]) -> Vec<Conflict<'a>> {
    let mut conflicts = Vec::new();
    for (state, row) in action.iter().enumerate() {
        for (col, cell) in row.iter().enumerate() {
            let ActionCell::Conflict(candidates) = cell else {
                continue;
            };
            let kind = if candidates.iter().any(|c| matches!(c, ActionCell::Shift(_))) {
                ConflictKind::ShiftReduce
            } else {
                ConflictKind::ReduceReduce
            };
            conflicts.push(Conflict {
                state,
                terminal: terms[col],
                kind,
                actions: candidates.clone(),
            });
        }
    }
    conflicts
}
