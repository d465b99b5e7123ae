use bumpalo::Bump;
use indexmap::IndexSet;
use std::{
    collections::{HashMap, HashSet, VecDeque},
    fmt::{Debug, Display},
};
use tracing::{debug, warn};

use crate::{
    NonTerminal, Terminal, Token,
    error::{Error, ParseProductionError, Resource},
    limits::Limits,
    token::{EOF, EPSILON, is_epsilon},
};

#[derive(Clone, Copy, Hash, PartialOrd, Ord, PartialEq, Eq)]
pub struct Production<'a> {
    // 产生式 `->` 左侧内容.
    head: NonTerminal<'a>,
    // 产生式 `->` 右侧内容, 空串产生式为空切片.
    tail: &'a [Token<'a>],
}

impl Debug for Production<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Production")
            .field(&format_args!(
                "{:?} -> {}",
                self.head,
                self.tail
                    .iter()
                    .map(|t| format!("{:?} ", t))
                    .collect::<String>()
                    .trim_end()
            ))
            .finish()
    }
}

impl Display for Production<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(&format!("{} -> {}", self.head, tail_to_string(self.tail)))
    }
}

fn tail_to_string(tail: &[Token<'_>]) -> String {
    if tail.is_empty() {
        return EPSILON.to_string();
    }
    tail.iter()
        .map(|t| format!("{} ", t))
        .collect::<String>()
        .trim_end()
        .to_string()
}

impl<'a> Production<'a> {
    #[must_use]
    pub fn new(head: NonTerminal<'a>, tail: &'a [Token<'a>]) -> Self {
        Self { head, tail }
    }

    #[must_use]
    pub fn head(&self) -> NonTerminal<'a> {
        self.head
    }

    #[must_use]
    pub fn tail(&self) -> &'a [Token<'a>] {
        self.tail
    }

    /// 产生式尾部的 tokens 数量, 空串产生式长度为 0.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tail.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tail.is_empty()
    }
}

/// 增广之后的文法.
///
/// 编号 0 的产生式总是 `S' -> S`, 用户的产生式按声明顺序从 1 开始编号.
#[derive(Debug, Clone)]
pub struct Grammar<'a> {
    prods: Vec<&'a Production<'a>>,
    prods_by_head: HashMap<NonTerminal<'a>, Vec<usize>>,
    /// 文本中首次出现的顺序, 不含 `$` 和增广起始符.
    symbols: IndexSet<Token<'a>>,
    start: NonTerminal<'a>,
    augmented_start: NonTerminal<'a>,
}

impl PartialEq for Grammar<'_> {
    fn eq(&self, other: &Self) -> bool {
        self.prods == other.prods && self.start == other.start && self.symbols == other.symbols
    }
}

impl Eq for Grammar<'_> {}

impl<'a> Grammar<'a> {
    /// 解析文法文本并增广.
    ///
    /// 文本每行一条规则 `Head -> a b | c | ε`, 空行和 `#` 开头的行被忽略.
    /// 出现在某条规则头部的符号是非终结符, 其余都是终结符.
    /// `start` 为 [`None`] 时使用第一条规则的头部作为起始符.
    pub fn from_cfg(
        s: &'a str,
        start: Option<&str>,
        limits: &Limits,
        bump: &'a Bump,
    ) -> Result<Self, Error> {
        // (行号, 头部, 右侧文本)
        let mut rules: Vec<(usize, &'a str, &'a str)> = Vec::new();
        for (line_idx, line) in s.lines().enumerate() {
            let line_num = line_idx + 1;
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let (head, tails) = line
                .split_once("->")
                .ok_or(Error::malformed(line_num, ParseProductionError::NoArrow))?;
            if tails.contains("->") {
                Err(Error::malformed(
                    line_num,
                    ParseProductionError::MultipleArrows,
                ))?
            }
            let head = head.trim();
            if head.is_empty() {
                Err(Error::malformed(line_num, ParseProductionError::EmptyHead))?
            }
            if head.split_whitespace().nth(1).is_some() || head.contains('|') {
                Err(Error::malformed(
                    line_num,
                    ParseProductionError::InvalidHead(head.to_string()),
                ))?
            }
            if head == EOF.as_str() || is_epsilon(head) {
                Err(Error::malformed(
                    line_num,
                    ParseProductionError::ReservedSymbol(head.to_string()),
                ))?
            }
            rules.push((line_num, head, tails));
        }
        let Some(&(_, first_head, _)) = rules.first() else {
            return Err(Error::EmptyInput);
        };
        // 一个符号是否为非终结符要等所有规则读完才能确定.
        let heads: HashSet<&str> = rules.iter().map(|&(_, head, _)| head).collect();
        let start = match start {
            Some(s) if heads.contains(s) => NonTerminal::from(&*bump.alloc_str(s)),
            Some(s) => Err(Error::NoProductionsForStart(s.to_string()))?,
            None => NonTerminal::from(first_head),
        };

        let mut symbols = IndexSet::new();
        let mut prods = Vec::new();
        let mut seen = HashSet::new();
        for (line_num, head, tails) in rules {
            let head = NonTerminal::from(head);
            symbols.insert(Token::from(head));
            for tail_s in tails.split('|') {
                let mut tail = Vec::new();
                for s in tail_s.split_whitespace() {
                    if is_epsilon(s) {
                        continue;
                    }
                    if s == EOF.as_str() {
                        Err(Error::malformed(
                            line_num,
                            ParseProductionError::ReservedSymbol(s.to_string()),
                        ))?
                    }
                    let tok = if heads.contains(s) {
                        Token::from(NonTerminal::from(s))
                    } else {
                        Token::from(Terminal::from(s))
                    };
                    symbols.insert(tok);
                    tail.push(tok);
                }
                let prod = Production::new(head, bump.alloc_slice_copy(&tail));
                if !seen.insert(prod) {
                    warn!(line = line_num, "duplicate production dropped: {prod}");
                    continue;
                }
                if prods.len() >= limits.max_productions {
                    Err(Error::limit(Resource::Productions, limits.max_productions))?
                }
                prods.push(&*bump.alloc(prod));
            }
        }
        if symbols.len() > limits.max_symbols {
            Err(Error::limit(Resource::Symbols, limits.max_symbols))?
        }

        let grammar = Self {
            prods,
            prods_by_head: HashMap::new(),
            symbols,
            start,
            augmented_start: start,
        }
        .augmented(bump);
        debug!(
            prods = grammar.prods.len(),
            symbols = grammar.symbols.len(),
            "grammar parsed"
        );
        Ok(grammar)
    }

    /// 加入 `S' -> S`, `S'` 的名字会一直追加 `'` 直到与已有符号不冲突.
    #[must_use]
    fn augmented(mut self, bump: &'a Bump) -> Self {
        let mut name = format!("{}'", self.start.as_str());
        while self.symbols.iter().any(|t| t.as_str() == name) {
            name.push('\'');
        }
        let augmented_start = NonTerminal::from(&*bump.alloc_str(&name));
        let tail = bump.alloc_slice_copy(&[Token::from(self.start)]);
        self.prods
            .insert(0, &*bump.alloc(Production::new(augmented_start, tail)));
        let mut prods_by_head: HashMap<_, Vec<_>> = HashMap::new();
        for (idx, prod) in self.prods.iter().enumerate() {
            prods_by_head.entry(prod.head()).or_default().push(idx);
        }
        Self {
            prods: self.prods,
            prods_by_head,
            symbols: self.symbols,
            start: self.start,
            augmented_start,
        }
    }

    /// 按产生式编号遍历产生式.
    pub fn prods(&self) -> &[&'a Production<'a>] {
        &self.prods
    }

    /// 以某个非终结符为头部的所有产生式 (编号, 产生式), 按编号排序, 结果可能为空.
    pub fn prods_of(
        &self,
        nt: NonTerminal<'a>,
    ) -> impl Iterator<Item = (usize, &'a Production<'a>)> + '_ {
        self.prods_by_head
            .get(&nt)
            .into_iter()
            .flatten()
            .map(|&idx| (idx, self.prods[idx]))
    }

    /// 用户文法的起始符.
    #[must_use]
    pub fn symbol_start(&self) -> NonTerminal<'a> {
        self.start
    }

    #[must_use]
    pub fn augmented_start(&self) -> NonTerminal<'a> {
        self.augmented_start
    }

    /// 按首次出现顺序遍历文法符号, 不含 `$` 和增广起始符.
    pub fn symbols(&self) -> impl Iterator<Item = Token<'a>> + '_ {
        self.symbols.iter().copied()
    }

    /// 按首次出现顺序遍历终结符, 不含 `$`.
    pub fn terminals(&self) -> impl Iterator<Item = Terminal<'a>> + '_ {
        self.symbols.iter().filter_map(|t| match t {
            Token::Terminal(t) => Some(*t),
            Token::NonTerminal(_) => None,
        })
    }

    /// 按首次出现顺序遍历用户声明的非终结符, 不含增广起始符.
    pub fn non_terminals(&self) -> impl Iterator<Item = NonTerminal<'a>> + '_ {
        self.symbols.iter().filter_map(Token::as_non_term)
    }

    /// 从起始符出发无法到达的非终结符.
    #[must_use]
    pub fn unreachable_non_terminals(&self) -> Vec<NonTerminal<'a>> {
        let mut reached = HashSet::from([self.start]);
        let mut pending = VecDeque::from([self.start]);
        while let Some(nt) = pending.pop_front() {
            for (_, prod) in self.prods_of(nt) {
                for nt in prod.tail().iter().filter_map(Token::as_non_term) {
                    if reached.insert(nt) {
                        pending.push_back(nt);
                    }
                }
            }
        }
        self.non_terminals()
            .filter(|nt| !reached.contains(nt))
            .collect()
    }

    /// 推导不出任何终结符串的非终结符.
    #[must_use]
    pub fn unproductive_non_terminals(&self) -> Vec<NonTerminal<'a>> {
        let mut productive = HashSet::new();
        loop {
            let mut changed = false;
            for prod in &self.prods {
                if productive.contains(&prod.head()) {
                    continue;
                }
                let all_productive = prod.tail().iter().all(|tok| match tok {
                    Token::Terminal(_) => true,
                    Token::NonTerminal(nt) => productive.contains(nt),
                });
                if all_productive {
                    productive.insert(prod.head());
                    changed = true;
                }
            }
            if !changed {
                break;
            }
        }
        self.non_terminals()
            .filter(|nt| !productive.contains(nt))
            .collect()
    }
}

/// 规范化之后的用户文法, 每个非终结符一行.
impl Display for Grammar<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let lines: Vec<String> = self
            .non_terminals()
            .map(|nt| {
                let alts: Vec<String> = self
                    .prods_of(nt)
                    .map(|(_, prod)| tail_to_string(prod.tail()))
                    .collect();
                format!("{} -> {}", nt, alts.join(" | "))
            })
            .collect();
        f.pad(&lines.join("\n"))
    }
}

#[cfg(test)]
mod test {
    use crate::{
        NonTerminal, Production, Terminal, Token,
        error::{Error, ParseProductionError, Resource},
        grammar::Grammar,
        limits::Limits,
    };
    use bumpalo::Bump;
    use pretty_assertions::assert_eq;

    fn parse<'a>(input: &'a str, bump: &'a Bump) -> Result<Grammar<'a>, Error> {
        Grammar::from_cfg(input, None, &Limits::default(), bump)
    }

    #[test]
    fn parse_productions() {
        let input = "
            program -> compoundstmt
            stmt -> ifstmt | whilestmt | assgstmt
            compoundstmt -> { stmts }
        ";
        let bump = Bump::new();
        let grammar = parse(input, &bump).unwrap();

        let program = NonTerminal::from("program");
        let stmt = NonTerminal::from("stmt");
        let compoundstmt = NonTerminal::from("compoundstmt");
        let t = |s: &'static str| Token::from(Terminal::from(s));

        let tails: [&[Token]; 6] = [
            &[Token::from(program)],
            &[Token::from(compoundstmt)],
            &[t("ifstmt")],
            &[t("whilestmt")],
            &[t("assgstmt")],
            &[t("{"), t("stmts"), t("}")],
        ];
        let heads = [
            NonTerminal::from("program'"),
            program,
            stmt,
            stmt,
            stmt,
            compoundstmt,
        ];
        let prods: Vec<_> = heads
            .into_iter()
            .zip(tails)
            .map(|(h, t)| Production::new(h, t))
            .collect();

        assert_eq!(grammar.symbol_start(), program);
        assert_eq!(grammar.augmented_start(), "program'".into());
        assert_eq!(
            grammar.prods().iter().map(|p| **p).collect::<Vec<_>>(),
            prods
        );
        assert_eq!(
            grammar.symbols().collect::<Vec<_>>(),
            vec![
                Token::from(program),
                compoundstmt.into(),
                stmt.into(),
                t("ifstmt"),
                t("whilestmt"),
                t("assgstmt"),
                t("{"),
                t("stmts"),
                t("}"),
            ]
        );
        assert_eq!(
            grammar.terminals().map(|t| t.as_str()).collect::<Vec<_>>(),
            ["ifstmt", "whilestmt", "assgstmt", "{", "stmts", "}"]
        );
    }

    #[test]
    fn epsilon_spellings_and_comments() {
        let bump = Bump::new();
        let grammar = parse(
            "# a comment\nS -> a S b | ε\n\nA -> epsilon | x ε y |\n",
            &bump,
        )
        .unwrap();
        let tails: Vec<usize> = grammar.prods().iter().map(|p| p.len()).collect();
        assert_eq!(tails, vec![1, 3, 0, 0, 2]);
        assert_eq!(grammar.to_string(), "S -> a S b | ε\nA -> ε | x y");
    }

    #[test]
    fn forward_references_are_non_terminals() {
        let bump = Bump::new();
        let grammar = parse("S -> A b\nA -> a", &bump).unwrap();
        assert_eq!(
            grammar.prods()[1].tail(),
            &[
                Token::from(NonTerminal::from("A")),
                Terminal::from("b").into()
            ]
        );
    }

    #[test]
    fn malformed_lines() {
        let bump = Bump::new();
        let cases = [
            ("", Error::EmptyInput),
            ("  \n# only comment\n", Error::EmptyInput),
            (
                "S -> a\nS a b",
                Error::malformed(2, ParseProductionError::NoArrow),
            ),
            (
                "S -> a -> b",
                Error::malformed(1, ParseProductionError::MultipleArrows),
            ),
            (
                " -> a",
                Error::malformed(1, ParseProductionError::EmptyHead),
            ),
            (
                "S T -> a",
                Error::malformed(1, ParseProductionError::InvalidHead("S T".into())),
            ),
            (
                "A|B -> a",
                Error::malformed(1, ParseProductionError::InvalidHead("A|B".into())),
            ),
            (
                "S -> a $",
                Error::malformed(1, ParseProductionError::ReservedSymbol("$".into())),
            ),
            (
                "ε -> a",
                Error::malformed(1, ParseProductionError::ReservedSymbol("ε".into())),
            ),
        ];
        for (input, err) in cases {
            assert_eq!(parse(input, &bump).unwrap_err(), err, "input: {input:?}");
        }
    }

    #[test]
    fn explicit_start() {
        let bump = Bump::new();
        let grammar =
            Grammar::from_cfg("A -> a\nB -> A b", Some("B"), &Limits::default(), &bump).unwrap();
        assert_eq!(grammar.symbol_start(), "B".into());
        assert_eq!(grammar.prods()[0].tail(), &[Token::from(NonTerminal::from("B"))]);
        assert_eq!(
            Grammar::from_cfg("A -> a", Some("C"), &Limits::default(), &bump).unwrap_err(),
            Error::NoProductionsForStart("C".into())
        );
    }

    #[test]
    fn augmented_name_avoids_collision() {
        let bump = Bump::new();
        let grammar = parse("S -> S' x\nS' -> y", &bump).unwrap();
        assert_eq!(grammar.augmented_start(), "S''".into());
    }

    #[test]
    fn duplicate_alternatives_dropped() {
        let bump = Bump::new();
        let grammar = parse("S -> a | b\nS -> a", &bump).unwrap();
        assert_eq!(grammar.prods().len(), 3);
    }

    #[test]
    fn production_limit() {
        let bump = Bump::new();
        let limits = Limits {
            max_productions: 2,
            ..Limits::default()
        };
        assert_eq!(
            Grammar::from_cfg("S -> a | b | c", None, &limits, &bump).unwrap_err(),
            Error::ResourceLimitExceeded {
                resource: Resource::Productions,
                limit: 2
            }
        );
    }

    #[test]
    fn symbol_limit() {
        let bump = Bump::new();
        let limits = Limits {
            max_symbols: 3,
            ..Limits::default()
        };
        assert!(Grammar::from_cfg("S -> a S b", None, &limits, &bump).is_ok());
        assert_eq!(
            Grammar::from_cfg("S -> a S b | c", None, &limits, &bump).unwrap_err(),
            Error::ResourceLimitExceeded {
                resource: Resource::Symbols,
                limit: 3
            }
        );
    }

    #[test]
    fn observations() {
        let bump = Bump::new();
        let grammar = parse("S -> a | L\nL -> L x\nU -> u", &bump).unwrap();
        assert_eq!(
            grammar.unreachable_non_terminals(),
            vec![NonTerminal::from("U")]
        );
        assert_eq!(
            grammar.unproductive_non_terminals(),
            vec![NonTerminal::from("L")]
        );
    }
}
