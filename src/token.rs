//! 文法符号. 符号名都借用自文法文本或者分析用的 arena, 复制成本很低.

use std::fmt::Display;

/// 空串的书写形式, 只在文法文本与展示中出现, 不会存入产生式.
pub const EPSILON: &str = "ε";
/// 空串的 ASCII 书写形式.
pub const EPSILON_ASCII: &str = "epsilon";
/// 输入结束符.
pub const EOF: Terminal<'static> = Terminal { ident: "$" };

/// 判断一个符号文本是否为空串的书写形式.
#[must_use]
pub fn is_epsilon(s: &str) -> bool {
    s == EPSILON || s == EPSILON_ASCII
}

/// 没有出现在任何规则头部的符号.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Hash, PartialOrd, Ord)]
pub struct Terminal<'a> {
    ident: &'a str,
}

/// 作为某条规则头部出现过的符号.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Hash, PartialOrd, Ord)]
pub struct NonTerminal<'a> {
    ident: &'a str,
}

#[derive(Debug, PartialEq, Eq, Clone, Copy, Hash, PartialOrd, Ord)]
pub enum Token<'a> {
    Terminal(Terminal<'a>),
    NonTerminal(NonTerminal<'a>),
}

impl<'a> Terminal<'a> {
    pub fn as_str(&self) -> &'a str {
        self.ident
    }
}

impl<'a> NonTerminal<'a> {
    pub fn as_str(&self) -> &'a str {
        self.ident
    }
}

impl<'a> Token<'a> {
    pub fn as_str(&self) -> &'a str {
        match self {
            Self::Terminal(t) => t.as_str(),
            Self::NonTerminal(nt) => nt.as_str(),
        }
    }

    #[must_use]
    pub fn as_non_term(&self) -> Option<NonTerminal<'a>> {
        match self {
            Self::NonTerminal(nt) => Some(*nt),
            Self::Terminal(_) => None,
        }
    }
}

impl<'a> From<&'a str> for Terminal<'a> {
    fn from(ident: &'a str) -> Self {
        Self { ident }
    }
}

impl<'a> From<&'a str> for NonTerminal<'a> {
    fn from(ident: &'a str) -> Self {
        Self { ident }
    }
}

impl<'a> From<Terminal<'a>> for Token<'a> {
    fn from(t: Terminal<'a>) -> Self {
        Self::Terminal(t)
    }
}

impl<'a> From<NonTerminal<'a>> for Token<'a> {
    fn from(nt: NonTerminal<'a>) -> Self {
        Self::NonTerminal(nt)
    }
}

impl Display for Terminal<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(self.ident)
    }
}

impl Display for NonTerminal<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(self.ident)
    }
}

impl Display for Token<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(self.as_str())
    }
}
