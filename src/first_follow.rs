//! FIRST / FOLLOW 集的计算.
//!
//! 两个集合都用工作队列求不动点: 队列里放的是产生式编号,
//! 某个集合增长之后, 只把读取了这个集合的产生式重新放回队列.

use std::collections::{BTreeSet, HashMap, VecDeque};

use tracing::debug;

use crate::{Grammar, NonTerminal, Terminal, Token, token::EOF};

/// 非终结符或符号串的 first 集.
///
/// 空串不作为终结符存入 `terms`, 而是用 `nullable` 表示.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FirstSet<'a> {
    terms: BTreeSet<Terminal<'a>>,
    nullable: bool,
}

impl<'a> FirstSet<'a> {
    pub fn terms(&self) -> &BTreeSet<Terminal<'a>> {
        &self.terms
    }

    /// 是否能推导出空串.
    #[must_use]
    pub fn nullable(&self) -> bool {
        self.nullable
    }

    /// 并入另一个 first 集, 返回是否增长.
    fn absorb(&mut self, other: &FirstSet<'a>) -> bool {
        let before = (self.terms.len(), self.nullable);
        self.terms.extend(other.terms.iter().copied());
        self.nullable |= other.nullable;
        before != (self.terms.len(), self.nullable)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FirstFollow<'a> {
    first: HashMap<NonTerminal<'a>, FirstSet<'a>>,
    follow: HashMap<NonTerminal<'a>, BTreeSet<Terminal<'a>>>,
}

impl<'a> FirstFollow<'a> {
    #[must_use]
    pub fn compute(grammar: &Grammar<'a>) -> Self {
        let first = compute_first(grammar);
        let mut this = Self {
            first,
            follow: HashMap::new(),
        };
        this.follow = compute_follow(grammar, &this);
        this
    }

    /// 非终结符的 first 集, 非终结符不在文法中时返回 [`None`].
    #[must_use]
    pub fn first_of(&self, nt: NonTerminal<'a>) -> Option<&FirstSet<'a>> {
        self.first.get(&nt)
    }

    /// 非终结符的 follow 集, 非终结符不在文法中时返回 [`None`].
    #[must_use]
    pub fn follow_of(&self, nt: NonTerminal<'a>) -> Option<&BTreeSet<Terminal<'a>>> {
        self.follow.get(&nt)
    }

    /// 计算一个 token 序列的 first 集, 空序列的 first 集只包含空串.
    #[must_use]
    pub fn first_of_seq<'t>(&self, seq: impl IntoIterator<Item = &'t Token<'a>>) -> FirstSet<'a>
    where
        'a: 't,
    {
        first_of_seq(&self.first, seq)
    }

    /// 对所有产生式执行一遍 FOLLOW 规则, 返回是否有集合增长.
    ///
    /// 已经收敛的结果上调用总是返回 `false`.
    pub fn refine_follow(&mut self, grammar: &Grammar<'a>) -> bool {
        let mut follow = std::mem::take(&mut self.follow);
        let mut changed = false;
        for prod in grammar.prods() {
            changed |= !propagate_follow(self, &mut follow, prod.head(), prod.tail()).is_empty();
        }
        self.follow = follow;
        changed
    }
}

fn first_of_seq<'a, 't>(
    first: &HashMap<NonTerminal<'a>, FirstSet<'a>>,
    seq: impl IntoIterator<Item = &'t Token<'a>>,
) -> FirstSet<'a>
where
    'a: 't,
{
    let mut result = FirstSet::default();
    for tok in seq {
        match tok {
            Token::Terminal(t) => {
                result.terms.insert(*t);
                return result;
            }
            Token::NonTerminal(nt) => {
                let Some(fs) = first.get(nt) else {
                    return result;
                };
                result.terms.extend(fs.terms.iter().copied());
                if !fs.nullable {
                    return result;
                }
            }
        }
    }
    result.nullable = true;
    result
}

/// 把产生式编号放入队列, 已经在队列中的不会重复放入.
fn enqueue(queue: &mut VecDeque<usize>, queued: &mut [bool], prods: &[usize]) {
    for &idx in prods {
        if !queued[idx] {
            queued[idx] = true;
            queue.push_back(idx);
        }
    }
}

fn compute_first<'a>(grammar: &Grammar<'a>) -> HashMap<NonTerminal<'a>, FirstSet<'a>> {
    let prods = grammar.prods();
    let mut first: HashMap<NonTerminal<'a>, FirstSet<'a>> = prods
        .iter()
        .map(|p| (p.head(), FirstSet::default()))
        .collect();
    // 非终结符 -> 尾部读取了它的产生式.
    let mut readers: HashMap<NonTerminal<'a>, Vec<usize>> = HashMap::new();
    for (idx, prod) in prods.iter().enumerate() {
        for nt in prod.tail().iter().filter_map(Token::as_non_term) {
            let entry = readers.entry(nt).or_default();
            if entry.last() != Some(&idx) {
                entry.push(idx);
            }
        }
    }
    let mut queue: VecDeque<usize> = (0..prods.len()).collect();
    let mut queued = vec![true; prods.len()];
    let mut rounds = 0usize;
    while let Some(idx) = queue.pop_front() {
        queued[idx] = false;
        rounds += 1;
        let prod = prods[idx];
        let body = first_of_seq(&first, prod.tail());
        let grown = first
            .get_mut(&prod.head())
            .is_some_and(|fs| fs.absorb(&body));
        if grown && let Some(readers) = readers.get(&prod.head()) {
            enqueue(&mut queue, &mut queued, readers);
        }
    }
    debug!(rounds, "first sets converged");
    first
}

/// 对产生式 `head -> tail` 应用一次 FOLLOW 规则, 返回 follow 集增长了的非终结符.
fn propagate_follow<'a>(
    sets: &FirstFollow<'a>,
    follow: &mut HashMap<NonTerminal<'a>, BTreeSet<Terminal<'a>>>,
    head: NonTerminal<'a>,
    tail: &[Token<'a>],
) -> Vec<NonTerminal<'a>> {
    let mut grown = Vec::new();
    for (i, tok) in tail.iter().enumerate() {
        let Token::NonTerminal(x) = tok else {
            continue;
        };
        let rest = sets.first_of_seq(&tail[i + 1..]);
        let mut gained = rest.terms;
        if rest.nullable {
            gained.extend(follow.get(&head).into_iter().flatten().copied());
        }
        let set = follow.entry(*x).or_default();
        let before = set.len();
        set.extend(gained);
        if set.len() != before {
            grown.push(*x);
        }
    }
    grown
}

fn compute_follow<'a>(
    grammar: &Grammar<'a>,
    sets: &FirstFollow<'a>,
) -> HashMap<NonTerminal<'a>, BTreeSet<Terminal<'a>>> {
    let prods = grammar.prods();
    let mut follow: HashMap<NonTerminal<'a>, BTreeSet<Terminal<'a>>> = prods
        .iter()
        .map(|p| (p.head(), BTreeSet::new()))
        .collect();
    for nt in [grammar.augmented_start(), grammar.symbol_start()] {
        follow.entry(nt).or_default().insert(EOF);
    }
    let mut by_head: HashMap<NonTerminal<'a>, Vec<usize>> = HashMap::new();
    for (idx, prod) in prods.iter().enumerate() {
        by_head.entry(prod.head()).or_default().push(idx);
    }
    let mut queue: VecDeque<usize> = (0..prods.len()).collect();
    let mut queued = vec![true; prods.len()];
    let mut rounds = 0usize;
    while let Some(idx) = queue.pop_front() {
        queued[idx] = false;
        rounds += 1;
        let prod = prods[idx];
        // follow(x) 增长之后, 以 x 为头部的产生式需要重新传播.
        for x in propagate_follow(sets, &mut follow, prod.head(), prod.tail()) {
            if let Some(heads) = by_head.get(&x) {
                enqueue(&mut queue, &mut queued, heads);
            }
        }
    }
    debug!(rounds, "follow sets converged");
    follow
}
