use std::{
    collections::{BTreeSet, HashSet, VecDeque},
    fmt::{Debug, Display},
};

use indexmap::{IndexMap, IndexSet};
use tracing::{debug, trace};

use crate::{
    Grammar, Production, Token,
    error::{Error, Resource},
    limits::{Deadline, Limits},
};

/// LR(0) 项.
///
/// 排序时先比较产生式编号, 再比较 dot 的位置, 因此项集中的项按产生式声明顺序排列.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Item<'a> {
    /// 产生式编号.
    index: usize,
    prod: &'a Production<'a>,
    /// dot 所处的位置, 在 `0..=prod.len()` 范围中.
    dot: usize,
}

impl Debug for Item<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(&format!("Item({}: {})", self.index, self))
    }
}

impl Display for Item<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let tail_s: String = self
            .prod
            .tail()
            .iter()
            .enumerate()
            .map(|(i, t)| format!("{}{} ", if i == self.dot { "• " } else { "" }, t))
            .collect();
        f.pad(&format!(
            "{} -> {}",
            self.prod.head(),
            format!(
                "{}{}",
                tail_s.trim_end(),
                if self.is_complete() { " •" } else { "" }
            )
            .trim()
        ))
    }
}

impl<'a> Item<'a> {
    #[must_use]
    pub(crate) fn new(index: usize, prod: &'a Production<'a>, dot: usize) -> Self {
        Self { index, prod, dot }
    }

    #[must_use]
    pub(crate) fn initial(index: usize, prod: &'a Production<'a>) -> Self {
        Self::new(index, prod, 0)
    }

    /// dot 之后的符号, 项已经完整时返回 [`None`].
    #[must_use]
    pub fn expected(&self) -> Option<Token<'a>> {
        self.prod.tail().get(self.dot).copied()
    }

    /// dot 越过 `token` 之后的项, 如果 dot 之后不是 `token` 则返回 [`None`].
    #[must_use]
    pub fn goto(&self, token: Token<'a>) -> Option<Self> {
        if self.expected()? != token {
            return None;
        }
        Some(Self::new(self.index, self.prod, self.dot + 1))
    }

    /// dot 是否已经到达产生式末尾 (可以归约).
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.dot == self.prod.len()
    }

    #[must_use]
    pub fn prod(&self) -> &'a Production<'a> {
        self.prod
    }

    #[must_use]
    pub fn prod_index(&self) -> usize {
        self.index
    }
}

/// 对闭包运算封闭的项集, 只有 `items` 参与比较和哈希.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ItemSet<'a> {
    items: BTreeSet<Item<'a>>,
}

impl Debug for ItemSet<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ItemSet")
            .field("items", &self.items)
            .finish()
    }
}

impl<'a> ItemSet<'a> {
    /// 获取 I_0 项集, 也就是 `closure({[S' -> • S]})`.
    #[must_use]
    pub(crate) fn initial(grammar: &Grammar<'a>) -> Self {
        let items = grammar
            .prods_of(grammar.augmented_start())
            .map(|(index, prod)| Item::initial(index, prod))
            .collect();
        Self { items }.closure(grammar)
    }

    /// 获取当前项集的闭包项集.
    ///
    /// 每个非终结符只展开一次, 所以队列中的每一项最多被处理一次.
    #[must_use]
    fn closure(self, grammar: &Grammar<'a>) -> Self {
        let mut items = self.items;
        let mut pending: VecDeque<Item<'a>> = items.iter().copied().collect();
        let mut expanded = HashSet::new();
        while let Some(item) = pending.pop_front() {
            let Some(Token::NonTerminal(nt)) = item.expected() else {
                continue;
            };
            if !expanded.insert(nt) {
                continue;
            }
            for (index, prod) in grammar.prods_of(nt) {
                let new_item = Item::initial(index, prod);
                if items.insert(new_item) {
                    pending.push_back(new_item);
                }
            }
        }
        Self { items }
    }

    /// `goto(I, X)`, 结果为空时返回 [`None`].
    #[must_use]
    pub(crate) fn goto(&self, token: Token<'a>, grammar: &Grammar<'a>) -> Option<Self> {
        let items: BTreeSet<Item<'a>> = self.items.iter().filter_map(|i| i.goto(token)).collect();
        if items.is_empty() {
            None
        } else {
            Some(Self { items }.closure(grammar))
        }
    }

    pub fn items(&self) -> impl Iterator<Item = &Item<'a>> {
        self.items.iter()
    }

    /// dot 之后出现过的符号.
    #[must_use]
    pub fn expected_tokens(&self) -> HashSet<Token<'a>> {
        self.items.iter().filter_map(Item::expected).collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// 规范 LR(0) 项集族.
///
/// 项集按发现顺序编号, 第 0 个是初始项集. 状态之间的转移保存在每个状态自己的表中,
/// 回边也只是表中的一项.
#[derive(Debug)]
pub struct Family<'a> {
    item_sets: IndexSet<ItemSet<'a>>,
    /// 描述了 goto 动作, 下标为起始项集.
    /// GOTO(i, key) = value, 按文法符号顺序插入.
    gotos: Vec<IndexMap<Token<'a>, usize>>,
}

impl<'a> Family<'a> {
    /// 从 `grammar` 构建规范 LR(0) 项集族.
    ///
    /// 按编号从小到大处理项集, 每个项集按文法符号的首次出现顺序尝试 goto,
    /// 相同输入总是得到相同的编号.
    pub fn from_grammar(grammar: &Grammar<'a>, limits: &Limits) -> Result<Self, Error> {
        Self::build(grammar, limits, &limits.start_clock())
    }

    /// 与 [`Family::from_grammar`] 相同, 但使用已经开始计时的 `deadline`.
    pub(crate) fn build(
        grammar: &Grammar<'a>,
        limits: &Limits,
        deadline: &Deadline,
    ) -> Result<Self, Error> {
        let mut item_sets = IndexSet::from([ItemSet::initial(grammar)]);
        let mut gotos = Vec::new();
        let mut from = 0;
        while let Some(is) = item_sets.get_index(from) {
            deadline.check()?;
            let expected = is.expected_tokens();
            let targets: Vec<(Token<'a>, ItemSet<'a>)> = grammar
                .symbols()
                .filter(|tok| expected.contains(tok))
                .filter_map(|tok| is.goto(tok, grammar).map(|nis| (tok, nis)))
                .collect();
            let mut edges = IndexMap::new();
            for (tok, nis) in targets {
                let (to, fresh) = item_sets.insert_full(nis);
                if fresh {
                    trace!("new item set I_{to} = GOTO(I_{from}, {tok})");
                    if item_sets.len() > limits.max_states {
                        Err(Error::limit(Resource::States, limits.max_states))?
                    }
                }
                edges.insert(tok, to);
            }
            gotos.push(edges);
            from += 1;
        }
        debug!(states = item_sets.len(), "canonical collection built");
        Ok(Self { item_sets, gotos })
    }

    /// 按照 I_i (i = 0, 1, 2, 3...) 顺序获取项集.
    pub fn item_sets(&self) -> impl ExactSizeIterator<Item = &ItemSet<'a>> {
        self.item_sets.iter()
    }

    #[must_use]
    pub fn item_set(&self, state: usize) -> Option<&ItemSet<'a>> {
        self.item_sets.get_index(state)
    }

    /// 遍历 gotos (起始项集, 转换 Token, 到达项集).
    pub fn gotos(&self) -> impl Iterator<Item = (usize, Token<'a>, usize)> + '_ {
        self.gotos
            .iter()
            .enumerate()
            .flat_map(|(from, v)| v.iter().map(move |(&tok, &to)| (from, tok, to)))
    }

    /// 获取一个项集的 gotos: (转换 Token, 到达项集), 按发现顺序排列.
    /// 如果 item_set 没有对应项集, 那么返回 [`None`].
    #[must_use]
    pub fn gotos_of(&self, item_set: usize) -> Option<impl Iterator<Item = (Token<'a>, usize)>> {
        self.gotos
            .get(item_set)
            .map(|v| v.iter().map(|(&tok, &to)| (tok, to)))
    }

    /// 查询 GOTO(state, token).
    #[must_use]
    pub fn goto(&self, state: usize, token: Token<'a>) -> Option<usize> {
        self.gotos.get(state)?.get(&token).copied()
    }

    /// 获取项集族数量
    #[must_use]
    pub fn len(&self) -> usize {
        self.item_sets.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod test {
    use std::collections::{BTreeSet, HashSet};

    use bumpalo::Bump;

    use crate::{
        Family, Grammar, NonTerminal, Terminal, Token,
        error::{Error, Resource},
        item::{Item, ItemSet},
        limits::Limits,
    };
    use pretty_assertions::assert_eq;

    fn grammar<'a>(input: &'a str, bump: &'a Bump) -> Grammar<'a> {
        Grammar::from_cfg(input, None, &Limits::default(), bump).unwrap()
    }

    /// 用 (产生式编号, dot) 描述一个项集.
    fn item_set<'a>(grammar: &Grammar<'a>, cores: &[(usize, usize)]) -> ItemSet<'a> {
        ItemSet {
            items: cores
                .iter()
                .map(|&(index, dot)| Item::new(index, grammar.prods()[index], dot))
                .collect::<BTreeSet<_>>(),
        }
    }

    fn rendered(is: &ItemSet<'_>) -> Vec<String> {
        is.items().map(|i| i.to_string()).collect()
    }

    #[test]
    fn closure() {
        let bump = Bump::new();
        let grammar = grammar("program -> stmts\nstmts -> good", &bump);
        let i0 = ItemSet::initial(&grammar);
        assert_eq!(i0, item_set(&grammar, &[(0, 0), (1, 0), (2, 0)]));
        assert_eq!(
            rendered(&i0),
            [
                "program' -> • program",
                "program -> • stmts",
                "stmts -> • good"
            ]
        );
    }

    #[test]
    fn goto_basic_transition() {
        let bump = Bump::new();
        // 增广后:
        // 0: S' -> S
        // 1: S -> E
        // 2: E -> a
        let grammar = grammar("S -> E\nE -> a", &bump);
        let i0 = ItemSet::initial(&grammar);

        let next_s = i0.goto(NonTerminal::from("S").into(), &grammar).unwrap();
        assert_eq!(next_s, item_set(&grammar, &[(0, 1)]));

        let next_e = i0.goto(NonTerminal::from("E").into(), &grammar).unwrap();
        assert_eq!(next_e, item_set(&grammar, &[(1, 1)]));

        let next_a = i0.goto(Terminal::from("a").into(), &grammar).unwrap();
        assert_eq!(next_a, item_set(&grammar, &[(2, 1)]));

        assert_eq!(i0.goto(Terminal::from("b").into(), &grammar), None);
    }

    #[test]
    fn goto_triggers_closure_and_recursion() {
        let bump = Bump::new();
        // 0: program' -> program
        // 1: program -> stmts
        // 2: stmts -> stmt stmts
        // 3: stmts -> stmt
        let grammar = grammar("program -> stmts\nstmts -> stmt stmts | stmt", &bump);
        let i0 = ItemSet::initial(&grammar);
        let i1 = i0.goto(Terminal::from("stmt").into(), &grammar).unwrap();
        assert_eq!(i1, item_set(&grammar, &[(2, 0), (2, 1), (3, 0), (3, 1)]));
        assert_eq!(
            rendered(&i1),
            [
                "stmts -> • stmt stmts",
                "stmts -> stmt • stmts",
                "stmts -> • stmt",
                "stmts -> stmt •",
            ]
        );
    }

    #[test]
    fn epsilon_prod() {
        let bump = Bump::new();
        let grammar = grammar("head -> ε", &bump);
        let item = Item::initial(1, grammar.prods()[1]);
        assert_eq!(item.expected(), None);
        assert!(item.is_complete());
        assert_eq!(item.goto(Terminal::from("x").into()), None);
        assert_eq!(format!("{}", item), "head -> •");
    }

    #[test]
    fn family_of_itemsets() {
        (0..10).for_each(|_| family_of_itemsets_repeaten());
    }

    fn family_of_itemsets_repeaten() {
        let bump = Bump::new();
        let grammar = grammar("program -> stmts\nstmts -> stmt stmts | stmt", &bump);
        let family = Family::from_grammar(&grammar, &Limits::default()).unwrap();
        // 这里使用 Vec, 就是要确保项集状态顺序的不变性, 不能每次运行都是随机的编号.
        assert_eq!(
            family.item_sets().cloned().collect::<Vec<_>>(),
            vec![
                item_set(&grammar, &[(0, 0), (1, 0), (2, 0), (3, 0)]),
                item_set(&grammar, &[(0, 1)]),
                item_set(&grammar, &[(1, 1)]),
                item_set(&grammar, &[(2, 0), (2, 1), (3, 0), (3, 1)]),
                item_set(&grammar, &[(2, 2)]),
            ]
        );
        let program = Token::from(NonTerminal::from("program"));
        let stmts = Token::from(NonTerminal::from("stmts"));
        let stmt = Token::from(Terminal::from("stmt"));
        assert_eq!(
            family.gotos().collect::<Vec<_>>(),
            vec![
                (0, program, 1),
                (0, stmts, 2),
                (0, stmt, 3),
                (3, stmts, 4),
                (3, stmt, 3),
            ]
        );
    }

    #[test]
    fn family_is_deduplicated_and_deterministic() {
        let bump = Bump::new();
        let grammar = grammar("E -> E + T | T\nT -> T * F | F\nF -> ( E ) | id", &bump);
        let family = Family::from_grammar(&grammar, &Limits::default()).unwrap();
        assert_eq!(family.len(), 12);
        let distinct: HashSet<_> = family.item_sets().collect();
        assert_eq!(distinct.len(), family.len());
        for state in 0..family.len() {
            let tokens: Vec<_> = family.gotos_of(state).unwrap().map(|(t, _)| t).collect();
            let unique: HashSet<_> = tokens.iter().collect();
            assert_eq!(unique.len(), tokens.len());
        }
        let t = |s: &'static str| Token::from(Terminal::from(s));
        let nt = |s: &'static str| Token::from(NonTerminal::from(s));
        assert_eq!(
            family.gotos_of(0).unwrap().collect::<Vec<_>>(),
            vec![(nt("E"), 1), (nt("T"), 2), (nt("F"), 3), (t("("), 4), (t("id"), 5)]
        );
        assert_eq!(family.goto(4, nt("E")), Some(8));
        assert_eq!(family.goto(8, t(")")), Some(11));
        assert_eq!(family.goto(9, t("*")), Some(7));
        assert_eq!(family.goto(9, t("+")), None);
    }

    #[test]
    fn state_limit() {
        let bump = Bump::new();
        let grammar = grammar("E -> E + T | T\nT -> T * F | F\nF -> ( E ) | id", &bump);
        let limits = Limits {
            max_states: 4,
            ..Limits::default()
        };
        assert_eq!(
            Family::from_grammar(&grammar, &limits).unwrap_err(),
            Error::ResourceLimitExceeded {
                resource: Resource::States,
                limit: 4
            }
        );
    }
}
