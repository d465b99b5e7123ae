use bumpalo::Bump;
use tracing::info;

use crate::{
    Family, FirstFollow, Grammar, Table,
    error::Error,
    limits::{Deadline, Limits},
    report::AnalysisReport,
};

/// 一次文法提交的全部分析结果, 构建之后不再修改.
///
/// 文法中的符号和产生式都分配在调用者提供的 [`Bump`] 中.
#[derive(Debug)]
pub struct Analysis<'a> {
    grammar: Grammar<'a>,
    sets: FirstFollow<'a>,
    family: Family<'a>,
    table: Table<'a>,
    /// 从解析文法开始计时, 生成报告时仍然有效.
    deadline: Deadline,
}

impl<'a> Analysis<'a> {
    /// 解析文法, 依次计算 FIRST/FOLLOW 集, 规范 LR(0) 项集族和 SLR(1) 分析表.
    ///
    /// 文法错误或者超出 `limits` 时直接返回错误, 不会产生部分结果.
    pub fn new(
        text: &'a str,
        start: Option<&str>,
        limits: &Limits,
        bump: &'a Bump,
    ) -> Result<Self, Error> {
        let deadline = limits.start_clock();
        let grammar = Grammar::from_cfg(text, start, limits, bump)?;
        let sets = FirstFollow::compute(&grammar);
        deadline.check()?;
        let family = Family::build(&grammar, limits, &deadline)?;
        let table = Table::build(&family, &grammar, &sets, || deadline.check())?;
        info!(
            states = family.len(),
            conflicts = table.conflicts().len(),
            "grammar analysed"
        );
        Ok(Self {
            grammar,
            sets,
            family,
            table,
            deadline,
        })
    }

    pub fn grammar(&self) -> &Grammar<'a> {
        &self.grammar
    }

    pub fn sets(&self) -> &FirstFollow<'a> {
        &self.sets
    }

    pub fn family(&self) -> &Family<'a> {
        &self.family
    }

    pub fn table(&self) -> &Table<'a> {
        &self.table
    }

    pub(crate) fn deadline(&self) -> &Deadline {
        &self.deadline
    }
}

/// 从文法文本直接得到可以展示的分析报告.
pub fn analyze(text: &str, limits: &Limits) -> Result<AnalysisReport, Error> {
    let bump = Bump::new();
    let analysis = Analysis::new(text, None, limits, &bump)?;
    AnalysisReport::try_from(&analysis)
}

#[cfg(test)]
mod test {
    use std::time::Duration;

    use bumpalo::Bump;

    use crate::{
        Family, FirstFollow, Grammar, Table,
        analysis::Analysis,
        error::{Error, Resource},
        limits::Limits,
        report::AnalysisReport,
    };
    use pretty_assertions::assert_eq;

    fn expired() -> Limits {
        Limits {
            time_budget: Some(Duration::ZERO),
            ..Limits::default()
        }
    }

    const TIMEOUT: Error = Error::ResourceLimitExceeded {
        resource: Resource::Milliseconds,
        limit: 0,
    };

    #[test]
    fn table_stops_when_budget_runs_out() {
        let bump = Bump::new();
        let grammar = Grammar::from_cfg("S -> a S b | ε", None, &Limits::default(), &bump).unwrap();
        let sets = FirstFollow::compute(&grammar);
        let family = Family::from_grammar(&grammar, &Limits::default()).unwrap();
        let deadline = expired().start_clock();
        std::thread::sleep(Duration::from_millis(2));
        assert_eq!(
            Table::build(&family, &grammar, &sets, || deadline.check()).unwrap_err(),
            TIMEOUT
        );
    }

    #[test]
    fn report_stops_when_budget_runs_out() {
        let bump = Bump::new();
        let mut analysis =
            Analysis::new("S -> a S b | ε", None, &Limits::default(), &bump).unwrap();
        assert!(AnalysisReport::try_from(&analysis).is_ok());

        analysis.deadline = expired().start_clock();
        std::thread::sleep(Duration::from_millis(2));
        assert_eq!(AnalysisReport::try_from(&analysis).unwrap_err(), TIMEOUT);
    }
}
