use std::time::{Duration, Instant};

use crate::error::{Error, Resource};

/// 单次分析允许使用的资源上限, 用于拒绝病态文法.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Limits {
    pub max_productions: usize,
    /// 终结符与非终结符的总数, 不计 `$` 和增广起始符.
    pub max_symbols: usize,
    pub max_states: usize,
    /// 整个分析的墙钟时间上限, [`None`] 表示不限制.
    pub time_budget: Option<Duration>,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_productions: 4096,
            max_symbols: 1024,
            max_states: 16384,
            time_budget: Some(Duration::from_secs(5)),
        }
    }
}

impl Limits {
    /// 不做任何限制.
    #[must_use]
    pub fn unlimited() -> Self {
        Self {
            max_productions: usize::MAX,
            max_symbols: usize::MAX,
            max_states: usize::MAX,
            time_budget: None,
        }
    }

    #[must_use]
    pub(crate) fn start_clock(&self) -> Deadline {
        Deadline {
            at: self.time_budget.and_then(|b| Instant::now().checked_add(b)),
            budget: self.time_budget.unwrap_or_default(),
        }
    }
}

/// 从分析开始时刻计算得到的截止时间.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Deadline {
    at: Option<Instant>,
    budget: Duration,
}

impl Deadline {
    pub(crate) fn check(&self) -> Result<(), Error> {
        match self.at {
            Some(at) if Instant::now() > at => Err(Error::limit(
                Resource::Milliseconds,
                self.budget.as_millis(),
            )),
            _ => Ok(()),
        }
    }
}
