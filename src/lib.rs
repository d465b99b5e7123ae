pub mod analysis;
pub mod driver;
pub mod error;
pub mod first_follow;
pub mod grammar;
pub mod html;
pub mod item;
pub mod limits;
pub mod report;
pub mod server;
pub mod service;
pub mod table;
pub mod token;

pub use analysis::{Analysis, analyze};
pub use driver::Step;
pub use error::{DriveError, Error, ParseProductionError};
pub use first_follow::{FirstFollow, FirstSet};
pub use grammar::{Grammar, Production};
pub use html::HtmlReport;
pub use item::{Family, Item, ItemSet};
pub use limits::Limits;
pub use report::AnalysisReport;
pub use table::{ActionCell, Conflict, ConflictKind, Table};
pub use token::{EOF, NonTerminal, Terminal, Token};
