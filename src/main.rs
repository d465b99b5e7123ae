use std::{
    fs,
    io::{self, Read},
    path::PathBuf,
    process::ExitCode,
    time::Duration,
};

use bumpalo::Bump;
use clap::{Parser, Subcommand, ValueEnum};
use slr_analysis::{
    Analysis, AnalysisReport, Limits,
    server::Server,
    service::{EXAMPLE_GRAMMAR, ParseResponse},
};
use tracing::{error, level_filters::LevelFilter};

#[derive(Parser)]
#[command(about = "SLR(1) 文法分析: FIRST/FOLLOW 集, LR(0) 项集族和 SLR(1) 分析表")]
struct AppArgs {
    /// 日志详细程度, 可以重复多次.
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
    #[command(flatten)]
    limits: LimitArgs,
    #[command(subcommand)]
    command: Command,
}

#[derive(clap::Args)]
struct LimitArgs {
    #[arg(long, global = true, default_value_t = 4096)]
    max_productions: usize,
    #[arg(long, global = true, default_value_t = 1024)]
    max_symbols: usize,
    #[arg(long, global = true, default_value_t = 16384)]
    max_states: usize,
    /// 单次分析的时间上限 (毫秒), 0 表示不限制.
    #[arg(long, global = true, default_value_t = 5000)]
    time_budget_ms: u64,
}

impl From<&LimitArgs> for Limits {
    fn from(args: &LimitArgs) -> Self {
        Self {
            max_productions: args.max_productions,
            max_symbols: args.max_symbols,
            max_states: args.max_states,
            time_budget: (args.time_budget_ms > 0)
                .then(|| Duration::from_millis(args.time_budget_ms)),
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum Format {
    Text,
    Json,
    Markdown,
}

#[derive(Subcommand)]
enum Command {
    /// 分析文法文件, 不指定文件时从标准输入读取.
    Analyze {
        input: Option<PathBuf>,
        #[arg(short, long, value_enum, default_value_t = Format::Text)]
        format: Format,
        /// 起始符, 默认为第一条产生式的左部.
        #[arg(short, long)]
        start: Option<String>,
    },
    /// 输出示例文法.
    Example,
    /// 用分析表驱动一串以空白分隔的终结符.
    Drive {
        grammar: PathBuf,
        #[arg(short = 'i', long)]
        sentence: String,
    },
    /// 启动 HTTP 服务.
    Serve {
        #[arg(long, default_value = "127.0.0.1:5000")]
        addr: String,
        /// 连接上读写的超时 (秒).
        #[arg(long, default_value_t = 10)]
        timeout_secs: u64,
        /// 同时处理的连接数上限.
        #[arg(long, default_value_t = 256)]
        max_connections: usize,
    },
}

fn init_logging(verbose: u8) {
    use tracing_subscriber::{Layer, fmt, layer::SubscriberExt, registry, util::SubscriberInitExt};

    let level = match verbose {
        0 => LevelFilter::WARN,
        1 => LevelFilter::INFO,
        2 => LevelFilter::DEBUG,
        _ => LevelFilter::TRACE,
    };
    let layer = fmt::layer()
        .without_time()
        .with_writer(io::stderr)
        .with_filter(level);
    registry().with(layer).init();
}

fn read_input(path: Option<&PathBuf>) -> io::Result<String> {
    match path {
        Some(path) => fs::read_to_string(path),
        None => {
            let mut inp = String::new();
            io::stdin().read_to_string(&mut inp)?;
            Ok(inp)
        }
    }
}

fn run(args: AppArgs) -> Result<(), Box<dyn std::error::Error>> {
    let limits = Limits::from(&args.limits);
    match args.command {
        Command::Analyze {
            input,
            format,
            start,
        } => {
            let inp = read_input(input.as_ref())?;
            let bump = Bump::new();
            let analysis = match Analysis::new(&inp, start.as_deref(), &limits, &bump) {
                Ok(analysis) => analysis,
                Err(e) if matches!(format, Format::Json) => {
                    println!("{}", serde_json::to_string_pretty(&ParseResponse::failure(e))?);
                    return Ok(());
                }
                Err(e) => return Err(e.into()),
            };
            match format {
                Format::Text => print!("{}", AnalysisReport::try_from(&analysis)?),
                Format::Json => {
                    let report = AnalysisReport::try_from(&analysis)?;
                    println!("{}", serde_json::to_string_pretty(&report)?);
                }
                Format::Markdown => println!("{}", analysis.table().to_markdown()),
            }
        }
        Command::Example => println!("{EXAMPLE_GRAMMAR}"),
        Command::Drive { grammar, sentence } => {
            let inp = read_input(Some(&grammar))?;
            let bump = Bump::new();
            let analysis = Analysis::new(&inp, None, &limits, &bump)?;
            let steps = analysis
                .table()
                .drive(analysis.grammar(), sentence.split_whitespace())?;
            for (i, step) in steps.iter().enumerate() {
                println!("{i:>4} {step}");
            }
        }
        Command::Serve {
            addr,
            timeout_secs,
            max_connections,
        } => Server::bind(addr, limits)?
            .with_timeout(Duration::from_secs(timeout_secs))
            .with_max_connections(max_connections)
            .run()?,
    }
    Ok(())
}

fn main() -> ExitCode {
    let args = AppArgs::parse();
    init_logging(args.verbose);
    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}
