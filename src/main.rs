use anyhow::Result;
use clap::Parser;

use exam_structure::config::{Config, FailurePolicy};
use exam_structure::orchestrator::{App, BatchOptions};
use exam_structure::utils::logging;

/// 试卷文本结构化批处理
#[derive(Parser, Debug)]
#[command(name = "exam_structure")]
#[command(about = "把 OCR 抽取的试卷文本整理成带分值的结构化题目")]
#[command(version)]
struct Args {
    /// 文档 id 前缀（如 2023-geo）
    target: Option<String>,

    /// 重新处理已有输出的文档
    #[arg(long)]
    force: bool,

    /// 处理全部文档
    #[arg(long)]
    all: bool,

    /// 出现第一个失败后不再启动新的文档
    #[arg(long)]
    stop_on_failure: bool,

    /// 原始文档目录
    #[arg(long)]
    input: Option<String>,

    /// 结构化结果目录
    #[arg(long)]
    output: Option<String>,

    /// 同时处理的文档数
    #[arg(long)]
    concurrency: Option<usize>,

    /// 显示详细日志
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // 加载配置，命令行参数优先
    let mut config = Config::from_env();
    if let Some(input) = args.input {
        config.input_folder = input;
    }
    if let Some(output) = args.output {
        config.output_folder = output;
    }
    if let Some(concurrency) = args.concurrency {
        config.max_concurrent_documents = concurrency;
    }
    if args.stop_on_failure {
        config.failure_policy = FailurePolicy::StopOnFirstFailure;
    }
    config.verbose_logging |= args.verbose;

    // 初始化日志
    logging::init(config.verbose_logging);

    let options = BatchOptions {
        target: args.target,
        all: args.all,
        force: args.force,
    };

    // 初始化并运行应用
    let stats = App::initialize(config)?.run(&options).await?;

    if stats.has_failures() {
        std::process::exit(1);
    }
    Ok(())
}
