use anyhow::{Context, Result};
use book_batch::models::parse_section_arg;
use book_batch::utils::logging;
use book_batch::{App, Config, Operation};
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use std::path::PathBuf;
use tracing::error;

const OPERATIONS: [&str; 4] = ["research", "write", "review", "proofread"];

fn parallel_arg() -> Arg {
    Arg::new("parallel")
        .long("parallel")
        .short('p')
        .value_parser(value_parser!(usize))
        .help("并行 Agent 数量 (1-5)")
}

fn batch_command(name: &'static str, about: &'static str) -> Command {
    Command::new(name)
        .about(about)
        .arg(
            Arg::new("sections")
                .required(true)
                .help("逗号分隔的节号，或分组名 part1..part5 / all"),
        )
        .arg(parallel_arg())
}

fn cli() -> Command {
    Command::new("book-batch")
        .version(env!("CARGO_PKG_VERSION"))
        .about("书籍写作多 Agent 批量处理工具")
        .arg(
            Arg::new("book_dir")
                .required(true)
                .value_parser(value_parser!(PathBuf))
                .help("书籍根目录"),
        )
        .subcommand_required(true)
        .arg_required_else_help(true)
        .subcommand(batch_command("research", "批量研究"))
        .subcommand(batch_command("write", "批量撰写"))
        .subcommand(batch_command("review", "批量审查"))
        .subcommand(batch_command("proofread", "批量校对"))
        .subcommand(Command::new("status").about("查看任务状态"))
        .subcommand(
            Command::new("resume")
                .about("恢复未完成的任务")
                .arg(parallel_arg()),
        )
        .subcommand(
            Command::new("progress").about("写作进度报告").arg(
                Arg::new("json")
                    .long("json")
                    .action(ArgAction::SetTrue)
                    .help("以 JSON 输出"),
            ),
        )
        .subcommand(
            Command::new("validate")
                .about("验证小节内容（front matter、状态、字数）")
                .arg(Arg::new("section_id").help("只验证该节，不填则验证全书")),
        )
        .subcommand(
            Command::new("agent")
                .about("单独运行一个 Agent 处理一个小节")
                .arg(
                    Arg::new("operation")
                        .required(true)
                        .value_parser(OPERATIONS),
                )
                .arg(Arg::new("section_id").required(true)),
        )
}

fn parse_operation(name: &str) -> Result<Operation> {
    name.parse::<Operation>().map_err(anyhow::Error::msg)
}

#[tokio::main]
async fn main() -> Result<()> {
    let matches = cli().get_matches();

    let book_dir = matches
        .get_one::<PathBuf>("book_dir")
        .cloned()
        .context("缺少书籍目录")?;
    let (command, args) = matches.subcommand().context("缺少命令")?;

    // 加载配置
    let parallel = args
        .try_get_one::<usize>("parallel")
        .ok()
        .flatten()
        .copied();
    let config = Config::load(&book_dir)
        .await
        .with_context(|| format!("无法加载配置: {}", book_dir.display()))?
        .with_parallel(parallel);

    // 初始化日志
    logging::init(config.verbose_logging);

    let app = App::initialize(&book_dir, config).await?;
    run_command(&app, command, args).await
}

async fn run_command(app: &App, command: &str, args: &ArgMatches) -> Result<()> {
    match command {
        "research" | "write" | "review" | "proofread" => {
            let operation = parse_operation(command)?;
            let sections = args
                .get_one::<String>("sections")
                .context("缺少节号参数")?;
            let section_ids = parse_section_arg(sections)?;
            // 单个任务失败不影响退出码
            app.run_batch(&section_ids, operation).await?;
        }
        "status" => {
            app.status().await;
        }
        "resume" => {
            app.resume().await?;
        }
        "progress" => {
            let report = app.progress().await?;
            if args.get_flag("json") {
                println!("{}", serde_json::to_string_pretty(&report)?);
            }
        }
        "validate" => {
            let section_id = args.get_one::<String>("section_id");
            app.validate(section_id.map(String::as_str)).await?;
        }
        "agent" => {
            let operation = parse_operation(
                args.get_one::<String>("operation")
                    .context("缺少操作参数")?,
            )?;
            let section_id = args
                .get_one::<String>("section_id")
                .context("缺少节号参数")?;

            if let Err(e) = app.run_single(operation, section_id).await {
                let err = anyhow::Error::new(e)
                    .context(format!("{} {} 处理失败", operation, section_id));
                error!("❌ {:#}", err);
                std::process::exit(1);
            }
        }
        other => anyhow::bail!("未知命令: {}", other),
    }

    Ok(())
}
