//! Equivalências - 课程等效认定工具
//!
//! 根据来源机构的等效规则表，判断学生已通过的课程可以免修哪些目标课程。

pub mod core;
pub mod report;
pub mod storage;

use crate::core::extractor::TranscriptExtractor;
use crate::core::models::{AnalysisRequest, AppConfig, StudentRecord, Strategy};
use crate::core::normalizer::normalize;
use crate::core::rule_engine::RuleEngine;
use crate::report::{render_markdown, Summary};
use crate::storage::config::ConfigManager;
use crate::storage::database::Database;
use crate::storage::spreadsheet::RuleWorkbook;
use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// 历史记录保留条数
const HISTORY_KEEP: usize = 500;

#[derive(Parser, Debug)]
#[command(name = "equivalencias", version, about = "课程等效认定工具")]
struct Cli {
    /// 配置文件路径（默认位于系统配置目录）
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// 校验规则表格并列出其中的机构
    Sheets {
        /// 规则表格（.xlsx）
        path: PathBuf,
    },

    /// 执行一次等效分析
    Resolve {
        /// 规则文件（.xlsx 或 .json）；省略时使用配置或数据库缓存
        #[arg(long)]
        rules: Option<PathBuf>,

        /// 来源机构（工作表名）
        #[arg(long)]
        institution: Option<String>,

        /// 解析策略（consume | grant-all | lookup）
        #[arg(long)]
        strategy: Option<Strategy>,

        /// 已通过的课程代码，逗号或空格分隔
        #[arg(long, conflicts_with = "transcript", required_unless_present = "transcript")]
        codes: Option<String>,

        /// 学业指导公报（.pdf 或文本）
        #[arg(long)]
        transcript: Option<PathBuf>,

        /// 学生姓名（仅在使用 --codes 时）
        #[arg(long, requires = "codes")]
        student: Option<String>,

        /// 把 Markdown 报告写入文件
        #[arg(long)]
        markdown: Option<PathBuf>,

        /// 以JSON输出分析报告
        #[arg(long)]
        json: bool,

        /// 保存规则表和分析结果到数据库
        #[arg(long)]
        save: bool,
    },

    /// 查看最近的分析记录
    History {
        #[arg(long, default_value = "20")]
        limit: usize,
    },

    /// 把某机构的规则导出为JSON规则文件
    Export {
        #[arg(long)]
        rules: PathBuf,

        #[arg(long)]
        institution: Option<String>,

        /// 输出文件（省略时打印到标准输出）
        #[arg(long, short)]
        output: Option<PathBuf>,
    },

    /// 显示当前配置
    Config {
        /// 重置为默认配置
        #[arg(long)]
        reset: bool,
    },
}

fn main() {
    // 初始化日志
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    if let Err(e) = run(cli) {
        eprintln!("{:#}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    let manager = ConfigManager::new(cli.config.unwrap_or_else(ConfigManager::default_path));
    let config = manager.load().context("无法加载配置")?;

    match cli.cmd {
        Commands::Sheets { path } => cmd_sheets(&path),
        Commands::Resolve {
            rules,
            institution,
            strategy,
            codes,
            transcript,
            student,
            markdown,
            json,
            save,
        } => {
            let source = match (codes, transcript) {
                (Some(codes), _) => RecordSource::Codes { codes, student },
                (None, Some(path)) => RecordSource::Transcript(path),
                (None, None) => bail!("必须提供 --codes 或 --transcript"),
            };
            cmd_resolve(
                &config,
                ResolveArgs {
                    rules,
                    institution,
                    strategy,
                    source,
                    markdown,
                    json,
                    save,
                },
            )
        }
        Commands::History { limit } => cmd_history(&config, limit),
        Commands::Export {
            rules,
            institution,
            output,
        } => cmd_export(&rules, institution.as_deref(), output.as_deref()),
        Commands::Config { reset } => {
            if reset {
                manager.reset()?;
                tracing::info!("配置已重置");
            }
            println!("{}", serde_json::to_string_pretty(&manager.load()?)?);
            Ok(())
        }
    }
}

enum RecordSource {
    Codes { codes: String, student: Option<String> },
    Transcript(PathBuf),
}

struct ResolveArgs {
    rules: Option<PathBuf>,
    institution: Option<String>,
    strategy: Option<Strategy>,
    source: RecordSource,
    markdown: Option<PathBuf>,
    json: bool,
    save: bool,
}

fn cmd_sheets(path: &Path) -> Result<()> {
    let workbook = RuleWorkbook::open(path)?;
    workbook.validate()?;

    for name in workbook.institutions() {
        let Some(sheet) = workbook.sheet(name) else {
            continue;
        };
        let missing = sheet.missing_columns();
        if missing.is_empty() {
            println!("{}\t{} 条规则", name, sheet.rules()?.len());
        } else {
            println!("{}\t缺少列: {}", name, missing.join(", "));
        }
    }
    Ok(())
}

fn cmd_resolve(config: &AppConfig, args: ResolveArgs) -> Result<()> {
    // 先读取学生记录，提取失败时不加载规则也不调用引擎
    let record = match args.source {
        RecordSource::Codes { codes, student } => {
            let mut record = StudentRecord::from_codes(normalize(&codes));
            record.student_name = student;
            record
        }
        RecordSource::Transcript(path) => {
            let extractor =
                TranscriptExtractor::new(&config.course_prefixes, &config.excluded_codes)?;
            extractor.extract_from_file(&path)?
        }
    };

    let institution = args
        .institution
        .or_else(|| config.default_institution.clone());

    let (institution, rules) = match args.rules.or_else(|| config.default_rules_path.clone()) {
        Some(path) => storage::load_rules(&path, institution.as_deref())?,
        None => {
            let Some(name) = institution else {
                bail!("未指定规则文件，也未指定机构");
            };
            let db = open_database(config)?;
            let table = db
                .load_rule_table(&name)?
                .with_context(|| format!("数据库中没有机构 '{}' 的规则表", name))?;
            tracing::info!("使用缓存的规则表（导入于 {}）", table.imported_at.to_rfc3339());
            (table.institution, table.rules)
        }
    };

    let engine = RuleEngine::new(rules)?;
    let report = engine.analyze(&AnalysisRequest {
        institution: institution.clone(),
        strategy: args.strategy.unwrap_or(config.default_strategy),
        record,
    });

    let summary = Summary::from_report(&report);
    if !summary.all_found() {
        tracing::warn!("{} 门课程未在机构 '{}' 的规则表中找到", summary.not_found.len(), institution);
    }

    let markdown = render_markdown(&summary);
    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("{}", markdown);
    }

    if let Some(path) = &args.markdown {
        std::fs::write(path, &markdown)
            .with_context(|| format!("无法写入报告 {}", path.display()))?;
        tracing::info!("报告已写入 {}", path.display());
    }

    if args.save {
        let db = open_database(config)?;
        db.save_rule_table(&institution, engine.rules())?;
        db.save_analysis(&report)?;
        db.cleanup_old_analyses(HISTORY_KEEP)?;
    }

    Ok(())
}

fn cmd_history(config: &AppConfig, limit: usize) -> Result<()> {
    let db = open_database(config)?;
    let institutions = db.list_institutions()?;
    if !institutions.is_empty() {
        println!("已缓存的机构: {}", institutions.join(", "));
    }

    for report in db.load_recent_analyses(limit)? {
        println!(
            "{}\t{}\t{}\t{}\t{} 门课程",
            report.created_at.format("%Y-%m-%d %H:%M"),
            report.id,
            report.institution,
            report.strategy(),
            report.approved_codes.len()
        );
    }
    Ok(())
}

fn cmd_export(rules: &Path, institution: Option<&str>, output: Option<&Path>) -> Result<()> {
    let (institution, rules) = storage::load_rules(rules, institution)?;
    let json = storage::rule_file::export_rules_to_json(&rules)?;

    match output {
        Some(path) => {
            std::fs::write(path, json)?;
            tracing::info!("已导出机构 '{}' 的 {} 条规则到 {}", institution, rules.len(), path.display());
        }
        None => println!("{}", json),
    }
    Ok(())
}

fn open_database(config: &AppConfig) -> Result<Database> {
    let path = config
        .database_path
        .clone()
        .unwrap_or_else(ConfigManager::default_database_path);
    Database::open(&path)
}
