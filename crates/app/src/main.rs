use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use listening_core::model::{CategoryId, CategoryInfo, QuestionId, TestId};
use services::sessions::format_clock;
use services::{AppServices, Clock, FileBackend, ReviewError, ReviewSession, SessionError};
use storage::provider::JsonDirProvider;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug)]
enum ArgsError {
    MissingValue { flag: &'static str },
    MissingRequired { flag: &'static str },
    UnknownArg(String),
    InvalidDbUrl { raw: String },
    InvalidAnswer { raw: String },
    InvalidStart { raw: String },
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::MissingRequired { flag } => write!(f, "{flag} is required"),
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
            ArgsError::InvalidDbUrl { raw } => write!(f, "invalid --db value: {raw}"),
            ArgsError::InvalidAnswer { raw } => {
                write!(f, "invalid --answer value: {raw} (expected <question>=<option>)")
            }
            ArgsError::InvalidStart { raw } => write!(f, "invalid --start value: {raw}"),
        }
    }
}

impl std::error::Error for ArgsError {}

fn require_value(
    args: &mut impl Iterator<Item = String>,
    flag: &'static str,
) -> Result<String, ArgsError> {
    args.next().ok_or(ArgsError::MissingValue { flag })
}

fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  cargo run -p app -- attempt --category <id> --test <id> [--answer <q>=<option>]...");
    eprintln!("                              [--category-name <name>] [--data <dir>] [--db <sqlite_url>] [--autoplay]");
    eprintln!("  cargo run -p app -- review  --category <id> --test <id> [--start <n>] [--data <dir>] [--db <sqlite_url>]");
    eprintln!();
    eprintln!("Defaults:");
    eprintln!("  --data ./data        (documents at <data>/<category>/<test>.json, audio paths resolved under <data>)");
    eprintln!("  --db sqlite::memory: (results last for this run only)");
    eprintln!();
    eprintln!("Environment:");
    eprintln!("  LISTENING_DATA_DIR, LISTENING_DB_URL, RUST_LOG");
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Attempt,
    Review,
}

impl Command {
    fn from_arg(arg: &str) -> Option<Self> {
        match arg {
            "attempt" => Some(Self::Attempt),
            "review" => Some(Self::Review),
            _ => None,
        }
    }
}

/// Exit code when the requested test cannot be started from its data.
const DATA_ERROR_EXIT: i32 = 3;

/// Values used when a flag is absent.
#[derive(Debug, Clone)]
struct Defaults {
    data_dir: PathBuf,
    db_url: String,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            db_url: storage::sqlite::SESSION_DATABASE_URL.into(),
        }
    }
}

impl Defaults {
    /// Built-in defaults overridden by `LISTENING_DATA_DIR` and `LISTENING_DB_URL`.
    fn from_env() -> Self {
        let mut defaults = Self::default();
        if let Ok(dir) = std::env::var("LISTENING_DATA_DIR") {
            defaults.data_dir = PathBuf::from(dir);
        }
        if let Ok(url) = std::env::var("LISTENING_DB_URL") {
            defaults.db_url = normalize_sqlite_url(url);
        }
        defaults
    }
}

/// Resolved configuration: flags first, then `Defaults`.
#[derive(Debug)]
struct Args {
    data_dir: PathBuf,
    db_url: String,
    category: CategoryId,
    category_name: Option<String>,
    test_id: TestId,
    answers: Vec<(QuestionId, String)>,
    start: Option<u32>,
    autoplay: bool,
}

impl Args {
    fn parse(
        args: &mut impl Iterator<Item = String>,
        defaults: Defaults,
    ) -> Result<Self, ArgsError> {
        let Defaults {
            mut data_dir,
            mut db_url,
        } = defaults;
        let mut category = None;
        let mut category_name = None;
        let mut test_id = None;
        let mut answers = Vec::new();
        let mut start = None;
        let mut autoplay = false;

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--data" => data_dir = PathBuf::from(require_value(args, "--data")?),
                "--db" => {
                    let value = require_value(args, "--db")?;
                    if value.trim().is_empty() {
                        return Err(ArgsError::InvalidDbUrl { raw: value });
                    }
                    db_url = normalize_sqlite_url(value);
                }
                "--category" => category = Some(CategoryId::new(require_value(args, "--category")?)),
                "--category-name" => category_name = Some(require_value(args, "--category-name")?),
                "--test" => test_id = Some(TestId::new(require_value(args, "--test")?)),
                "--answer" => answers.push(parse_answer(&require_value(args, "--answer")?)?),
                "--start" => {
                    let value = require_value(args, "--start")?;
                    let parsed = value
                        .parse()
                        .map_err(|_| ArgsError::InvalidStart { raw: value.clone() })?;
                    start = Some(parsed);
                }
                "--autoplay" => autoplay = true,
                "--help" | "-h" => {
                    print_usage();
                    std::process::exit(0);
                }
                _ => return Err(ArgsError::UnknownArg(arg)),
            }
        }

        Ok(Self {
            data_dir,
            db_url,
            category: category.ok_or(ArgsError::MissingRequired { flag: "--category" })?,
            category_name,
            test_id: test_id.ok_or(ArgsError::MissingRequired { flag: "--test" })?,
            answers,
            start,
            autoplay,
        })
    }

    fn category_info(&self) -> CategoryInfo {
        CategoryInfo {
            id: self.category.clone(),
            name: self
                .category_name
                .clone()
                .unwrap_or_else(|| self.category.as_str().to_uppercase()),
        }
    }
}

fn parse_answer(raw: &str) -> Result<(QuestionId, String), ArgsError> {
    let invalid = || ArgsError::InvalidAnswer { raw: raw.to_string() };
    let (question, option) = raw.split_once('=').ok_or_else(invalid)?;
    let question: QuestionId = question.trim().parse().map_err(|_| invalid())?;
    let option = option.trim();
    if option.is_empty() {
        return Err(invalid());
    }
    Ok((question, option.to_string()))
}

fn normalize_sqlite_url(raw: String) -> String {
    if raw == storage::sqlite::SESSION_DATABASE_URL || raw.starts_with("sqlite://") {
        return raw;
    }

    let trimmed = raw.trim().to_string();
    let path_str = trimmed
        .strip_prefix("sqlite:")
        .unwrap_or(trimmed.as_str())
        .to_string();
    let path = std::path::Path::new(&path_str);
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .unwrap_or_else(|_| PathBuf::from("."))
            .join(path)
    };
    format!("sqlite://{}", absolute.display())
}

fn prepare_sqlite_file(db_url: &str) -> anyhow::Result<()> {
    if db_url == storage::sqlite::SESSION_DATABASE_URL {
        return Ok(());
    }

    let path = db_url
        .strip_prefix("sqlite://")
        .ok_or_else(|| ArgsError::InvalidDbUrl {
            raw: db_url.to_string(),
        })?;
    let path = path.split('?').next().unwrap_or(path);
    if path.is_empty() {
        return Err(ArgsError::InvalidDbUrl {
            raw: db_url.to_string(),
        }
        .into());
    }

    let path = std::path::Path::new(path);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("creating {}", parent.display()))?;
    }

    if !path.exists() {
        std::fs::OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(path)
            .with_context(|| format!("creating {}", path.display()))?;
    }

    Ok(())
}

/// Blocking message for a test whose data cannot be used.
fn data_error_message(args: &Args, err: &SessionError) -> String {
    format!(
        "Test {}/{} cannot be started: {err}.\nCheck the documents under {} and run the command again.",
        args.category,
        args.test_id,
        args.data_dir.display()
    )
}

async fn run_attempt(app: &AppServices, args: &Args) -> anyhow::Result<()> {
    let mut live = match app
        .assessments()
        .open(args.category_info(), &args.test_id)
        .await
    {
        Ok(live) => live,
        Err(err) if err.is_data_error() => {
            eprintln!("{}", data_error_message(args, &err));
            std::process::exit(DATA_ERROR_EXIT);
        }
        Err(err) => {
            return Err(err)
                .with_context(|| format!("cannot open test {}/{}", args.category, args.test_id));
        }
    };
    live.start()?;

    let progress = live.controller().progress();
    println!(
        "{} ({} questions, {} on the clock)",
        live.controller().question_set().info().title,
        progress.total,
        progress.clock()
    );

    for (question, option) in &args.answers {
        live.select_answer(*question, option.clone())
            .with_context(|| format!("answering question {question}"))?;
    }
    live.player_mut().drain_events().await;

    let record = match live.submit().await? {
        Some(record) => record,
        None => live
            .wait_for_result()
            .await
            .context("attempt closed without a result")?,
    };

    println!(
        "Score {}% ({}/{} correct) in {}",
        record.score(),
        record.correct_count(),
        record.total_questions(),
        format_clock(record.time_spent_secs())
    );
    info!(token = %record.token(), "attempt recorded");

    run_review(app, args).await
}

fn print_review_item(review: &ReviewSession) {
    let Some(item) = review.current() else {
        return;
    };
    let mark = if item.is_correct { "correct" } else { "wrong" };
    println!(
        "  Q{:>2} [{mark:>7}] yours: {:<12} expected: {}",
        item.number, item.user_answer, item.correct_answer
    );
    if !item.explanation().is_empty() {
        println!("        {}", item.explanation());
    }
}

async fn run_review(app: &AppServices, args: &Args) -> anyhow::Result<()> {
    let mut review = match app
        .reviews()
        .open(&args.category, &args.test_id, args.start)
        .await
    {
        Ok(review) => review,
        Err(ReviewError::NoResult { .. }) => {
            println!("No result stored for this test; take it first.");
            return Ok(());
        }
        Err(e) => return Err(e.into()),
    };

    println!("Review from question {}:", review.index() + 1);
    loop {
        review.player_mut().drain_events().await;
        print_review_item(&review);
        if !review.next() {
            break;
        }
    }
    review.close();
    Ok(())
}

async fn run() -> anyhow::Result<()> {
    let mut argv: Vec<String> = std::env::args().skip(1).collect();

    let cmd = match argv.first().map(String::as_str) {
        None | Some("--help" | "-h") => {
            print_usage();
            return Ok(());
        }
        Some(first) if first.starts_with("--") => Command::Attempt,
        Some(first) => match Command::from_arg(first) {
            Some(cmd) => cmd,
            None => {
                print_usage();
                anyhow::bail!("unknown subcommand: {first}");
            }
        },
    };
    if !argv[0].starts_with("--") {
        argv.remove(0);
    }

    let args =
        Args::parse(&mut argv.into_iter(), Defaults::from_env()).inspect_err(|_| print_usage())?;
    info!(data_dir = %args.data_dir.display(), db = %args.db_url, "configuration resolved");

    prepare_sqlite_file(&args.db_url)?;
    let questions = Arc::new(JsonDirProvider::new(&args.data_dir));
    let backend = Arc::new(FileBackend::new(&args.data_dir));
    let app = AppServices::new_sqlite(&args.db_url, questions, backend, Clock::default())
        .await
        .context("opening result store")?
        .with_autoplay(args.autoplay);

    match cmd {
        Command::Attempt => run_attempt(&app, &args).await,
        Command::Review => run_review(&app, &args).await,
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "app=info,services=info,storage=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    if let Err(err) = run().await {
        eprintln!("{err:#}");
        std::process::exit(2);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(raw: &[&str]) -> Result<Args, ArgsError> {
        Args::parse(&mut raw.iter().map(|s| (*s).to_string()), Defaults::default())
    }

    #[test]
    fn answers_and_required_flags() {
        let args = parse(&[
            "--category", "ielts", "--test", "t1", "--answer", "3=B", "--answer", " 4 = gate nine ",
        ])
        .unwrap();
        assert_eq!(args.test_id, TestId::new("t1"));
        assert_eq!(
            args.answers,
            vec![
                (QuestionId::new(3), "B".to_string()),
                (QuestionId::new(4), "gate nine".to_string())
            ]
        );
        assert_eq!(args.category_info().name, "IELTS");

        assert!(matches!(
            parse(&["--test", "t1"]),
            Err(ArgsError::MissingRequired { flag: "--category" })
        ));
        assert!(matches!(
            parse(&["--category", "c", "--test", "t", "--answer", "x=B"]),
            Err(ArgsError::InvalidAnswer { .. })
        ));
        assert!(matches!(
            parse(&["--category", "c", "--test"]),
            Err(ArgsError::MissingValue { flag: "--test" })
        ));
    }

    #[test]
    fn flags_override_defaults() {
        let defaults = Defaults {
            data_dir: PathBuf::from("/srv/tests"),
            db_url: "sqlite:///srv/results.sqlite3".into(),
        };
        let args = Args::parse(
            &mut ["--category", "c", "--test", "t"].iter().map(|s| (*s).to_string()),
            defaults.clone(),
        )
        .unwrap();
        assert_eq!(args.data_dir, defaults.data_dir);
        assert_eq!(args.db_url, defaults.db_url);

        let args = parse(&["--category", "c", "--test", "t", "--data", "docs"]).unwrap();
        assert_eq!(args.data_dir, PathBuf::from("docs"));
        assert_eq!(args.db_url, storage::sqlite::SESSION_DATABASE_URL);
    }

    #[test]
    fn data_errors_get_a_retry_hint() {
        let args = parse(&["--category", "ielts", "--test", "t1", "--data", "docs"]).unwrap();
        let err = SessionError::InvalidDuration {
            label: "soon".into(),
        };
        assert!(err.is_data_error());
        let message = data_error_message(&args, &err);
        assert!(message.starts_with("Test ielts/t1 cannot be started"));
        assert!(message.contains("run the command again"));
    }

    #[test]
    fn sqlite_urls_are_normalized() {
        assert_eq!(normalize_sqlite_url("sqlite::memory:".into()), "sqlite::memory:");
        assert_eq!(
            normalize_sqlite_url("sqlite:/tmp/results.sqlite3".into()),
            "sqlite:///tmp/results.sqlite3"
        );
    }
}
