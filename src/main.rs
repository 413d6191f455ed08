//! Command-line surface: review sessions, MCQ sessions, and progress views
//! over the scheduling core. Exits 0 on a clean finish or a clean quit,
//! nonzero on database failure.

use std::io::{self, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Instant;

use clap::{Args, Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use jpstudy::config;
use jpstudy::db::reviews::DueFilter;
use jpstudy::db::stats::{self, DateRange};
use jpstudy::db::{self, DbPool};
use jpstudy::domain::{Item, ItemKind, JlptLevel, Lang};
use jpstudy::error::{Result, StudyError};
use jpstudy::quiz::{QuestionGenerator, QuestionType};
use jpstudy::srs::{FlashScheduler, McqScheduler};

#[derive(Parser)]
#[command(name = "jpstudy", about = "Japanese vocabulary and kanji study with FSRS scheduling")]
struct Cli {
    /// Database file (falls back to JPSTUDY_DB, then ./data/japanese.db)
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create or migrate the database, then exit
    Init,
    /// Insert the built-in N5 starter items into an empty catalog
    Seed,
    /// Flashcard review session
    Review(ReviewArgs),
    /// Multiple-choice question session
    Mcq(McqArgs),
    /// Progress and statistics
    Progress {
        #[command(subcommand)]
        command: ProgressCommand,
    },
}

#[derive(Args)]
struct ReviewArgs {
    /// Maximum cards this session
    #[arg(long)]
    limit: Option<usize>,
    /// JLPT level filter (n5..n1, none)
    #[arg(long)]
    level: Option<String>,
    /// Item kind filter (vocab, kanji)
    #[arg(long)]
    kind: Option<String>,
}

#[derive(Args)]
struct McqArgs {
    /// vocab, kanji, or both
    #[arg(long, default_value = "both")]
    kind: String,
    /// JLPT level filter (n5..n1, none)
    #[arg(long)]
    level: Option<String>,
    /// Maximum questions this session
    #[arg(long)]
    limit: Option<usize>,
    /// w2m, m2w, or mixed
    #[arg(long = "question-type", default_value = "mixed")]
    question_type: String,
    /// Meaning language (vi, en)
    #[arg(long, default_value = "vi")]
    language: String,
}

#[derive(Subcommand)]
enum ProgressCommand {
    /// Current levels, streak, and catalog counts
    Show,
    /// Set the target level (or current level with --current)
    SetLevel {
        level: String,
        #[arg(long)]
        current: bool,
    },
    /// Review statistics over a range
    Stats {
        /// 7d, 30d, or all
        #[arg(long, default_value = "all")]
        range: String,
    },
}

fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "jpstudy=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {}", err);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    let path = config::database_path(cli.db);
    let pool = db::init_db(&path)?;

    match cli.command {
        Command::Init => {
            println!("Database ready at {}", path.display());
            Ok(())
        }
        Command::Seed => {
            let conn = db::try_lock(&pool)?;
            let inserted = db::seed_starter_items(&conn)?;
            if inserted == 0 {
                println!("Catalog already has items; nothing seeded.");
            } else {
                println!("Seeded {} starter items.", inserted);
            }
            Ok(())
        }
        Command::Review(args) => run_review_session(&pool, &args),
        Command::Mcq(args) => run_mcq_session(&pool, &args),
        Command::Progress { command } => run_progress(&pool, &command),
    }
}

fn parse_level(value: &str) -> Result<JlptLevel> {
    JlptLevel::from_str(value)
        .ok_or_else(|| StudyError::Invalid(format!("unknown JLPT level {:?}", value)))
}

fn parse_kind(value: &str) -> Result<ItemKind> {
    ItemKind::from_str(value)
        .ok_or_else(|| StudyError::Invalid(format!("unknown item kind {:?}", value)))
}

fn due_filter(
    limit: Option<usize>,
    level: Option<&str>,
    kind: Option<ItemKind>,
) -> Result<DueFilter> {
    Ok(DueFilter {
        limit: Some(limit.unwrap_or(config::DEFAULT_SESSION_LIMIT)),
        jlpt_level: level.map(parse_level).transpose()?,
        item_kind: kind,
    })
}

/// Read one trimmed line; None means EOF or an explicit quit.
fn prompt(message: &str) -> io::Result<Option<String>> {
    print!("{}", message);
    io::stdout().flush()?;
    let mut line = String::new();
    if io::stdin().read_line(&mut line)? == 0 {
        return Ok(None);
    }
    let line = line.trim().to_string();
    if line == "q" {
        return Ok(None);
    }
    Ok(Some(line))
}

fn load_item(pool: &DbPool, kind: ItemKind, item_id: i64) -> Result<Option<Item>> {
    let conn = db::try_lock(pool)?;
    Ok(db::items::get_item(&conn, kind, item_id)?)
}

fn describe_answer(item: &Item) -> String {
    let meanings = [Lang::Vi, Lang::En]
        .iter()
        .filter_map(|lang| {
            let m = item.meanings_in(*lang);
            if m.is_empty() {
                None
            } else {
                Some(format!("{}: {}", lang.as_str(), m.join("; ")))
            }
        })
        .collect::<Vec<_>>()
        .join("  |  ");

    match item {
        Item::Vocab(vocab) => format!("{} ({})  {}", vocab.word, vocab.reading, meanings),
        Item::Kanji(kanji) => format!(
            "{}  on: {}  kun: {}  {}",
            kanji.character,
            kanji.on_readings.join("・"),
            kanji.kun_readings.join("・"),
            meanings
        ),
    }
}

fn run_review_session(pool: &DbPool, args: &ReviewArgs) -> Result<()> {
    let kind = args.kind.as_deref().map(parse_kind).transpose()?;
    let filter = due_filter(args.limit, args.level.as_deref(), kind)?;
    let scheduler = FlashScheduler::new(pool.clone());

    let due = scheduler.due(&filter)?;
    if due.is_empty() {
        println!("Nothing due right now.");
        return Ok(());
    }
    println!("{} card(s) due.\n", due.len());

    for review in due {
        let Some(item) = load_item(pool, review.item_kind, review.item_id)? else {
            tracing::warn!("review {} points at a missing item; skipping", review.id);
            continue;
        };

        println!("  {}", item.surface());
        if prompt("Press Enter to reveal (q quits): ")?.is_none() {
            println!("Session ended.");
            return Ok(());
        }
        let revealed_at = Instant::now();
        println!("  {}", describe_answer(&item));

        loop {
            let Some(answer) = prompt("Recall [1=again 2=hard 3=good 4=easy]: ")? else {
                println!("Session ended.");
                return Ok(());
            };
            let Ok(rating) = answer.parse::<u8>() else {
                continue;
            };
            let duration_ms = revealed_at.elapsed().as_millis() as i64;
            match scheduler.apply(review.id, rating, Some(duration_ms)) {
                Ok(updated) => {
                    println!("  next review {}\n", updated.due_date.format("%Y-%m-%d %H:%M"));
                    break;
                }
                Err(StudyError::Invalid(message)) => {
                    println!("  {}", message);
                }
                Err(err) => return Err(err),
            }
        }
    }

    println!("Session complete.");
    Ok(())
}

fn run_mcq_session(pool: &DbPool, args: &McqArgs) -> Result<()> {
    let kind = match args.kind.as_str() {
        "both" => None,
        other => Some(parse_kind(other)?),
    };
    let question_type = QuestionType::from_str(&args.question_type)
        .ok_or_else(|| StudyError::Invalid(format!("unknown question type {:?}", args.question_type)))?;
    let language = Lang::from_str(&args.language)
        .ok_or_else(|| StudyError::Invalid(format!("unknown language {:?}", args.language)))?;
    let filter = due_filter(args.limit, args.level.as_deref(), kind)?;

    let scheduler = McqScheduler::new(pool.clone());
    let generator = QuestionGenerator::new(pool.clone());

    let due = scheduler.due(&filter)?;
    if due.is_empty() {
        println!("Nothing due right now.");
        return Ok(());
    }
    println!("{} question(s) due.\n", due.len());

    let labels = ['A', 'B', 'C', 'D'];
    for review in due {
        let question =
            match generator.generate(review.item_id, review.item_kind, question_type, language) {
                Ok(question) => question,
                Err(StudyError::Unavailable(reason)) => {
                    tracing::debug!("skipping item {}: {}", review.item_id, reason);
                    continue;
                }
                Err(err) => return Err(err),
            };

        println!("  {}", question.prompt);
        for (label, option) in labels.iter().zip(question.options.iter()) {
            println!("    {}. {}", label, option);
        }

        let asked_at = Instant::now();
        let selected = loop {
            let Some(answer) = prompt("Answer [a-d]: ")? else {
                println!("Session ended.");
                return Ok(());
            };
            match answer.to_ascii_lowercase().as_str() {
                "a" => break 0u8,
                "b" => break 1,
                "c" => break 2,
                "d" => break 3,
                _ => {}
            }
        };

        let is_correct = selected as usize == question.correct_index;
        let duration_ms = asked_at.elapsed().as_millis() as i64;
        scheduler.apply(review.id, is_correct, selected, Some(duration_ms))?;

        if is_correct {
            println!("  Correct!\n");
        } else {
            println!(
                "  Wrong. Answer: {}. {}\n",
                labels[question.correct_index], question.options[question.correct_index]
            );
        }
    }

    println!("Session complete.");
    Ok(())
}

fn run_progress(pool: &DbPool, command: &ProgressCommand) -> Result<()> {
    let conn = db::try_lock(pool)?;
    match command {
        ProgressCommand::Show => {
            let progress = db::progress::get_progress(&conn)?;
            println!("Current level: {}", progress.current_level.as_str());
            println!("Target level:  {}", progress.target_level.as_str());
            println!("Streak:        {} day(s)", progress.streak_days);
            if let Some(last) = progress.last_review_date {
                println!("Last review:   {}", last);
            }

            let vocab = stats::vocab_count_by_level(&conn)?;
            let kanji = stats::kanji_count_by_level(&conn)?;
            println!("\nCatalog by level:");
            for level in JlptLevel::ALL {
                println!(
                    "  {:>4}  vocab {:>5}  kanji {:>5}",
                    level.as_str(),
                    vocab[&level],
                    kanji[&level]
                );
            }
            println!(
                "\nMastered: {} vocab, {} kanji",
                stats::mastered_count(&conn, ItemKind::Vocab)?,
                stats::mastered_count(&conn, ItemKind::Kanji)?
            );
        }
        ProgressCommand::SetLevel { level, current } => {
            let level = parse_level(level)?;
            if *current {
                db::progress::set_current_level(&conn, level)?;
                println!("Current level set to {}", level.as_str());
            } else {
                db::progress::set_target_level(&conn, level)?;
                println!("Target level set to {}", level.as_str());
            }
        }
        ProgressCommand::Stats { range } => {
            let today = chrono::Utc::now().date_naive();
            let range = match range.as_str() {
                "7d" => DateRange::last_days(7, today),
                "30d" => DateRange::last_days(30, today),
                "all" => DateRange::all(),
                other => {
                    return Err(StudyError::Invalid(format!("unknown range {:?}", other)));
                }
            };

            println!("Retention:     {:.1}%", stats::retention_rate(&conn, &range)?);
            println!(
                "Avg duration:  {:.0} ms",
                stats::avg_review_duration_ms(&conn, &range)?
            );
            println!(
                "MCQ accuracy:  {:.1}%",
                stats::mcq_accuracy_rate(&conn, &range, None, None)?
            );

            let by_type = stats::mcq_stats_by_type(&conn, &range)?;
            println!(
                "  vocab {:.1}% ({}/{})  kanji {:.1}% ({}/{})",
                by_type.vocab.accuracy(),
                by_type.vocab.correct,
                by_type.vocab.total,
                by_type.kanji.accuracy(),
                by_type.kanji.correct,
                by_type.kanji.total
            );

            let distribution = stats::mcq_option_distribution(&conn, &range)?;
            println!(
                "Picked options: A {}  B {}  C {}  D {}",
                distribution[0], distribution[1], distribution[2], distribution[3]
            );

            let daily = stats::daily_review_counts(&conn, &range)?;
            if !daily.is_empty() {
                println!("\nReviews per day:");
                for (day, count) in daily {
                    println!("  {}  {}", day, count);
                }
            }

            let top = stats::most_reviewed(&conn, 5)?;
            if !top.is_empty() {
                println!("\nMost reviewed:");
                for entry in top {
                    println!(
                        "  {}  ({}, {} reviews)",
                        entry.surface,
                        entry.item_kind.as_str(),
                        entry.review_count
                    );
                }
            }
        }
    }
    Ok(())
}
