use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use grammar_worksheets::config::{load_config_from_file, Config, DEFAULT_CONFIG_FILE};
use grammar_worksheets::generation::{generate_worksheet, LessonRequest};
use grammar_worksheets::llm::OpenAiClient;
use grammar_worksheets::parsing::cleaner::clean_lesson_text;
use grammar_worksheets::parsing::sections::parse_lesson_sections;
use grammar_worksheets::render::{document_filename, layout, render_pdf};
use grammar_worksheets::store::{save_generated_lesson, JsonLessonStore, LessonStore};
use grammar_worksheets::types::worksheet_data::{ExpectedCounts, ValidationResult, ACTIVITY_ORDINALS};
use grammar_worksheets::validation::validate_counts;

#[derive(Parser, Debug)]
#[command(name = "worksheets", about = "Generate, repair and file grammar worksheets", version)]
struct Cli {
    #[arg(long, global = true, help = "Path to the TOML config file")]
    config: Option<PathBuf>,

    #[arg(long, global = true, help = "Enable debug logging")]
    debug: bool,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Generate a worksheet with the configured model
    Generate {
        #[arg(long)]
        grade: u32,
        #[arg(long, help = "One topic, or several separated by commas")]
        topic: String,
        #[arg(long)]
        subject: Option<String>,
        #[arg(long, help = "Numbered items per activity")]
        questions: Option<u32>,
        #[arg(long, help = "Do not store the finished worksheet")]
        no_save: bool,
        #[arg(long, value_name = "FILE", help = "Also write the worksheet as a PDF")]
        output: Option<PathBuf>,
    },
    /// List stored worksheets, newest first
    List,
    Show {
        id: i64,
    },
    Search {
        keyword: String,
    },
    Delete {
        id: i64,
    },
    /// Write a stored worksheet as a PDF
    Render {
        id: i64,
        #[arg(long, value_name = "FILE")]
        output: Option<PathBuf>,
    },
    /// Clean and validate a saved raw model response without calling the model
    Clean {
        #[arg(long)]
        subject: Option<String>,
        #[arg(long)]
        topic: String,
        #[arg(long)]
        questions: Option<u32>,
        file: PathBuf,
    },
}

fn init_tracing(debug: bool) {
    let filter = if debug {
        EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("debug,reqwest=info,hyper=info"))
    } else {
        EnvFilter::new("info,reqwest=warn,hyper=warn")
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(path) => {
            let path = path.to_string_lossy();
            Ok(load_config_from_file(&path)?)
        }
        None if Path::new(DEFAULT_CONFIG_FILE).exists() => Ok(load_config_from_file(DEFAULT_CONFIG_FILE)?),
        None => {
            info!("No {} found, using default settings", DEFAULT_CONFIG_FILE);
            Ok(Config::default())
        }
    }
}

fn print_validation(validation: &ValidationResult) {
    for check in &validation.activities {
        println!(
            "Activity {}: {} of {} items{}",
            check.ordinal,
            check.actual,
            check.expected,
            if check.matches { "" } else { "  (mismatch)" }
        );
    }
    let s = &validation.summary;
    println!(
        "{}/{} activities match, {} of {} items",
        s.matching_activities,
        ACTIVITY_ORDINALS.len(),
        s.total_actual,
        s.total_expected
    );
}

fn write_pdf(lesson_text: &str, grade: u32, topics: &[String], output: Option<PathBuf>) -> Result<PathBuf> {
    let path = output.unwrap_or_else(|| PathBuf::from(document_filename(grade, topics)));
    let bytes = render_pdf(&layout(lesson_text, grade, topics))?;
    fs::write(&path, bytes).with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(path)
}

fn run_generate(
    config: &Config,
    store: &mut JsonLessonStore,
    request: LessonRequest,
    no_save: bool,
    output: Option<PathBuf>,
) -> Result<()> {
    let client = OpenAiClient::from_env(&config.llm)?;
    let result = generate_worksheet(client, &request, config.generation.max_repair_attempts)?;

    for warning in &result.warnings {
        warn!("{}", warning);
    }
    println!("{}", result.lesson_text);
    println!();
    print_validation(&result.final_validation);

    if !no_save {
        if let Some(id) = save_generated_lesson(store, &result.topics, request.grade, &result.lesson_text) {
            println!("Saved lesson {}", id);
        }
    }
    if output.is_some() {
        let path = write_pdf(&result.lesson_text, request.grade, &result.topics, output)?;
        println!("Wrote {}", path.display());
    }
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.debug);

    let config = load_config(cli.config.as_deref())?;
    let mut store = JsonLessonStore::new(&config.store.path);

    match cli.cmd {
        Command::Generate { grade, topic, subject, questions, no_save, output } => {
            let request = LessonRequest {
                grade,
                subject: subject.unwrap_or_else(|| config.generation.subject.clone()),
                topic,
                questions_per_section: questions.unwrap_or(config.generation.questions_per_section),
            };
            run_generate(&config, &mut store, request, no_save, output)
        }
        Command::List => {
            let lessons = store.list()?;
            if lessons.is_empty() {
                println!("No lessons stored in {}", store.path().display());
            }
            for lesson in lessons {
                println!(
                    "{:>4}  grade {:<2}  {}  {}",
                    lesson.id,
                    lesson.grade,
                    lesson.date_generated,
                    lesson.topics.join(", ")
                );
            }
            Ok(())
        }
        Command::Show { id } => match store.get(id)? {
            Some(record) => {
                println!("{}", record.lesson_text);
                Ok(())
            }
            None => bail!("Lesson {} not found", id),
        },
        Command::Search { keyword } => {
            for record in store.search(&keyword)? {
                println!("{:>4}  grade {:<2}  {}", record.id, record.grade, record.topics.join(", "));
            }
            Ok(())
        }
        Command::Delete { id } => {
            if !store.delete(id)? {
                bail!("Lesson {} not found", id);
            }
            println!("Deleted lesson {}", id);
            Ok(())
        }
        Command::Render { id, output } => {
            let record = store.get(id)?.with_context(|| format!("Lesson {} not found", id))?;
            let path = write_pdf(&record.lesson_text, record.grade, &record.topics, output)?;
            println!("Wrote {}", path.display());
            Ok(())
        }
        Command::Clean { subject, topic, questions, file } => {
            let raw = fs::read_to_string(&file)
                .with_context(|| format!("Failed to read {}", file.display()))?;
            let subject = subject.unwrap_or_else(|| config.generation.subject.clone());
            let expected = ExpectedCounts::uniform(questions.unwrap_or(config.generation.questions_per_section));
            let cleaned = clean_lesson_text(&raw, &subject, &topic);
            let validation = validate_counts(&parse_lesson_sections(&cleaned), &expected);
            println!("{}", cleaned);
            println!();
            print_validation(&validation);
            Ok(())
        }
    }
}
