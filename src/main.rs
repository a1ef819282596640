use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use log::{error, LevelFilter};
use std::io::{self, Write};
use std::path::PathBuf;
use study_portal::commands::{self, AppState};
use study_portal::config::{AppConfig, ENV_LOG};
use study_portal::services::{DatabaseService, LlmClient};

#[derive(Parser)]
#[command(name = "study-portal")]
#[command(about = "AI-assisted quiz practice for B.Sc. Computer Science students")]
#[command(version)]
struct Cli {
    /// Override the database path
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List subjects from the imported syllabus
    Subjects {
        #[arg(long)]
        json: bool,
    },
    /// Import a syllabus JSON file (semester -> course code -> course)
    ImportSyllabus {
        path: PathBuf,
    },
    /// Generate a quiz and answer it interactively
    Quiz {
        /// Student taking the quiz
        #[arg(short, long)]
        student: String,

        /// Subject (defaults to the first subject in the catalog)
        #[arg(long)]
        subject: Option<String>,

        #[arg(long)]
        json: bool,
    },
    /// Show quiz history for a student
    History {
        #[arg(short, long)]
        student: String,

        /// Show a single past result
        #[arg(long)]
        show: Option<String>,

        #[arg(long)]
        json: bool,
    },
    /// Chat with the AI tutor about the syllabus
    Tutor {
        /// Student name used to address the student
        #[arg(short, long)]
        student: String,

        /// Restrict the syllabus context to one subject
        #[arg(long)]
        subject: Option<String>,
    },
    /// Generate a code solution and explanation for a lab exercise
    CodeSolution {
        /// Exercise description, including the programming language
        description: Option<String>,

        /// Take the exercise from this subject's syllabus
        #[arg(long, requires = "exercise")]
        subject: Option<String>,

        /// Exercise number within the subject (starting at 1)
        #[arg(long, requires = "subject")]
        exercise: Option<usize>,

        #[arg(long)]
        json: bool,
    },
    /// Generate a 7-day study plan for difficult subjects
    StudyPlan {
        /// Difficult subjects (defaults to the student's unpassed subjects)
        subjects: Vec<String>,

        #[arg(short, long)]
        student: Option<String>,

        #[arg(long)]
        json: bool,
    },
    /// Generate likely questions, revision notes and a model answer
    ExamStrategy {
        /// Subject (defaults to the first subject in the catalog)
        #[arg(long)]
        subject: Option<String>,

        #[arg(long)]
        json: bool,
    },
    /// Check that the inference server is reachable
    Health,
}

fn setup_logger() -> Result<(), fern::InitError> {
    let level = std::env::var(ENV_LOG)
        .ok()
        .and_then(|v| v.parse::<LevelFilter>().ok())
        .unwrap_or(LevelFilter::Info);

    fern::Dispatch::new()
        .format(|out, message, record| {
            out.finish(format_args!(
                "[{} {} {}] {}",
                chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
                record.level(),
                record.target(),
                message
            ))
        })
        .level(level)
        .level_for("reqwest", LevelFilter::Warn)
        .level_for("hyper_util", LevelFilter::Warn)
        .chain(io::stderr())
        .apply()?;
    Ok(())
}

async fn run(cli: Cli) -> Result<()> {
    let mut config = AppConfig::from_env();
    if let Some(db) = cli.db {
        config.database_path = db;
    }

    let stdout = io::stdout();
    let mut out = stdout.lock();

    if let Commands::Health = cli.command {
        let client = LlmClient::new(config.llm.clone())?;
        if client.is_healthy().await {
            writeln!(out, "Inference server at {} is healthy", config.llm.base_url)?;
            return Ok(());
        }
        anyhow::bail!("Inference server at {} is not reachable", config.llm.base_url);
    }

    let db = DatabaseService::open(&config.database_path).with_context(|| {
        format!("Failed to open database at {}", config.database_path.display())
    })?;
    let state = AppState::new(db, config);

    match cli.command {
        Commands::Subjects { json } => {
            commands::list_subjects(&state, json, &mut out)?;
        }
        Commands::ImportSyllabus { path } => {
            let imported = commands::import_syllabus_file(&state, &path)?;
            writeln!(out, "Imported {} courses", imported)?;
        }
        Commands::Quiz {
            student,
            subject,
            json,
        } => {
            let client = LlmClient::new(state.config.llm.clone())?;
            let stdin = io::stdin();
            let mut input = stdin.lock();
            let result =
                commands::run_quiz(&state, &client, &student, subject, &mut input, &mut out)
                    .await?;
            if json {
                writeln!(out, "{}", serde_json::to_string_pretty(&result)?)?;
            }
        }
        Commands::History {
            student,
            show,
            json,
        } => match show {
            Some(id) => {
                let result = commands::show_result(&state, &student, &id, &mut out)?;
                if json {
                    writeln!(out, "{}", serde_json::to_string_pretty(&result)?)?;
                }
            }
            None => {
                commands::show_history(&state, &student, json, &mut out)?;
            }
        },
        Commands::Tutor { student, subject } => {
            let client = LlmClient::new(state.config.llm.clone())?;
            let stdin = io::stdin();
            let mut input = stdin.lock();
            commands::run_tutor(&state, &client, &student, subject.as_deref(), &mut input, &mut out)
                .await?;
        }
        Commands::CodeSolution {
            description,
            subject,
            exercise,
            json,
        } => {
            let description = match (description, subject, exercise) {
                (_, Some(subject), Some(number)) => {
                    commands::resolve_exercise(&state, &subject, number)?
                }
                (Some(description), _, _) => description,
                _ => anyhow::bail!("Provide an exercise description or --subject with --exercise"),
            };
            let client = LlmClient::new(state.config.llm.clone())?;
            commands::code_solution(&client, &description, json, &mut out).await?;
        }
        Commands::StudyPlan {
            subjects,
            student,
            json,
        } => {
            let client = LlmClient::new(state.config.llm.clone())?;
            commands::study_plan(&state, &client, subjects, student.as_deref(), json, &mut out)
                .await?;
        }
        Commands::ExamStrategy { subject, json } => {
            let client = LlmClient::new(state.config.llm.clone())?;
            commands::exam_strategy(&state, &client, subject, json, &mut out).await?;
        }
        Commands::Health => {}
    }

    Ok(())
}

#[tokio::main]
async fn main() {
    dotenv::dotenv().ok();
    let cli = Cli::parse();

    if let Err(e) = setup_logger() {
        eprintln!("Failed to initialize logger: {}", e);
    }

    if let Err(e) = run(cli).await {
        error!("{:#}", e);
        std::process::exit(1);
    }
}
