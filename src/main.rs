use anyhow::Result;
use clap::{Parser, Subcommand};
use problum_client::{AuthenticatedClient, LearningApi};
use problum_config::{Config, LogFormat};
use serde::Serialize;
use std::{path::PathBuf, sync::Arc};

#[derive(Parser, Debug)]
#[command(name = "problum", about = "problum: learning platform API client")]
struct Cli {
    /// Path to the YAML configuration file.
    #[arg(short, long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,
    /// Override the API base URL.
    #[arg(long, global = true)]
    base_url: Option<String>,
    /// Account login.
    #[arg(long, env = "PROBLUM_LOGIN", global = true)]
    login: Option<String>,
    /// Account password.
    #[arg(long, env = "PROBLUM_PASSWORD", hide_env_values = true, global = true)]
    password: Option<String>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List courses.
    Courses,
    /// Show one course with its lessons.
    Course { id: u64 },
    /// Show a lesson.
    Lesson { course_id: u64, lesson_id: u64 },
    /// Show a problem and its starter template.
    Problem {
        course_id: u64,
        problem_id: u64,
        /// Template language.
        #[arg(short, long, default_value = "go")]
        language: String,
    },
    /// Submit a solution file.
    Submit {
        course_id: u64,
        problem_id: u64,
        #[arg(short, long)]
        language: String,
        /// Source file to submit.
        #[arg(short, long, value_name = "FILE")]
        file: PathBuf,
    },
    /// Show one attempt.
    Attempt { id: u64 },
    /// List attempts, for one problem or for the whole account.
    Attempts {
        #[arg(long, requires = "problem")]
        course: Option<u64>,
        #[arg(long, requires = "course")]
        problem: Option<u64>,
    },
    /// Enroll in a course.
    Enroll { course_id: u64 },
    /// Show the logged-in user.
    Profile,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = Config::load(cli.config.as_deref())
        .map_err(|e| anyhow::anyhow!("config error: {e}"))?;
    if let Some(url) = cli.base_url.clone() {
        config.base_url = url;
    }
    init_tracing(&config);

    let api = connect(&cli, &config).await?;
    let outcome = run(&api, cli.command).await;
    api.client().logout().await;
    outcome
}

fn init_tracing(config: &Config) {
    use tracing_subscriber::EnvFilter;
    use tracing_subscriber::fmt;

    let filter = EnvFilter::try_new(&config.log.level).unwrap_or_else(|_| EnvFilter::new("info"));
    // stdout carries command output.
    match config.log.format {
        LogFormat::Json => fmt::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .json()
            .init(),
        LogFormat::Text => fmt::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init(),
    }
}

async fn connect(cli: &Cli, config: &Config) -> Result<LearningApi> {
    let client = AuthenticatedClient::from_config(config)?;
    client.subscribe(Arc::new(|| {
        tracing::error!("session expired, log in again");
    }));

    match (&cli.login, &cli.password) {
        (Some(login), Some(password)) => client
            .login(login, password)
            .await
            .map_err(|e| anyhow::anyhow!("login failed: {e}"))?,
        _ => anyhow::bail!("--login and --password are required"),
    }
    Ok(LearningApi::new(client))
}

async fn run(api: &LearningApi, command: Commands) -> Result<()> {
    match command {
        Commands::Courses => print(&api.courses().await?),
        Commands::Course { id } => print(&api.course(id).await?),
        Commands::Lesson {
            course_id,
            lesson_id,
        } => print(&api.lesson(course_id, lesson_id).await?),
        Commands::Problem {
            course_id,
            problem_id,
            language,
        } => print(&api.problem(course_id, problem_id, &language).await?),
        Commands::Submit {
            course_id,
            problem_id,
            language,
            file,
        } => {
            let code = std::fs::read_to_string(&file)
                .map_err(|e| anyhow::anyhow!("cannot read {}: {e}", file.display()))?;
            let resp = api
                .submit_attempt(course_id, problem_id, &language, &code)
                .await?;
            tracing::info!(attempt_id = resp.attempt_id, "submitted");
            print(&resp)
        }
        Commands::Attempt { id } => print(&api.attempt(id).await?),
        Commands::Attempts {
            course: Some(course_id),
            problem: Some(problem_id),
        } => print(&api.attempts_for_problem(course_id, problem_id).await?),
        Commands::Attempts { .. } => print(&api.attempts_for_user().await?),
        Commands::Enroll { course_id } => {
            api.enroll(course_id).await?;
            eprintln!("enrolled in course {course_id}");
            Ok(())
        }
        Commands::Profile => print(&api.profile().await?),
    }
}

fn print<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
