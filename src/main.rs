use anyhow::{bail, Context};
use clap::{value_parser, Args, Parser, Subcommand};
use reqwest::Url;
use std::env;
use std::io::{self, BufRead, Write};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use records_admin::config::{
    parse_api_url, DEFAULT_API_URL, DEFAULT_DEBOUNCE_MS, DEFAULT_NOTIFICATION_SECS, DEFAULT_PAGE_SIZE,
};
use records_admin::form::{EditSession, FormOutcome};
use records_admin::models::{Course, Page, Student, SLOTS};
use records_admin::notify::LogNotifier;
use records_admin::scores::{self, RemoveOutcome};
use records_admin::{Config, HttpGateway, PagedList, ScoreMatrix, SearchState};

#[derive(Parser)]
#[command(name = "records-admin", about = "Manage students, courses and exam scores")]
struct Cli {
    /// Gateway base URL
    #[arg(long, env = "RECORDS_API_URL", default_value = DEFAULT_API_URL, value_parser = parse_api_url)]
    api_url: Url,
    /// Rows per list page
    #[arg(long, env = "RECORDS_PAGE_SIZE", default_value_t = DEFAULT_PAGE_SIZE,
          value_parser = value_parser!(u32).range(1..))]
    page_size: u32,
    /// Quiet period before typed search text is sent
    #[arg(long, env = "RECORDS_SEARCH_DEBOUNCE_MS", default_value_t = DEFAULT_DEBOUNCE_MS,
          value_parser = value_parser!(u64).range(1..))]
    debounce_ms: u64,
    /// How long an error notification stays up
    #[arg(long, env = "RECORDS_NOTIFICATION_SECS", default_value_t = DEFAULT_NOTIFICATION_SECS,
          value_parser = value_parser!(i64).range(1..))]
    notification_secs: i64,
    #[command(subcommand)]
    command: Command,
}

impl Cli {
    fn config(&self) -> Config {
        Config {
            api_url: self.api_url.clone(),
            page_size: self.page_size,
            debounce: Duration::from_millis(self.debounce_ms),
            notification_secs: self.notification_secs,
        }
    }
}

#[derive(Subcommand)]
enum Command {
    /// Show dashboard statistics
    Dashboard,
    #[command(subcommand)]
    Students(StudentCmd),
    #[command(subcommand)]
    Courses(CourseCmd),
    #[command(subcommand)]
    Results(ResultCmd),
    #[command(subcommand)]
    Scores(ScoreCmd),
}

#[derive(Args)]
struct ListArgs {
    #[arg(long, default_value_t = 0)]
    page: u32,
    #[arg(long)]
    size: Option<u32>,
    #[arg(long, default_value = "")]
    search: String,
}

#[derive(Args)]
struct StudentFields {
    #[arg(long)]
    full_name: Option<String>,
    #[arg(long)]
    number: Option<i32>,
    #[arg(long)]
    email: Option<String>,
    #[arg(long)]
    gsm: Option<String>,
}

#[derive(Subcommand)]
enum StudentCmd {
    List(ListArgs),
    Get { id: i64 },
    Create {
        #[arg(long)]
        full_name: String,
        #[arg(long)]
        number: i32,
        #[arg(long)]
        email: String,
        #[arg(long)]
        gsm: Option<String>,
    },
    Update {
        id: i64,
        #[command(flatten)]
        fields: StudentFields,
    },
    Delete {
        id: i64,
        #[arg(long)]
        yes: bool,
    },
}

#[derive(Subcommand)]
enum CourseCmd {
    List(ListArgs),
    Create { name: String },
    Rename { id: i64, name: String },
    Delete {
        id: i64,
        #[arg(long)]
        yes: bool,
    },
}

#[derive(Subcommand)]
enum ResultCmd {
    List(ListArgs),
}

#[derive(Subcommand)]
enum ScoreCmd {
    /// Show a student's score grid
    Show { student_id: i64 },
    /// Set one slot (1-3); an empty value clears it. Adds the course row if missing.
    Set {
        student_id: i64,
        course_id: i64,
        slot: usize,
        value: String,
    },
    /// Drop a course row, deleting its saved scores
    RemoveCourse {
        student_id: i64,
        course_id: i64,
        #[arg(long)]
        yes: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            env::var("RUST_LOG").unwrap_or_else(|_| "records_admin=info".into()),
        ))
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();

    let cli = Cli::parse();
    let config = cli.config();
    tracing::debug!(api_url = %config.api_url, page_size = config.page_size, "config loaded");
    let gateway = HttpGateway::new(&config, Arc::new(LogNotifier))?;

    match cli.command {
        Command::Dashboard => dashboard(&gateway).await,
        Command::Students(cmd) => students(&gateway, &config, cmd).await,
        Command::Courses(cmd) => courses(&gateway, &config, cmd).await,
        Command::Results(ResultCmd::List(args)) => {
            let (seq, query) = list_query(&config, &args);
            let page = gateway.list_exam_results(&query).await?;
            let list = paged(seq, page);
            println!("{:<6} {:<24} {:>8}  {:<20} {:>5}", "ID", "STUDENT", "NUMBER", "COURSE", "SCORE");
            for r in list.items() {
                println!(
                    "{:<6} {:<24} {:>8}  {:<20} {:>5}",
                    r.id, r.student_name, r.student_number, r.course_name, r.score
                );
            }
            println!("{} of {} results", list.items().len(), list.total());
            Ok(())
        }
        Command::Scores(cmd) => score_cmd(&gateway, cmd).await,
    }
}

fn list_query(config: &Config, args: &ListArgs) -> (u64, records_admin::ListQuery) {
    let mut state = SearchState::new(config.page_size);
    state.input(&args.search);
    let query = state.page_change(args.page, args.size.unwrap_or(config.page_size));
    (query.seq, query)
}

fn paged<T>(seq: u64, page: Page<T>) -> PagedList<T> {
    let mut list = PagedList::new();
    list.apply(seq, page);
    list
}

fn confirm(prompt: &str, assume_yes: bool) -> anyhow::Result<bool> {
    if assume_yes {
        return Ok(true);
    }
    print!("{prompt} [y/N] ");
    io::stdout().flush()?;
    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;
    Ok(matches!(line.trim(), "y" | "Y" | "yes"))
}

async fn dashboard(gateway: &HttpGateway) -> anyhow::Result<()> {
    let stats = gateway.dashboard_stats().await?;
    println!("Students:      {}", stats.total_students);
    println!("Courses:       {}", stats.total_courses);
    println!("Exam results:  {}", stats.total_exam_results);
    println!("Average score: {:.2}", stats.average_score);
    println!(
        "Pairs:         {} completed, {} in progress",
        stats.completed_pairs, stats.in_progress_pairs
    );

    println!("\nScore distribution");
    let dist = stats.score_distribution;
    for (label, count) in dist.buckets() {
        let bar = "#".repeat((dist.percent(count) / 5.0).round() as usize);
        println!("{label:>7} {count:>5} {bar}");
    }

    println!("\nTop students");
    for t in &stats.top_students {
        println!("  {:<24} {:>6.2}", t.full_name, t.average_score);
    }
    println!("\nRecent results");
    for r in &stats.recent_results {
        println!("  {:<24} {:<20} {:>4}  {}", r.student_name, r.course_name, r.score, r.created_at);
    }
    Ok(())
}

fn apply_fields(draft: &mut Student, fields: StudentFields) {
    if let Some(v) = fields.full_name {
        draft.full_name = v;
    }
    if let Some(v) = fields.number {
        draft.number = v;
    }
    if let Some(v) = fields.email {
        draft.email = v;
    }
    if let Some(v) = fields.gsm {
        draft.gsm_number = Some(v);
    }
}

async fn students(gateway: &HttpGateway, config: &Config, cmd: StudentCmd) -> anyhow::Result<()> {
    match cmd {
        StudentCmd::List(args) => {
            let (seq, query) = list_query(config, &args);
            let list = paged(seq, gateway.list_students(&query).await?);
            println!("{:<6} {:>8}  {:<24} {:<28} {}", "ID", "NUMBER", "NAME", "EMAIL", "COMPLETED");
            for s in list.items() {
                let completed = s
                    .completed_courses
                    .iter()
                    .flatten()
                    .map(|c| format!("{} ({:.2})", c.course_name, c.average))
                    .collect::<Vec<_>>()
                    .join(", ");
                println!(
                    "{:<6} {:>8}  {:<24} {:<28} {}",
                    s.id.unwrap_or_default(),
                    s.number,
                    s.full_name,
                    s.email,
                    completed
                );
            }
            println!("{} of {} students", list.items().len(), list.total());
        }
        StudentCmd::Get { id } => {
            let s = gateway.get_student(id).await.with_context(|| format!("student {id}"))?;
            println!("{} (#{})", s.full_name, s.number);
            println!("Email: {}", s.email);
            println!("Phone: {}", s.gsm_number.as_deref().unwrap_or("-"));
        }
        StudentCmd::Create {
            full_name,
            number,
            email,
            gsm,
        } => {
            let mut session = EditSession::<Student>::default();
            session.start_create();
            if let Some(draft) = session.draft_mut() {
                draft.full_name = full_name;
                draft.number = number;
                draft.email = email;
                draft.gsm_number = gsm;
            }
            if let FormOutcome::Submitted(student) = session.submit()? {
                let created = gateway.create_student(&student).await?;
                println!("Student created (id {})", created.id.unwrap_or_default());
            }
        }
        StudentCmd::Update { id, fields } => {
            let current = gateway.get_student(id).await.with_context(|| format!("student {id}"))?;
            let mut session = EditSession::default();
            session.start_edit(&current);
            if let Some(draft) = session.draft_mut() {
                apply_fields(draft, fields);
            }
            if let FormOutcome::Submitted(student) = session.submit()? {
                gateway.update_student(id, &student).await?;
                println!("Student updated");
            }
        }
        StudentCmd::Delete { id, yes } => {
            if confirm(&format!("Delete student {id}?"), yes)? {
                gateway.delete_student(id).await?;
                println!("Student deleted");
            }
        }
    }
    Ok(())
}

async fn courses(gateway: &HttpGateway, config: &Config, cmd: CourseCmd) -> anyhow::Result<()> {
    match cmd {
        CourseCmd::List(args) => {
            let (seq, query) = list_query(config, &args);
            let list = paged(seq, gateway.list_courses(&query).await?);
            for c in list.items() {
                println!("{:<6} {}", c.id.unwrap_or_default(), c.name);
            }
            println!("{} of {} courses", list.items().len(), list.total());
        }
        CourseCmd::Create { name } => {
            let mut session = EditSession::<Course>::default();
            session.start_create();
            if let Some(draft) = session.draft_mut() {
                draft.name = name;
            }
            if let FormOutcome::Submitted(course) = session.submit()? {
                let created = gateway.create_course(&course).await?;
                println!("Course created (id {})", created.id.unwrap_or_default());
            }
        }
        CourseCmd::Rename { id, name } => {
            let mut session = EditSession::default();
            session.start_edit(&Course { id: Some(id), name });
            if let FormOutcome::Submitted(course) = session.submit()? {
                gateway.update_course(id, &course).await?;
                println!("Course updated");
            }
        }
        CourseCmd::Delete { id, yes } => {
            if confirm(&format!("Delete course {id}?"), yes)? {
                gateway.delete_course(id).await?;
                println!("Course deleted");
            }
        }
    }
    Ok(())
}

fn print_grid(matrix: &ScoreMatrix) {
    println!("{:<24} {:>7} {:>7} {:>7} {:>8}", "COURSE", "SCORE 1", "SCORE 2", "SCORE 3", "AVERAGE");
    for row in matrix.rows() {
        let cells: Vec<String> = row
            .scores
            .iter()
            .map(|s| s.score.map(|v| v.to_string()).unwrap_or_else(|| "-".into()))
            .collect();
        let avg = scores::average(row)
            .map(|a| format!("{a:.1}"))
            .unwrap_or_else(|| "-".into());
        let done = scores::completed_average(row)
            .map(|a| format!("  completed ({a:.2})"))
            .unwrap_or_default();
        println!(
            "{:<24} {:>7} {:>7} {:>7} {:>8}{}",
            row.course_name, cells[0], cells[1], cells[2], avg, done
        );
    }
}

async fn score_cmd(gateway: &HttpGateway, cmd: ScoreCmd) -> anyhow::Result<()> {
    match cmd {
        ScoreCmd::Show { student_id } => {
            let student = gateway.get_student(student_id).await?;
            let mut matrix = ScoreMatrix::new(student_id);
            matrix.fetch(gateway).await?;
            println!("Scores for {}", student.full_name);
            if matrix.rows().is_empty() {
                println!("No courses added yet.");
            } else {
                print_grid(&matrix);
            }
        }
        ScoreCmd::Set {
            student_id,
            course_id,
            slot,
            value,
        } => {
            if !(1..=SLOTS).contains(&slot) {
                bail!("slot must be between 1 and {SLOTS}");
            }
            let mut matrix = ScoreMatrix::new(student_id);
            matrix.fetch(gateway).await?;
            if !matrix.rows().iter().any(|r| r.course_id == course_id) {
                let course = gateway.get_course(course_id).await.with_context(|| format!("course {course_id}"))?;
                matrix.add_course(&course);
            }
            let index = matrix
                .rows()
                .iter()
                .position(|r| r.course_id == course_id)
                .context("course row missing")?;
            matrix.set_score(index, slot - 1, Some(value.as_str()))?;
            if matrix.has_invalid_scores() {
                bail!("score must be a number between 0 and 100");
            }
            if !matrix.is_dirty() {
                println!("Nothing to save");
                return Ok(());
            }
            matrix.save(gateway).await?;
            println!("Scores saved successfully");
            print_grid(&matrix);
        }
        ScoreCmd::RemoveCourse {
            student_id,
            course_id,
            yes,
        } => {
            let mut matrix = ScoreMatrix::new(student_id);
            matrix.fetch(gateway).await?;
            let Some(index) = matrix.rows().iter().position(|r| r.course_id == course_id) else {
                bail!("student {student_id} has no scores for course {course_id}");
            };
            let prompt = format!(
                "Remove {}? Existing scores will be deleted.",
                matrix.rows()[index].course_name
            );
            let accepted = confirm(&prompt, yes)?;
            match matrix.remove_course(index, gateway, |_| accepted).await? {
                RemoveOutcome::Cancelled => println!("Kept"),
                _ => println!("Course removed"),
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn flags_override_defaults() {
        let cli = Cli::try_parse_from([
            "records-admin",
            "--api-url",
            "https://records.example.edu/api",
            "--page-size",
            "25",
            "dashboard",
        ])
        .unwrap();
        let config = cli.config();
        assert_eq!(config.api_url.as_str(), "https://records.example.edu/api");
        assert_eq!(config.page_size, 25);
    }

    #[test]
    fn rejects_zero_page_size_and_bad_url() {
        assert!(Cli::try_parse_from(["records-admin", "--page-size", "0", "dashboard"]).is_err());
        assert!(Cli::try_parse_from(["records-admin", "--api-url", "ftp://host/api", "dashboard"]).is_err());
    }

    #[test]
    fn student_create_requires_number() {
        let args = ["records-admin", "students", "create", "--full-name", "Ann Lee", "--email", "ann@example.com"];
        assert!(Cli::try_parse_from(args).is_err());

        let cli = Cli::try_parse_from(
            args.iter().copied().chain(["--number", "1001"]),
        )
        .unwrap();
        assert!(matches!(
            cli.command,
            Command::Students(StudentCmd::Create { number: 1001, .. })
        ));
    }
}
