use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, ValueEnum};
use serde::Serialize;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

use exam_invite::access::{self, Role, Route};
use exam_invite::api::types::{format_minute, Candidate, PaperPhase, RegisterRequest};
use exam_invite::api::ApiClient;
use exam_invite::candidates::{CandidateView, PageInfo};
use exam_invite::config::{ConsoleConfig, DEFAULT_BASE_URL};
use exam_invite::dashboard::{self, card};
use exam_invite::dispatch::{
    ConflictNotice, DispatchOutcome, DispatchReport, DispatchSummary, Dispatcher, RunState,
};
use exam_invite::error::{ConsoleError, Result};
use exam_invite::roster::{Roster, RosterRow};
use exam_invite::session::{Session, SessionStore};

#[derive(Parser, Debug)]
#[command(name = "exam-invite")]
#[command(version)]
#[command(about = "Recruitment console: send exam invitations and follow candidates")]
#[command(propagate_version = true)]
struct Args {
    #[command(flatten)]
    global: GlobalArgs,

    #[command(subcommand)]
    command: Commands,
}

// =============================================================================
// Global Arguments
// =============================================================================

#[derive(Parser, Debug)]
struct GlobalArgs {
    /// Backend base URL
    #[arg(long, global = true, env = "EXAM_INVITE_BASE_URL", default_value = DEFAULT_BASE_URL)]
    base_url: String,

    /// Where the login session is stored (default: ~/.exam-invite/session)
    #[arg(long, global = true, env = "EXAM_INVITE_SESSION_FILE")]
    session_file: Option<PathBuf>,

    /// Per-request timeout in seconds
    #[arg(long, global = true, default_value = "30")]
    timeout: u64,

    /// Output format
    #[arg(long, short = 'o', global = true, default_value = "table")]
    output: OutputFormat,
}

#[derive(Debug, Clone, ValueEnum)]
enum OutputFormat {
    Table,
    Json,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Log in and store the session
    Login {
        #[arg(long, short = 'u')]
        username: String,

        #[arg(long, short = 'p', env = "EXAM_INVITE_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// Forget the stored session
    Logout,
    /// Show who the stored session belongs to
    Whoami,
    /// Register a new account (administrators only)
    Register(RegisterArgs),
    /// Account balance, candidate counts and profile
    Dashboard,
    /// Exam papers
    Papers {
        #[command(subcommand)]
        command: PaperCommands,
    },
    /// Send exam invitations to a list of candidates
    Invite(InviteArgs),
    /// Candidate pipeline
    Candidates {
        #[command(subcommand)]
        command: CandidateCommands,
    },
}

#[derive(Parser, Debug)]
struct RegisterArgs {
    #[arg(long)]
    username: String,

    #[arg(long, env = "EXAM_INVITE_NEW_PASSWORD", hide_env_values = true)]
    password: String,

    #[arg(long)]
    api_key: String,

    #[arg(long)]
    token: String,

    #[arg(long)]
    company: String,

    /// VENDOR, PMO, HR or ADMIN
    #[arg(long, default_value = "VENDOR")]
    role: Role,
}

#[derive(clap::Subcommand, Debug)]
enum PaperCommands {
    /// List the exam papers available to this account
    List,
}

#[derive(Parser, Debug)]
struct InviteArgs {
    /// Exam paper to invite candidates to
    #[arg(long)]
    paper: u64,

    /// Candidate as name:email or name:email:phone (repeatable)
    #[arg(long = "to", value_parser = parse_recipient)]
    to: Vec<RosterRow>,

    /// JSON file with an array of {"name", "email", "phone"} rows
    #[arg(long)]
    roster: Option<PathBuf>,

    /// Acknowledge already-invited candidates without prompting
    #[arg(long, short = 'y')]
    yes: bool,
}

#[derive(clap::Subcommand, Debug)]
enum CandidateCommands {
    /// List candidates one page at a time
    List {
        #[arg(long, default_value = "detail")]
        view: ViewArg,

        /// 1-based page number
        #[arg(long, default_value = "1")]
        page: u32,

        /// Fetch every page from --page onwards
        #[arg(long)]
        all: bool,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ViewArg {
    Overview,
    Detail,
    Pmo,
}

impl ViewArg {
    fn view(self) -> CandidateView {
        match self {
            ViewArg::Overview => CandidateView::Overview,
            ViewArg::Detail => CandidateView::Detail,
            ViewArg::Pmo => CandidateView::Pmo,
        }
    }

    fn route(self) -> Route {
        match self {
            ViewArg::Overview => Route::VendorDashboard,
            ViewArg::Detail => Route::Candidates,
            ViewArg::Pmo => Route::PmoCandidates,
        }
    }
}

// =============================================================================
// JSON Output Types
// =============================================================================

#[derive(Serialize)]
struct SessionOutput {
    subject: Option<String>,
    role: String,
    company: Option<String>,
    expires_at: Option<String>,
    landing: String,
    navigation: Vec<String>,
}

#[derive(Serialize)]
struct PaperOutput {
    id: u64,
    name: String,
    phase: &'static str,
    window: String,
    duration_minutes: Option<u32>,
    invited: Option<u64>,
    participants: Option<u64>,
    tested: Option<u64>,
}

#[derive(Serialize)]
struct RecipientOutput {
    id: u64,
    name: String,
    email: String,
    outcome: DispatchOutcome,
}

#[derive(Serialize)]
struct InviteOutput {
    paper_id: u64,
    final_state: String,
    calls_issued: usize,
    summary: DispatchSummary,
    recipients: Vec<RecipientOutput>,
    conflicts: Vec<ConflictNotice>,
}

#[derive(Serialize)]
struct CandidatePageOutput {
    page: PageInfo,
    total_elements: Option<u64>,
    candidates: Vec<Candidate>,
}

// =============================================================================
// Helper Functions
// =============================================================================

fn parse_recipient(s: &str) -> std::result::Result<RosterRow, String> {
    let parts: Vec<&str> = s.split(':').collect();
    match parts.as_slice() {
        [name, email] => Ok(RosterRow {
            name: name.to_string(),
            email: email.to_string(),
            phone: None,
        }),
        [name, email, phone] => Ok(RosterRow {
            name: name.to_string(),
            email: email.to_string(),
            phone: Some(phone.to_string()),
        }),
        _ => Err(format!("expected name:email or name:email:phone, got {s:?}")),
    }
}

fn phase_label(phase: PaperPhase) -> &'static str {
    match phase {
        PaperPhase::Open => "open",
        PaperPhase::InProgress => "in progress",
        PaperPhase::Finished => "finished",
    }
}

fn state_label(state: RunState) -> String {
    match state {
        RunState::Idle => "idle".to_string(),
        RunState::Validating => "validating".to_string(),
        RunState::InFlight { index, total } => format!("sending {}/{}", index + 1, total),
        RunState::HaltedAuth => "halted (not authorized)".to_string(),
        RunState::Completed => "completed".to_string(),
    }
}

fn truncate(s: &str, width: usize) -> String {
    if s.chars().count() > width {
        let cut: String = s.chars().take(width.saturating_sub(3)).collect();
        format!("{cut}...")
    } else {
        s.to_string()
    }
}

fn load_session(store: &SessionStore, route: Route) -> Result<Session> {
    let session = store.load()?;
    access::require(session.as_ref(), route)?;
    session.ok_or(ConsoleError::NotAuthenticated)
}

/// Wait for the live status task; a panic in it is logged, never fatal.
async fn join_printer(printer: tokio::task::JoinHandle<()>) -> bool {
    match printer.await {
        Ok(()) => true,
        Err(e) => {
            tracing::warn!(error = %e, "Live status printer failed");
            false
        }
    }
}

async fn read_line() -> Result<String> {
    let mut line = String::new();
    BufReader::new(tokio::io::stdin())
        .read_line(&mut line)
        .await?;
    Ok(line)
}

// =============================================================================
// Command Handlers
// =============================================================================

async fn handle_login(
    config: &ConsoleConfig,
    store: &SessionStore,
    username: &str,
    password: &str,
    output: &OutputFormat,
) -> Result<()> {
    let client = ApiClient::new(config)?;
    let jwt = client.login(username, password).await?;
    let session = Session::from_jwt(&jwt)?;
    store.save(&session)?;
    tracing::info!(role = %session.role(), path = %store.path().display(), "Session stored");
    print_session(&session, output)
}

fn print_session(session: &Session, output: &OutputFormat) -> Result<()> {
    let claims = session.claims();
    let profile = claims.role.profile();
    match output {
        OutputFormat::Json => {
            let out = SessionOutput {
                subject: claims.subject.clone(),
                role: claims.role.to_string(),
                company: claims.company.clone(),
                expires_at: claims.expires_at.map(|t| t.to_rfc3339()),
                landing: profile.landing.path().to_string(),
                navigation: profile
                    .navigation
                    .iter()
                    .map(|r| r.path().to_string())
                    .collect(),
            };
            println!("{}", serde_json::to_string_pretty(&out)?);
        }
        OutputFormat::Table => {
            println!(
                "User:    {}",
                claims.subject.as_deref().unwrap_or("(unknown)")
            );
            println!("Role:    {} ({})", claims.role, profile.label);
            if let Some(company) = &claims.company {
                println!("Company: {}", company);
            }
            println!("Expires: {}", format_minute(claims.expires_at));
            println!("Landing: {}", profile.landing);
            println!("Pages:");
            for route in profile.navigation {
                println!("  {:<16} {}", route.path(), route.title());
            }
        }
    }
    Ok(())
}

async fn handle_register(
    config: &ConsoleConfig,
    store: &SessionStore,
    args: RegisterArgs,
) -> Result<()> {
    let session = load_session(store, Route::Register)?;
    let client = ApiClient::new(config)?;
    let request = RegisterRequest {
        username: args.username,
        password: args.password,
        api_key: args.api_key,
        token: args.token,
        company: args.company,
        role: args.role,
    };
    let message = client.register(&session, &request).await?;
    println!("{}", message);
    Ok(())
}

async fn handle_dashboard(
    config: &ConsoleConfig,
    store: &SessionStore,
    output: &OutputFormat,
) -> Result<()> {
    let session = load_session(store, Route::VendorDashboard)?;
    let client = ApiClient::new(config)?;
    let snapshot = dashboard::load(&client, &session).await;

    match output {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&snapshot)?),
        OutputFormat::Table => {
            println!("Dashboard");
            println!("{}", "=".repeat(40));
            println!(
                "Balance:           {}",
                card(snapshot.balance.map(|m| format!("{m:.2}")))
            );
            println!("Not yet tested:    {}", card(snapshot.untested));
            println!("Test in progress:  {}", card(snapshot.progressing));
            println!();
            match (&snapshot.user, &snapshot.error) {
                (Some(user), _) => {
                    println!(
                        "Company:  {}",
                        user.company_name.as_deref().unwrap_or("N/A")
                    );
                    println!("Email:    {}", user.email.as_deref().unwrap_or("N/A"));
                    println!("Phone:    {}", user.phone.as_deref().unwrap_or("N/A"));
                    println!(
                        "Valid:    {} to {}",
                        format_minute(user.valid_begin_time),
                        format_minute(user.valid_end_time)
                    );
                }
                (None, Some(error)) => eprintln!("Error: {}", error),
                (None, None) => {}
            }
            for warning in &snapshot.warnings {
                eprintln!("Warning: {}", warning);
            }
        }
    }
    Ok(())
}

async fn handle_papers_list(
    config: &ConsoleConfig,
    store: &SessionStore,
    output: &OutputFormat,
) -> Result<()> {
    let session = load_session(store, Route::SendExam)?;
    let client = ApiClient::new(config)?;
    let papers = client.fetch_papers(&session).await?;

    match output {
        OutputFormat::Json => {
            let out: Vec<PaperOutput> = papers
                .iter()
                .map(|p| PaperOutput {
                    id: p.id,
                    name: p.paper_name.clone(),
                    phase: phase_label(p.phase()),
                    window: p.window(),
                    duration_minutes: p.duration,
                    invited: p.preset_user_count,
                    participants: p.person_total,
                    tested: p.test_count,
                })
                .collect();
            println!("{}", serde_json::to_string_pretty(&out)?);
        }
        OutputFormat::Table => {
            if papers.is_empty() {
                println!("No exam papers found.");
                return Ok(());
            }
            println!(
                "{:<8} {:<30} {:<12} {:<10} {:<8} WINDOW",
                "ID", "NAME", "PHASE", "DURATION", "TESTED"
            );
            println!("{}", "-".repeat(100));
            for paper in &papers {
                let duration = paper
                    .duration
                    .map(|d| format!("{d} min"))
                    .unwrap_or_else(|| "-".to_string());
                let tested = format!(
                    "{}/{}",
                    paper.test_count.unwrap_or(0),
                    paper.preset_user_count.unwrap_or(0)
                );
                println!(
                    "{:<8} {:<30} {:<12} {:<10} {:<8} {}",
                    paper.id,
                    truncate(&paper.paper_name, 30),
                    phase_label(paper.phase()),
                    duration,
                    tested,
                    paper.window()
                );
            }
        }
    }
    Ok(())
}

async fn handle_invite(
    config: &ConsoleConfig,
    store: &SessionStore,
    args: InviteArgs,
    output: &OutputFormat,
) -> Result<()> {
    let session = load_session(store, Route::SendExam)?;
    let client = ApiClient::new(config)?;

    let mut roster = match &args.roster {
        Some(path) => Roster::load_json(path)?,
        None => Roster::empty(),
    };
    for row in args.to {
        roster.push(row.name, row.email, row.phone);
    }
    if roster.is_empty() {
        return Err(ConsoleError::Config(
            "no candidates given, use --to or --roster".to_string(),
        ));
    }

    let paper = client.fetch_paper(&session, args.paper).await?;
    let entries = roster.snapshot();
    let emails: BTreeMap<_, _> = entries.iter().map(|e| (e.id, e.email.clone())).collect();

    let mut dispatcher = Dispatcher::new(client);
    let mut updates = dispatcher.subscribe();

    let live = matches!(output, OutputFormat::Table);
    if live {
        println!(
            "Sending \"{}\" to {} candidate(s)...",
            paper.paper_name,
            entries.len()
        );
    }
    let printer = tokio::spawn(async move {
        let mut printed = BTreeSet::new();
        while updates.changed().await.is_ok() {
            let projection = updates.borrow_and_update().clone();
            if !live {
                continue;
            }
            for (id, outcome) in projection.iter() {
                if outcome.is_terminal() && printed.insert(id) {
                    let email = emails.get(&id).map(String::as_str).unwrap_or("");
                    println!("  [{}] {:<32} {}", id, email, outcome);
                }
            }
        }
    });

    let result = dispatcher.dispatch(&session, &paper, &entries).await;
    drop(dispatcher);
    join_printer(printer).await;
    let mut report = result?;

    if report.requires_acknowledgment() {
        acknowledge(&mut report, args.yes, output).await?;
    }

    print_report(&report, &roster, output)?;

    if report.halted_by_authorization() {
        std::process::exit(1);
    }
    Ok(())
}

async fn acknowledge(
    report: &mut DispatchReport,
    yes: bool,
    output: &OutputFormat,
) -> Result<()> {
    if let OutputFormat::Table = output {
        println!();
        println!("Already invited:");
        for notice in report.conflicts() {
            let when = notice
                .created_at
                .map(|t| format!(" on {}", t.format("%Y-%m-%d %H:%M")))
                .unwrap_or_default();
            println!("  {} was invited{} ({})", notice.email, when, notice.message);
        }
        if !yes {
            println!("Press Enter to acknowledge...");
            read_line().await?;
        }
    }
    report.acknowledge_conflicts();
    Ok(())
}

fn print_report(report: &DispatchReport, roster: &Roster, output: &OutputFormat) -> Result<()> {
    let summary = report.summary();
    match output {
        OutputFormat::Json => {
            let out = InviteOutput {
                paper_id: report.paper_id,
                final_state: state_label(report.final_state),
                calls_issued: report.calls_issued,
                summary,
                recipients: roster
                    .entries()
                    .iter()
                    .map(|e| RecipientOutput {
                        id: e.id.0,
                        name: e.display_name.clone(),
                        email: e.email.clone(),
                        outcome: report.projection.outcome(e.id),
                    })
                    .collect(),
                conflicts: report.conflicts().to_vec(),
            };
            println!("{}", serde_json::to_string_pretty(&out)?);
        }
        OutputFormat::Table => {
            println!();
            println!("{:<6} {:<20} {:<32} STATUS", "ID", "NAME", "EMAIL");
            println!("{}", "-".repeat(80));
            for entry in roster.entries() {
                println!(
                    "{:<6} {:<20} {:<32} {}",
                    entry.id,
                    truncate(&entry.display_name, 20),
                    truncate(&entry.email, 32),
                    report.projection.outcome(entry.id)
                );
            }
            println!();
            println!(
                "Sent: {}  Already invited: {}  Failed: {}  Not attempted: {}",
                summary.succeeded, summary.conflicted, summary.failed, summary.not_attempted
            );
            if report.halted_by_authorization() {
                eprintln!(
                    "Error: this session is not authorized to send invitations; \
                     the run stopped early. Log in again and retry."
                );
            }
        }
    }
    Ok(())
}

async fn handle_candidates_list(
    config: &ConsoleConfig,
    store: &SessionStore,
    view: ViewArg,
    page: u32,
    all: bool,
    output: &OutputFormat,
) -> Result<()> {
    let session = load_session(store, view.route())?;
    let client = ApiClient::new(config)?;
    let candidate_view = view.view();
    let size = candidate_view.page_size(&config.page_sizes);

    let mut number = page.saturating_sub(1);
    let mut candidates = Vec::new();
    let (info, total_elements) = loop {
        let fetched = client.fetch_candidates(&session, number, size).await?;
        let info = PageInfo::from(&fetched);
        if info.total_pages > 0 && info.go_to(number).is_none() {
            return Err(ConsoleError::Config(format!(
                "page {} is out of range (1..={})",
                number + 1,
                info.total_pages
            )));
        }
        candidates.extend(fetched.content);
        match info.next() {
            Some(next) if all => number = next,
            _ => break (info, fetched.total_elements),
        }
    };

    match output {
        OutputFormat::Json => {
            let out = CandidatePageOutput {
                page: info,
                total_elements,
                candidates,
            };
            println!("{}", serde_json::to_string_pretty(&out)?);
        }
        OutputFormat::Table => {
            println!("{}", candidate_view.title());
            if candidates.is_empty() {
                println!("No candidates found.");
                return Ok(());
            }
            let columns = candidate_view.columns();
            let header: Vec<String> = columns
                .iter()
                .map(|c| format!("{:<width$}", c.header(), width = c.width()))
                .collect();
            println!("{}", header.join(" "));
            println!(
                "{}",
                "-".repeat(columns.iter().map(|c| c.width() + 1).sum::<usize>())
            );
            for candidate in &candidates {
                let row: Vec<String> = columns
                    .iter()
                    .map(|c| {
                        let text = candidate_view.cell(candidate, *c);
                        format!("{:<width$}", truncate(&text, c.width()), width = c.width())
                    })
                    .collect();
                println!("{}", row.join(" ").trim_end());
            }
            println!();
            println!("{}", info);
            if !all {
                if let Some(prev) = info.previous() {
                    println!("Previous: --page {}", prev + 1);
                }
                if let Some(next) = info.next() {
                    println!("Next:     --page {}", next + 1);
                }
            }
        }
    }
    Ok(())
}

async fn run(args: Args) -> Result<()> {
    let global = args.global;
    let mut config = ConsoleConfig::new(global.base_url)
        .with_request_timeout(Duration::from_secs(global.timeout));
    if let Some(path) = global.session_file {
        config = config.with_session_path(path);
    }
    config.validate()?;
    let store = SessionStore::new(config.session_path.clone());
    let output = global.output;

    match args.command {
        Commands::Login { username, password } => {
            handle_login(&config, &store, &username, &password, &output).await
        }
        Commands::Logout => {
            store.clear()?;
            println!("Logged out.");
            Ok(())
        }
        Commands::Whoami => match store.load()? {
            Some(session) if !session.is_expired(chrono::Utc::now()) => {
                print_session(&session, &output)
            }
            _ => Err(ConsoleError::NotAuthenticated),
        },
        Commands::Register(register) => handle_register(&config, &store, register).await,
        Commands::Dashboard => handle_dashboard(&config, &store, &output).await,
        Commands::Papers { command } => match command {
            PaperCommands::List => handle_papers_list(&config, &store, &output).await,
        },
        Commands::Invite(invite) => handle_invite(&config, &store, invite, &output).await,
        Commands::Candidates { command } => match command {
            CandidateCommands::List { view, page, all } => {
                handle_candidates_list(&config, &store, view, page, all, &output).await
            }
        },
    }
}

// =============================================================================
// Main Entry Point
// =============================================================================

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    if let Err(e) = run(args).await {
        match e {
            ConsoleError::Validation(failures) => {
                eprintln!("Error: nothing was sent, fix these rows first:");
                for failure in failures {
                    eprintln!("  {}", failure);
                }
            }
            other => eprintln!("Error: {}", other),
        }
        std::process::exit(1);
    }
}
