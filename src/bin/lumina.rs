use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, ValueEnum};
use lumina_tutor::clients::flexible::{ClientType, FlexibleClient};
use lumina_tutor::config::TutorConfig;
use lumina_tutor::controller::{InputOutcome, OnboardingForm, TranscriptObserver, TutorController};
use lumina_tutor::interceptors::FileInterceptor;
use lumina_tutor::models::{AdminSettings, AppMode, GradeLevel, Message, Subject, COUNTRIES};
use lumina_tutor::store::SettingsStore;
use lumina_tutor::streaming::Fragment;
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use tracing_subscriber::EnvFilter;

#[derive(Clone, Copy, Debug, ValueEnum)]
enum ClientArg {
    Gemini,
    Mock,
}

#[derive(Parser)]
#[command(author, version, about = "Lumina: a streaming AI study tutor with quizzes", long_about = None)]
#[command(after_help = "ENVIRONMENT VARIABLES:
    GEMINI_API_KEY              API key for the Gemini client
    LUMINA_CLIENT               Default client (gemini|mock)
    LUMINA_TEMPERATURE          Tutor sampling temperature [default: 0.5]
    LUMINA_THINKING_BUDGET      Reasoning budget in tokens, 0 disables [default: 32768]
    LUMINA_WEB_GROUNDING        Attach web search grounding [default: true]
    LUMINA_QUIZ_MIN_DISPLAY_MS  Minimum quiz loading time, at least 5000 [default: 5000]
    LUMINA_DATA_DIR             Settings and user log directory [default: .lumina]

COMMANDS:
    study:  <text>  /quiz  /admin  /quit
    quiz:   1-4  /next  /back
    admin:  /announce <text>  /modifier <text>  /users  /close")]
struct Args {
    /// Backend: gemini, mock [default: gemini when GEMINI_API_KEY is set]
    #[arg(short, long, value_enum)]
    client: Option<ClientArg>,

    /// Directory for admin settings and the user log
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Gemini model id
    #[arg(long)]
    model: Option<String>,

    /// Write every quiz prompt and reply as markdown into this directory
    #[arg(long)]
    trace_dir: Option<PathBuf>,

    /// Debug logging
    #[arg(short, long)]
    verbose: bool,
}

/// Prints reply fragments as they stream in
struct StdoutTranscript;

impl TranscriptObserver for StdoutTranscript {
    fn on_fragment(&mut self, _message: &Message, fragment: &Fragment) {
        print!("{}", fragment.text);
        let _ = std::io::stdout().flush();
    }

    fn on_stream_end(&mut self, message: &Message) {
        println!();
        if let Some(sources) = &message.sources {
            println!("Sources:");
            for source in sources {
                println!("  - {} <{}>", source.title, source.uri);
            }
        }
    }
}

type Input = Lines<BufReader<Stdin>>;

async fn ask(input: &mut Input, label: &str) -> Result<String> {
    print!("{}: ", label);
    std::io::stdout().flush()?;
    let line = input.next_line().await?.context("stdin closed")?;
    Ok(line.trim().to_string())
}

/// Pick from a numbered list, re-asking until the answer is valid
async fn choose<T: Copy>(input: &mut Input, label: &str, options: &[(T, &str)]) -> Result<T> {
    for (i, (_, name)) in options.iter().enumerate() {
        println!("  {}. {}", i + 1, name);
    }
    loop {
        let answer = ask(input, label).await?;
        match answer.parse::<usize>() {
            Ok(n) if (1..=options.len()).contains(&n) => return Ok(options[n - 1].0),
            _ => println!("Enter a number between 1 and {}", options.len()),
        }
    }
}

async fn onboarding_form(input: &mut Input) -> Result<OnboardingForm> {
    println!("Welcome to Lumina!");
    let name = ask(input, "Name").await?;
    let email = ask(input, "Email").await?;
    let countries: Vec<(&str, &str)> = COUNTRIES.iter().map(|c| (*c, *c)).collect();
    let country = choose(input, "Country", &countries).await?.to_string();
    let grades: Vec<_> = GradeLevel::ALL.iter().map(|g| (*g, g.label())).collect();
    let grade = choose(input, "Grade", &grades).await?;
    let subjects: Vec<_> = Subject::ALL.iter().map(|s| (*s, s.label())).collect();
    let subject = choose(input, "Subject", &subjects).await?;
    let topic = ask(input, "What do you want to learn about").await?;
    Ok(OnboardingForm { name, email, country, grade, subject, topic })
}

fn show_question(controller: &TutorController<FlexibleClient>) {
    let stats = controller.quiz_stats();
    let Some(round) = controller.current_quiz() else {
        return;
    };
    let question = round.question();
    println!("\n[Score {}/{}] {}", stats.correct, stats.total, question.question);
    for (i, option) in question.options.iter().enumerate() {
        println!("  {}. {}", i + 1, option);
    }
}

async fn run_quiz(controller: &mut TutorController<FlexibleClient>, next: bool) {
    println!("Generating a question...");
    let presented = if next {
        controller.next_question().await
    } else {
        controller.start_quiz().await
    };
    if presented {
        show_question(controller);
    } else {
        println!("Could not create a quiz right now. Back to studying.");
    }
}

fn show_overview(controller: &TutorController<FlexibleClient>) -> Result<()> {
    let overview = controller.admin_overview()?;
    println!("{} registered users", overview.users.len());
    println!("{} from South Africa", overview.south_africa_users);
    for share in &overview.top_countries {
        println!("  {}: {} ({}%)", share.country, share.users, share.percent);
    }
    for user in &overview.users {
        println!("  - {} <{}> {}", user.name, user.email, user.country);
    }
    Ok(())
}

fn print_banner(controller: &TutorController<FlexibleClient>) {
    println!("\n== {} ==", controller.header_title());
    if let Some(text) = controller.announcement() {
        println!("📢 {}", text);
    }
}

fn build_backend(args: &Args) -> Result<FlexibleClient> {
    let client_type = match args.client {
        #[cfg(feature = "gemini")]
        Some(ClientArg::Gemini) => ClientType::Gemini,
        #[cfg(not(feature = "gemini"))]
        Some(ClientArg::Gemini) => bail!("built without the gemini feature"),
        Some(ClientArg::Mock) => ClientType::Mock,
        None => ClientType::from_env(),
    };
    println!("Client: {}", client_type);

    #[cfg(feature = "gemini")]
    {
        use lumina_tutor::clients::gemini::{GeminiClient, GeminiModel};
        if let (ClientType::Gemini, Some(model)) = (client_type, &args.model) {
            let client = GeminiClient::interactive()?.with_model(GeminiModel::from_id(model));
            return Ok(FlexibleClient::gemini(client));
        }
    }

    Ok(FlexibleClient::from_type(client_type)?)
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let default_level = if args.verbose { "lumina_tutor=debug" } else { "lumina_tutor=warn" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
        .with_writer(std::io::stderr)
        .init();

    let mut config = TutorConfig::from_env();
    if let Some(dir) = &args.data_dir {
        config.data_dir = dir.clone();
    }

    let backend = build_backend(&args)?;
    let store = SettingsStore::file(&config.data_dir);
    let mut controller = TutorController::new(backend, store, config);
    if let Some(dir) = &args.trace_dir {
        controller = controller.with_quiz_interceptor(Arc::new(FileInterceptor::new(dir.clone())));
    }

    let mut input = BufReader::new(tokio::io::stdin()).lines();
    let mut transcript = StdoutTranscript;

    loop {
        let form = onboarding_form(&mut input).await?;
        match controller.submit_onboarding(form, &mut transcript).await {
            Ok(()) => break,
            Err(e) => println!("{}", e),
        }
    }
    print_banner(&controller);

    loop {
        let prompt = match controller.mode() {
            AppMode::Quizzing => "answer",
            AppMode::AdminDashboard => "admin",
            _ => "you",
        };
        let line = match ask(&mut input, prompt).await {
            Ok(line) => line,
            Err(_) => break,
        };

        match controller.mode() {
            AppMode::Studying => match line.as_str() {
                "/quit" => break,
                "/quiz" => run_quiz(&mut controller, false).await,
                "/admin" => match controller.open_admin() {
                    Ok(()) => {
                        print_banner(&controller);
                        show_overview(&controller)?;
                    }
                    Err(e) => println!("{}", e),
                },
                text => match controller.handle_input(text, &mut transcript).await {
                    Ok(InputOutcome::QuizStarted) => {
                        if controller.current_quiz().is_some() {
                            show_question(&controller);
                        } else {
                            println!("Could not create a quiz right now. Back to studying.");
                        }
                    }
                    Ok(_) => {}
                    Err(e) => println!("{}", e),
                },
            },
            AppMode::Quizzing => match line.as_str() {
                "/next" => run_quiz(&mut controller, true).await,
                "/back" => {
                    controller.back_to_study()?;
                    print_banner(&controller);
                }
                answer => {
                    let picked = answer.parse::<usize>().ok().and_then(|n| n.checked_sub(1));
                    match picked.and_then(|i| controller.select_answer(i)) {
                        Some(outcome) => {
                            let verdict = if outcome.correct { "Correct!" } else { "Not quite." };
                            let explanation = controller
                                .current_quiz()
                                .map(|r| r.question().explanation.clone())
                                .unwrap_or_default();
                            println!("{} The answer is {}. {}", verdict, outcome.correct_index + 1, explanation);
                            println!("(/next for another question, /back to keep studying)");
                        }
                        None => println!("Pick an unanswered option 1-4, /next or /back"),
                    }
                }
            },
            AppMode::AdminDashboard => {
                let (command, rest) = line.split_once(' ').unwrap_or((line.as_str(), ""));
                let mut settings: AdminSettings = controller.settings().clone();
                match command {
                    "/announce" => {
                        settings.global_announcement = rest.trim().to_string();
                        controller.update_admin_settings(settings)?;
                        println!("Announcement updated");
                    }
                    "/modifier" => {
                        settings.ai_modifier = rest.trim().to_string();
                        controller.update_admin_settings(settings)?;
                        println!("AI modifier updated; applies to new sessions and quizzes");
                    }
                    "/users" => show_overview(&controller)?,
                    "/close" => {
                        controller.close_admin()?;
                        print_banner(&controller);
                    }
                    _ => println!("Commands: /announce <text>, /modifier <text>, /users, /close"),
                }
            }
            AppMode::Onboarding => bail!("onboarding did not complete"),
        }
    }

    println!("Goodbye!");
    Ok(())
}
