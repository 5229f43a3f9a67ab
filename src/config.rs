use std::env;
use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::PathBuf;
use std::thread;
use std::time::Duration;

use crossterm::{
    event::{self, Event, KeyCode, KeyEvent},
    terminal,
};
use tracing::{debug, warn};

use crate::error::ConfigError;

/// Trait for clients that read their API key from the environment
pub trait KeyFromEnv {
    /// The environment variable name for this client's API key
    const KEY_NAME: &'static str;

    /// Find the API key by checking environment variables first, then .env file
    fn find_key() -> Option<String> {
        let _ = dotenvy::dotenv();
        env::var(Self::KEY_NAME).ok().filter(|key| !key.trim().is_empty())
    }

    /// Find the API key, asking on the terminal when it is not configured.
    /// Gives up after 15 seconds without input.
    fn find_key_with_user() -> Result<String, ConfigError> {
        if let Some(key) = Self::find_key() {
            return Ok(key);
        }

        print!("Environment variable {} not found. Please enter the API key (15 second timeout): ", Self::KEY_NAME);
        io::stdout().flush()?;

        let (sender, receiver) = std::sync::mpsc::channel();
        thread::spawn(move || {
            let mut input = String::new();
            if io::stdin().read_line(&mut input).is_ok() {
                let _ = sender.send(input.trim().to_string());
            }
        });

        let api_key = match receiver.recv_timeout(Duration::from_secs(15)) {
            Ok(input) if !input.is_empty() => input,
            _ => return Err(ConfigError::PromptTimeout(Self::KEY_NAME)),
        };

        if Self::prompt_save_to_env()? {
            match Self::save_to_env_file(&api_key) {
                Ok(()) => println!("API key saved to .env file"),
                Err(e) => eprintln!("Warning: Failed to save to .env file: {}", e),
            }
        }

        Ok(api_key)
    }

    /// Ask whether to persist the key. Single keystroke, falling back to a line read.
    fn prompt_save_to_env() -> Result<bool, ConfigError> {
        print!("Add {} to .env file? (y/N): ", Self::KEY_NAME);
        io::stdout().flush()?;

        if let Ok(answer) = Self::read_single_key() {
            println!("{}", if answer { "y" } else { "n" });
            return Ok(answer);
        }

        let mut input = String::new();
        io::stdin().read_line(&mut input)?;
        Ok(input.trim().eq_ignore_ascii_case("y"))
    }

    /// Read one keystroke in raw mode; anything but `y` means no.
    fn read_single_key() -> io::Result<bool> {
        terminal::enable_raw_mode()?;
        let result = Self::poll_confirm_key();
        terminal::disable_raw_mode()?;
        result
    }

    /// Wait up to 30 seconds for a key press
    fn poll_confirm_key() -> io::Result<bool> {
        if !event::poll(Duration::from_secs(30))? {
            return Ok(false);
        }
        Ok(matches!(
            event::read()?,
            Event::Key(KeyEvent { code: KeyCode::Char('y' | 'Y'), .. })
        ))
    }

    /// Append the key to .env unless it is already there
    fn save_to_env_file(api_key: &str) -> io::Result<()> {
        if let Ok(content) = std::fs::read_to_string(".env") {
            if content.contains(&format!("{}=", Self::KEY_NAME)) {
                return Ok(());
            }
        }

        let mut file = OpenOptions::new().create(true).append(true).open(".env")?;
        file.write_all(format!("{}={}\n", Self::KEY_NAME, api_key).as_bytes())
    }
}

/// Shortest quiz loading time allowed from the environment
pub const QUIZ_MIN_DISPLAY_FLOOR: Duration = Duration::from_secs(5);

/// Tunables shared by the session client, quiz generator and controller.
#[derive(Debug, Clone)]
pub struct TutorConfig {
    /// Sampling temperature for tutoring turns
    pub temperature: f32,
    /// Extended reasoning budget in tokens; `None` disables thinking config
    pub thinking_budget: Option<u32>,
    /// Attach the web search grounding tool to tutoring sessions
    pub web_grounding: bool,
    /// Minimum time the "generating" view is shown before a quiz question
    pub quiz_min_display: Duration,
    /// How many trailing transcript characters feed quiz generation
    pub quiz_context_chars: usize,
    /// Directory holding the persisted settings and user log
    pub data_dir: PathBuf,
}

impl Default for TutorConfig {
    fn default() -> Self {
        Self {
            temperature: 0.5,
            thinking_budget: Some(32768),
            web_grounding: true,
            quiz_min_display: QUIZ_MIN_DISPLAY_FLOOR,
            quiz_context_chars: 3000,
            data_dir: PathBuf::from(".lumina"),
        }
    }
}

impl TutorConfig {
    /// Defaults overridden by `LUMINA_*` variables (after loading `.env`).
    /// Unparsable values are logged and ignored.
    pub fn from_env() -> Self {
        let _ = dotenvy::dotenv();
        let mut config = Self::default();

        if let Some(temperature) = parse_var::<f32>("LUMINA_TEMPERATURE") {
            config.temperature = temperature;
        }
        if let Some(budget) = parse_var::<u32>("LUMINA_THINKING_BUDGET") {
            config.thinking_budget = (budget > 0).then_some(budget);
        }
        if let Some(grounding) = parse_var::<bool>("LUMINA_WEB_GROUNDING") {
            config.web_grounding = grounding;
        }
        if let Some(ms) = parse_var::<u64>("LUMINA_QUIZ_MIN_DISPLAY_MS") {
            config.quiz_min_display = quiz_min_display_from_ms(ms);
        }
        if let Ok(dir) = env::var("LUMINA_DATA_DIR") {
            config.data_dir = PathBuf::from(dir);
        }

        debug!(?config, "Loaded tutor configuration");
        config
    }
}

/// Environment values can raise the quiz loading time but never lower it
/// below [`QUIZ_MIN_DISPLAY_FLOOR`].
fn quiz_min_display_from_ms(ms: u64) -> Duration {
    let requested = Duration::from_millis(ms);
    if requested < QUIZ_MIN_DISPLAY_FLOOR {
        warn!(requested_ms = ms, "LUMINA_QUIZ_MIN_DISPLAY_MS below the 5 second floor, using the floor");
        QUIZ_MIN_DISPLAY_FLOOR
    } else {
        requested
    }
}

fn parse_var<T: std::str::FromStr>(name: &str) -> Option<T> {
    let raw = env::var(name).ok()?;
    match raw.trim().parse::<T>() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!(variable = name, value = %raw, "Ignoring unparsable configuration value");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quiz_loading_time_cannot_be_lowered_below_the_floor() {
        assert_eq!(quiz_min_display_from_ms(0), QUIZ_MIN_DISPLAY_FLOOR);
        assert_eq!(quiz_min_display_from_ms(4_999), QUIZ_MIN_DISPLAY_FLOOR);
        assert_eq!(quiz_min_display_from_ms(8_000), Duration::from_secs(8));
    }
}
