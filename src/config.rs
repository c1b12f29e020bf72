use log::warn;

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Runtime configuration, read from environment variables.
///
/// Call `dotenvy::dotenv()` before `from_env` so a local `.env` file is
/// picked up during development.
#[derive(Debug, Clone)]
pub struct Config {
    pub deepgram_api_key: String,
    pub deepgram_model: String,
    pub llm_api_key: String,
    pub llm_base_url: String,
    pub llm_model: String,
    /// Output budget for the evaluation call. Kept generous so a truncated
    /// reply is the exception, not the common case.
    pub llm_max_tokens: u32,
    pub ledger_base_url: String,
    pub ledger_token: Option<String>,
    /// Identity attached to persisted answers when the collaborator wants
    /// one; the credential itself stays in `ledger_token`.
    pub ledger_user_id: Option<String>,
    /// External command used to read a question aloud. The question text is
    /// appended as the final argument (e.g. `espeak` or `say`).
    pub narration_command: Option<String>,
}

impl Config {
    pub fn from_env() -> Self {
        let config = Self {
            deepgram_api_key: env_or("DEEPGRAM_API_KEY", ""),
            deepgram_model: env_or("DEEPGRAM_MODEL", "nova-3"),
            llm_api_key: env_or("LLM_API_KEY", ""),
            llm_base_url: env_or("LLM_BASE_URL", "https://api.openai.com/v1"),
            llm_model: env_or("LLM_MODEL", "gpt-4"),
            llm_max_tokens: std::env::var("LLM_MAX_TOKENS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(1024),
            ledger_base_url: env_or("LEDGER_BASE_URL", "http://localhost:3000/api"),
            ledger_token: std::env::var("LEDGER_TOKEN").ok().filter(|t| !t.is_empty()),
            ledger_user_id: std::env::var("LEDGER_USER_ID")
                .ok()
                .filter(|u| !u.is_empty()),
            narration_command: std::env::var("NARRATION_COMMAND")
                .ok()
                .filter(|c| !c.is_empty()),
        };

        if config.llm_api_key.is_empty() {
            warn!("LLM_API_KEY not set - answer evaluation will fail until it is provided");
        }
        if config.deepgram_api_key.is_empty() {
            warn!("DEEPGRAM_API_KEY not set - speech capture is unavailable, typed input still works");
        }
        if config.ledger_token.is_none() {
            warn!("LEDGER_TOKEN not set - answers will only be kept in memory");
        }

        config
    }
}
