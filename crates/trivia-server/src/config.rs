use serde::Deserialize;

/// Top-level server configuration, loaded from `trivia.toml`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub listen_addr: String,
    pub web_root: String,
    /// Optional TOML question bank; the built-in set is used when absent.
    pub questions_file: Option<String>,
    pub limits: LimitsConfig,
    pub rooms: RoomsConfig,
    pub game: GameConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:3000".to_string(),
            web_root: "public".to_string(),
            questions_file: None,
            limits: LimitsConfig::default(),
            rooms: RoomsConfig::default(),
            game: GameConfig::default(),
        }
    }
}

/// Infrastructure limits (connection caps, buffer sizes, rate limits).
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    pub max_ws_connections: usize,
    pub max_ws_per_ip: usize,
    pub ws_rate_limit_per_sec: f64,
    pub player_message_buffer: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_ws_connections: 1000,
            max_ws_per_ip: 10,
            ws_rate_limit_per_sec: 20.0,
            player_message_buffer: 256,
        }
    }
}

/// Room lifecycle configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RoomsConfig {
    pub idle_timeout_secs: u64,
    pub idle_check_interval_secs: u64,
}

impl Default for RoomsConfig {
    fn default() -> Self {
        Self {
            idle_timeout_secs: 3600,
            idle_check_interval_secs: 60,
        }
    }
}

/// Game rules applied to every session.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GameConfig {
    pub max_players: usize,
    pub question_count: usize,
    pub question_secs: u64,
    pub countdown_secs: u64,
    pub reveal_pause_ms: u64,
    pub points_per_correct: u32,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            max_players: 50,
            question_count: 10,
            question_secs: 8,
            countdown_secs: 5,
            reveal_pause_ms: 1500,
            points_per_correct: 10,
        }
    }
}

impl ServerConfig {
    /// Validate configuration, exiting on unusable values.
    pub fn validate(&self) {
        if self.listen_addr.parse::<std::net::SocketAddr>().is_err() {
            tracing::error!(
                addr = %self.listen_addr,
                "listen_addr is not a valid socket address"
            );
            std::process::exit(1);
        }

        if self.limits.max_ws_connections == 0 {
            tracing::error!("limits.max_ws_connections must be > 0");
            std::process::exit(1);
        }
        if self.limits.max_ws_per_ip == 0 {
            tracing::error!("limits.max_ws_per_ip must be > 0");
            std::process::exit(1);
        }
        if self.limits.ws_rate_limit_per_sec <= 0.0 {
            tracing::error!("limits.ws_rate_limit_per_sec must be > 0");
            std::process::exit(1);
        }
        if self.limits.player_message_buffer == 0 {
            tracing::error!("limits.player_message_buffer must be > 0");
            std::process::exit(1);
        }

        if self.rooms.idle_timeout_secs == 0 {
            tracing::error!("rooms.idle_timeout_secs must be > 0");
            std::process::exit(1);
        }
        if self.rooms.idle_check_interval_secs == 0 {
            tracing::error!("rooms.idle_check_interval_secs must be > 0");
            std::process::exit(1);
        }

        if self.game.max_players == 0 {
            tracing::error!("game.max_players must be > 0");
            std::process::exit(1);
        }
        if self.game.question_count == 0 {
            tracing::error!("game.question_count must be > 0");
            std::process::exit(1);
        }
        if self.game.question_secs == 0 {
            tracing::error!("game.question_secs must be > 0");
            std::process::exit(1);
        }
        // Time budgets go over the wire as u16 seconds.
        if self.game.question_secs > u64::from(u16::MAX) {
            tracing::error!("game.question_secs must be <= {}", u16::MAX);
            std::process::exit(1);
        }
        if self.game.countdown_secs > u64::from(u16::MAX) {
            tracing::error!("game.countdown_secs must be <= {}", u16::MAX);
            std::process::exit(1);
        }
        if self.game.points_per_correct == 0 {
            tracing::error!("game.points_per_correct must be > 0");
            std::process::exit(1);
        }
    }

    /// Load config from `trivia.toml` if it exists, then apply env var overrides.
    pub fn load() -> Self {
        let mut config = match std::fs::read_to_string("trivia.toml") {
            Ok(content) => match toml::from_str::<ServerConfig>(&content) {
                Ok(cfg) => {
                    tracing::info!("Loaded configuration from trivia.toml");
                    cfg
                },
                Err(e) => {
                    tracing::warn!("Failed to parse trivia.toml: {e}, using defaults");
                    ServerConfig::default()
                },
            },
            Err(_) => {
                tracing::info!("No trivia.toml found, using defaults");
                ServerConfig::default()
            },
        };

        // Environment variable overrides
        if let Ok(addr) = std::env::var("TRIVIA_LISTEN_ADDR")
            && !addr.is_empty()
        {
            config.listen_addr = addr;
        }
        if let Ok(root) = std::env::var("TRIVIA_WEB_ROOT")
            && !root.is_empty()
        {
            config.web_root = root;
        }
        if let Ok(path) = std::env::var("TRIVIA_QUESTIONS_FILE")
            && !path.is_empty()
        {
            config.questions_file = Some(path);
        }
        if let Ok(val) = std::env::var("TRIVIA_QUESTION_COUNT")
            && let Ok(n) = val.parse::<usize>()
        {
            config.game.question_count = n;
        }
        if let Ok(val) = std::env::var("TRIVIA_QUESTION_SECS")
            && let Ok(n) = val.parse::<u64>()
        {
            config.game.question_secs = n;
        }
        if let Ok(val) = std::env::var("TRIVIA_MAX_WS_CONNECTIONS")
            && let Ok(n) = val.parse::<usize>()
        {
            config.limits.max_ws_connections = n;
        }

        config
    }
}
