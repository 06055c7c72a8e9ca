use pong_shared::{
    AuthorityMode, Field, DEFAULT_PORT, DEFAULT_SCREEN_HEIGHT, DEFAULT_SCREEN_WIDTH,
    PADDLE_HEIGHT, TICK_RATE, WALL_THICKNESS,
};
use std::time::Duration;

/// Server configuration, resolved once at start-up
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub screen_width: u32,
    pub screen_height: u32,
    /// Simulation ticks per second
    pub tick_rate: u32,
    pub mode: AuthorityMode,
    /// A player silent for this long loses its seat
    pub idle_timeout: Duration,
}

pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(5);

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: DEFAULT_PORT,
            screen_width: DEFAULT_SCREEN_WIDTH,
            screen_height: DEFAULT_SCREEN_HEIGHT,
            tick_rate: TICK_RATE,
            mode: AuthorityMode::default(),
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
        }
    }
}

impl ServerConfig {
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn field(&self) -> Field {
        Field::new(self.screen_width, self.screen_height)
    }

    pub fn tick_duration(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.tick_rate.max(1) as f64)
    }

    /// Rejects settings the simulation cannot run with
    pub fn validate(&self) -> Result<(), String> {
        if self.tick_rate == 0 {
            return Err("tick rate must be positive".to_string());
        }
        if self.idle_timeout.is_zero() {
            return Err("idle timeout must be positive".to_string());
        }
        let min_height = (2.0 * WALL_THICKNESS + PADDLE_HEIGHT) as u32;
        if self.screen_height <= min_height {
            return Err(format!("screen height must exceed {}", min_height));
        }
        if self.screen_width < 100 {
            return Err("screen width must be at least 100".to_string());
        }
        Ok(())
    }
}
