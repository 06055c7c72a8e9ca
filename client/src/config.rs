use pong_shared::DEFAULT_PORT;
use rand::Rng;
use std::time::Duration;

/// Artificial one-way delay for exercising the netcode on loopback
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Latency {
    /// Simulated round trip; each direction gets half
    pub fake_ping: Duration,
    /// Upper bound of the random extra delay added per packet
    pub jitter: Duration,
}

impl Latency {
    pub fn new(fake_ping_ms: u64, jitter_ms: u64) -> Self {
        Self {
            fake_ping: Duration::from_millis(fake_ping_ms),
            jitter: Duration::from_millis(jitter_ms),
        }
    }

    pub fn is_zero(&self) -> bool {
        self.fake_ping.is_zero() && self.jitter.is_zero()
    }

    /// Samples the delay for one packet in one direction
    pub fn sample(&self) -> Duration {
        let base = self.fake_ping / 2;
        if self.jitter.is_zero() {
            return base;
        }
        let max = self.jitter.as_millis() as u64;
        base + Duration::from_millis(rand::thread_rng().gen_range(0..=max))
    }
}

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub server: String,
    pub latency: Latency,
    pub frame_rate: u32,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server: format!("127.0.0.1:{}", DEFAULT_PORT),
            latency: Latency::default(),
            frame_rate: 60,
        }
    }
}

impl ClientConfig {
    pub fn frame_duration(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.frame_rate.max(1) as f64)
    }
}
