//! Circuit breaker for the outbound email provider.
//!
//! Repeated provider failures open the circuit and follow-up sends turn
//! into silent suppressions instead of hammering a provider that is
//! already struggling. After a cooldown the circuit lets one probe
//! through; a success closes it again.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

#[derive(Debug, Clone)]
pub struct ProviderCircuit {
    state: CircuitState,
    failures: u32,
    threshold: u32,
    cooldown_secs: u64,
    opened_at: Option<u64>,
}

impl ProviderCircuit {
    pub fn new(threshold: u32, cooldown_secs: u64) -> Self {
        Self {
            state: CircuitState::Closed,
            failures: 0,
            threshold,
            cooldown_secs,
            opened_at: None,
        }
    }

    pub fn state(&self) -> CircuitState {
        self.state
    }

    pub fn record_success(&mut self) {
        self.failures = 0;
        self.state = CircuitState::Closed;
        self.opened_at = None;
    }

    pub fn record_failure(&mut self, now: u64) {
        self.failures += 1;
        if self.failures >= self.threshold {
            self.state = CircuitState::Open;
            self.opened_at = Some(now);
        }
    }

    /// Whether a send may go out right now. An open circuit moves to
    /// half-open once the cooldown has elapsed, admitting one probe.
    pub fn allow(&mut self, now: u64) -> bool {
        match self.state {
            CircuitState::Closed | CircuitState::HalfOpen => true,
            CircuitState::Open => {
                let elapsed = self
                    .opened_at
                    .map(|t| now.saturating_sub(t))
                    .unwrap_or(u64::MAX);
                if elapsed >= self.cooldown_secs {
                    self.state = CircuitState::HalfOpen;
                    true
                } else {
                    false
                }
            }
        }
    }
}
