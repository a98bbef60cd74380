//! System control commands: shutdown, close applications, shutdown timer

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{error, info};

use super::{Command, CommandContext, contains_any};
use crate::error::CommandError;
use crate::platform::PowerControl;

const PATTERNS: &[&str] = &[
    "matikan komputer",
    "tutup semua aplikasi",
    "timer * menit matikan komputer",
    "batalkan timer",
];

/// Vocabulary that routes a command here
const MATCH_VOCABULARY: &[&str] = &["matikan komputer", "tutup semua aplikasi", "timer", "menit"];

static MINUTES: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\d+)\s*menit").expect("valid regex"));

/// Longest accepted shutdown timer (one week)
pub const MAX_TIMER_MINUTES: u64 = 7 * 24 * 60;

/// Poll interval while a due shutdown is still executing
const FIRE_POLL: Duration = Duration::from_millis(10);

struct PendingShutdown {
    handle: JoinHandle<()>,
    fires_at: Instant,
}

/// At most one deferred shutdown.
///
/// The timer task lives on the tokio runtime, so a process that exits while
/// a shutdown is pending loses it. Callers that are about to exit should
/// [`wait`](Self::wait) first. Dropping the timer cancels the pending task.
pub struct ShutdownTimer {
    power: Arc<dyn PowerControl>,
    pending: Mutex<Option<PendingShutdown>>,
}

impl ShutdownTimer {
    pub fn new(power: Arc<dyn PowerControl>) -> Self {
        Self {
            power,
            pending: Mutex::new(None),
        }
    }

    /// Schedule a shutdown after `delay`, replacing any pending one
    pub fn schedule(&self, delay: Duration) {
        let power = Arc::clone(&self.power);
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            info!("Executing scheduled shutdown");
            if let Err(e) = power.shutdown().await {
                error!("Failed to execute scheduled shutdown: {}", e);
            }
        });

        let pending = PendingShutdown {
            handle,
            fires_at: Instant::now() + delay,
        };
        if let Some(previous) = self.slot().replace(pending) {
            previous.handle.abort();
        }
    }

    /// Cancel the pending shutdown. Returns whether one was pending.
    pub fn cancel(&self) -> bool {
        let pending = self.slot().take();
        match pending {
            Some(pending) if !pending.handle.is_finished() => {
                pending.handle.abort();
                info!("Shutdown timer cancelled");
                true
            }
            _ => false,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.remaining().is_some()
    }

    /// Time left until the pending shutdown fires
    pub fn remaining(&self) -> Option<Duration> {
        self.slot()
            .as_ref()
            .filter(|pending| !pending.handle.is_finished())
            .map(|pending| pending.fires_at.saturating_duration_since(Instant::now()))
    }

    /// Wait until no shutdown is pending (it fired or was cancelled)
    pub async fn wait(&self) {
        while let Some(remaining) = self.remaining() {
            tokio::time::sleep(remaining.max(FIRE_POLL)).await;
        }
    }

    fn slot(&self) -> MutexGuard<'_, Option<PendingShutdown>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for ShutdownTimer {
    fn drop(&mut self) {
        if let Some(pending) = self.slot().take() {
            pending.handle.abort();
        }
    }
}

/// Parse "timer N menit" into a delay of at most [`MAX_TIMER_MINUTES`]
fn timer_delay(command: &str) -> Result<(u64, Duration), CommandError> {
    let too_large = || {
        CommandError::SystemCommand(format!(
            "Timer duration too large (maximum {} minutes)",
            MAX_TIMER_MINUTES
        ))
    };

    let captures = MINUTES.captures(command).ok_or_else(|| {
        CommandError::SystemCommand("Could not extract timer duration from command".to_string())
    })?;
    // The capture is all digits, so parsing only fails on overflow
    let minutes: u64 = captures[1].parse().map_err(|_| too_large())?;
    if minutes == 0 {
        return Err(CommandError::SystemCommand(
            "Timer duration must be positive".to_string(),
        ));
    }
    if minutes > MAX_TIMER_MINUTES {
        return Err(too_large());
    }

    Ok((minutes, Duration::from_secs(minutes * 60)))
}

pub struct SystemControlCommand {
    power: Arc<dyn PowerControl>,
    timer: Arc<ShutdownTimer>,
}

impl SystemControlCommand {
    pub fn new(power: Arc<dyn PowerControl>) -> Self {
        let timer = Arc::new(ShutdownTimer::new(Arc::clone(&power)));
        Self::with_timer(power, timer)
    }

    /// Share a timer owned elsewhere, so it outlives this handler
    pub fn with_timer(power: Arc<dyn PowerControl>, timer: Arc<ShutdownTimer>) -> Self {
        Self { power, timer }
    }

    pub fn timer(&self) -> &Arc<ShutdownTimer> {
        &self.timer
    }

    /// Whether a deferred shutdown is pending
    pub fn has_pending_shutdown(&self) -> bool {
        self.timer.is_pending()
    }

    /// Cancel any pending deferred shutdown. Returns whether one was pending.
    pub fn cancel_shutdown_timer(&self) -> bool {
        self.timer.cancel()
    }

    async fn shutdown_computer(&self) -> Result<String, CommandError> {
        self.power.shutdown().await?;
        Ok("Computer shutdown initiated".to_string())
    }

    async fn close_all_applications(&self) -> Result<String, CommandError> {
        info!("Closing all applications");
        let closed = self.power.close_user_applications().await?;
        info!("Attempted to close {} applications", closed);
        Ok(format!("Closed {} applications", closed))
    }

    fn schedule_shutdown(&self, command: &str) -> Result<String, CommandError> {
        let (minutes, delay) = timer_delay(command)?;
        info!(
            "Scheduling shutdown in {} minutes ({} seconds)",
            minutes,
            delay.as_secs()
        );
        self.timer.schedule(delay);
        Ok(format!("Computer will shutdown in {} minutes", minutes))
    }
}

#[async_trait]
impl Command for SystemControlCommand {
    fn name(&self) -> &str {
        "SystemControlCommand"
    }

    fn patterns(&self) -> Vec<String> {
        PATTERNS.iter().map(|p| p.to_string()).collect()
    }

    fn description(&self) -> &str {
        "Handle system control commands: shutdown, close apps, timer shutdown"
    }

    fn can_handle(&self, command: &str) -> bool {
        contains_any(command, MATCH_VOCABULARY)
    }

    async fn execute(
        &self,
        command: &str,
        _context: Option<&CommandContext>,
    ) -> Result<String, CommandError> {
        let command = command.to_lowercase();
        let has_timer = command.contains("timer");
        let has_shutdown = command.contains("matikan komputer");

        if has_shutdown && !has_timer {
            self.shutdown_computer().await
        } else if command.contains("tutup semua aplikasi") {
            self.close_all_applications().await
        } else if has_timer && command.contains("menit") && has_shutdown {
            self.schedule_shutdown(&command)
        } else if has_timer && command.contains("batalkan") {
            if self.cancel_shutdown_timer() {
                Ok("Shutdown timer cancelled".to_string())
            } else {
                Ok("No shutdown timer pending".to_string())
            }
        } else {
            Err(CommandError::SystemCommand(format!(
                "Unknown system command: {}",
                command
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct CountingPower {
        shutdowns: AtomicUsize,
    }

    #[async_trait]
    impl PowerControl for CountingPower {
        async fn shutdown(&self) -> Result<(), CommandError> {
            self.shutdowns.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn close_user_applications(&self) -> Result<usize, CommandError> {
            Ok(3)
        }
    }

    fn handler() -> (Arc<CountingPower>, SystemControlCommand) {
        let power = Arc::new(CountingPower::default());
        let command = SystemControlCommand::new(power.clone());
        (power, command)
    }

    #[test]
    fn test_can_handle() {
        let (_, command) = handler();
        assert!(command.can_handle("matikan komputer"));
        assert!(command.can_handle("Tutup Semua Aplikasi"));
        assert!(command.can_handle("timer 5 menit matikan komputer"));
        assert!(command.can_handle("batalkan timer"));
        assert!(!command.can_handle("matikan lampu"));
        assert!(!command.can_handle("buka youtube"));
    }

    #[tokio::test]
    async fn test_immediate_shutdown() {
        let (power, command) = handler();
        let result = command.execute("matikan komputer", None).await.unwrap();
        assert_eq!(result, "Computer shutdown initiated");
        assert_eq!(power.shutdowns.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_close_all_applications() {
        let (_, command) = handler();
        let result = command.execute("tutup semua aplikasi", None).await.unwrap();
        assert_eq!(result, "Closed 3 applications");
    }

    #[tokio::test(start_paused = true)]
    async fn test_timer_fires_after_delay() {
        let (power, command) = handler();
        let result = command
            .execute("timer 2 menit matikan komputer", None)
            .await
            .unwrap();
        assert_eq!(result, "Computer will shutdown in 2 minutes");
        assert!(command.has_pending_shutdown());
        assert_eq!(power.shutdowns.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_secs(121)).await;
        assert_eq!(power.shutdowns.load(Ordering::SeqCst), 1);
        assert!(!command.has_pending_shutdown());
    }

    #[tokio::test(start_paused = true)]
    async fn test_new_timer_replaces_pending() {
        let (power, command) = handler();
        command
            .execute("timer 1 menit matikan komputer", None)
            .await
            .unwrap();
        command
            .execute("timer 10 menit matikan komputer", None)
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_secs(120)).await;
        assert_eq!(power.shutdowns.load(Ordering::SeqCst), 0);
        assert!(command.has_pending_shutdown());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_timer() {
        let (power, command) = handler();
        command
            .execute("timer 1 menit matikan komputer", None)
            .await
            .unwrap();

        let result = command.execute("batalkan timer", None).await.unwrap();
        assert_eq!(result, "Shutdown timer cancelled");

        tokio::time::sleep(Duration::from_secs(120)).await;
        assert_eq!(power.shutdowns.load(Ordering::SeqCst), 0);

        let result = command.execute("batalkan timer", None).await.unwrap();
        assert_eq!(result, "No shutdown timer pending");
    }

    #[tokio::test]
    async fn test_timer_requires_positive_minutes() {
        let (_, command) = handler();
        let err = command
            .execute("timer 0 menit matikan komputer", None)
            .await
            .unwrap_err();
        assert!(matches!(err, CommandError::SystemCommand(_)));

        let err = command
            .execute("timer beberapa menit matikan komputer", None)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("timer duration"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_oversized_timer_is_rejected_without_scheduling() {
        let (power, command) = handler();

        for text in [
            "timer 999999999999999999 menit matikan komputer",
            "timer 99999999999999999999999 menit matikan komputer",
            "timer 10081 menit matikan komputer",
        ] {
            let err = command.execute(text, None).await.unwrap_err();
            assert!(err.to_string().contains("Timer duration too large"), "{}", text);
        }
        assert!(!command.has_pending_shutdown());

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(power.shutdowns.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_longest_timer_is_accepted() {
        let (_, command) = handler();
        let text = format!("timer {} menit matikan komputer", MAX_TIMER_MINUTES);

        let result = command.execute(&text, None).await.unwrap();

        assert_eq!(
            result,
            format!("Computer will shutdown in {} minutes", MAX_TIMER_MINUTES)
        );
        let remaining = command.timer().remaining().unwrap();
        assert_eq!(remaining, Duration::from_secs(MAX_TIMER_MINUTES * 60));
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_returns_after_timer_fires() {
        let (power, command) = handler();
        command
            .execute("timer 3 menit matikan komputer", None)
            .await
            .unwrap();

        command.timer().wait().await;

        assert_eq!(power.shutdowns.load(Ordering::SeqCst), 1);
        assert!(!command.has_pending_shutdown());
    }

    #[tokio::test(start_paused = true)]
    async fn test_shared_timer_outlives_handler() {
        let power = Arc::new(CountingPower::default());
        let timer = Arc::new(ShutdownTimer::new(power.clone()));
        let command = SystemControlCommand::with_timer(power.clone(), timer.clone());

        command
            .execute("timer 1 menit matikan komputer", None)
            .await
            .unwrap();
        drop(command);
        assert!(timer.is_pending());

        timer.wait().await;
        assert_eq!(power.shutdowns.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_without_pending_timer_returns_immediately() {
        let (_, command) = handler();
        command.timer().wait().await;
        assert_eq!(command.timer().remaining(), None);
    }

    #[tokio::test]
    async fn test_unknown_system_command() {
        let (_, command) = handler();
        let err = command.execute("setel timer", None).await.unwrap_err();
        assert!(err.to_string().contains("Unknown system command"));
    }
}
