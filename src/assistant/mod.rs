//! Voice assistant orchestrator
//!
//! One long-lived listen loop pulls utterances from the speech recognizer and
//! hands each one to its own tokio task, so a slow handler never blocks
//! listening. Completion order across command tasks is unspecified.

mod status;

pub use status::{AssistantOptions, AssistantState, AssistantStatus};

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use futures::FutureExt;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::commands::{CommandContext, CommandInfo, CommandRegistry};
use crate::config::ConfigManager;
use crate::error::{AssistantError, DispatchError};
use crate::speech::SpeechRecognizer;

type ListenTask = JoinHandle<Result<(), AssistantError>>;

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// State shared between the assistant, its listen loop, and command tasks
struct Shared {
    config: Arc<ConfigManager>,
    speech: Arc<dyn SpeechRecognizer>,
    registry: Arc<CommandRegistry>,
    running: AtomicBool,
    commands: Mutex<Vec<JoinHandle<()>>>,
}

impl Shared {
    fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    fn commands(&self) -> MutexGuard<'_, Vec<JoinHandle<()>>> {
        self.commands.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Run the listen loop, turning a panic into a crash report
    async fn run_guarded(self: Arc<Self>, options: AssistantOptions) -> Result<(), AssistantError> {
        let outcome = AssertUnwindSafe(Arc::clone(&self).run_loop(options))
            .catch_unwind()
            .await;

        match outcome {
            Ok(()) => Ok(()),
            Err(panic) => {
                self.running.store(false, Ordering::SeqCst);
                let message = panic_message(&*panic);
                error!("Unexpected error in main loop: {}", message);
                Err(AssistantError::Crashed(message))
            }
        }
    }

    async fn run_loop(self: Arc<Self>, options: AssistantOptions) {
        info!("Voice Assistant main loop started. Listening for commands...");

        while self.is_running() {
            match self.speech.listen_for_command().await {
                Ok(Some(text)) if self.is_running() => self.dispatch(text),
                Ok(_) => {}
                Err(e) => {
                    error!("Error in main loop: {}", e);
                    tokio::time::sleep(options.error_backoff).await;
                    continue;
                }
            }
            tokio::time::sleep(options.idle_delay).await;
        }

        info!("Voice Assistant main loop stopped");
    }

    /// Execute one utterance on its own task
    fn dispatch(self: &Arc<Self>, text: String) {
        let id = Uuid::new_v4();
        let shared = Arc::clone(self);

        let handle = tokio::spawn(async move {
            info!(command_id = %id, "Processing command: {}", text);
            let outcome = AssertUnwindSafe(shared.registry.execute_command(&text, None))
                .catch_unwind()
                .await;

            match outcome {
                Ok(Ok(result)) => {
                    info!(command_id = %id, "Command executed successfully: {}", result)
                }
                Ok(Err(e)) => error!(command_id = %id, "Command execution error: {}", e),
                Err(panic) => error!(
                    command_id = %id,
                    "Unexpected error processing command '{}': {}",
                    text,
                    panic_message(&*panic)
                ),
            }
        });

        let mut commands = self.commands();
        commands.retain(|task| !task.is_finished());
        commands.push(handle);
    }
}

/// The running assistant: speech in, dispatched commands out
pub struct VoiceAssistant {
    shared: Arc<Shared>,
    options: AssistantOptions,
    listen_task: Mutex<Option<ListenTask>>,
}

impl VoiceAssistant {
    pub fn new(
        config: Arc<ConfigManager>,
        speech: Arc<dyn SpeechRecognizer>,
        registry: CommandRegistry,
    ) -> Self {
        info!(
            "Voice Assistant initialized with {} command handlers",
            registry.len()
        );
        Self {
            shared: Arc::new(Shared {
                config,
                speech,
                registry: Arc::new(registry),
                running: AtomicBool::new(false),
                commands: Mutex::new(Vec::new()),
            }),
            options: AssistantOptions::default(),
            listen_task: Mutex::new(None),
        }
    }

    pub fn with_options(mut self, options: AssistantOptions) -> Self {
        self.options = options;
        self
    }

    pub fn options(&self) -> &AssistantOptions {
        &self.options
    }

    pub fn config(&self) -> &Arc<ConfigManager> {
        &self.shared.config
    }

    pub fn registry(&self) -> &CommandRegistry {
        &self.shared.registry
    }

    pub fn state(&self) -> AssistantState {
        if self.shared.is_running() {
            AssistantState::Running
        } else {
            AssistantState::Stopped
        }
    }

    pub fn is_running(&self) -> bool {
        self.shared.is_running()
    }

    /// Run the listen loop on the current task until [`stop`](Self::stop).
    ///
    /// Returns immediately if already running. A panic inside the loop
    /// stops the assistant and is reported as [`AssistantError::Crashed`].
    pub async fn start(&self) -> Result<(), AssistantError> {
        if self.shared.running.swap(true, Ordering::SeqCst) {
            warn!("Voice Assistant is already running");
            return Ok(());
        }

        info!("Starting Voice Assistant...");
        Arc::clone(&self.shared).run_guarded(self.options).await
    }

    /// Spawn the listen loop onto the tokio runtime and return
    pub fn start_background(&self) {
        if self.shared.running.swap(true, Ordering::SeqCst) {
            warn!("Voice Assistant is already running");
            return;
        }

        info!("Starting Voice Assistant in background task...");
        let task = tokio::spawn(Arc::clone(&self.shared).run_guarded(self.options));
        *self.listen_task.lock().unwrap_or_else(PoisonError::into_inner) = Some(task);
    }

    /// Stop listening and wait up to the stop grace period for the listen
    /// loop and in-flight commands. Commands still running afterwards are
    /// left to finish on their own.
    pub async fn stop(&self) {
        if !self.shared.running.swap(false, Ordering::SeqCst) {
            return;
        }

        info!("Stopping Voice Assistant...");
        let deadline = Instant::now() + self.options.stop_grace;

        let listen = self
            .listen_task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(task) = listen {
            match tokio::time::timeout_at(deadline, task).await {
                Ok(Ok(Err(e))) => warn!("Listen loop ended with error: {}", e),
                Ok(Err(e)) => warn!("Listen loop task failed: {}", e),
                Ok(Ok(Ok(()))) => {}
                Err(_) => warn!("Listen loop did not stop gracefully"),
            }
        }

        let commands = std::mem::take(&mut *self.shared.commands());
        let pending = commands.iter().filter(|task| !task.is_finished()).count();
        if pending > 0 {
            debug!("Waiting for {} running command(s)", pending);
            let finished = tokio::time::timeout_at(deadline, futures::future::join_all(commands));
            if finished.await.is_err() {
                warn!("Commands still running after stop");
            }
        }

        info!("Voice Assistant stopped");
    }

    /// Dispatch a single utterance and wait for its result
    pub async fn process_command(
        &self,
        text: &str,
        context: Option<&CommandContext>,
    ) -> Result<String, DispatchError> {
        info!("Processing single command: {}", text);
        self.shared
            .registry
            .execute_command(text, context)
            .await
            .inspect_err(|e| error!("Error processing command '{}': {}", text, e))
    }

    /// Number of command tasks that have not finished yet
    pub fn pending_commands(&self) -> usize {
        self.shared
            .commands()
            .iter()
            .filter(|task| !task.is_finished())
            .count()
    }

    pub fn status(&self) -> AssistantStatus {
        AssistantStatus {
            state: self.state(),
            config_loaded: self.shared.config.is_loaded(),
            microphone_available: self.shared.speech.is_available(),
            registered_commands: self.shared.registry.len(),
            command_handlers: self.shared.registry.handler_names(),
        }
    }

    pub fn commands_info(&self) -> Vec<CommandInfo> {
        self.shared.registry.list_commands()
    }

    pub async fn calibrate(&self, duration: Duration) -> Result<(), AssistantError> {
        info!("Calibrating microphone...");
        self.shared
            .speech
            .calibrate(duration)
            .await
            .map_err(|e| {
                error!("Microphone calibration failed: {}", e);
                AssistantError::Calibration(e.to_string())
            })?;
        info!("Microphone calibration completed");
        Ok(())
    }

    /// Re-read the configuration file.
    ///
    /// Handlers see the new values on their next command. The wake word is
    /// fixed for the lifetime of the registry.
    pub fn reload_config(&self) -> Result<(), AssistantError> {
        info!("Reloading configuration...");
        self.shared.config.load().inspect_err(|e| {
            error!("Failed to reload configuration: {}", e);
        })?;
        info!("Configuration reloaded successfully");
        Ok(())
    }
}

impl Drop for VoiceAssistant {
    fn drop(&mut self) {
        // A detached listen loop exits on its next iteration
        self.shared.running.store(false, Ordering::SeqCst);
    }
}
