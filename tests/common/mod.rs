//! Shared fakes for integration tests
#![allow(dead_code)]

use std::collections::VecDeque;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tempfile::TempDir;

use vassist::commands::{Command, CommandContext};
use vassist::config::SmartDevice;
use vassist::error::{CommandError, SpeechError};
use vassist::factory::{AssistantFactory, Backends};
use vassist::platform::{AppLauncher, Browser, DeviceController, PowerControl, ScreenCapture};
use vassist::speech::SpeechRecognizer;

/// Records every side effect the handlers trigger
#[derive(Default)]
pub struct Recorder {
    pub opened_urls: Mutex<Vec<String>>,
    pub launched: Mutex<Vec<String>>,
    pub shutdowns: AtomicUsize,
    pub captures: Mutex<Vec<String>>,
    pub device_calls: Mutex<Vec<(String, bool)>>,
}

impl Recorder {
    pub fn opened_urls(&self) -> Vec<String> {
        self.opened_urls.lock().unwrap().clone()
    }

    pub fn launched(&self) -> Vec<String> {
        self.launched.lock().unwrap().clone()
    }

    pub fn device_calls(&self) -> Vec<(String, bool)> {
        self.device_calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Browser for Recorder {
    async fn open(&self, url: &str) -> Result<(), CommandError> {
        self.opened_urls.lock().unwrap().push(url.to_string());
        Ok(())
    }
}

#[async_trait]
impl AppLauncher for Recorder {
    async fn launch(&self, executable: &str) -> Result<(), CommandError> {
        self.launched.lock().unwrap().push(executable.to_string());
        Ok(())
    }
}

#[async_trait]
impl PowerControl for Recorder {
    async fn shutdown(&self) -> Result<(), CommandError> {
        self.shutdowns.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn close_user_applications(&self) -> Result<usize, CommandError> {
        Ok(0)
    }
}

#[async_trait]
impl ScreenCapture for Recorder {
    async fn capture(&self, path: &Path) -> Result<(), CommandError> {
        std::fs::write(path, b"\x89PNG").map_err(|e| CommandError::Execution(e.to_string()))?;
        self.captures
            .lock()
            .unwrap()
            .push(path.display().to_string());
        Ok(())
    }
}

#[async_trait]
impl DeviceController for Recorder {
    async fn set_power(&self, device: &SmartDevice, on: bool) -> Result<(), CommandError> {
        self.device_calls
            .lock()
            .unwrap()
            .push((device.name.clone(), on));
        Ok(())
    }

    async fn status(&self, _device: &SmartDevice) -> Result<serde_json::Value, CommandError> {
        Ok(serde_json::json!({ "dps": { "1": true } }))
    }
}

/// Backends that only record, with the device backend enabled
pub fn recording_backends() -> (Arc<Recorder>, Backends) {
    let recorder = Arc::new(Recorder::default());
    let backends = Backends {
        browser: recorder.clone(),
        launcher: recorder.clone(),
        power: recorder.clone(),
        screen: recorder.clone(),
        devices: Some(recorder.clone()),
    };
    (recorder, backends)
}

/// Factory over a fresh config file in a temp dir, with recording backends
pub fn test_factory() -> (TempDir, Arc<Recorder>, AssistantFactory) {
    let temp = TempDir::new().expect("Failed to create temp dir");
    let (recorder, backends) = recording_backends();
    let factory = AssistantFactory::new(temp.path().join("config").join("devices.toml"))
        .with_backends(backends);
    (temp, recorder, factory)
}

/// One scripted listen outcome
pub enum Heard {
    Text(&'static str),
    Nothing,
    Failure(&'static str),
    Panic,
}

/// Recognizer that replays a script, then hears nothing
pub struct ScriptedRecognizer {
    script: Mutex<VecDeque<Heard>>,
    pub listens: AtomicUsize,
    pub calibrations: AtomicUsize,
}

impl ScriptedRecognizer {
    pub fn new(script: impl IntoIterator<Item = Heard>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script.into_iter().collect()),
            listens: AtomicUsize::new(0),
            calibrations: AtomicUsize::new(0),
        })
    }

    /// Hears nothing, ever
    pub fn silent() -> Arc<Self> {
        Self::new(Vec::<Heard>::new())
    }

    pub fn remaining(&self) -> usize {
        self.script.lock().unwrap().len()
    }
}

#[async_trait]
impl SpeechRecognizer for ScriptedRecognizer {
    async fn listen_for_command(&self) -> Result<Option<String>, SpeechError> {
        self.listens.fetch_add(1, Ordering::SeqCst);
        let next = self.script.lock().unwrap().pop_front();
        match next {
            Some(Heard::Text(text)) => Ok(Some(text.to_string())),
            Some(Heard::Failure(message)) => Err(SpeechError::Service(message.to_string())),
            Some(Heard::Panic) => panic!("microphone exploded"),
            Some(Heard::Nothing) | None => {
                tokio::time::sleep(Duration::from_millis(5)).await;
                Ok(None)
            }
        }
    }

    async fn calibrate(&self, _duration: Duration) -> Result<(), SpeechError> {
        self.calibrations.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn is_available(&self) -> bool {
        true
    }

    fn describe(&self) -> String {
        "scripted".to_string()
    }
}

/// Handler matching a substring; optionally slow or panicking
pub struct StubCommand {
    pub name: &'static str,
    pub trigger: &'static str,
    pub delay: Duration,
    pub panics: bool,
    pub executed: Mutex<Vec<String>>,
    pub completed: AtomicUsize,
}

impl StubCommand {
    pub fn new(name: &'static str, trigger: &'static str) -> Self {
        Self {
            name,
            trigger,
            delay: Duration::ZERO,
            panics: false,
            executed: Mutex::new(Vec::new()),
            completed: AtomicUsize::new(0),
        }
    }

    pub fn slow(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn panicking(mut self) -> Self {
        self.panics = true;
        self
    }

    pub fn executed(&self) -> Vec<String> {
        self.executed.lock().unwrap().clone()
    }
}

#[async_trait]
impl Command for StubCommand {
    fn name(&self) -> &str {
        self.name
    }

    fn patterns(&self) -> Vec<String> {
        vec![self.trigger.to_string()]
    }

    fn description(&self) -> &str {
        "test handler"
    }

    fn can_handle(&self, command: &str) -> bool {
        command.to_lowercase().contains(self.trigger)
    }

    async fn execute(
        &self,
        command: &str,
        _context: Option<&CommandContext>,
    ) -> Result<String, CommandError> {
        self.executed.lock().unwrap().push(command.to_string());
        if self.panics {
            panic!("handler bug");
        }
        tokio::time::sleep(self.delay).await;
        self.completed.fetch_add(1, Ordering::SeqCst);
        Ok(format!("{} done", self.name))
    }
}

/// Poll `condition` until it holds or `limit` elapses
pub async fn wait_until(limit: Duration, condition: impl Fn() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + limit;
    while tokio::time::Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    condition()
}
