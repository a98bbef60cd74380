//! Text-input recognizer: one utterance per line

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader, Lines, Stdin};
use tokio::sync::Mutex;
use tracing::{debug, info};

use super::{SpeechRecognizer, normalize_utterance};
use crate::error::SpeechError;

pub struct TypedRecognizer<R = BufReader<Stdin>> {
    lines: Mutex<Lines<R>>,
    exhausted: AtomicBool,
    /// Pause after end of input so a listen loop does not spin
    eof_delay: Duration,
}

impl TypedRecognizer {
    pub fn stdin() -> Self {
        Self::from_reader(BufReader::new(tokio::io::stdin()))
    }
}

impl<R: AsyncBufRead + Unpin + Send> TypedRecognizer<R> {
    pub fn from_reader(reader: R) -> Self {
        Self {
            lines: Mutex::new(reader.lines()),
            exhausted: AtomicBool::new(false),
            eof_delay: Duration::from_millis(500),
        }
    }

    pub fn with_eof_delay(mut self, delay: Duration) -> Self {
        self.eof_delay = delay;
        self
    }

    pub fn is_exhausted(&self) -> bool {
        self.exhausted.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl<R: AsyncBufRead + Unpin + Send> SpeechRecognizer for TypedRecognizer<R> {
    async fn listen_for_command(&self) -> Result<Option<String>, SpeechError> {
        if self.is_exhausted() {
            tokio::time::sleep(self.eof_delay).await;
            return Ok(None);
        }

        let line = self.lines.lock().await.next_line().await?;
        match line {
            Some(line) => {
                let command = normalize_utterance(&line);
                if let Some(command) = &command {
                    info!("Command recognized: {}", command);
                }
                Ok(command)
            }
            None => {
                if !self.exhausted.swap(true, Ordering::SeqCst) {
                    info!("End of text input reached");
                }
                Ok(None)
            }
        }
    }

    async fn calibrate(&self, _duration: Duration) -> Result<(), SpeechError> {
        debug!("Text input needs no calibration");
        Ok(())
    }

    fn is_available(&self) -> bool {
        !self.is_exhausted()
    }

    fn describe(&self) -> String {
        if self.is_exhausted() {
            "typed input (end of input reached)".to_string()
        } else {
            "typed input (one command per line)".to_string()
        }
    }
}
