//! Browser and internet commands

use std::collections::BTreeMap;
use std::sync::{Arc, PoisonError, RwLock};

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::info;

use super::{Command, CommandContext, contains_any};
use crate::error::CommandError;
use crate::platform::Browser;

const PATTERNS: &[&str] = &["buka youtube", "cari di google *", "buka website *"];

const MATCH_VOCABULARY: &[&str] = &["buka youtube", "cari di google", "buka website"];

const YOUTUBE_URL: &str = "https://youtube.com";

static SEARCH_KEYWORDS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"cari di google (.+)").expect("valid regex"));
static WEBSITE_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"buka website (.+)").expect("valid regex"));

fn default_website_shortcuts() -> BTreeMap<String, String> {
    [
        ("github", "https://github.com"),
        ("facebook", "https://facebook.com"),
        ("twitter", "https://twitter.com"),
        ("instagram", "https://instagram.com"),
        ("linkedin", "https://linkedin.com"),
        ("stackoverflow", "https://stackoverflow.com"),
        ("reddit", "https://reddit.com"),
        ("netflix", "https://netflix.com"),
        ("amazon", "https://amazon.com"),
        ("gmail", "https://gmail.com"),
        ("youtube", "https://youtube.com"),
        ("google", "https://google.com"),
    ]
    .into_iter()
    .map(|(name, url)| (name.to_string(), url.to_string()))
    .collect()
}

/// Google search URL; words are percent-encoded and joined with `+`
pub(crate) fn google_search_url(keywords: &str) -> String {
    let query = keywords
        .split_whitespace()
        .map(|word| urlencoding::encode(word).into_owned())
        .collect::<Vec<_>>()
        .join("+");
    format!("https://www.google.com/search?q={}", query)
}

pub struct BrowserCommand {
    browser: Arc<dyn Browser>,
    website_shortcuts: RwLock<BTreeMap<String, String>>,
}

impl BrowserCommand {
    pub fn new(browser: Arc<dyn Browser>) -> Self {
        Self {
            browser,
            website_shortcuts: RwLock::new(default_website_shortcuts()),
        }
    }

    /// Add or replace a website shortcut. URLs without a scheme get `https://`.
    pub fn add_website_shortcut(&self, name: &str, url: &str) {
        let url = if url.starts_with("http://") || url.starts_with("https://") {
            url.to_string()
        } else {
            format!("https://{}", url)
        };
        info!("Added website shortcut: {} -> {}", name, url);
        self.website_shortcuts
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(name.to_lowercase(), url);
    }

    pub fn remove_website_shortcut(&self, name: &str) -> bool {
        let removed = self
            .website_shortcuts
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&name.to_lowercase())
            .is_some();
        if removed {
            info!("Removed website shortcut: {}", name);
        }
        removed
    }

    pub fn list_website_shortcuts(&self) -> BTreeMap<String, String> {
        self.website_shortcuts
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Shortcut URL for a site name, or `https://<name>.com`
    fn resolve_website(&self, name: &str) -> String {
        self.website_shortcuts
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
            .unwrap_or_else(|| format!("https://{}.com", name))
    }

    async fn open_youtube(&self) -> Result<String, CommandError> {
        info!("Opening YouTube");
        self.browser.open(YOUTUBE_URL).await?;
        Ok(format!("Opened YouTube: {}", YOUTUBE_URL))
    }

    async fn search_google(&self, command: &str) -> Result<String, CommandError> {
        let keywords = SEARCH_KEYWORDS
            .captures(command)
            .map(|c| c[1].trim().to_string())
            .filter(|k| !k.is_empty())
            .ok_or_else(|| CommandError::Execution("No search keywords provided".to_string()))?;

        let url = google_search_url(&keywords);
        info!("Searching Google for: {}", keywords);
        self.browser.open(&url).await?;
        Ok(format!("Searching Google for: {} ({})", keywords, url))
    }

    async fn open_website(&self, command: &str) -> Result<String, CommandError> {
        let name = WEBSITE_NAME
            .captures(command)
            .map(|c| c[1].trim().to_lowercase())
            .filter(|n| !n.is_empty())
            .ok_or_else(|| CommandError::Execution("No website name provided".to_string()))?;

        let url = self.resolve_website(&name);
        info!("Opening website: {}", url);
        self.browser.open(&url).await?;
        Ok(format!("Opened website: {}", url))
    }
}

#[async_trait]
impl Command for BrowserCommand {
    fn name(&self) -> &str {
        "BrowserCommand"
    }

    fn patterns(&self) -> Vec<String> {
        PATTERNS.iter().map(|p| p.to_string()).collect()
    }

    fn description(&self) -> &str {
        "Handle browser commands: open YouTube, Google search, open websites"
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

        if command.contains("buka youtube") {
            self.open_youtube().await
        } else if command.contains("cari di google") {
            self.search_google(&command).await
        } else if command.contains("buka website") {
            self.open_website(&command).await
        } else {
            Err(CommandError::Execution(format!(
                "Unknown browser command: {}",
                command
            )))
        }
    }
}
