//! Logs command implementation

use anyhow::{Context, Result};

use vassist::logging::LogDirectory;

/// Print the last `lines` lines of the newest log file
pub fn logs_command(logs: &LogDirectory, lines: usize, cleanup: Option<u64>) -> Result<()> {
    if let Some(days) = cleanup {
        let deleted = logs
            .cleanup_old_logs(days)
            .context("Failed to clean up old logs")?;
        println!("✓ Deleted {} log files older than {} days", deleted, days);
    }

    let files = logs.log_files().context("Failed to list log files")?;
    let Some(newest) = files.first() else {
        println!("No log files in {}", logs.path().display());
        return Ok(());
    };

    println!(
        "{} ({} files, newest {} bytes)",
        newest.path.display(),
        files.len(),
        newest.size_bytes
    );
    println!("{}", "-".repeat(50));
    for line in logs.tail(lines).context("Failed to read log file")? {
        println!("{}", line);
    }
    Ok(())
}
