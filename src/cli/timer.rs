//! Keeps the process alive while a shutdown timer is pending

use tracing::info;

use vassist::factory::AssistantFactory;

/// Block until a pending shutdown fires. Ctrl+C cancels it instead.
///
/// The timer runs on this process's runtime, so exiting early would
/// silently drop it.
pub async fn wait_for_pending_shutdown(factory: &AssistantFactory) {
    let timer = factory.shutdown_timer();
    let Some(remaining) = timer.remaining() else {
        return;
    };

    println!(
        "Shutdown scheduled in {} seconds; waiting for it (Ctrl+C cancels)",
        remaining.as_secs()
    );
    tokio::select! {
        _ = timer.wait() => {
            info!("Scheduled shutdown executed");
        }
        _ = tokio::signal::ctrl_c() => {
            if timer.cancel() {
                println!("✓ Shutdown timer cancelled");
            }
        }
    }
}
