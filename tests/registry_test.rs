//! Dispatch through the fully wired registry

mod common;

use std::sync::Arc;
use std::sync::atomic::Ordering;

use common::{StubCommand, test_factory};
use vassist::commands::{BrowserCommand, Command, CommandRegistry};
use vassist::error::DispatchError;

#[tokio::test]
async fn test_youtube_with_wake_word_opens_url() {
    let (_temp, recorder, _) = test_factory();
    let mut registry = CommandRegistry::new("peter").unwrap();
    registry.register(Arc::new(BrowserCommand::new(recorder.clone())));

    let result = registry
        .execute_command("peter buka youtube", None)
        .await
        .unwrap();

    assert!(result.contains("https://youtube.com"));
    assert_eq!(recorder.opened_urls(), ["https://youtube.com"]);
}

#[tokio::test]
async fn test_youtube_without_wake_word_is_rejected() {
    let (_temp, recorder, _) = test_factory();
    let mut registry = CommandRegistry::new("peter").unwrap();
    registry.register(Arc::new(BrowserCommand::new(recorder.clone())));

    let err = registry
        .execute_command("buka youtube", None)
        .await
        .unwrap_err();

    assert!(matches!(err, DispatchError::MissingWakeWord { .. }));
    assert!(recorder.opened_urls().is_empty());
}

#[tokio::test]
async fn test_earlier_handler_wins_over_more_specific_one() {
    let h1 = Arc::new(StubCommand::new("H1", "lampu"));
    let h2 = Arc::new(StubCommand::new("H2", "lampu nyala"));
    let mut registry = CommandRegistry::new("peter").unwrap();
    registry.register(h1.clone());
    registry.register(h2.clone());

    let result = registry
        .execute_command("peter nyalakan lampu nyala", None)
        .await
        .unwrap();

    assert_eq!(result, "H1 done");
    assert_eq!(h1.executed(), ["nyalakan lampu nyala"]);
    assert!(h2.executed().is_empty());
}

#[tokio::test]
async fn test_default_handlers_dispatch_in_priority_order() {
    let (_temp, recorder, factory) = test_factory();
    let registry = factory.command_registry().unwrap();

    // "matikan komputer" belongs to system control even though the device
    // handler also knows "matikan"
    registry
        .execute_command("Peter matikan komputer", None)
        .await
        .unwrap();
    assert_eq!(recorder.shutdowns.load(Ordering::SeqCst), 1);

    registry
        .execute_command("peter matikan lampu", None)
        .await
        .unwrap();
    assert_eq!(
        recorder.device_calls(),
        [("Smart Plug 1".to_string(), false)]
    );

    let result = registry
        .execute_command("peter cari di google cuaca bandung", None)
        .await
        .unwrap();
    assert!(result.contains("https://www.google.com/search?q=cuaca+bandung"));

    let result = registry
        .execute_command("peter jalankan aplikasi calculator", None)
        .await
        .unwrap();
    assert_eq!(result, "Launched application: calculator");
    assert_eq!(recorder.launched(), ["calc.exe"]);
}

#[tokio::test]
async fn test_screenshot_through_registry() {
    let (temp, recorder, factory) = test_factory();
    let folder = temp.path().join("shots");
    factory
        .config_manager()
        .update(|config| config.settings.screenshots_folder = folder.display().to_string())
        .unwrap();

    let registry = factory.command_registry().unwrap();
    let result = registry
        .execute_command("peter tangkap layar", None)
        .await
        .unwrap();

    assert!(result.starts_with("Screenshot saved: "));
    assert_eq!(recorder.captures.lock().unwrap().len(), 1);
    assert_eq!(std::fs::read_dir(&folder).unwrap().count(), 1);
}

#[tokio::test]
async fn test_unknown_command_has_no_handler() {
    let (_temp, _recorder, factory) = test_factory();
    let registry = factory.command_registry().unwrap();

    let err = registry
        .execute_command("peter nyanyikan lagu", None)
        .await
        .unwrap_err();
    assert!(err.is_no_handler());
}

#[tokio::test]
async fn test_handler_failure_keeps_original_message() {
    let (_temp, _recorder, factory) = test_factory();
    let registry = factory.command_registry().unwrap();

    let err = registry
        .execute_command("peter timer 0 menit matikan komputer", None)
        .await
        .unwrap_err();

    assert_eq!(err.handler(), Some("SystemControlCommand"));
    assert!(err.to_string().contains("Timer duration must be positive"));
}

#[test]
fn test_listing_uses_configured_wake_word() {
    let (_temp, _recorder, factory) = test_factory();
    factory
        .config_manager()
        .update(|config| config.settings.wake_word = "Jarvis".to_string())
        .unwrap();

    let registry = factory.command_registry().unwrap();
    let listing = registry.list_commands();

    assert_eq!(listing.len(), 5);
    assert!(
        listing
            .iter()
            .flat_map(|info| info.patterns.iter())
            .all(|pattern| pattern.starts_with("jarvis "))
    );
}

#[test]
fn test_register_then_unregister_restores_order() {
    let (_temp, _recorder, factory) = test_factory();
    let mut registry = factory.command_registry().unwrap();
    let before = registry.handler_names();

    let extra: Arc<dyn Command> = Arc::new(StubCommand::new("Extra", "extra"));
    registry.register(extra.clone());
    assert!(registry.unregister(&extra));

    assert_eq!(registry.handler_names(), before);
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_timer_outlives_the_registry() {
    let (_temp, recorder, factory) = test_factory();
    {
        let registry = factory.command_registry().unwrap();
        let result = registry
            .execute_command("peter timer 2 menit matikan komputer", None)
            .await
            .unwrap();
        assert_eq!(result, "Computer will shutdown in 2 minutes");
    }

    let timer = factory.shutdown_timer();
    assert!(timer.is_pending());
    assert_eq!(recorder.shutdowns.load(Ordering::SeqCst), 0);

    timer.wait().await;
    assert_eq!(recorder.shutdowns.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn test_timer_cancelled_through_another_registry() {
    let (_temp, recorder, factory) = test_factory();
    let first = factory.command_registry().unwrap();
    first
        .execute_command("peter timer 5 menit matikan komputer", None)
        .await
        .unwrap();

    let second = factory.command_registry().unwrap();
    let result = second
        .execute_command("peter batalkan timer", None)
        .await
        .unwrap();

    assert_eq!(result, "Shutdown timer cancelled");
    assert!(!factory.shutdown_timer().is_pending());
    tokio::time::sleep(std::time::Duration::from_secs(600)).await;
    assert_eq!(recorder.shutdowns.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_oversized_timer_fails_without_panicking() {
    let (_temp, _recorder, factory) = test_factory();
    let registry = factory.command_registry().unwrap();

    let err = registry
        .execute_command("peter timer 999999999999999999 menit matikan komputer", None)
        .await
        .unwrap_err();

    assert_eq!(err.handler(), Some("SystemControlCommand"));
    assert!(err.to_string().contains("Timer duration too large"));
    assert!(!factory.shutdown_timer().is_pending());
}
