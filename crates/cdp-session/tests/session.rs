use std::sync::Arc;
use std::time::Duration;

use cdp_session::testing::{DriverEvent, FakeNode, ScriptedDriver, ScriptedLauncher};
use cdp_session::{
    ArtifactKind, DriverConfig, DriverError, DriverErrorKind, DriverSession, ManualClock,
    PollPolicy, Selector,
};
use tempfile::tempdir;

const PORTAL: &str = "https://portal.example/busqueda";

fn portal_driver() -> ScriptedDriver {
    ScriptedDriver::new()
        .page(
            "landing",
            FakeNode::new("body").child(FakeNode::button("reveal", "Licitaciones")),
        )
        .route(PORTAL, "landing")
}

async fn open(
    driver: &ScriptedDriver,
    clock: &ManualClock,
    dir: &std::path::Path,
) -> DriverSession<ScriptedDriver> {
    let launcher = ScriptedLauncher::new(driver);
    DriverSession::open(
        &launcher,
        &DriverConfig::default(),
        Arc::new(clock.clone()),
        dir,
    )
    .await
    .expect("scripted launch")
}

#[tokio::test]
async fn retriable_navigation_failure_is_retried_once_after_backoff() {
    let dir = tempdir().unwrap();
    let clock = ManualClock::new();
    let driver = portal_driver().fail_next_navigation(
        DriverError::new(DriverErrorKind::NavTimeout).retriable(true),
    );
    let session = open(&driver, &clock, dir.path()).await;

    session.navigate(PORTAL).await.unwrap();

    let navigations = driver
        .events()
        .into_iter()
        .filter(|event| matches!(event, DriverEvent::Navigate(_)))
        .count();
    assert_eq!(navigations, 2);
    assert_eq!(clock.sleeps(), vec![Duration::from_millis(5_000)]);
    session.close().await.unwrap();
}

#[tokio::test]
async fn second_navigation_failure_propagates() {
    let dir = tempdir().unwrap();
    let clock = ManualClock::new();
    let driver = portal_driver()
        .fail_next_navigation(DriverError::new(DriverErrorKind::NavTimeout).retriable(true))
        .fail_next_navigation(DriverError::new(DriverErrorKind::NavTimeout).retriable(true));
    let session = open(&driver, &clock, dir.path()).await;

    let err = session.navigate(PORTAL).await.unwrap_err();
    assert_eq!(err.kind, DriverErrorKind::NavTimeout);
    assert_eq!(driver.events().len(), 2);
    session.close().await.unwrap();
}

#[tokio::test]
async fn non_retriable_navigation_failure_is_not_retried() {
    let dir = tempdir().unwrap();
    let clock = ManualClock::new();
    let driver = portal_driver()
        .fail_next_navigation(DriverError::new(DriverErrorKind::Navigation).with_hint("dns"));
    let session = open(&driver, &clock, dir.path()).await;

    let err = session.navigate(PORTAL).await.unwrap_err();
    assert_eq!(err.kind, DriverErrorKind::Navigation);
    assert!(clock.sleeps().is_empty());
    session.close().await.unwrap();
}

#[tokio::test]
async fn close_is_idempotent() {
    let dir = tempdir().unwrap();
    let driver = portal_driver();
    let session = open(&driver, &ManualClock::new(), dir.path()).await;

    session.close().await.unwrap();
    session.close().await.unwrap();

    assert_eq!(driver.quit_count(), 1);
    assert!(session.is_closed());
    let err = session.navigate(PORTAL).await.unwrap_err();
    assert_eq!(err.kind, DriverErrorKind::Closed);
}

#[tokio::test]
async fn dropping_an_open_session_releases_the_browser() {
    let dir = tempdir().unwrap();
    let driver = portal_driver();
    let session = open(&driver, &ManualClock::new(), dir.path()).await;
    assert!(!driver.released());
    drop(session);
    assert!(driver.released());
    assert_eq!(driver.quit_count(), 0);
}

#[tokio::test]
async fn artifacts_land_in_the_session_folder() {
    let dir = tempdir().unwrap();
    let driver = portal_driver();
    let session = open(&driver, &ManualClock::new(), dir.path()).await;
    session.navigate(PORTAL).await.unwrap();

    let png = session
        .dump_artifact(ArtifactKind::Screenshot, "screenshot_formulario")
        .await
        .unwrap();
    let html = session
        .dump_artifact(ArtifactKind::PageSource, "formulario")
        .await
        .unwrap();

    assert_eq!(png, dir.path().join("screenshot_formulario.png"));
    assert!(std::fs::read(&png).unwrap().starts_with(b"\x89PNG"));
    let source = std::fs::read_to_string(&html).unwrap();
    assert!(source.contains("data-page=\"landing\""));
    session.close().await.unwrap();
}

#[tokio::test]
async fn wait_for_gives_up_after_policy_timeout() {
    let dir = tempdir().unwrap();
    let clock = ManualClock::new();
    let driver = portal_driver();
    let session = open(&driver, &clock, dir.path()).await;
    session.navigate(PORTAL).await.unwrap();

    let found = session
        .wait_for(&Selector::id("reveal"), &PollPolicy::with_timeout(3_000))
        .await
        .unwrap();
    assert!(found.is_some());
    assert!(clock.sleeps().is_empty());

    let missing = session
        .wait_for(&Selector::id("absent"), &PollPolicy::with_timeout(3_000))
        .await
        .unwrap();
    assert!(missing.is_none());
    assert_eq!(clock.total_slept(), Duration::from_millis(3_000));
    session.close().await.unwrap();
}

#[tokio::test]
async fn launch_errors_surface_as_launch_failed() {
    let launcher = ScriptedLauncher::failing(
        DriverError::new(DriverErrorKind::CdpIo).with_hint("websocket refused"),
    );
    let result: Result<DriverSession<ScriptedDriver>, _> = DriverSession::open(
        &launcher,
        &DriverConfig::default(),
        Arc::new(ManualClock::new()),
        "unused",
    )
    .await;
    let err = result.err().expect("launch must fail");
    assert_eq!(err.kind, DriverErrorKind::LaunchFailed);
    assert!(err.to_string().contains("websocket refused"));
}
