//! Smoke test against a real Chromium. Opt-in with `LICITACIONES_REAL_CHROME=1`.

use std::sync::Arc;

use cdp_session::{
    ArtifactKind, ChromiumLauncher, DriverConfig, DriverSession, PollPolicy, Selector, TokioClock,
};
use tempfile::tempdir;

fn real_chrome_enabled() -> bool {
    std::env::var("LICITACIONES_REAL_CHROME")
        .map(|value| matches!(value.trim(), "1" | "true" | "yes"))
        .unwrap_or(false)
}

#[tokio::test]
async fn drives_a_data_url_page() {
    if !real_chrome_enabled() {
        eprintln!("skipping real chrome test; set LICITACIONES_REAL_CHROME=1");
        return;
    }

    let dir = tempdir().unwrap();
    let session = DriverSession::open(
        &ChromiumLauncher,
        &DriverConfig::default(),
        Arc::new(TokioClock::new()),
        dir.path(),
    )
    .await
    .expect("launch chromium");

    let html = "data:text/html,<input id='a:b' value='x'><select id='s'><option value='PUB'>Publicada</option></select><a target='_blank' href='https://example.org/d'>go</a>";
    session.navigate(html).await.unwrap();

    let input = session
        .wait_for(&Selector::id("a:b"), &PollPolicy::with_timeout(5_000))
        .await
        .unwrap()
        .expect("input present");
    session.clear(&input).await.unwrap();
    session.type_text(&input, "48000000").await.unwrap();
    assert_eq!(
        session.attribute(&input, "value").await.unwrap().as_deref(),
        Some("48000000")
    );

    let select = session.find(&Selector::id("s")).await.unwrap().unwrap();
    session.select_option(&select, "PUB").await.unwrap();
    assert!(session.select_option(&select, "NOPE").await.is_err());

    let link = session
        .find(&Selector::css("a[target='_blank']"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(
        session.attribute(&link, "href").await.unwrap().as_deref(),
        Some("https://example.org/d")
    );

    let shot = session
        .dump_artifact(ArtifactKind::Screenshot, "smoke")
        .await
        .unwrap();
    assert!(shot.exists());

    session.close().await.unwrap();
    session.close().await.unwrap();
}
