//! Browser session layer for the procurement extractor.
//!
//! Exposes a small [`Driver`] capability trait, the Chromium implementation
//! over CDP, an owned [`DriverSession`] with idempotent teardown, and the
//! clock/polling helpers used for every wait.

pub mod chromium;
pub mod config;
pub mod driver;
pub mod error;
pub mod locate;
pub mod session;
#[cfg(feature = "testing")]
pub mod testing;
pub mod wait;

pub use chromium::{ChromiumDriver, ChromiumLauncher};
pub use config::DriverConfig;
pub use driver::{Driver, Launcher, Selector};
pub use error::{DriverError, DriverErrorKind};
pub use locate::chrome_version;
pub use session::{ArtifactKind, DriverSession};
pub use wait::{poll_until, Clock, ManualClock, PollPolicy, TokioClock};
