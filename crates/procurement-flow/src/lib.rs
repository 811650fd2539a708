//! Procurement portal extraction flow.
//!
//! [`Orchestrator::run`] opens a browser session, walks the search form with
//! [`FormNavigator`], drains [`ResultPages`] through the row parser and
//! persists the records into a per-run folder.

pub mod artifacts;
pub mod criteria;
pub mod errors;
pub mod locators;
pub mod navigator;
pub mod orchestrator;
pub mod paginator;
pub mod parser;
pub mod record;

pub use artifacts::RunFolder;
pub use criteria::{parse_code_list, SearchCriteria, SearchRequest, DATE_FORMAT};
pub use errors::{ArtifactError, CriteriaError, FlowError, FlowResult};
pub use locators::{PortalConfig, PortalLocators, Timings};
pub use navigator::{FilterReport, FormInventory, FormNavigator, FormState};
pub use orchestrator::{FlowSettings, Orchestrator, RunExecutor, RunResult};
pub use paginator::{Page, PaginationEnd, ResultPages};
pub use parser::parse_row;
pub use record::{RawAnchor, RawCell, RawRow, Record};
