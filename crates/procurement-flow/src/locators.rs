//! Portal identifiers and wait timings. Every value can be overridden from
//! configuration.

use cdp_session::{PollPolicy, Selector};
use serde::{Deserialize, Serialize};

pub const DEFAULT_PORTAL_URL: &str =
    "https://contrataciondelestado.es/wps/portal/plataforma/buscadores/busqueda";

/// JSF naming-container prefix shared by every control of the search form.
pub const FORM_PREFIX: &str = "viewns_Z7_AVEQAI930OBRD02JPMTPG21004_:form1:";

pub const DEFAULT_PAGINATION_MARKER: &str = "Página";

fn form_id(suffix: &str) -> Selector {
    Selector::id(format!("{FORM_PREFIX}{suffix}"))
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PortalLocators {
    pub reveal_form: Selector,
    pub code_input: Selector,
    pub code_add: Selector,
    pub date_lower: Selector,
    pub date_upper: Selector,
    pub status_select: Selector,
    pub submit: Selector,
    pub next_page: Selector,
    pub result_table: Selector,
    pub result_row: Selector,
    pub result_cell: Selector,
    pub anchor: Selector,
    pub iframe: Selector,
}

impl Default for PortalLocators {
    fn default() -> Self {
        Self {
            reveal_form: form_id("linkFormularioBusqueda"),
            code_input: form_id("cpvMultiple:codigoCpv"),
            code_add: form_id("cpvMultiplebuttonAnyadirMultiple"),
            date_lower: form_id("textMinFecAnuncioMAQ2"),
            date_upper: form_id("textMaxFecAnuncioMAQ"),
            status_select: form_id("estadoLici"),
            submit: form_id("button1"),
            next_page: form_id("footerSiguiente"),
            result_table: Selector::tag("table"),
            result_row: Selector::tag("tr"),
            result_cell: Selector::tag("td"),
            anchor: Selector::tag("a"),
            iframe: Selector::tag("iframe"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PortalConfig {
    pub url: String,
    pub locators: PortalLocators,
    pub pagination_marker: String,
}

impl Default for PortalConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_PORTAL_URL.to_string(),
            locators: PortalLocators::default(),
            pagination_marker: DEFAULT_PAGINATION_MARKER.to_string(),
        }
    }
}

/// Settle delays after each kind of action plus the lookup poll policy, in
/// milliseconds.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Timings {
    pub after_load_ms: u64,
    pub after_reveal_ms: u64,
    pub after_add_ms: u64,
    pub after_submit_ms: u64,
    pub before_next_ms: u64,
    pub after_next_ms: u64,
    pub lookup: PollPolicy,
}

impl Default for Timings {
    fn default() -> Self {
        Self {
            after_load_ms: 8_000,
            after_reveal_ms: 5_000,
            after_add_ms: 3_000,
            after_submit_ms: 5_000,
            before_next_ms: 500,
            after_next_ms: 4_000,
            lookup: PollPolicy::with_timeout(10_000),
        }
    }
}
