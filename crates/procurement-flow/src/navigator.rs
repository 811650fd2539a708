//! Search form state machine:
//! `Init -> PortalLoaded -> FormRevealed -> FiltersApplied -> Submitted`.

use cdp_session::{ArtifactKind, Driver, DriverSession, Selector};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::artifacts::{write_json, FORM_INVENTORY_JSON};
use crate::criteria::SearchCriteria;
use crate::errors::{FlowError, FlowResult};
use crate::locators::{PortalConfig, Timings};

const IFRAME_SRC_LIMIT: usize = 80;
const SELECT_OPTION_LIMIT: usize = 10;
const SELECT_OPTION_PREVIEW: usize = 5;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum FormState {
    Init,
    PortalLoaded,
    FormRevealed,
    FiltersApplied,
    Submitted,
}

/// What the filter step managed to set.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct FilterReport {
    pub add_attempted: usize,
    pub add_succeeded: usize,
    pub failed_codes: Vec<String>,
    pub lower_date_set: bool,
    pub upper_date_set: bool,
    pub status_selected: bool,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct InputField {
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub name: Option<String>,
    pub placeholder: Option<String>,
    pub id: Option<String>,
    pub value: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct SelectField {
    pub name: Option<String>,
    pub id: Option<String>,
    pub options: Vec<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ButtonField {
    pub text: String,
    #[serde(rename = "type")]
    pub kind: Option<String>,
}

/// Visible controls of the revealed search form.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct FormInventory {
    pub inputs: Vec<InputField>,
    pub selects: Vec<SelectField>,
    pub buttons: Vec<ButtonField>,
}

pub struct FormNavigator<'a, D: Driver> {
    session: &'a DriverSession<D>,
    portal: &'a PortalConfig,
    timings: &'a Timings,
    state: FormState,
    report: FilterReport,
}

impl<'a, D: Driver> FormNavigator<'a, D> {
    pub fn new(session: &'a DriverSession<D>, portal: &'a PortalConfig, timings: &'a Timings) -> Self {
        Self {
            session,
            portal,
            timings,
            state: FormState::Init,
            report: FilterReport::default(),
        }
    }

    pub fn state(&self) -> FormState {
        self.state
    }

    pub fn report(&self) -> &FilterReport {
        &self.report
    }

    /// Drives the form from `Init` to `Submitted`.
    pub async fn run(&mut self, criteria: &SearchCriteria) -> FlowResult<FilterReport> {
        self.load_portal().await?;
        self.reveal_form().await?;
        self.apply_filters(criteria).await?;
        self.submit().await?;
        Ok(self.report.clone())
    }

    fn advance(&mut self, expected: FormState, next: FormState) -> FlowResult<()> {
        if self.state != expected {
            return Err(FlowError::OutOfOrder {
                from: self.state,
                to: next,
            });
        }
        Ok(())
    }

    pub async fn load_portal(&mut self) -> FlowResult<()> {
        self.advance(FormState::Init, FormState::PortalLoaded)?;
        info!(target: "procurement-flow", url = %self.portal.url, "loading search portal");
        self.session
            .navigate(&self.portal.url)
            .await
            .map_err(FlowError::Navigation)?;
        self.session.settle(self.timings.after_load_ms).await;
        self.capture(ArtifactKind::Screenshot, "screenshot_formulario").await;
        self.log_iframes().await;
        self.state = FormState::PortalLoaded;
        Ok(())
    }

    pub async fn reveal_form(&mut self) -> FlowResult<()> {
        self.advance(FormState::PortalLoaded, FormState::FormRevealed)?;
        let selector = &self.portal.locators.reveal_form;
        let link = self
            .session
            .wait_for(selector, &self.timings.lookup)
            .await?
            .ok_or_else(|| FlowError::FormNotFound {
                selector: selector.to_string(),
            })?;
        let label = self.session.text(&link).await.unwrap_or_default();
        info!(target: "procurement-flow", label = %label, "opening search form");
        self.session.click(&link).await?;
        self.session.settle(self.timings.after_reveal_ms).await;

        self.capture(ArtifactKind::Screenshot, "screenshot_formulario_busqueda").await;
        self.capture(ArtifactKind::PageSource, "formulario_busqueda_selenium").await;
        match self.inventory().await {
            Ok(inventory) => self.save_inventory(&inventory).await,
            Err(err) => warn!(target: "procurement-flow", error = %err, "form inventory failed"),
        }
        self.state = FormState::FormRevealed;
        Ok(())
    }

    pub async fn apply_filters(&mut self, criteria: &SearchCriteria) -> FlowResult<()> {
        self.advance(FormState::FormRevealed, FormState::FiltersApplied)?;
        info!(
            target: "procurement-flow",
            desde = %criteria.lower_text(),
            hasta = %criteria.upper_text(),
            codes = ?criteria.codes(),
            "applying search filters"
        );

        let total = criteria.codes().len();
        for (position, code) in criteria.codes().iter().enumerate() {
            self.report.add_attempted += 1;
            debug!(target: "procurement-flow", code = %code, position = position + 1, total, "adding filter code");
            match self.add_code(code).await {
                Ok(()) => {
                    self.report.add_succeeded += 1;
                    info!(target: "procurement-flow", code = %code, "filter code added");
                }
                Err(err) => {
                    self.report.failed_codes.push(code.clone());
                    warn!(target: "procurement-flow", code = %code, error = %err, "failed to add filter code");
                }
            }
        }
        if total == 0 {
            info!(target: "procurement-flow", "no filter codes given; searching all notices");
        }

        let locators = &self.portal.locators;
        self.report.lower_date_set = self
            .fill_field(&locators.date_lower, &criteria.lower_text(), "fecha_desde")
            .await;
        self.report.upper_date_set = self
            .fill_field(&locators.date_upper, &criteria.upper_text(), "fecha_hasta")
            .await;
        self.report.status_selected = self.select_status(criteria.status()).await;

        self.capture(ArtifactKind::Screenshot, "screenshot_antes_busqueda").await;
        self.state = FormState::FiltersApplied;
        Ok(())
    }

    pub async fn submit(&mut self) -> FlowResult<()> {
        self.advance(FormState::FiltersApplied, FormState::Submitted)?;
        let selector = &self.portal.locators.submit;
        let button = self
            .session
            .wait_for(selector, &self.timings.lookup)
            .await?
            .ok_or_else(|| FlowError::SubmitNotFound {
                selector: selector.to_string(),
            })?;
        info!(target: "procurement-flow", "submitting search");
        self.session.click(&button).await?;
        self.session.settle(self.timings.after_submit_ms).await;
        self.state = FormState::Submitted;
        Ok(())
    }

    /// One add-value transaction: fill the code field, press add, settle.
    async fn add_code(&self, code: &str) -> Result<(), cdp_session::DriverError> {
        let locators = &self.portal.locators;
        let input = self
            .session
            .find(&locators.code_input)
            .await?
            .ok_or_else(|| missing(&locators.code_input))?;
        self.session.clear(&input).await?;
        self.session.type_text(&input, code).await?;
        let add = self
            .session
            .find(&locators.code_add)
            .await?
            .ok_or_else(|| missing(&locators.code_add))?;
        self.session.click(&add).await?;
        self.session.settle(self.timings.after_add_ms).await;
        Ok(())
    }

    async fn fill_field(&self, selector: &Selector, value: &str, field: &str) -> bool {
        let result = async {
            let Some(input) = self.session.find(selector).await? else {
                return Ok(false);
            };
            self.session.clear(&input).await?;
            self.session.type_text(&input, value).await?;
            Ok::<_, cdp_session::DriverError>(true)
        }
        .await;
        match result {
            Ok(true) => {
                info!(target: "procurement-flow", field, value, "date filter set");
                true
            }
            Ok(false) => {
                warn!(target: "procurement-flow", field, selector = %selector, "date field not found; skipping");
                false
            }
            Err(err) => {
                warn!(target: "procurement-flow", field, error = %err, "failed to fill date field");
                false
            }
        }
    }

    async fn select_status(&self, status: &str) -> bool {
        let selector = &self.portal.locators.status_select;
        let result = async {
            let Some(select) = self.session.find(selector).await? else {
                return Ok(false);
            };
            self.session.select_option(&select, status).await?;
            Ok::<_, cdp_session::DriverError>(true)
        }
        .await;
        match result {
            Ok(true) => {
                info!(target: "procurement-flow", status, "status filter selected");
                true
            }
            Ok(false) => {
                warn!(target: "procurement-flow", selector = %selector, "status select not found; skipping");
                false
            }
            Err(err) => {
                warn!(target: "procurement-flow", status, error = %err, "failed to select status");
                false
            }
        }
    }

    async fn capture(&self, kind: ArtifactKind, name: &str) {
        match self.session.dump_artifact(kind, name).await {
            Ok(path) => debug!(target: "procurement-flow", path = %path.display(), "capture saved"),
            Err(err) => warn!(target: "procurement-flow", name, error = %err, "capture failed"),
        }
    }

    async fn log_iframes(&self) {
        let frames = match self.session.find_all(&self.portal.locators.iframe).await {
            Ok(frames) => frames,
            Err(err) => {
                warn!(target: "procurement-flow", error = %err, "iframe lookup failed");
                return;
            }
        };
        info!(target: "procurement-flow", count = frames.len(), "iframes on portal");
        for (index, frame) in frames.iter().enumerate() {
            let name = self.session.attribute(frame, "name").await.ok().flatten();
            let src = self
                .session
                .attribute(frame, "src")
                .await
                .ok()
                .flatten()
                .map(|src| src.chars().take(IFRAME_SRC_LIMIT).collect::<String>());
            info!(
                target: "procurement-flow",
                index = index + 1,
                name = name.as_deref().unwrap_or("N/A"),
                src = src.as_deref().unwrap_or("N/A"),
                "iframe"
            );
        }
    }

    /// Visible inputs (except hidden ones), selects and labelled buttons.
    pub async fn inventory(&self) -> Result<FormInventory, cdp_session::DriverError> {
        let session = self.session;
        let mut inventory = FormInventory::default();

        for input in session.find_all(&Selector::tag("input")).await? {
            if !session.is_displayed(&input).await.unwrap_or(false) {
                continue;
            }
            let kind = session.attribute(&input, "type").await.ok().flatten();
            if kind.as_deref() == Some("hidden") {
                continue;
            }
            let field = InputField {
                kind,
                name: session.attribute(&input, "name").await.ok().flatten(),
                placeholder: session.attribute(&input, "placeholder").await.ok().flatten(),
                id: session.attribute(&input, "id").await.ok().flatten(),
                value: session.attribute(&input, "value").await.ok().flatten(),
            };
            debug!(target: "procurement-flow", field = ?field, "visible input");
            inventory.inputs.push(field);
        }

        for select in session.find_all(&Selector::tag("select")).await? {
            if !session.is_displayed(&select).await.unwrap_or(false) {
                continue;
            }
            let options = session.find_within(&select, &Selector::tag("option")).await?;
            let mut labels = Vec::new();
            if !options.is_empty() && options.len() <= SELECT_OPTION_LIMIT {
                for option in options.iter().take(SELECT_OPTION_PREVIEW) {
                    labels.push(session.text(option).await.unwrap_or_default());
                }
            }
            inventory.selects.push(SelectField {
                name: session.attribute(&select, "name").await.ok().flatten(),
                id: session.attribute(&select, "id").await.ok().flatten(),
                options: labels,
            });
        }

        for button in session.find_all(&Selector::tag("button")).await? {
            if !session.is_displayed(&button).await.unwrap_or(false) {
                continue;
            }
            let text = session.text(&button).await.unwrap_or_default();
            if text.is_empty() {
                continue;
            }
            inventory.buttons.push(ButtonField {
                text,
                kind: session.attribute(&button, "type").await.ok().flatten(),
            });
        }

        info!(
            target: "procurement-flow",
            inputs = inventory.inputs.len(),
            selects = inventory.selects.len(),
            buttons = inventory.buttons.len(),
            "search form inventory"
        );
        Ok(inventory)
    }

    async fn save_inventory(&self, inventory: &FormInventory) {
        if inventory.inputs.is_empty() {
            return;
        }
        let path = self.session.artifact_dir().join(FORM_INVENTORY_JSON);
        if let Err(err) = write_json(&path, &inventory.inputs).await {
            warn!(target: "procurement-flow", error = %err, "failed to save form inventory");
        }
    }
}

fn missing(selector: &Selector) -> cdp_session::DriverError {
    cdp_session::DriverError::new(cdp_session::DriverErrorKind::ElementNotFound)
        .with_hint(selector.to_string())
}
