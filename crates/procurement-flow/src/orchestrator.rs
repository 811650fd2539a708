//! One extraction run: session, form, pages, persistence.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use cdp_session::{Clock, DriverConfig, DriverSession, Launcher, TokioClock};
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use tracing::{error, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::artifacts::RunFolder;
use crate::criteria::SearchCriteria;
use crate::errors::{FlowError, FlowResult};
use crate::locators::{PortalConfig, Timings};
use crate::navigator::{FilterReport, FormNavigator};
use crate::paginator::{ResultPages, DEFAULT_MAX_PAGES};
use crate::record::Record;

const SUMMARY_RECORDS: usize = 5;

/// Everything a run needs besides its criteria.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct FlowSettings {
    pub browser: DriverConfig,
    pub portal: PortalConfig,
    pub timing: Timings,
    pub output_root: PathBuf,
    pub max_pages: usize,
}

impl Default for FlowSettings {
    fn default() -> Self {
        Self {
            browser: DriverConfig::default(),
            portal: PortalConfig::default(),
            timing: Timings::default(),
            output_root: PathBuf::from("datos_licitaciones"),
            max_pages: DEFAULT_MAX_PAGES,
        }
    }
}

/// Outcome of one run. Records keep page order, then row order.
#[derive(Clone, Debug, Serialize)]
pub struct RunResult {
    pub run_id: Uuid,
    pub success: bool,
    pub error: Option<String>,
    pub records: Vec<Record>,
    pub pages: usize,
    pub output_folder: Option<PathBuf>,
    pub fecha_desde: String,
    pub fecha_hasta: String,
    pub cpv_codes: Vec<String>,
    pub filters: FilterReport,
    pub started_at: DateTime<Local>,
    pub finished_at: DateTime<Local>,
}

/// Something that can execute a run; the HTTP layer depends on this seam.
#[async_trait]
pub trait RunExecutor: Send + Sync {
    async fn execute(&self, criteria: SearchCriteria) -> RunResult;
}

pub struct Orchestrator<L: Launcher> {
    launcher: L,
    settings: FlowSettings,
    clock: Arc<dyn Clock>,
}

struct Progress {
    records: Vec<Record>,
    pages: usize,
    filters: FilterReport,
}

impl<L: Launcher> Orchestrator<L> {
    pub fn new(launcher: L, settings: FlowSettings) -> Self {
        Self::with_clock(launcher, settings, Arc::new(TokioClock::new()))
    }

    pub fn with_clock(launcher: L, settings: FlowSettings, clock: Arc<dyn Clock>) -> Self {
        Self {
            launcher,
            settings,
            clock,
        }
    }

    pub fn settings(&self) -> &FlowSettings {
        &self.settings
    }

    /// Never fails: every error is folded into `success = false` after the
    /// browser has been released. Records gathered before a failure are kept
    /// and persisted.
    pub async fn run(&self, criteria: &SearchCriteria) -> RunResult {
        let run_id = Uuid::new_v4();
        let span = info_span!("run", run_id = %run_id);
        self.run_inner(run_id, criteria).instrument(span).await
    }

    async fn run_inner(&self, run_id: Uuid, criteria: &SearchCriteria) -> RunResult {
        let started_at = Local::now();
        info!(
            target: "procurement-flow",
            desde = %criteria.lower_text(),
            hasta = %criteria.upper_text(),
            codes = ?criteria.codes(),
            "extraction run started"
        );

        let mut progress = Progress {
            records: Vec::new(),
            pages: 0,
            filters: FilterReport::default(),
        };

        let folder = match RunFolder::create(&self.settings.output_root, started_at, &run_id).await {
            Ok(folder) => folder,
            Err(err) => {
                let err = FlowError::from(err);
                return self.finish(run_id, criteria, started_at, None, progress, Some(err));
            }
        };

        let outcome = self.extract(criteria, &folder, &mut progress).await;
        let mut failure = outcome.err();

        if let Err(err) = folder.write_records_json(&progress.records).await {
            warn!(target: "procurement-flow", error = %err, "failed to persist json results");
            failure.get_or_insert(err.into());
        }
        if let Err(err) = folder
            .write_records_csv(&progress.records, started_at.date_naive())
            .await
        {
            warn!(target: "procurement-flow", error = %err, "failed to persist csv results");
            failure.get_or_insert(err.into());
        }

        self.finish(
            run_id,
            criteria,
            started_at,
            Some(folder.path().to_path_buf()),
            progress,
            failure,
        )
    }

    async fn extract(
        &self,
        criteria: &SearchCriteria,
        folder: &RunFolder,
        progress: &mut Progress,
    ) -> FlowResult<()> {
        let session = DriverSession::open(
            &self.launcher,
            &self.settings.browser,
            Arc::clone(&self.clock),
            folder.path(),
        )
        .await
        .map_err(FlowError::Launch)?;

        let outcome = self.drive(&session, criteria, progress).await;
        if let Err(err) = session.close().await {
            warn!(target: "procurement-flow", error = %err, "browser close reported an error");
        }
        outcome
    }

    async fn drive(
        &self,
        session: &DriverSession<L::Driver>,
        criteria: &SearchCriteria,
        progress: &mut Progress,
    ) -> FlowResult<()> {
        let settings = &self.settings;
        let mut navigator = FormNavigator::new(session, &settings.portal, &settings.timing);
        let outcome = navigator.run(criteria).await;
        progress.filters = navigator.report().clone();
        outcome?;

        let mut pages = ResultPages::new(session, &settings.portal, &settings.timing, settings.max_pages);
        while let Some(page) = pages.next_page().await? {
            progress.pages = pages.pages_consumed();
            progress.records.extend(page.records);
            info!(
                target: "procurement-flow",
                page = page.number,
                total = progress.records.len(),
                "records accumulated"
            );
        }
        Ok(())
    }

    fn finish(
        &self,
        run_id: Uuid,
        criteria: &SearchCriteria,
        started_at: DateTime<Local>,
        output_folder: Option<PathBuf>,
        progress: Progress,
        failure: Option<FlowError>,
    ) -> RunResult {
        let success = failure.is_none();
        match &failure {
            None => {
                info!(
                    target: "procurement-flow",
                    records = progress.records.len(),
                    pages = progress.pages,
                    "extraction run finished"
                );
                log_summary(&progress.records);
            }
            Some(err) => error!(
                target: "procurement-flow",
                error = %err,
                records = progress.records.len(),
                pages = progress.pages,
                "extraction run failed"
            ),
        }
        RunResult {
            run_id,
            success,
            error: failure.map(|err| err.to_string()),
            records: progress.records,
            pages: progress.pages,
            output_folder,
            fecha_desde: criteria.lower_text(),
            fecha_hasta: criteria.upper_text(),
            cpv_codes: criteria.codes().to_vec(),
            filters: progress.filters,
            started_at,
            finished_at: Local::now(),
        }
    }
}

fn log_summary(records: &[Record]) {
    if records.is_empty() {
        info!(target: "procurement-flow", "no notices found in the result tables");
        return;
    }
    for (index, record) in records.iter().take(SUMMARY_RECORDS).enumerate() {
        info!(
            target: "procurement-flow",
            n = index + 1,
            expediente = %record.expediente,
            descripcion = %truncate(&record.descripcion, 80),
            tipo = %record.tipo,
            subtipo = %record.subtipo,
            estado = %record.estado,
            importe = %record.importe,
            fecha = %record.fecha,
            organismo = %truncate(&record.organismo, 60),
            "notice"
        );
    }
}

fn truncate(text: &str, limit: usize) -> String {
    text.chars().take(limit).collect()
}

#[async_trait]
impl<L> RunExecutor for Orchestrator<L>
where
    L: Launcher + 'static,
{
    async fn execute(&self, criteria: SearchCriteria) -> RunResult {
        self.run(&criteria).await
    }
}
