//! Lazy walk over the result pages of a submitted search.

use cdp_session::{ArtifactKind, Driver, DriverError, DriverSession};
use tracing::{debug, info, warn};

use crate::errors::FlowResult;
use crate::locators::{PortalConfig, Timings};
use crate::parser::{parse_row, RESULT_CELLS};
use crate::record::{RawAnchor, RawCell, RawRow, Record};

pub const DEFAULT_MAX_PAGES: usize = 500;

/// Records extracted from one result page.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Page {
    pub number: usize,
    pub records: Vec<Record>,
}

/// Why the page sequence ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PaginationEnd {
    NoNextControl,
    NextUnavailable,
    ProbeFailed,
    PageCap,
}

/// Finite, non-restartable sequence of result pages on one session.
///
/// The first call to [`next_page`](Self::next_page) reads the page left by
/// the search submit; each later call activates the next-page control first.
pub struct ResultPages<'a, D: Driver> {
    session: &'a DriverSession<D>,
    portal: &'a PortalConfig,
    timings: &'a Timings,
    max_pages: usize,
    consumed: usize,
    end: Option<PaginationEnd>,
}

impl<'a, D: Driver> ResultPages<'a, D> {
    pub fn new(
        session: &'a DriverSession<D>,
        portal: &'a PortalConfig,
        timings: &'a Timings,
        max_pages: usize,
    ) -> Self {
        Self {
            session,
            portal,
            timings,
            max_pages: max_pages.max(1),
            consumed: 0,
            end: None,
        }
    }

    pub fn pages_consumed(&self) -> usize {
        self.consumed
    }

    pub fn end_reason(&self) -> Option<PaginationEnd> {
        self.end
    }

    pub async fn next_page(&mut self) -> FlowResult<Option<Page>> {
        if self.end.is_some() {
            return Ok(None);
        }
        if self.consumed > 0 {
            if let Some(reason) = self.advance().await {
                self.end = Some(reason);
                return Ok(None);
            }
        }

        let number = self.consumed + 1;
        info!(target: "procurement-flow", page = number, "processing result page");
        self.capture(ArtifactKind::Screenshot, &format!("screenshot_resultados_pagina_{number}"))
            .await;
        self.capture(ArtifactKind::PageSource, &format!("resultados_pagina_{number}"))
            .await;

        let records = self.extract().await?;
        self.consumed = number;
        info!(target: "procurement-flow", page = number, records = records.len(), "page extracted");
        Ok(Some(Page { number, records }))
    }

    /// Moves to the next page. Returns the reason when there is none.
    async fn advance(&mut self) -> Option<PaginationEnd> {
        let selector = &self.portal.locators.next_page;
        let next = match self.session.find(selector).await {
            Ok(Some(next)) => next,
            Ok(None) => {
                info!(target: "procurement-flow", page = self.consumed, "next control not found; last page reached");
                return Some(PaginationEnd::NoNextControl);
            }
            Err(err) => {
                warn!(target: "procurement-flow", error = %err, "next control lookup failed; assuming last page");
                return Some(PaginationEnd::ProbeFailed);
            }
        };

        match self.is_available(&next).await {
            Ok(true) => {}
            Ok(false) => {
                info!(target: "procurement-flow", page = self.consumed, "next control unavailable; last page reached");
                return Some(PaginationEnd::NextUnavailable);
            }
            Err(err) => {
                warn!(target: "procurement-flow", error = %err, "next control probe failed; assuming last page");
                return Some(PaginationEnd::ProbeFailed);
            }
        }

        if self.consumed >= self.max_pages {
            warn!(target: "procurement-flow", max_pages = self.max_pages, "page cap reached; stopping pagination");
            return Some(PaginationEnd::PageCap);
        }

        debug!(target: "procurement-flow", page = self.consumed + 1, "moving to next page");
        let clicked = async {
            self.session.scroll_into_view(&next).await?;
            self.session.settle(self.timings.before_next_ms).await;
            self.session.click(&next).await
        }
        .await;
        if let Err(err) = clicked {
            warn!(target: "procurement-flow", error = %err, "failed to activate next control; assuming last page");
            return Some(PaginationEnd::ProbeFailed);
        }
        self.session.settle(self.timings.after_next_ms).await;
        None
    }

    async fn is_available(&self, next: &D::Element) -> Result<bool, DriverError> {
        Ok(self.session.is_displayed(next).await? && self.session.is_enabled(next).await?)
    }

    async fn extract(&self) -> FlowResult<Vec<Record>> {
        let locators = &self.portal.locators;
        let tables = self.session.find_all(&locators.result_table).await?;
        debug!(target: "procurement-flow", tables = tables.len(), "result tables");

        let mut records = Vec::new();
        for (table_index, table) in tables.iter().enumerate() {
            let rows = self.session.find_within(table, &locators.result_row).await?;
            if rows.len() <= 1 {
                continue;
            }
            for (row_index, row) in rows.iter().enumerate().skip(1) {
                match self.read_row(row).await {
                    Ok(Some(raw)) => {
                        if let Some(record) = parse_row(&raw, &self.portal.pagination_marker) {
                            records.push(record);
                        }
                    }
                    Ok(None) => {}
                    Err(err) => warn!(
                        target: "procurement-flow",
                        table = table_index + 1,
                        row = row_index,
                        error = %err,
                        "failed to read result row"
                    ),
                }
            }
        }
        Ok(records)
    }

    /// Reads cell texts and the first cell's anchors. Rows without the
    /// expected cell count are skipped before any text is read.
    async fn read_row(&self, row: &D::Element) -> Result<Option<RawRow>, DriverError> {
        let locators = &self.portal.locators;
        let cells = self.session.find_within(row, &locators.result_cell).await?;
        if cells.len() != RESULT_CELLS {
            debug!(target: "procurement-flow", cells = cells.len(), "skipping non-result row");
            return Ok(None);
        }

        let mut raw = Vec::with_capacity(cells.len());
        for (index, cell) in cells.iter().enumerate() {
            let mut parsed = RawCell::text(self.session.text(cell).await?);
            if index == 0 {
                for anchor in self.session.find_within(cell, &locators.anchor).await? {
                    parsed.anchors.push(RawAnchor {
                        href: self.session.attribute(&anchor, "href").await?,
                        target: self.session.attribute(&anchor, "target").await?,
                    });
                }
            }
            raw.push(parsed);
        }
        Ok(Some(RawRow::new(raw)))
    }

    async fn capture(&self, kind: ArtifactKind, name: &str) {
        if let Err(err) = self.session.dump_artifact(kind, name).await {
            warn!(target: "procurement-flow", name, error = %err, "capture failed");
        }
    }
}
