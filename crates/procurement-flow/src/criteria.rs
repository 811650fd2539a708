//! Run inputs: filter codes and publication-date bounds.

use chrono::{Duration, Local, NaiveDate};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::errors::CriteriaError;

pub const DATE_FORMAT: &str = "%d-%m-%Y";

/// Status filter value for "Publicada".
pub const STATUS_PUBLISHED: &str = "PUB";

/// Immutable search parameters for one run.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SearchCriteria {
    codes: Vec<String>,
    lower: NaiveDate,
    upper: NaiveDate,
    status: String,
}

impl SearchCriteria {
    /// Codes are trimmed, empties dropped and duplicates removed keeping
    /// first occurrence order. An inverted range is passed through as-is.
    pub fn new<I, S>(codes: I, lower: NaiveDate, upper: NaiveDate) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut unique: Vec<String> = Vec::new();
        for code in codes {
            let code = code.as_ref().trim();
            if !code.is_empty() && !unique.iter().any(|seen| seen == code) {
                unique.push(code.to_string());
            }
        }
        if lower > upper {
            warn!(
                target: "procurement-flow",
                lower = %lower.format(DATE_FORMAT),
                upper = %upper.format(DATE_FORMAT),
                "lower date bound is after upper bound; searching as given"
            );
        }
        Self {
            codes: unique,
            lower,
            upper,
            status: STATUS_PUBLISHED.to_string(),
        }
    }

    /// Builds criteria from raw inputs, defaulting missing bounds to the day
    /// before `today`.
    pub fn resolve<I, S>(
        codes: I,
        fecha_desde: Option<&str>,
        fecha_hasta: Option<&str>,
        today: NaiveDate,
    ) -> Result<Self, CriteriaError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let fallback = yesterday(today);
        let lower = parse_optional_date("fecha_desde", fecha_desde)?.unwrap_or(fallback);
        let upper = parse_optional_date("fecha_hasta", fecha_hasta)?.unwrap_or(fallback);
        Ok(Self::new(codes, lower, upper))
    }

    /// [`resolve`](Self::resolve) against the local calendar date.
    pub fn resolve_now<I, S>(
        codes: I,
        fecha_desde: Option<&str>,
        fecha_hasta: Option<&str>,
    ) -> Result<Self, CriteriaError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self::resolve(codes, fecha_desde, fecha_hasta, Local::now().date_naive())
    }

    pub fn codes(&self) -> &[String] {
        &self.codes
    }

    pub fn lower_bound(&self) -> NaiveDate {
        self.lower
    }

    pub fn upper_bound(&self) -> NaiveDate {
        self.upper
    }

    pub fn lower_text(&self) -> String {
        self.lower.format(DATE_FORMAT).to_string()
    }

    pub fn upper_text(&self) -> String {
        self.upper.format(DATE_FORMAT).to_string()
    }

    pub fn status(&self) -> &str {
        &self.status
    }
}

/// Request shape shared by the CLI and the HTTP query string.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct SearchRequest {
    pub cpv_codes: Option<String>,
    pub fecha_desde: Option<String>,
    pub fecha_hasta: Option<String>,
}

impl SearchRequest {
    pub fn into_criteria(self, today: NaiveDate) -> Result<SearchCriteria, CriteriaError> {
        let codes = self
            .cpv_codes
            .as_deref()
            .map(parse_code_list)
            .unwrap_or_default();
        SearchCriteria::resolve(
            codes,
            self.fecha_desde.as_deref(),
            self.fecha_hasta.as_deref(),
            today,
        )
    }
}

/// Splits a comma-separated code list, trimming entries and dropping empties.
pub fn parse_code_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|code| !code.is_empty())
        .map(str::to_string)
        .collect()
}

pub fn parse_date(field: &'static str, raw: &str) -> Result<NaiveDate, CriteriaError> {
    NaiveDate::parse_from_str(raw.trim(), DATE_FORMAT).map_err(|_| CriteriaError::InvalidDate {
        field,
        value: raw.to_string(),
    })
}

fn parse_optional_date(
    field: &'static str,
    raw: Option<&str>,
) -> Result<Option<NaiveDate>, CriteriaError> {
    match raw.map(str::trim) {
        None | Some("") => Ok(None),
        Some(value) => parse_date(field, value).map(Some),
    }
}

pub fn yesterday(today: NaiveDate) -> NaiveDate {
    today - Duration::days(1)
}
