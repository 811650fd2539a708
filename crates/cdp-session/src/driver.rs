use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::DriverConfig;
use crate::error::DriverError;

/// Element lookup strategy.
///
/// Portal identifiers contain `:` which CSS would read as a pseudo-class, so
/// `Id` is rendered as an attribute match instead of `#id`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "by", content = "value", rename_all = "snake_case")]
pub enum Selector {
    Id(String),
    Css(String),
    Tag(String),
}

impl Selector {
    pub fn id(value: impl Into<String>) -> Self {
        Selector::Id(value.into())
    }

    pub fn css(value: impl Into<String>) -> Self {
        Selector::Css(value.into())
    }

    pub fn tag(value: impl Into<String>) -> Self {
        Selector::Tag(value.into())
    }

    pub fn to_css(&self) -> String {
        match self {
            Selector::Id(id) => format!("[id=\"{}\"]", escape_attr(id)),
            Selector::Css(css) => css.clone(),
            Selector::Tag(tag) => tag.clone(),
        }
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Selector::Id(id) => write!(f, "id={id}"),
            Selector::Css(css) => write!(f, "css={css}"),
            Selector::Tag(tag) => write!(f, "tag={tag}"),
        }
    }
}

fn escape_attr(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for ch in raw.chars() {
        if ch == '"' || ch == '\\' {
            out.push('\\');
        }
        out.push(ch);
    }
    out
}

/// Browser capabilities the extraction flow relies on.
///
/// Lookups report absence as `Ok(None)` / empty vectors; errors are reserved
/// for transport or protocol failures.
#[async_trait]
pub trait Driver: Send + Sync {
    type Element: Send + Sync;

    async fn navigate(&self, url: &str) -> Result<(), DriverError>;
    async fn find(&self, selector: &Selector) -> Result<Option<Self::Element>, DriverError>;
    async fn find_all(&self, selector: &Selector) -> Result<Vec<Self::Element>, DriverError>;
    async fn find_within(
        &self,
        parent: &Self::Element,
        selector: &Selector,
    ) -> Result<Vec<Self::Element>, DriverError>;

    async fn click(&self, element: &Self::Element) -> Result<(), DriverError>;
    async fn clear(&self, element: &Self::Element) -> Result<(), DriverError>;
    async fn type_text(&self, element: &Self::Element, text: &str) -> Result<(), DriverError>;
    async fn select_option(&self, element: &Self::Element, value: &str)
        -> Result<(), DriverError>;
    async fn scroll_into_view(&self, element: &Self::Element) -> Result<(), DriverError>;

    /// Rendered text, trimmed.
    async fn text(&self, element: &Self::Element) -> Result<String, DriverError>;
    async fn attribute(
        &self,
        element: &Self::Element,
        name: &str,
    ) -> Result<Option<String>, DriverError>;
    async fn is_displayed(&self, element: &Self::Element) -> Result<bool, DriverError>;
    async fn is_enabled(&self, element: &Self::Element) -> Result<bool, DriverError>;

    async fn screenshot(&self) -> Result<Vec<u8>, DriverError>;
    async fn page_source(&self) -> Result<String, DriverError>;
    async fn quit(&self) -> Result<(), DriverError>;
}

/// Starts a browser and hands back a ready driver.
#[async_trait]
pub trait Launcher: Send + Sync {
    type Driver: Driver + 'static;

    async fn launch(&self, config: &DriverConfig) -> Result<Self::Driver, DriverError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn id_selector_survives_colons() {
        let selector = Selector::id("viewns_Z7:form1:button1");
        assert_eq!(selector.to_css(), "[id=\"viewns_Z7:form1:button1\"]");
    }

    #[test]
    fn id_selector_escapes_quotes() {
        assert_eq!(Selector::id("a\"b").to_css(), "[id=\"a\\\"b\"]");
    }

    #[test]
    fn selectors_deserialize_from_tagged_form() {
        let parsed: Selector =
            serde_json::from_str(r#"{"by":"css","value":"table.results"}"#).unwrap();
        assert_eq!(parsed, Selector::css("table.results"));
        assert_eq!(parsed.to_string(), "css=table.results");
    }
}
