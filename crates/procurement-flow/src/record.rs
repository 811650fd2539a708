use serde::{Deserialize, Serialize};

/// One procurement notice as listed in the results table.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    pub expediente: String,
    pub descripcion: String,
    pub tipo: String,
    pub subtipo: String,
    pub estado: String,
    pub importe: String,
    pub fecha: String,
    pub organismo: String,
    pub enlace: String,
}

impl Record {
    /// Column order used for CSV output.
    pub const COLUMNS: [&'static str; 9] = [
        "expediente",
        "descripcion",
        "tipo",
        "subtipo",
        "estado",
        "importe",
        "fecha",
        "organismo",
        "enlace",
    ];
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RawAnchor {
    pub href: Option<String>,
    pub target: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RawCell {
    pub text: String,
    pub anchors: Vec<RawAnchor>,
}

impl RawCell {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            anchors: Vec::new(),
        }
    }

    pub fn with_anchor(mut self, href: Option<&str>, target: Option<&str>) -> Self {
        self.anchors.push(RawAnchor {
            href: href.map(str::to_string),
            target: target.map(str::to_string),
        });
        self
    }
}

/// Table row as scraped, before interpretation.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RawRow {
    pub cells: Vec<RawCell>,
}

impl RawRow {
    pub fn new(cells: Vec<RawCell>) -> Self {
        Self { cells }
    }
}
