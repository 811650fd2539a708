//! Raw result row to [`Record`].

use tracing::debug;

use crate::record::{RawCell, RawRow, Record};

pub const RESULT_CELLS: usize = 6;

/// Interprets one result row. Returns `None` for rows that are not notices:
/// wrong cell count, empty reference id, or the pagination footer row
/// (reference id starting with `pagination_marker`). A blank marker never
/// matches.
pub fn parse_row(row: &RawRow, pagination_marker: &str) -> Option<Record> {
    if row.cells.len() != RESULT_CELLS {
        debug!(
            target: "procurement-flow",
            cells = row.cells.len(),
            "skipping row with unexpected cell count"
        );
        return None;
    }

    let (expediente, descripcion) = split_first_line(&row.cells[0].text);
    if expediente.is_empty() || is_marker_row(expediente, pagination_marker) {
        return None;
    }
    let (tipo, subtipo) = split_first_line(&row.cells[1].text);

    Some(Record {
        expediente: expediente.to_string(),
        descripcion: descripcion.to_string(),
        tipo: tipo.to_string(),
        subtipo: subtipo.to_string(),
        estado: row.cells[2].text.clone(),
        importe: row.cells[3].text.clone(),
        fecha: row.cells[4].text.clone(),
        organismo: row.cells[5].text.clone(),
        enlace: detail_link(&row.cells[0]).unwrap_or_default(),
    })
}

/// `target="_blank"` anchor with an href first, then the first anchor's href.
pub fn detail_link(cell: &RawCell) -> Option<String> {
    let blank = cell
        .anchors
        .iter()
        .filter(|anchor| anchor.target.as_deref() == Some("_blank"))
        .find_map(|anchor| anchor.href.clone().filter(|href| !href.is_empty()));
    blank.or_else(|| {
        cell.anchors
            .first()
            .and_then(|anchor| anchor.href.clone())
            .filter(|href| !href.is_empty())
    })
}

fn is_marker_row(expediente: &str, pagination_marker: &str) -> bool {
    let marker = pagination_marker.trim();
    !marker.is_empty() && expediente.starts_with(marker)
}

fn split_first_line(text: &str) -> (&str, &str) {
    text.split_once('\n').unwrap_or((text, ""))
}
