//! Scripted stand-in for the procurement portal.

#![allow(dead_code)]

use std::path::Path;
use std::sync::Arc;

use cdp_session::testing::{DriverEvent, FakeNode, ScriptedDriver, ScriptedLauncher};
use cdp_session::ManualClock;
use procurement_flow::locators::{DEFAULT_PORTAL_URL, FORM_PREFIX};
use procurement_flow::{FlowSettings, Orchestrator};

pub fn id(suffix: &str) -> String {
    format!("{FORM_PREFIX}{suffix}")
}

#[derive(Clone, Copy, Debug)]
pub enum Next {
    Enabled,
    Disabled,
    Hidden,
    Absent,
}

pub struct ResultPage {
    pub rows: Vec<(String, String)>,
    pub next: Next,
}

impl ResultPage {
    pub fn new(ids: &[&str], next: Next) -> Self {
        Self {
            rows: ids
                .iter()
                .map(|id| (id.to_string(), format!("Contrato {id}")))
                .collect(),
            next,
        }
    }
}

pub fn landing(with_reveal: bool) -> FakeNode {
    let mut body = FakeNode::new("body")
        .child(
            FakeNode::new("iframe")
                .with_attr("name", "analytics")
                .with_attr("src", format!("https://tracker.example/{}", "x".repeat(120))),
        )
        .child(FakeNode::new("iframe"));
    if with_reveal {
        body = body.child(
            FakeNode::new("a")
                .with_id(id("linkFormularioBusqueda"))
                .with_text("Licitaciones"),
        );
    }
    body
}

pub fn search_form() -> FakeNode {
    FakeNode::new("body").child(
        FakeNode::new("form")
            .child(FakeNode::new("input").with_attr("type", "hidden").with_attr("name", "javax.faces.ViewState"))
            .child(
                FakeNode::input(id("cpvMultiple:codigoCpv"))
                    .with_attr("name", "codigoCpv")
                    .with_attr("placeholder", "Código CPV"),
            )
            .child(FakeNode::button(id("cpvMultiplebuttonAnyadirMultiple"), "Añadir"))
            .child(FakeNode::input(id("textMinFecAnuncioMAQ2")))
            .child(FakeNode::input(id("textMaxFecAnuncioMAQ")))
            .child(FakeNode::select(
                id("estadoLici"),
                &[("", "Todos"), ("PUB", "Publicada"), ("EV", "Evaluación"), ("RES", "Resuelta")],
            ))
            .child(
                FakeNode::new("input")
                    .with_id(id("button1"))
                    .with_attr("type", "submit")
                    .with_attr("value", "Buscar"),
            ),
    )
}

pub fn result_row(expediente: &str, descripcion: &str) -> FakeNode {
    FakeNode::row([
        FakeNode::cell(format!("{expediente}\n{descripcion}"))
            .child(FakeNode::link(format!("https://portal.example/detalle/{expediente}")))
            .child(
                FakeNode::link(format!("https://portal.example/deeplink/{expediente}%3D%3D"))
                    .with_attr("target", "_blank"),
            ),
        FakeNode::cell("Servicios\nServicios informáticos"),
        FakeNode::cell("Publicada"),
        FakeNode::cell("15.000,00 EUR"),
        FakeNode::cell("20/01/2026"),
        FakeNode::cell("Ayuntamiento de Sevilla"),
    ])
}

pub fn header_row() -> FakeNode {
    FakeNode::row(
        ["Expediente", "Tipo", "Estado", "Importe", "Fecha", "Órgano"]
            .into_iter()
            .map(|label| FakeNode::new("th").with_text(label)),
    )
}

/// Header row followed by one notice row per id.
pub fn notice_table(ids: &[&str]) -> FakeNode {
    ids.iter().fold(FakeNode::table([header_row()]), |table, expediente| {
        table.child(result_row(expediente, &format!("Contrato {expediente}")))
    })
}

pub fn results_page(page: &ResultPage, number: usize, total: usize) -> FakeNode {
    let header = header_row();
    let footer = FakeNode::row([FakeNode::cell(format!("Página {number} de {total}")).with_attr("colspan", "6")]);
    let marker_row = FakeNode::row([
        FakeNode::cell(format!("Página {number}")),
        FakeNode::cell(""),
        FakeNode::cell(""),
        FakeNode::cell(""),
        FakeNode::cell(""),
        FakeNode::cell(""),
    ]);

    let mut table = FakeNode::table([header]);
    for (expediente, descripcion) in &page.rows {
        table = table.child(result_row(expediente, descripcion));
    }
    table = table.child(marker_row).child(footer);

    let mut body = FakeNode::new("body")
        .child(FakeNode::table([FakeNode::row([FakeNode::cell("layout")])]))
        .child(table);

    let next = FakeNode::new("input")
        .with_id(id("footerSiguiente"))
        .with_attr("type", "submit")
        .with_attr("value", "Siguiente >>");
    body = match page.next {
        Next::Enabled => body.child(next),
        Next::Disabled => body.child(next.disabled()),
        Next::Hidden => body.child(next.hidden()),
        Next::Absent => body,
    };
    body
}

/// Portal with a landing page, the search form and the given result pages.
pub fn portal(pages: &[ResultPage]) -> ScriptedDriver {
    let mut driver = ScriptedDriver::new()
        .page("landing", landing(true))
        .page("form", search_form())
        .route(DEFAULT_PORTAL_URL, "landing")
        .on_click("landing", id("linkFormularioBusqueda"), "form")
        .on_click("form", id("button1"), "results_1");
    for (index, page) in pages.iter().enumerate() {
        let number = index + 1;
        let name = format!("results_{number}");
        driver = driver.page(name.clone(), results_page(page, number, pages.len()));
        if number < pages.len() {
            driver = driver.on_click(name, id("footerSiguiente"), format!("results_{}", number + 1));
        }
    }
    driver
}

/// Portal whose search submit lands on a single hand-built result page.
pub fn portal_with_results(body: FakeNode) -> ScriptedDriver {
    ScriptedDriver::new()
        .page("landing", landing(true))
        .page("form", search_form())
        .page("results_1", body)
        .route(DEFAULT_PORTAL_URL, "landing")
        .on_click("landing", id("linkFormularioBusqueda"), "form")
        .on_click("form", id("button1"), "results_1")
}

pub fn settings(output_root: &Path) -> FlowSettings {
    FlowSettings {
        output_root: output_root.to_path_buf(),
        ..FlowSettings::default()
    }
}

pub fn orchestrator(
    driver: &ScriptedDriver,
    settings: FlowSettings,
    clock: &ManualClock,
) -> Orchestrator<ScriptedLauncher> {
    Orchestrator::with_clock(ScriptedLauncher::new(driver), settings, Arc::new(clock.clone()))
}

pub fn typed_into(events: &[DriverEvent], target: &str) -> Vec<String> {
    events
        .iter()
        .filter_map(|event| match event {
            DriverEvent::Type { target: t, text } if t == target => Some(text.clone()),
            _ => None,
        })
        .collect()
}

pub fn position(events: &[DriverEvent], wanted: &DriverEvent) -> Option<usize> {
    events.iter().position(|event| event == wanted)
}

pub fn clicks(events: &[DriverEvent], target: &str) -> usize {
    events
        .iter()
        .filter(|event| matches!(event, DriverEvent::Click(t) if t == target))
        .count()
}
