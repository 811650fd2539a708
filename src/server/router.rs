use axum::extract::{Query, State};
use axum::http::{HeaderMap, Method};
use axum::{routing::get, Json, Router};
use chrono::Local;
use procurement_flow::{RunResult, SearchRequest};
use serde_json::{json, Value};
use tokio::time::timeout;
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info, warn};

use super::auth::authenticate;
use super::errors::{ApiError, ApiResult};
use super::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(root_handler))
        .route("/health", get(health_handler))
        .route("/licitaciones", get(licitaciones_handler))
        .layer(cors_layer())
        .with_state(state)
}

fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::OPTIONS])
        .allow_headers(Any)
}

async fn root_handler() -> Json<Value> {
    Json(json!({
        "mensaje": "API de Licitaciones - contrataciondelestado.es",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": {
            "/licitaciones": "Obtener licitaciones (parámetros opcionales: cpv_codes, fecha_desde, fecha_hasta)",
            "/health": "Estado de la API"
        },
        "parametros": {
            "cpv_codes": {
                "descripcion": "Códigos CPV separados por comas (opcional)",
                "ejemplo": "48000000,72000000",
                "comportamiento": "Si no se especifica, no filtra por CPV."
            },
            "fecha_desde": {
                "descripcion": "Fecha de inicio en formato DD-MM-YYYY (opcional)",
                "ejemplo": "01-01-2026",
                "comportamiento": "Si no se especifica, usa la fecha de ayer."
            },
            "fecha_hasta": {
                "descripcion": "Fecha de fin en formato DD-MM-YYYY (opcional)",
                "ejemplo": "31-01-2026",
                "comportamiento": "Si no se especifica, usa la fecha de ayer."
            }
        }
    }))
}

async fn health_handler() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "timestamp": Local::now().to_rfc3339(),
    }))
}

async fn licitaciones_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(request): Query<SearchRequest>,
) -> ApiResult<Json<Value>> {
    if let Err(err) = authenticate(&headers, state.api_key()) {
        warn!(target: "api", code = err.code(), "rejected /licitaciones request");
        return Err(err);
    }

    let criteria = request.into_criteria(Local::now().date_naive())?;
    let _permit = state.try_acquire_run().ok_or(ApiError::Busy)?;

    info!(
        target: "api",
        desde = %criteria.lower_text(),
        hasta = %criteria.upper_text(),
        codes = ?criteria.codes(),
        "extraction requested"
    );

    let limit = state.run_timeout();
    let result = match timeout(limit, state.executor().execute(criteria)).await {
        Ok(result) => result,
        Err(_) => {
            error!(target: "api", secs = limit.as_secs(), "extraction timed out");
            return Err(ApiError::Timeout {
                secs: limit.as_secs(),
            });
        }
    };

    if !result.success {
        let message = result
            .error
            .clone()
            .unwrap_or_else(|| "extraction failed".to_string());
        error!(target: "api", run_id = %result.run_id, error = %message, "extraction failed");
        return Err(ApiError::RunFailed(message));
    }

    info!(
        target: "api",
        run_id = %result.run_id,
        total = result.records.len(),
        "extraction succeeded"
    );
    Ok(Json(success_body(&result)))
}

fn success_body(result: &RunResult) -> Value {
    let folder = result
        .output_folder
        .as_ref()
        .map(|path| path.display().to_string())
        .unwrap_or_default();
    let mut body = json!({
        "success": true,
        "timestamp": Local::now().to_rfc3339(),
        "total_licitaciones": result.records.len(),
        "carpeta_salida": folder,
        "fecha_desde": result.fecha_desde,
        "fecha_hasta": result.fecha_hasta,
        "licitaciones": result.records,
    });
    if result.cpv_codes.is_empty() {
        body["filtro_cpv"] = json!("ninguno");
    } else {
        body["codigos_cpv"] = json!(result.cpv_codes);
    }
    body
}
