use axum::{
    body::Body,
    extract::{Query, State},
    http::{
        header::{CACHE_CONTROL, CONTENT_DISPOSITION, CONTENT_TYPE, ETAG, IF_NONE_MATCH},
        HeaderMap, HeaderValue, Response, StatusCode,
    },
    Json,
};
use chrono::{Datelike, Utc};
use serde_json::{json, Value};

use crate::{
    error::{AppError, AppResult},
    repository::cam_records::{
        fetch_approved_for_fiscal_year, fetch_calendar_months, fetch_fiscal_year,
    },
    schemas::{
        validate_input, CamPeriodQuery, FiscalYearQuery, MissingDocumentsQuery, ReconcileInput,
        TowerBreakdownQuery,
    },
    services::{
        cam_analytics::{
            detect_pending_increases, fiscal_year_totals, missing_documents,
            monthly_collection_series, report_period_months, tower_breakdown,
            TowerBreakdownFilter,
        },
        cam_catalog::{fiscal_year_label, FiscalQuarter},
        cam_export::{content_etag, etag_matches, export_file_name, render_summary_csv},
        cam_reconciliation::{quarter_summary, QuarterSummary},
    },
    state::AppState,
};

pub fn router() -> axum::Router<AppState> {
    axum::Router::new()
        .route("/cam/summary", axum::routing::get(cam_summary))
        .route("/cam/summary/export", axum::routing::get(export_cam_summary))
        .route("/cam/reconcile", axum::routing::post(reconcile_records))
        .route("/cam/quarter-totals", axum::routing::get(cam_quarter_totals))
        .route("/cam/discrepancies", axum::routing::get(cam_discrepancies))
        .route(
            "/cam/missing-documents",
            axum::routing::get(cam_missing_documents),
        )
        .route("/cam/monthly", axum::routing::get(cam_monthly_series))
        .route("/cam/towers", axum::routing::get(cam_tower_breakdown))
}

async fn cam_summary(
    State(state): State<AppState>,
    Query(query): Query<CamPeriodQuery>,
) -> AppResult<Json<Value>> {
    validate_input(&query)?;
    let (fiscal_year, quarter) = resolve_period(&state, query.year, query.quarter)?;
    let cache_key = format!("cam-summary:{fiscal_year}:{}", quarter.number());
    if let Some(cached) = state.report_cache.get(&cache_key).await {
        return Ok(Json(cached));
    }

    let summary = load_summary(&state, fiscal_year, quarter).await?;
    let mut payload = serde_json::to_value(&summary).map_err(|error| {
        tracing::error!(error = %error, "Could not serialize CAM summary");
        AppError::Internal("Could not build CAM summary.".to_string())
    })?;
    if let Value::Object(map) = &mut payload {
        map.insert(
            "fiscal_year_label".to_string(),
            Value::String(fiscal_year_label(fiscal_year)),
        );
    }

    state
        .report_cache
        .insert(cache_key, payload.clone())
        .await;
    Ok(Json(payload))
}

async fn export_cam_summary(
    State(state): State<AppState>,
    Query(query): Query<CamPeriodQuery>,
    headers: HeaderMap,
) -> AppResult<Response<Body>> {
    validate_input(&query)?;
    let (fiscal_year, quarter) = resolve_period(&state, query.year, query.quarter)?;
    let summary = load_summary(&state, fiscal_year, quarter).await?;

    let csv = render_summary_csv(&summary);
    let etag = content_etag(&csv);

    if let Some(if_none_match) = headers.get(IF_NONE_MATCH).and_then(|v| v.to_str().ok()) {
        if etag_matches(if_none_match, &etag) {
            return Response::builder()
                .status(StatusCode::NOT_MODIFIED)
                .body(Body::empty())
                .map_err(|error| {
                    tracing::error!(error = %error, "Could not build 304 response");
                    AppError::Internal("Could not build response.".to_string())
                });
        }
    }

    let file_name = export_file_name(&summary);
    let mut response = Response::builder()
        .status(StatusCode::OK)
        .body(Body::from(csv))
        .map_err(|error| {
            tracing::error!(error = %error, "Could not build CSV response");
            AppError::Internal("Could not build CSV response.".to_string())
        })?;
    let headers = response.headers_mut();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("text/csv; charset=utf-8"));
    if let Ok(val) = HeaderValue::from_str(&format!("attachment; filename=\"{file_name}\"")) {
        headers.insert(CONTENT_DISPOSITION, val);
    }
    if let Ok(val) = HeaderValue::from_str(&etag) {
        headers.insert(ETAG, val);
    }
    headers.insert(
        CACHE_CONTROL,
        HeaderValue::from_static("private, no-cache"),
    );
    Ok(response)
}

async fn reconcile_records(
    State(state): State<AppState>,
    Json(payload): Json<ReconcileInput>,
) -> AppResult<Json<QuarterSummary>> {
    validate_input(&payload)?;
    Ok(Json(quarter_summary(
        &payload.records,
        payload.year,
        payload.quarter,
        &state.cam_catalog,
        &state.fiscal_calendar,
    )))
}

async fn cam_quarter_totals(
    State(state): State<AppState>,
    Query(query): Query<FiscalYearQuery>,
) -> AppResult<Json<Value>> {
    validate_input(&query)?;
    let fiscal_year = resolve_fiscal_year(&state, query.year);
    let pool = state.db_pool()?;
    let records = fetch_fiscal_year(pool, fiscal_year).await?;

    let quarters = fiscal_year_totals(
        &records,
        fiscal_year,
        &state.cam_catalog,
        &state.fiscal_calendar,
    );
    Ok(Json(json!({
        "fiscal_year": fiscal_year,
        "fiscal_year_label": fiscal_year_label(fiscal_year),
        "quarters": quarters,
    })))
}

async fn cam_discrepancies(
    State(state): State<AppState>,
    Query(query): Query<FiscalYearQuery>,
) -> AppResult<Json<Value>> {
    validate_input(&query)?;
    let fiscal_year = resolve_fiscal_year(&state, query.year);
    let pool = state.db_pool()?;
    let records = fetch_fiscal_year(pool, fiscal_year).await?;

    let discrepancies = detect_pending_increases(
        &records,
        fiscal_year,
        &state.cam_catalog,
        &state.fiscal_calendar,
    );
    if !discrepancies.is_empty() {
        tracing::info!(
            fiscal_year,
            count = discrepancies.len(),
            "Pending-count increases found"
        );
    }
    Ok(Json(json!({
        "fiscal_year": fiscal_year,
        "count": discrepancies.len(),
        "data": discrepancies,
    })))
}

async fn cam_missing_documents(
    State(state): State<AppState>,
    Query(query): Query<MissingDocumentsQuery>,
) -> AppResult<Json<Value>> {
    validate_input(&query)?;
    let today = Utc::now().date_naive();
    let year = query.year.unwrap_or_else(|| today.year());
    let months = report_period_months(
        &query.period_type,
        query.period.as_deref(),
        today.month(),
        &state.fiscal_calendar,
    )
    .ok_or_else(|| {
        AppError::BadRequest(format!(
            "Unsupported period '{}' for period_type '{}'.",
            query.period.as_deref().unwrap_or(""),
            query.period_type
        ))
    })?;

    let tower_filter = query.tower.trim();
    let towers = if tower_filter.is_empty() || tower_filter.eq_ignore_ascii_case("all") {
        state
            .cam_catalog
            .towers()
            .iter()
            .map(|entry| entry.tower.clone())
            .collect::<Vec<_>>()
    } else {
        vec![known_tower(&state, tower_filter)?]
    };

    let pool = state.db_pool()?;
    let records = fetch_calendar_months(pool, year, &months).await?;
    let missing = missing_documents(&records, year, &months, &towers);

    Ok(Json(json!({
        "year": year,
        "months": months,
        "count": missing.len(),
        "data": missing,
    })))
}

async fn cam_monthly_series(
    State(state): State<AppState>,
    Query(query): Query<FiscalYearQuery>,
) -> AppResult<Json<Value>> {
    validate_input(&query)?;
    let fiscal_year = resolve_fiscal_year(&state, query.year);
    let pool = state.db_pool()?;
    let records = fetch_approved_for_fiscal_year(pool, fiscal_year).await?;

    let series = monthly_collection_series(&records, fiscal_year, &state.fiscal_calendar);
    Ok(Json(json!({
        "fiscal_year": fiscal_year,
        "data": series,
    })))
}

async fn cam_tower_breakdown(
    State(state): State<AppState>,
    Query(query): Query<TowerBreakdownQuery>,
) -> AppResult<Json<Value>> {
    validate_input(&query)?;
    let fiscal_year = resolve_fiscal_year(&state, query.year);
    let filter = TowerBreakdownFilter::parse(
        &query.filter,
        query.value.as_deref(),
        &state.fiscal_calendar,
    )
    .ok_or_else(|| {
        AppError::BadRequest(format!(
            "filter must be one of latest, month, quarter, half_year, year; got '{}'.",
            query.filter
        ))
    })?;

    let pool = state.db_pool()?;
    let records = fetch_approved_for_fiscal_year(pool, fiscal_year).await?;
    let rows = tower_breakdown(
        &records,
        fiscal_year,
        &filter,
        &state.cam_catalog,
        &state.fiscal_calendar,
    );
    Ok(Json(json!({
        "fiscal_year": fiscal_year,
        "filter": query.filter,
        "data": rows,
    })))
}

async fn load_summary(
    state: &AppState,
    fiscal_year: i32,
    quarter: FiscalQuarter,
) -> AppResult<QuarterSummary> {
    let pool = state.db_pool()?;
    let records = fetch_approved_for_fiscal_year(pool, fiscal_year).await?;
    Ok(quarter_summary(
        &records,
        fiscal_year,
        quarter,
        &state.cam_catalog,
        &state.fiscal_calendar,
    ))
}

pub(crate) fn resolve_fiscal_year(state: &AppState, year: Option<i32>) -> i32 {
    year.unwrap_or_else(|| {
        state
            .fiscal_calendar
            .fiscal_period_of(Utc::now().date_naive())
            .0
    })
}

pub(crate) fn resolve_period(
    state: &AppState,
    year: Option<i32>,
    quarter: Option<u32>,
) -> AppResult<(i32, FiscalQuarter)> {
    let (current_year, current_quarter) = state
        .fiscal_calendar
        .fiscal_period_of(Utc::now().date_naive());
    let quarter = match quarter {
        Some(number) => parse_quarter(number)?,
        None => current_quarter,
    };
    Ok((year.unwrap_or(current_year), quarter))
}

pub(crate) fn parse_quarter(number: u32) -> AppResult<FiscalQuarter> {
    FiscalQuarter::from_number(number)
        .ok_or_else(|| AppError::BadRequest(format!("quarter must be 1-4, got {number}.")))
}

pub(crate) fn known_tower(state: &AppState, tower: &str) -> AppResult<String> {
    let tower = tower.trim();
    if state.cam_catalog.contains(tower) {
        Ok(tower.to_string())
    } else {
        Err(AppError::NotFound(format!("Unknown tower '{tower}'.")))
    }
}
