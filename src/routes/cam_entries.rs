use std::collections::HashSet;

use axum::{
    extract::{Query, State},
    Json,
};
use serde_json::{json, Value};

use crate::{
    error::{AppError, AppResult},
    repository::cam_records::{fetch_tower_months, transition_status, upsert_entries, CamEntryWrite},
    routes::cam::{known_tower, parse_quarter, resolve_period},
    schemas::{validate_input, CamEntriesQuery, CamWorkflowInput, SaveCamEntriesInput},
    services::{
        cam_catalog::{month_name, FiscalQuarter},
        cam_model::{CamStatus, TowerRecord},
        cam_workflow::{
            can_edit, months_without_data, tower_status, validate_entry, CamEntryValues,
            WorkflowAction,
        },
    },
    state::AppState,
};

pub fn router() -> axum::Router<AppState> {
    axum::Router::new()
        .route(
            "/cam/entries",
            axum::routing::get(get_cam_entries).put(save_cam_entries),
        )
        .route("/cam/entries/submit", axum::routing::post(submit_cam_entries))
        .route("/cam/entries/approve", axum::routing::post(approve_cam_entries))
        .route(
            "/cam/entries/request-correction",
            axum::routing::post(request_cam_correction),
        )
        .route(
            "/cam/entries/approve-correction",
            axum::routing::post(approve_cam_correction),
        )
}

async fn get_cam_entries(
    State(state): State<AppState>,
    Query(query): Query<CamEntriesQuery>,
) -> AppResult<Json<Value>> {
    validate_input(&query)?;
    let tower = known_tower(&state, &query.tower)?;
    let (fiscal_year, quarter) = resolve_period(&state, query.year, query.quarter)?;
    let pool = state.db_pool()?;

    let records = fetch_tower_months(pool, &tower, &quarter_periods(&state, fiscal_year, quarter))
        .await?;
    let status = quarter_status(&records);

    Ok(Json(json!({
        "tower": tower,
        "year": fiscal_year,
        "quarter": quarter,
        "quarter_label": quarter.label(),
        "capacity": state.cam_catalog.capacity(&tower),
        "status": status,
        "editable": can_edit(status),
        "data": records,
    })))
}

async fn save_cam_entries(
    State(state): State<AppState>,
    Json(payload): Json<SaveCamEntriesInput>,
) -> AppResult<Json<Value>> {
    validate_input(&payload)?;
    let tower = known_tower(&state, &payload.tower)?;
    let quarter = parse_quarter(payload.quarter)?;
    let capacity = state
        .cam_catalog
        .capacity(&tower)
        .ok_or_else(|| AppError::NotFound(format!("Unknown tower '{tower}'.")))?;

    let mut seen_months = HashSet::new();
    let mut writes = Vec::with_capacity(payload.months.len());
    for entry in &payload.months {
        if !state.fiscal_calendar.contains(quarter, entry.month) {
            return Err(AppError::UnprocessableEntity(format!(
                "{} is not part of {}.",
                month_name(entry.month).unwrap_or("Month"),
                quarter.label()
            )));
        }
        if !seen_months.insert(entry.month) {
            return Err(AppError::UnprocessableEntity(format!(
                "{} appears more than once.",
                month_name(entry.month).unwrap_or("Month")
            )));
        }

        let values = CamEntryValues {
            paid_flats: entry.paid_flats,
            pending_flats: entry.pending_flats,
            dues_cleared_from_previous: entry.dues_cleared_from_previous.unwrap_or(0),
            advance_payments: entry.advance_payments.unwrap_or(0),
        };
        validate_entry(&values, &tower, entry.month, capacity)
            .map_err(AppError::UnprocessableEntity)?;
        if entry.cam_recon_flats.is_some_and(|recon| recon < 0) {
            return Err(AppError::UnprocessableEntity(
                "Values cannot be negative".to_string(),
            ));
        }

        writes.push(CamEntryWrite {
            tower: tower.clone(),
            year: state
                .fiscal_calendar
                .calendar_year_for(payload.year, entry.month),
            month: entry.month,
            quarter: quarter.number(),
            paid_flats: values.paid_flats,
            pending_flats: values.pending_flats,
            dues_cleared_from_previous: values.dues_cleared_from_previous,
            advance_payments: values.advance_payments,
            cam_recon_flats: entry.cam_recon_flats,
            notes: non_empty(entry.notes.as_deref()),
            document_url: non_empty(entry.document_url.as_deref()),
        });
    }

    let pool = state.db_pool()?;
    let periods = writes
        .iter()
        .map(|write| (write.year, write.month))
        .collect::<Vec<_>>();
    let existing = fetch_tower_months(pool, &tower, &periods).await?;
    let current = quarter_status(&existing);
    if !existing.is_empty() && !can_edit(current) {
        return Err(AppError::Conflict(format!(
            "CAM data for tower {tower} in {} is {} and cannot be edited.",
            quarter.label(),
            current.as_str()
        )));
    }

    let saved = upsert_entries(pool, &writes).await?;
    let status = if existing.is_empty() {
        CamStatus::Draft
    } else {
        current
    };
    state.invalidate_reports();
    tracing::info!(
        tower = %tower,
        fiscal_year = payload.year,
        quarter = quarter.number(),
        saved,
        "CAM entries saved"
    );

    Ok(Json(json!({
        "tower": tower,
        "year": payload.year,
        "quarter": quarter,
        "saved": saved,
        "status": status,
    })))
}

async fn submit_cam_entries(
    State(state): State<AppState>,
    Json(payload): Json<CamWorkflowInput>,
) -> AppResult<Json<Value>> {
    apply_workflow(&state, &payload, WorkflowAction::Submit).await
}

async fn approve_cam_entries(
    State(state): State<AppState>,
    Json(payload): Json<CamWorkflowInput>,
) -> AppResult<Json<Value>> {
    apply_workflow(&state, &payload, WorkflowAction::Approve).await
}

async fn request_cam_correction(
    State(state): State<AppState>,
    Json(payload): Json<CamWorkflowInput>,
) -> AppResult<Json<Value>> {
    apply_workflow(&state, &payload, WorkflowAction::RequestCorrection).await
}

async fn approve_cam_correction(
    State(state): State<AppState>,
    Json(payload): Json<CamWorkflowInput>,
) -> AppResult<Json<Value>> {
    apply_workflow(&state, &payload, WorkflowAction::ApproveCorrection).await
}

async fn apply_workflow(
    state: &AppState,
    payload: &CamWorkflowInput,
    action: WorkflowAction,
) -> AppResult<Json<Value>> {
    validate_input(payload)?;
    let tower = known_tower(state, &payload.tower)?;
    let quarter = parse_quarter(payload.quarter)?;
    let reason = non_empty(payload.reason.as_deref());
    if action == WorkflowAction::RequestCorrection && reason.is_none() {
        return Err(AppError::UnprocessableEntity(
            "A reason is required to request a correction.".to_string(),
        ));
    }

    let pool = state.db_pool()?;
    let periods = quarter_periods(state, payload.year, quarter);
    let records = fetch_tower_months(pool, &tower, &periods).await?;
    if records.is_empty() {
        return Err(AppError::NotFound(format!(
            "No CAM data for tower {tower} in {}.",
            quarter.label()
        )));
    }

    let current = quarter_status(&records);
    let target = action.transition(current).map_err(AppError::Conflict)?;

    if action == WorkflowAction::Submit && state.config.cam_submit_requires_all_months {
        let entries = records
            .iter()
            .filter_map(|record| {
                record
                    .reporting_month()
                    .map(|month| (month, CamEntryValues::from(record)))
            })
            .collect::<Vec<_>>();
        let months = state.fiscal_calendar.months(quarter);
        let missing = months_without_data(&entries, &months);
        if !missing.is_empty() {
            let names = missing
                .iter()
                .filter_map(|month| month_name(*month))
                .collect::<Vec<_>>()
                .join(", ");
            return Err(AppError::UnprocessableEntity(format!(
                "Please enter data for all months before submitting: {names}."
            )));
        }
    }

    let updated = transition_status(
        pool,
        &tower,
        &periods,
        action.allowed_from(),
        target,
        action.locks(),
        reason.as_deref(),
    )
    .await?;
    state.invalidate_reports();
    tracing::info!(
        tower = %tower,
        fiscal_year = payload.year,
        quarter = quarter.number(),
        action = action.as_str(),
        from = current.as_str(),
        to = target.as_str(),
        updated,
        "CAM workflow transition"
    );

    Ok(Json(json!({
        "tower": tower,
        "year": payload.year,
        "quarter": quarter,
        "action": action,
        "status": target,
        "updated": updated,
    })))
}

fn quarter_periods(state: &AppState, fiscal_year: i32, quarter: FiscalQuarter) -> Vec<(i32, u32)> {
    state
        .fiscal_calendar
        .months(quarter)
        .into_iter()
        .map(|month| {
            (
                state.fiscal_calendar.calendar_year_for(fiscal_year, month),
                month,
            )
        })
        .collect()
}

fn quarter_status(records: &[TowerRecord]) -> CamStatus {
    let statuses = records.iter().map(|record| record.status).collect::<Vec<_>>();
    tower_status(&statuses)
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(ToOwned::to_owned)
}
