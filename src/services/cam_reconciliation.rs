//! Per-tower CAM collection summary for one fiscal quarter.
//!
//! Every tower in the catalog gets exactly one row. The row is copied from the
//! tower's best approved record: the latest month inside the quarter if there
//! is one, otherwise the latest month seen at all. Towers without any usable
//! record keep the "nothing paid yet" defaults.

use std::collections::HashMap;

use serde::Serialize;

use crate::services::{
    cam_catalog::{FiscalCalendar, FiscalQuarter, TowerCapacity, TowerCatalog},
    cam_model::{CamStatus, TowerRecord},
};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TowerSummary {
    pub tower: String,
    pub capacity: i64,
    pub total_flats: i64,
    pub paid_flats: i64,
    pub pending_flats: i64,
    pub dues_cleared_from_previous: i64,
    pub advance_payments: i64,
    pub cam_recon_flats: i64,
    pub source_year: Option<i32>,
    pub source_month: Option<u32>,
    pub is_from_selected_period: bool,
    pub collection_rate: f64,
    pub exceeds_capacity: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CollectionTotals {
    pub tower_count: usize,
    pub total_flats: i64,
    pub total_paid: i64,
    pub total_pending: i64,
    pub total_dues_cleared: i64,
    pub total_advance_payments: i64,
    pub collection_rate: f64,
    pub towers_from_selected_period: usize,
    pub towers_exceeding_capacity: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QuarterSummary {
    pub fiscal_year: i32,
    pub quarter: FiscalQuarter,
    pub quarter_label: &'static str,
    pub towers: Vec<TowerSummary>,
    pub totals: CollectionTotals,
}

struct Candidate<'a> {
    record: &'a TowerRecord,
    month: u32,
    in_quarter: bool,
}

/// Percentage of `paid` over `total`, one decimal, 0 when there is nothing to
/// divide by. Not clamped: inconsistent inputs may yield more than 100.
pub fn collection_rate(paid: i64, total: i64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    round1(paid as f64 / total as f64 * 100.0)
}

/// Pick one summary row per catalog tower for `quarter` of `fiscal_year`.
///
/// Only approved records from `fiscal_year` and the following calendar year
/// take part. Months are compared without their year, and on equal months the
/// record seen first is kept.
pub fn reconcile(
    records: &[TowerRecord],
    fiscal_year: i32,
    quarter: FiscalQuarter,
    catalog: &TowerCatalog,
    calendar: &FiscalCalendar,
) -> Vec<TowerSummary> {
    let mut selected: HashMap<&str, Candidate<'_>> = HashMap::new();

    for record in records {
        if record.status != CamStatus::Approved
            || !matches!(record.year.checked_sub(fiscal_year), Some(0 | 1))
        {
            continue;
        }
        let Some(month) = record.reporting_month() else {
            continue;
        };
        if !catalog.contains(&record.tower) {
            continue;
        }

        let in_quarter = calendar.contains(quarter, month);
        let replace = match selected.get(record.tower.as_str()) {
            None => true,
            Some(current) => supersedes(in_quarter, month, current),
        };
        if replace {
            selected.insert(
                record.tower.as_str(),
                Candidate {
                    record,
                    month,
                    in_quarter,
                },
            );
        }
    }

    catalog
        .towers()
        .iter()
        .map(|tower| match selected.get(tower.tower.as_str()) {
            Some(candidate) => summary_from_candidate(tower, candidate),
            None => default_summary(tower),
        })
        .collect()
}

pub fn summarize(towers: &[TowerSummary]) -> CollectionTotals {
    let total_flats = saturating_sum(towers.iter().map(|row| row.total_flats));
    let total_paid = saturating_sum(towers.iter().map(|row| row.paid_flats));

    CollectionTotals {
        tower_count: towers.len(),
        total_flats,
        total_paid,
        total_pending: saturating_sum(towers.iter().map(|row| row.pending_flats)),
        total_dues_cleared: saturating_sum(
            towers.iter().map(|row| row.dues_cleared_from_previous),
        ),
        total_advance_payments: saturating_sum(towers.iter().map(|row| row.advance_payments)),
        collection_rate: collection_rate(total_paid, total_flats),
        towers_from_selected_period: towers
            .iter()
            .filter(|row| row.is_from_selected_period)
            .count(),
        towers_exceeding_capacity: towers.iter().filter(|row| row.exceeds_capacity).count(),
    }
}

pub fn quarter_summary(
    records: &[TowerRecord],
    fiscal_year: i32,
    quarter: FiscalQuarter,
    catalog: &TowerCatalog,
    calendar: &FiscalCalendar,
) -> QuarterSummary {
    let towers = reconcile(records, fiscal_year, quarter, catalog, calendar);
    let totals = summarize(&towers);

    tracing::debug!(
        fiscal_year,
        quarter = quarter.number(),
        records = records.len(),
        in_period = totals.towers_from_selected_period,
        over_capacity = totals.towers_exceeding_capacity,
        "Reconciled CAM tower summary"
    );

    QuarterSummary {
        fiscal_year,
        quarter,
        quarter_label: quarter.label(),
        towers,
        totals,
    }
}

fn supersedes(in_quarter: bool, month: u32, current: &Candidate<'_>) -> bool {
    if in_quarter {
        !current.in_quarter || month > current.month
    } else {
        !current.in_quarter && month > current.month
    }
}

fn summary_from_candidate(tower: &TowerCapacity, candidate: &Candidate<'_>) -> TowerSummary {
    let record = candidate.record;
    TowerSummary {
        tower: tower.tower.clone(),
        capacity: tower.total_flats,
        total_flats: record.total_flats,
        paid_flats: record.paid_flats,
        pending_flats: record.pending_flats,
        dues_cleared_from_previous: record.dues_cleared_from_previous.unwrap_or(0),
        advance_payments: record.advance_payments.unwrap_or(0),
        cam_recon_flats: record.cam_recon_flats.unwrap_or(0),
        source_year: Some(record.year),
        source_month: Some(candidate.month),
        is_from_selected_period: candidate.in_quarter,
        collection_rate: collection_rate(record.paid_flats, record.total_flats),
        exceeds_capacity: record.paid_flats.saturating_add(record.pending_flats)
            > tower.total_flats,
    }
}

fn default_summary(tower: &TowerCapacity) -> TowerSummary {
    TowerSummary {
        tower: tower.tower.clone(),
        capacity: tower.total_flats,
        total_flats: tower.total_flats,
        paid_flats: 0,
        pending_flats: tower.total_flats,
        dues_cleared_from_previous: 0,
        advance_payments: 0,
        cam_recon_flats: 0,
        source_year: None,
        source_month: None,
        is_from_selected_period: false,
        collection_rate: 0.0,
        exceeds_capacity: false,
    }
}

/// Sums clamp at the `i64` bounds instead of overflowing.
pub(crate) fn saturating_sum(values: impl Iterator<Item = i64>) -> i64 {
    values.fold(0i64, i64::saturating_add)
}

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}
