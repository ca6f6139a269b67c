use std::collections::HashMap;

use serde::Serialize;

use crate::services::{
    cam_catalog::{month_name, FiscalCalendar, FiscalQuarter, HalfYear, TowerCatalog},
    cam_model::{CamStatus, TowerRecord},
    cam_reconciliation::collection_rate,
};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QuarterTotals {
    pub quarter: FiscalQuarter,
    pub quarter_label: &'static str,
    pub paid: i64,
    pub pending: i64,
    pub dues_cleared: i64,
    pub advance: i64,
    pub total_demand: i64,
    pub towers_reporting: usize,
}

/// Position of one fiscal quarter: paid/pending from each tower's latest month
/// in the quarter, dues cleared and advances summed over every month.
pub fn quarter_totals(
    records: &[TowerRecord],
    fiscal_year: i32,
    quarter: FiscalQuarter,
    catalog: &TowerCatalog,
    calendar: &FiscalCalendar,
) -> QuarterTotals {
    let in_quarter = records
        .iter()
        .filter_map(|record| record.reporting_month().map(|month| (record, month)))
        .filter(|(record, month)| {
            calendar.in_fiscal_year(fiscal_year, record.year, *month)
                && calendar.contains(quarter, *month)
        })
        .collect::<Vec<_>>();

    let mut latest: HashMap<&str, (&TowerRecord, u32)> = HashMap::new();
    for (record, month) in &in_quarter {
        let replace = latest
            .get(record.tower.as_str())
            .is_none_or(|(_, current_month)| month > current_month);
        if replace {
            latest.insert(record.tower.as_str(), (*record, *month));
        }
    }

    QuarterTotals {
        quarter,
        quarter_label: quarter.label(),
        paid: latest.values().map(|(record, _)| record.paid_flats).sum(),
        pending: latest.values().map(|(record, _)| record.pending_flats).sum(),
        dues_cleared: in_quarter
            .iter()
            .map(|(record, _)| record.dues_cleared_from_previous.unwrap_or(0))
            .sum(),
        advance: in_quarter
            .iter()
            .map(|(record, _)| record.advance_payments.unwrap_or(0))
            .sum(),
        total_demand: catalog.total_flats(),
        towers_reporting: latest.len(),
    }
}

pub fn fiscal_year_totals(
    records: &[TowerRecord],
    fiscal_year: i32,
    catalog: &TowerCatalog,
    calendar: &FiscalCalendar,
) -> Vec<QuarterTotals> {
    FiscalQuarter::ALL
        .into_iter()
        .map(|quarter| quarter_totals(records, fiscal_year, quarter, catalog, calendar))
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PendingDiscrepancy {
    pub id: String,
    pub tower: String,
    pub quarter: FiscalQuarter,
    pub quarter_label: &'static str,
    pub previous_month: u32,
    pub previous_pending: i64,
    pub month: u32,
    pub pending: i64,
    pub kind: &'static str,
    pub description: String,
}

/// Within a quarter a tower's pending count may only stay flat or fall.
/// Every month-over-month increase is reported.
pub fn detect_pending_increases(
    records: &[TowerRecord],
    fiscal_year: i32,
    catalog: &TowerCatalog,
    calendar: &FiscalCalendar,
) -> Vec<PendingDiscrepancy> {
    let mut found = Vec::new();

    for tower in catalog.towers() {
        for quarter in FiscalQuarter::ALL {
            let mut months = records
                .iter()
                .filter(|record| record.tower == tower.tower)
                .filter_map(|record| {
                    let month = record.reporting_month()?;
                    let position = calendar.position_in_quarter(quarter, month)?;
                    calendar
                        .in_fiscal_year(fiscal_year, record.year, month)
                        .then_some((position, month, record.pending_flats))
                })
                .collect::<Vec<_>>();
            if months.len() < 2 {
                continue;
            }
            months.sort_by_key(|(position, _, _)| *position);

            for pair in months.windows(2) {
                let (_, previous_month, previous_pending) = pair[0];
                let (_, month, pending) = pair[1];
                if pending <= previous_pending {
                    continue;
                }
                found.push(PendingDiscrepancy {
                    id: format!("{}-{}-{}", tower.tower, quarter.number(), month),
                    tower: tower.tower.clone(),
                    quarter,
                    quarter_label: quarter.label(),
                    previous_month,
                    previous_pending,
                    month,
                    pending,
                    kind: "pending_increased",
                    description: format!(
                        "Pending count increased from {previous_pending} ({}) to {pending} ({})",
                        month_name(previous_month).unwrap_or("?"),
                        month_name(month).unwrap_or("?"),
                    ),
                });
            }
        }
    }

    found
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MissingDocument {
    pub tower: String,
    pub month: u32,
    pub year: i32,
    pub has_record: bool,
    pub has_document: bool,
}

/// Towers/months of calendar `year` lacking a submitted or approved record
/// with a supporting document attached.
pub fn missing_documents(
    records: &[TowerRecord],
    year: i32,
    months: &[u32],
    towers: &[String],
) -> Vec<MissingDocument> {
    let mut missing = Vec::new();
    for tower in towers {
        for month in months {
            let found = records.iter().find(|record| {
                record.year == year
                    && record.tower == *tower
                    && record.reporting_month() == Some(*month)
                    && matches!(record.status, CamStatus::Submitted | CamStatus::Approved)
            });
            if found.is_some_and(TowerRecord::has_document) {
                continue;
            }
            missing.push(MissingDocument {
                tower: tower.clone(),
                month: *month,
                year,
                has_record: found.is_some(),
                has_document: false,
            });
        }
    }
    missing
}

/// Months of a document-audit period. `period_type` is monthly, quarterly,
/// half_yearly or yearly; `period` picks the month, fiscal quarter or half and
/// defaults to the one containing `current_month`.
pub fn report_period_months(
    period_type: &str,
    period: Option<&str>,
    current_month: u32,
    calendar: &FiscalCalendar,
) -> Option<Vec<u32>> {
    let period = period.map(str::trim).filter(|value| !value.is_empty());
    let current_quarter = calendar.quarter_of(current_month).unwrap_or(FiscalQuarter::Q1);

    match period_type.trim().to_ascii_lowercase().as_str() {
        "monthly" => {
            let month = match period {
                Some(raw) => raw.parse::<u32>().ok().filter(|month| (1..=12).contains(month))?,
                None => current_month,
            };
            Some(vec![month])
        }
        "quarterly" => {
            let quarter = match period {
                Some(raw) => FiscalQuarter::from_number(
                    raw.trim_start_matches(['Q', 'q']).parse::<u32>().ok()?,
                )?,
                None => current_quarter,
            };
            Some(calendar.months(quarter).to_vec())
        }
        "half_yearly" => {
            let half = match period {
                Some(raw) => HalfYear::parse(raw)?,
                None if matches!(current_quarter, FiscalQuarter::Q1 | FiscalQuarter::Q2) => {
                    HalfYear::H1
                }
                None => HalfYear::H2,
            };
            Some(calendar.half_year_months(half))
        }
        "yearly" => Some((1..=12).collect()),
        _ => None,
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MonthlyCollection {
    pub month: u32,
    pub month_name: &'static str,
    pub paid_flats: i64,
    pub pending_flats: i64,
}

/// Complex-wide approved paid/pending per month, in fiscal order.
pub fn monthly_collection_series(
    records: &[TowerRecord],
    fiscal_year: i32,
    calendar: &FiscalCalendar,
) -> Vec<MonthlyCollection> {
    calendar
        .fiscal_months()
        .into_iter()
        .map(|month| {
            let matching = records.iter().filter(|record| {
                record.status == CamStatus::Approved
                    && record.reporting_month() == Some(month)
                    && calendar.in_fiscal_year(fiscal_year, record.year, month)
            });
            let (paid_flats, pending_flats) = matching.fold((0, 0), |(paid, pending), record| {
                (paid + record.paid_flats, pending + record.pending_flats)
            });
            MonthlyCollection {
                month,
                month_name: month_name(month).unwrap_or("?"),
                paid_flats,
                pending_flats,
            }
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TowerBreakdownFilter {
    /// Each tower's most recent month.
    Latest,
    /// Sum over the listed months.
    Months(Vec<u32>),
}

impl TowerBreakdownFilter {
    /// `kind` is one of latest, month, quarter, half_year, year. A missing or
    /// unrecognised `value` selects no months, like an unset dropdown.
    pub fn parse(kind: &str, value: Option<&str>, calendar: &FiscalCalendar) -> Option<Self> {
        let value = value.map(str::trim).filter(|value| !value.is_empty());
        let number = value.and_then(|raw| raw.parse::<u32>().ok());

        let filter = match kind.trim().to_ascii_lowercase().as_str() {
            "latest" => Self::Latest,
            "month" => Self::Months(
                number
                    .filter(|month| (1..=12).contains(month))
                    .into_iter()
                    .collect(),
            ),
            "quarter" => Self::Months(
                number
                    .and_then(FiscalQuarter::from_number)
                    .map(|quarter| calendar.months(quarter).to_vec())
                    .unwrap_or_default(),
            ),
            "half_year" => Self::Months(
                value
                    .and_then(HalfYear::parse)
                    .map(|half| calendar.half_year_months(half))
                    .unwrap_or_default(),
            ),
            "year" => Self::Months((1..=12).collect()),
            _ => return None,
        };
        Some(filter)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RateBand {
    Excellent,
    Good,
    Moderate,
    Poor,
}

impl RateBand {
    pub fn for_rate(rate: f64) -> Self {
        if rate >= 90.0 {
            Self::Excellent
        } else if rate >= 75.0 {
            Self::Good
        } else if rate >= 50.0 {
            Self::Moderate
        } else {
            Self::Poor
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TowerCollectionRow {
    pub tower: String,
    pub paid_flats: i64,
    pub pending_flats: i64,
    pub total_flats: i64,
    pub months_counted: usize,
    pub payment_rate: f64,
    pub rate_band: RateBand,
}

/// Dashboard view of approved collection per tower. Only towers with data in
/// the selection appear, in catalog order.
pub fn tower_breakdown(
    records: &[TowerRecord],
    fiscal_year: i32,
    filter: &TowerBreakdownFilter,
    catalog: &TowerCatalog,
    calendar: &FiscalCalendar,
) -> Vec<TowerCollectionRow> {
    struct Totals {
        paid: i64,
        pending: i64,
        total: i64,
        count: usize,
        latest_month: u32,
    }

    let mut per_tower: HashMap<&str, Totals> = HashMap::new();
    for record in records {
        let Some(month) = record.reporting_month() else {
            continue;
        };
        if record.status != CamStatus::Approved
            || record.tower.is_empty()
            || !calendar.in_fiscal_year(fiscal_year, record.year, month)
        {
            continue;
        }

        match filter {
            TowerBreakdownFilter::Latest => {
                let newer = per_tower
                    .get(record.tower.as_str())
                    .is_none_or(|current| month > current.latest_month);
                if newer {
                    per_tower.insert(
                        record.tower.as_str(),
                        Totals {
                            paid: record.paid_flats,
                            pending: record.pending_flats,
                            total: record.total_flats,
                            count: 1,
                            latest_month: month,
                        },
                    );
                }
            }
            TowerBreakdownFilter::Months(months) => {
                if !months.contains(&month) {
                    continue;
                }
                let entry = per_tower.entry(record.tower.as_str()).or_insert(Totals {
                    paid: 0,
                    pending: 0,
                    total: 0,
                    count: 0,
                    latest_month: 0,
                });
                entry.paid += record.paid_flats;
                entry.pending += record.pending_flats;
                entry.total += record.total_flats;
                entry.count += 1;
                entry.latest_month = entry.latest_month.max(month);
            }
        }
    }

    let mut rows = per_tower
        .into_iter()
        .map(|(tower, totals)| {
            let payment_rate = collection_rate(totals.paid, totals.total);
            TowerCollectionRow {
                tower: tower.to_string(),
                paid_flats: totals.paid,
                pending_flats: totals.pending,
                total_flats: totals.total,
                months_counted: totals.count,
                payment_rate,
                rate_band: RateBand::for_rate(payment_rate),
            }
        })
        .collect::<Vec<_>>();
    rows.sort_by(|left, right| {
        let left_key = (catalog.position(&left.tower).unwrap_or(usize::MAX), &left.tower);
        let right_key = (catalog.position(&right.tower).unwrap_or(usize::MAX), &right.tower);
        left_key.cmp(&right_key)
    });
    rows
}
