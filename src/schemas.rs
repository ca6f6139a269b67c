use serde::Deserialize;
use validator::Validate;

use crate::{
    error::AppError,
    services::{cam_catalog::FiscalQuarter, cam_model::TowerRecord},
};

pub fn validate_input<T: Validate>(input: &T) -> Result<(), AppError> {
    input
        .validate()
        .map_err(|errors| AppError::UnprocessableEntity(format!("Validation failed: {errors}")))
}

fn default_breakdown_filter() -> String {
    "latest".to_string()
}
fn default_period_type() -> String {
    "quarterly".to_string()
}
fn default_tower_all() -> String {
    "All".to_string()
}

/// `year` is the fiscal year (April start). Omitted fields fall back to the
/// fiscal period containing today.
#[derive(Debug, Clone, Deserialize, serde::Serialize, Validate)]
pub struct CamPeriodQuery {
    #[validate(range(min = 2000, max = 2100))]
    pub year: Option<i32>,
    pub quarter: Option<u32>,
}

#[derive(Debug, Clone, Deserialize, serde::Serialize, Validate)]
pub struct FiscalYearQuery {
    #[validate(range(min = 2000, max = 2100))]
    pub year: Option<i32>,
}

#[derive(Debug, Clone, Deserialize, serde::Serialize, Validate)]
pub struct TowerBreakdownQuery {
    #[validate(range(min = 2000, max = 2100))]
    pub year: Option<i32>,
    #[serde(default = "default_breakdown_filter")]
    pub filter: String,
    pub value: Option<String>,
}

/// `year` here is a calendar year.
#[derive(Debug, Clone, Deserialize, serde::Serialize, Validate)]
pub struct MissingDocumentsQuery {
    #[validate(range(min = 2000, max = 2100))]
    pub year: Option<i32>,
    #[serde(default = "default_period_type")]
    pub period_type: String,
    pub period: Option<String>,
    #[serde(default = "default_tower_all")]
    pub tower: String,
}

#[derive(Debug, Clone, Deserialize, serde::Serialize, Validate)]
pub struct CamEntriesQuery {
    pub tower: String,
    #[validate(range(min = 2000, max = 2100))]
    pub year: Option<i32>,
    pub quarter: Option<u32>,
}

#[derive(Debug, Clone, Deserialize, serde::Serialize, Validate)]
pub struct CamMonthEntryInput {
    #[validate(range(min = 1, max = 12))]
    pub month: u32,
    #[serde(default)]
    pub paid_flats: i64,
    #[serde(default)]
    pub pending_flats: i64,
    pub dues_cleared_from_previous: Option<i64>,
    pub advance_payments: Option<i64>,
    pub cam_recon_flats: Option<i64>,
    #[validate(length(max = 2000))]
    pub notes: Option<String>,
    #[validate(length(max = 2048))]
    pub document_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize, serde::Serialize, Validate)]
pub struct SaveCamEntriesInput {
    #[validate(length(min = 1, max = 16))]
    pub tower: String,
    #[validate(range(min = 2000, max = 2100))]
    pub year: i32,
    #[validate(range(min = 1, max = 4))]
    pub quarter: u32,
    #[validate(length(min = 1, max = 3), nested)]
    pub months: Vec<CamMonthEntryInput>,
}

#[derive(Debug, Clone, Deserialize, serde::Serialize, Validate)]
pub struct CamWorkflowInput {
    #[validate(length(min = 1, max = 16))]
    pub tower: String,
    #[validate(range(min = 2000, max = 2100))]
    pub year: i32,
    #[validate(range(min = 1, max = 4))]
    pub quarter: u32,
    #[validate(length(max = 2000))]
    pub reason: Option<String>,
}

/// Records supplied by the caller instead of read from the database.
#[derive(Debug, Clone, Deserialize, serde::Serialize, Validate)]
pub struct ReconcileInput {
    #[validate(range(min = 2000, max = 2100))]
    pub year: i32,
    pub quarter: FiscalQuarter,
    #[serde(default)]
    pub records: Vec<TowerRecord>,
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{validate_input, FiscalYearQuery, ReconcileInput, SaveCamEntriesInput};
    use crate::error::AppError;

    #[test]
    fn rejects_month_outside_calendar() {
        let input: SaveCamEntriesInput = serde_json::from_value(json!({
            "tower": "1A",
            "year": 2025,
            "quarter": 1,
            "months": [{ "month": 13, "paid_flats": 1 }]
        }))
        .expect("payload parses");
        assert!(matches!(
            validate_input(&input),
            Err(AppError::UnprocessableEntity(_))
        ));
    }

    #[test]
    fn accepts_minimal_entry() {
        let input: SaveCamEntriesInput = serde_json::from_value(json!({
            "tower": "1A",
            "year": 2025,
            "quarter": 1,
            "months": [{ "month": 4, "paid_flats": 60, "pending_flats": 7 }]
        }))
        .expect("payload parses");
        assert!(validate_input(&input).is_ok());
        assert_eq!(input.months[0].dues_cleared_from_previous, None);
    }

    #[test]
    fn years_outside_supported_range_are_rejected() {
        let query = FiscalYearQuery {
            year: Some(i32::MAX),
        };
        assert!(matches!(
            validate_input(&query),
            Err(AppError::UnprocessableEntity(_))
        ));
        assert!(validate_input(&FiscalYearQuery { year: None }).is_ok());

        let input: ReconcileInput = serde_json::from_value(json!({
            "year": 1999,
            "quarter": 1
        }))
        .expect("payload parses");
        assert!(validate_input(&input).is_err());
    }
}
