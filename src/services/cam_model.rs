use serde::{Deserialize, Serialize};

/// Lifecycle of a `cam_tracking` row.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CamStatus {
    #[default]
    Draft,
    Submitted,
    Approved,
    CorrectionPending,
    CorrectionApproved,
    #[serde(other)]
    Unknown,
}

impl CamStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Submitted => "submitted",
            Self::Approved => "approved",
            Self::CorrectionPending => "correction_pending",
            Self::CorrectionApproved => "correction_approved",
            Self::Unknown => "unknown",
        }
    }
}

/// One tower's CAM collection figures for one month.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TowerRecord {
    #[serde(default)]
    pub id: Option<String>,
    pub tower: String,
    pub year: i32,
    #[serde(default)]
    pub month: Option<u32>,
    #[serde(default)]
    pub quarter: u32,
    #[serde(default)]
    pub paid_flats: i64,
    #[serde(default)]
    pub pending_flats: i64,
    #[serde(default)]
    pub total_flats: i64,
    #[serde(default)]
    pub dues_cleared_from_previous: Option<i64>,
    #[serde(default)]
    pub advance_payments: Option<i64>,
    #[serde(default)]
    pub cam_recon_flats: Option<i64>,
    #[serde(default)]
    pub status: CamStatus,
    #[serde(default)]
    pub document_url: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub is_locked: bool,
}

impl TowerRecord {
    /// Month usable for period matching; rows without one are quarter-only.
    pub fn reporting_month(&self) -> Option<u32> {
        self.month.filter(|month| *month > 0)
    }

    pub fn has_document(&self) -> bool {
        self.document_url
            .as_deref()
            .map(str::trim)
            .is_some_and(|url| !url.is_empty())
    }
}

#[cfg(test)]
pub(crate) fn record(tower: &str, year: i32, month: u32, paid: i64, pending: i64) -> TowerRecord {
    TowerRecord {
        id: None,
        tower: tower.to_string(),
        year,
        month: Some(month),
        quarter: 0,
        paid_flats: paid,
        pending_flats: pending,
        total_flats: paid + pending,
        dues_cleared_from_previous: None,
        advance_payments: None,
        cam_recon_flats: None,
        status: CamStatus::Approved,
        document_url: None,
        notes: None,
        is_locked: false,
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{CamStatus, TowerRecord};

    #[test]
    fn parses_database_row_shape() {
        let row = json!({
            "id": "550e8400-e29b-41d4-a716-446655440000",
            "tower": "11",
            "year": 2025,
            "month": 5,
            "quarter": 1,
            "paid_flats": 150,
            "pending_flats": 51,
            "total_flats": 201,
            "dues_cleared_from_previous": 4,
            "advance_payments": 2,
            "status": "approved",
            "document_url": null,
            "is_locked": true,
            "created_at": "2025-05-31T10:00:00+00:00"
        });
        let record: TowerRecord = serde_json::from_value(row).expect("row parses");
        assert_eq!(record.tower, "11");
        assert_eq!(record.reporting_month(), Some(5));
        assert_eq!(record.status, CamStatus::Approved);
        assert_eq!(record.cam_recon_flats, None);
        assert!(!record.has_document());
    }

    #[test]
    fn unknown_status_does_not_reject_row() {
        let record: TowerRecord = serde_json::from_value(json!({
            "tower": "5",
            "year": 2025,
            "month": null,
            "status": "archived"
        }))
        .expect("row parses");
        assert_eq!(record.status, CamStatus::Unknown);
        assert_eq!(record.reporting_month(), None);
    }
}
