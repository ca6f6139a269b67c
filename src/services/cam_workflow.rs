use serde::{Deserialize, Serialize};

use crate::services::{
    cam_catalog::month_name,
    cam_model::{CamStatus, TowerRecord},
};

/// Figures entered for one tower and one month.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CamEntryValues {
    pub paid_flats: i64,
    pub pending_flats: i64,
    pub dues_cleared_from_previous: i64,
    pub advance_payments: i64,
}

impl CamEntryValues {
    pub fn has_data(&self) -> bool {
        self.paid_flats > 0 || self.pending_flats > 0
    }
}

impl From<&TowerRecord> for CamEntryValues {
    fn from(record: &TowerRecord) -> Self {
        Self {
            paid_flats: record.paid_flats,
            pending_flats: record.pending_flats,
            dues_cleared_from_previous: record.dues_cleared_from_previous.unwrap_or(0),
            advance_payments: record.advance_payments.unwrap_or(0),
        }
    }
}

/// Rejects figures that cannot describe a tower with `max_flats` flats.
pub fn validate_entry(
    values: &CamEntryValues,
    tower: &str,
    month: u32,
    max_flats: i64,
) -> Result<(), String> {
    if values.paid_flats < 0
        || values.pending_flats < 0
        || values.dues_cleared_from_previous < 0
        || values.advance_payments < 0
    {
        return Err("Values cannot be negative".to_string());
    }
    if values.paid_flats > max_flats {
        return Err(format!(
            "Paid flats cannot exceed {max_flats} for tower {tower}"
        ));
    }
    if values.pending_flats > max_flats {
        return Err(format!(
            "Pending flats cannot exceed {max_flats} for tower {tower}"
        ));
    }
    if values.paid_flats + values.pending_flats > max_flats {
        return Err(format!(
            "Total (paid + pending) cannot exceed {max_flats} flats in {}",
            month_name(month).unwrap_or("this month")
        ));
    }
    Ok(())
}

/// Collapses the statuses of a tower's rows for one quarter into one.
pub fn tower_status(statuses: &[CamStatus]) -> CamStatus {
    if statuses.is_empty() {
        return CamStatus::Draft;
    }
    if statuses.iter().all(|status| *status == CamStatus::Approved) {
        return CamStatus::Approved;
    }
    for candidate in [
        CamStatus::Submitted,
        CamStatus::CorrectionPending,
        CamStatus::CorrectionApproved,
    ] {
        if statuses.contains(&candidate) {
            return candidate;
        }
    }
    CamStatus::Draft
}

pub fn can_edit(status: CamStatus) -> bool {
    matches!(status, CamStatus::Draft | CamStatus::CorrectionApproved)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowAction {
    Submit,
    Approve,
    RequestCorrection,
    ApproveCorrection,
}

impl WorkflowAction {
    /// Statuses the action may start from.
    pub fn allowed_from(self) -> &'static [CamStatus] {
        match self {
            Self::Submit => &[CamStatus::Draft, CamStatus::CorrectionApproved],
            Self::Approve => &[CamStatus::Submitted],
            Self::RequestCorrection => &[CamStatus::Approved],
            Self::ApproveCorrection => &[CamStatus::CorrectionPending],
        }
    }

    pub fn target(self) -> CamStatus {
        match self {
            Self::Submit => CamStatus::Submitted,
            Self::Approve => CamStatus::Approved,
            Self::RequestCorrection => CamStatus::CorrectionPending,
            Self::ApproveCorrection => CamStatus::CorrectionApproved,
        }
    }

    /// Rows are locked while approved or awaiting a correction decision.
    pub fn locks(self) -> bool {
        matches!(self, Self::Approve | Self::RequestCorrection)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Submit => "submit",
            Self::Approve => "approve",
            Self::RequestCorrection => "request_correction",
            Self::ApproveCorrection => "approve_correction",
        }
    }

    pub fn transition(self, current: CamStatus) -> Result<CamStatus, String> {
        if self.allowed_from().contains(&current) {
            Ok(self.target())
        } else {
            Err(format!(
                "Cannot {} CAM data in status {}",
                self.as_str().replace('_', " "),
                current.as_str()
            ))
        }
    }
}

/// Months of the quarter with neither paid nor pending flats entered.
pub fn months_without_data(entries: &[(u32, CamEntryValues)], months: &[u32]) -> Vec<u32> {
    months
        .iter()
        .copied()
        .filter(|month| {
            !entries
                .iter()
                .any(|(entry_month, values)| entry_month == month && values.has_data())
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::{
        can_edit, months_without_data, tower_status, validate_entry, CamEntryValues,
        WorkflowAction,
    };
    use crate::services::cam_model::CamStatus;

    fn values(paid: i64, pending: i64) -> CamEntryValues {
        CamEntryValues {
            paid_flats: paid,
            pending_flats: pending,
            ..CamEntryValues::default()
        }
    }

    #[test]
    fn entry_validation_messages() {
        assert_eq!(
            validate_entry(&values(-1, 0), "1A", 4, 67),
            Err("Values cannot be negative".to_string())
        );
        assert_eq!(
            validate_entry(&values(68, 0), "1A", 4, 67),
            Err("Paid flats cannot exceed 67 for tower 1A".to_string())
        );
        assert_eq!(
            validate_entry(&values(0, 202), "11", 4, 201),
            Err("Pending flats cannot exceed 201 for tower 11".to_string())
        );
        assert_eq!(
            validate_entry(&values(40, 40), "2B", 11, 67),
            Err("Total (paid + pending) cannot exceed 67 flats in Nov".to_string())
        );
        assert_eq!(validate_entry(&values(60, 7), "2B", 11, 67), Ok(()));
    }

    #[test]
    fn tower_status_precedence() {
        assert_eq!(tower_status(&[]), CamStatus::Draft);
        assert_eq!(
            tower_status(&[CamStatus::Approved, CamStatus::Approved]),
            CamStatus::Approved
        );
        assert_eq!(
            tower_status(&[CamStatus::Approved, CamStatus::Submitted, CamStatus::Draft]),
            CamStatus::Submitted
        );
        assert_eq!(
            tower_status(&[CamStatus::CorrectionApproved, CamStatus::CorrectionPending]),
            CamStatus::CorrectionPending
        );
        assert_eq!(
            tower_status(&[CamStatus::Approved, CamStatus::Draft]),
            CamStatus::Draft
        );
    }

    #[test]
    fn transitions() {
        assert!(can_edit(CamStatus::Draft));
        assert!(can_edit(CamStatus::CorrectionApproved));
        assert!(!can_edit(CamStatus::Submitted));

        assert_eq!(
            WorkflowAction::Submit.transition(CamStatus::CorrectionApproved),
            Ok(CamStatus::Submitted)
        );
        assert_eq!(
            WorkflowAction::Approve.transition(CamStatus::Draft),
            Err("Cannot approve CAM data in status draft".to_string())
        );
        assert_eq!(
            WorkflowAction::RequestCorrection.transition(CamStatus::Approved),
            Ok(CamStatus::CorrectionPending)
        );
        assert!(WorkflowAction::Approve.locks());
        assert!(!WorkflowAction::ApproveCorrection.locks());
    }

    #[test]
    fn submit_requires_data_for_each_month() {
        let entries = vec![(4, values(60, 7)), (5, values(0, 0))];
        assert_eq!(months_without_data(&entries, &[4, 5, 6]), vec![5, 6]);
        assert!(months_without_data(&[(7, values(0, 3))], &[7]).is_empty());
    }
}
