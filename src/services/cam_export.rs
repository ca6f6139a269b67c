use sha2::{Digest, Sha256};

use crate::services::cam_reconciliation::{saturating_sum, QuarterSummary};

const HEADER: [&str; 8] = [
    "Tower",
    "Total Flats",
    "Paid Flats",
    "Pending Flats",
    "Dues Cleared",
    "Advance Payments",
    "CAM Recon",
    "Collection Rate (%)",
];

pub fn export_file_name(summary: &QuarterSummary) -> String {
    format!(
        "CAM_Report_FY{}_Q{}.csv",
        summary.fiscal_year,
        summary.quarter.number()
    )
}

/// One row per tower in catalog order, closed by a complex-wide total row.
pub fn render_summary_csv(summary: &QuarterSummary) -> String {
    let mut lines = Vec::with_capacity(summary.towers.len() + 2);
    lines.push(HEADER.join(","));

    for row in &summary.towers {
        lines.push(
            [
                escape_csv_field(&row.tower),
                row.total_flats.to_string(),
                row.paid_flats.to_string(),
                row.pending_flats.to_string(),
                row.dues_cleared_from_previous.to_string(),
                row.advance_payments.to_string(),
                row.cam_recon_flats.to_string(),
                format!("{:.1}", row.collection_rate),
            ]
            .join(","),
        );
    }

    let totals = &summary.totals;
    let total_recon = saturating_sum(summary.towers.iter().map(|row| row.cam_recon_flats));
    lines.push(
        [
            "Total".to_string(),
            totals.total_flats.to_string(),
            totals.total_paid.to_string(),
            totals.total_pending.to_string(),
            totals.total_dues_cleared.to_string(),
            totals.total_advance_payments.to_string(),
            total_recon.to_string(),
            format!("{:.1}", totals.collection_rate),
        ]
        .join(","),
    );

    let mut csv = lines.join("\r\n");
    csv.push_str("\r\n");
    csv
}

/// Strong validator for an export body: first 16 bytes of its SHA-256, quoted.
pub fn content_etag(body: &str) -> String {
    let hash = Sha256::digest(body.as_bytes());
    format!(
        "\"{}\"",
        hash[..16]
            .iter()
            .map(|byte| format!("{byte:02x}"))
            .collect::<String>()
    )
}

pub fn etag_matches(if_none_match: &str, etag: &str) -> bool {
    if_none_match.split(',').map(str::trim).any(|candidate| {
        candidate == "*"
            || candidate.trim_start_matches("W/").trim_matches('"') == etag.trim_matches('"')
    })
}

fn escape_csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::{content_etag, escape_csv_field, etag_matches, export_file_name, render_summary_csv};
    use crate::services::{
        cam_catalog::{FiscalCalendar, FiscalQuarter, TowerCatalog},
        cam_model::record,
        cam_reconciliation::quarter_summary,
    };

    #[test]
    fn renders_rows_and_total_line() {
        let mut row = record("11", 2025, 5, 150, 51);
        row.cam_recon_flats = Some(3);
        let summary = quarter_summary(
            &[row],
            2025,
            FiscalQuarter::Q1,
            &TowerCatalog::standard(),
            &FiscalCalendar::standard(),
        );
        let csv = render_summary_csv(&summary);
        let lines = csv.lines().collect::<Vec<_>>();

        assert_eq!(lines.len(), 35);
        assert_eq!(
            lines[0],
            "Tower,Total Flats,Paid Flats,Pending Flats,Dues Cleared,Advance Payments,CAM Recon,Collection Rate (%)"
        );
        assert_eq!(lines[1], "1A,67,0,67,0,0,0,0.0");
        assert_eq!(lines[17], "11,201,150,51,0,0,3,74.6");
        assert!(lines[34].starts_with("Total,2613,150,"));
        assert!(lines[34].ends_with(",3,5.7"));
        assert_eq!(export_file_name(&summary), "CAM_Report_FY2025_Q1.csv");
    }

    #[test]
    fn etag_is_stable_and_quoted() {
        let etag = content_etag("Tower\r\n");
        assert_eq!(etag, content_etag("Tower\r\n"));
        assert_ne!(etag, content_etag("Tower,\r\n"));
        assert_eq!(etag.len(), 34);
        assert!(etag_matches(&format!("W/{etag}, \"other\""), &etag));
        assert!(etag_matches("*", &etag));
        assert!(!etag_matches("\"other\"", &etag));
    }

    #[test]
    fn quotes_fields_with_separators() {
        assert_eq!(escape_csv_field("9A"), "9A");
        assert_eq!(escape_csv_field("A,\"B\""), "\"A,\"\"B\"\"\"");
    }
}
