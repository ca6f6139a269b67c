//! Fixed lookup tables for CAM reporting: the tower list with flat capacities
//! and the April-start fiscal calendar.

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

pub const TOWER_CODES: [&str; 33] = [
    "1A", "1B", "2A", "2B", "3A", "3B", "4A", "4B", "5", "6", "7", "8", "9A", "9B", "9C", "10",
    "11", "12", "13", "14", "15A", "15B", "16A", "16B", "17A", "17B", "18A", "18B", "18C", "19",
    "20A", "20B", "20C",
];

pub const STANDARD_TOWER_FLATS: i64 = 67;
pub const LARGE_TOWER_FLATS: i64 = 201;
const LARGE_TOWERS: &[&str] = &["11", "12", "13"];

const MONTH_NAMES: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];

pub fn month_name(month: u32) -> Option<&'static str> {
    if (1..=12).contains(&month) {
        Some(MONTH_NAMES[(month - 1) as usize])
    } else {
        None
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TowerCapacity {
    pub tower: String,
    pub total_flats: i64,
}

/// Ordered tower list. Output of every per-tower report follows this order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TowerCatalog {
    towers: Vec<TowerCapacity>,
}

impl TowerCatalog {
    pub fn new(towers: Vec<TowerCapacity>) -> Self {
        Self { towers }
    }

    pub fn standard() -> Self {
        Self::new(
            TOWER_CODES
                .iter()
                .map(|code| TowerCapacity {
                    tower: (*code).to_string(),
                    total_flats: if LARGE_TOWERS.contains(code) {
                        LARGE_TOWER_FLATS
                    } else {
                        STANDARD_TOWER_FLATS
                    },
                })
                .collect(),
        )
    }

    pub fn towers(&self) -> &[TowerCapacity] {
        &self.towers
    }

    pub fn len(&self) -> usize {
        self.towers.len()
    }

    pub fn capacity(&self, tower: &str) -> Option<i64> {
        self.towers
            .iter()
            .find(|entry| entry.tower == tower)
            .map(|entry| entry.total_flats)
    }

    pub fn contains(&self, tower: &str) -> bool {
        self.position(tower).is_some()
    }

    pub fn position(&self, tower: &str) -> Option<usize> {
        self.towers.iter().position(|entry| entry.tower == tower)
    }

    pub fn total_flats(&self) -> i64 {
        self.towers.iter().map(|entry| entry.total_flats).sum()
    }
}

impl Default for TowerCatalog {
    fn default() -> Self {
        Self::standard()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub enum FiscalQuarter {
    Q1,
    Q2,
    Q3,
    Q4,
}

impl FiscalQuarter {
    pub const ALL: [FiscalQuarter; 4] = [Self::Q1, Self::Q2, Self::Q3, Self::Q4];

    pub fn from_number(number: u32) -> Option<Self> {
        match number {
            1 => Some(Self::Q1),
            2 => Some(Self::Q2),
            3 => Some(Self::Q3),
            4 => Some(Self::Q4),
            _ => None,
        }
    }

    pub fn number(self) -> u32 {
        match self {
            Self::Q1 => 1,
            Self::Q2 => 2,
            Self::Q3 => 3,
            Self::Q4 => 4,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Q1 => "Q1 (Apr-Jun)",
            Self::Q2 => "Q2 (Jul-Sep)",
            Self::Q3 => "Q3 (Oct-Dec)",
            Self::Q4 => "Q4 (Jan-Mar)",
        }
    }

    fn index(self) -> usize {
        (self.number() - 1) as usize
    }
}

impl TryFrom<u32> for FiscalQuarter {
    type Error = String;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        Self::from_number(value).ok_or_else(|| format!("quarter must be 1-4, got {value}"))
    }
}

impl From<FiscalQuarter> for u32 {
    fn from(quarter: FiscalQuarter) -> Self {
        quarter.number()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HalfYear {
    H1,
    H2,
}

impl HalfYear {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_uppercase().as_str() {
            "H1" | "1" => Some(Self::H1),
            "H2" | "2" => Some(Self::H2),
            _ => None,
        }
    }

    pub fn quarters(self) -> [FiscalQuarter; 2] {
        match self {
            Self::H1 => [FiscalQuarter::Q1, FiscalQuarter::Q2],
            Self::H2 => [FiscalQuarter::Q3, FiscalQuarter::Q4],
        }
    }
}

/// Quarter to calendar-month mapping. The standard calendar starts in April.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FiscalCalendar {
    quarter_months: [[u32; 3]; 4],
}

impl FiscalCalendar {
    pub fn new(quarter_months: [[u32; 3]; 4]) -> Self {
        Self { quarter_months }
    }

    pub fn standard() -> Self {
        Self::new([[4, 5, 6], [7, 8, 9], [10, 11, 12], [1, 2, 3]])
    }

    pub fn months(&self, quarter: FiscalQuarter) -> [u32; 3] {
        self.quarter_months[quarter.index()]
    }

    pub fn contains(&self, quarter: FiscalQuarter, month: u32) -> bool {
        self.months(quarter).contains(&month)
    }

    pub fn position_in_quarter(&self, quarter: FiscalQuarter, month: u32) -> Option<usize> {
        self.months(quarter).iter().position(|candidate| *candidate == month)
    }

    pub fn quarter_of(&self, month: u32) -> Option<FiscalQuarter> {
        FiscalQuarter::ALL
            .into_iter()
            .find(|quarter| self.contains(*quarter, month))
    }

    pub fn half_year_months(&self, half: HalfYear) -> Vec<u32> {
        half.quarters()
            .into_iter()
            .flat_map(|quarter| self.months(quarter))
            .collect()
    }

    /// All twelve months in fiscal order (Apr ... Mar for the standard calendar).
    pub fn fiscal_months(&self) -> Vec<u32> {
        FiscalQuarter::ALL
            .into_iter()
            .flat_map(|quarter| self.months(quarter))
            .collect()
    }

    /// Calendar year a fiscal month falls in: months of the quarter that wraps
    /// past December belong to the following calendar year.
    pub fn calendar_year_for(&self, fiscal_year: i32, month: u32) -> i32 {
        let first_month = self.quarter_months[0][0];
        if month < first_month {
            fiscal_year.saturating_add(1)
        } else {
            fiscal_year
        }
    }

    /// Whether (year, month) lies inside fiscal year `fiscal_year`.
    pub fn in_fiscal_year(&self, fiscal_year: i32, year: i32, month: u32) -> bool {
        if !(1..=12).contains(&month) {
            return false;
        }
        self.calendar_year_for(fiscal_year, month) == year
    }

    pub fn fiscal_period_of(&self, date: NaiveDate) -> (i32, FiscalQuarter) {
        let month = date.month();
        let first_month = self.quarter_months[0][0];
        let fiscal_year = if month < first_month {
            date.year() - 1
        } else {
            date.year()
        };
        let quarter = self.quarter_of(month).unwrap_or(FiscalQuarter::Q1);
        (fiscal_year, quarter)
    }
}

impl Default for FiscalCalendar {
    fn default() -> Self {
        Self::standard()
    }
}

pub fn fiscal_year_label(fiscal_year: i32) -> String {
    format!(
        "FY {}-{:02}",
        fiscal_year,
        (i64::from(fiscal_year) + 1).rem_euclid(100)
    )
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::{
        fiscal_year_label, month_name, FiscalCalendar, FiscalQuarter, HalfYear, TowerCatalog,
    };

    #[test]
    fn standard_catalog_matches_complex_total() {
        let catalog = TowerCatalog::standard();
        assert_eq!(catalog.len(), 33);
        assert_eq!(catalog.total_flats(), 2613);
        assert_eq!(catalog.capacity("11"), Some(201));
        assert_eq!(catalog.capacity("13"), Some(201));
        assert_eq!(catalog.capacity("20C"), Some(67));
        assert_eq!(catalog.capacity("21"), None);
        assert_eq!(catalog.position("1A"), Some(0));
        assert_eq!(catalog.position("20C"), Some(32));
    }

    #[test]
    fn quarters_follow_april_start() {
        let calendar = FiscalCalendar::standard();
        assert_eq!(calendar.months(FiscalQuarter::Q1), [4, 5, 6]);
        assert_eq!(calendar.months(FiscalQuarter::Q4), [1, 2, 3]);
        assert_eq!(calendar.quarter_of(12), Some(FiscalQuarter::Q3));
        assert_eq!(calendar.quarter_of(13), None);
        assert_eq!(calendar.position_in_quarter(FiscalQuarter::Q2, 9), Some(2));
        assert_eq!(
            calendar.fiscal_months(),
            vec![4, 5, 6, 7, 8, 9, 10, 11, 12, 1, 2, 3]
        );
        assert_eq!(
            calendar.half_year_months(HalfYear::H2),
            vec![10, 11, 12, 1, 2, 3]
        );
    }

    #[test]
    fn fiscal_window_spans_two_calendar_years() {
        let calendar = FiscalCalendar::standard();
        assert!(calendar.in_fiscal_year(2025, 2025, 4));
        assert!(calendar.in_fiscal_year(2025, 2026, 3));
        assert!(!calendar.in_fiscal_year(2025, 2025, 3));
        assert!(!calendar.in_fiscal_year(2025, 2026, 4));
        assert!(!calendar.in_fiscal_year(2025, 2025, 0));
        assert_eq!(calendar.calendar_year_for(2025, 2), 2026);
        assert_eq!(calendar.calendar_year_for(2025, 11), 2025);
    }

    #[test]
    fn current_period_from_date() {
        let calendar = FiscalCalendar::standard();
        let february = NaiveDate::from_ymd_opt(2026, 2, 10).expect("valid date");
        assert_eq!(calendar.fiscal_period_of(february), (2025, FiscalQuarter::Q4));
        let october = NaiveDate::from_ymd_opt(2026, 10, 19).expect("valid date");
        assert_eq!(calendar.fiscal_period_of(october), (2026, FiscalQuarter::Q3));
    }

    #[test]
    fn labels() {
        assert_eq!(fiscal_year_label(2025), "FY 2025-26");
        assert_eq!(fiscal_year_label(2099), "FY 2099-00");
        assert_eq!(fiscal_year_label(i32::MAX), "FY 2147483647-48");
        assert_eq!(FiscalCalendar::standard().calendar_year_for(i32::MAX, 1), i32::MAX);
        assert_eq!(FiscalQuarter::Q2.label(), "Q2 (Jul-Sep)");
        assert_eq!(month_name(9), Some("Sep"));
        assert_eq!(month_name(0), None);
        assert_eq!(HalfYear::parse("h1"), Some(HalfYear::H1));
        assert_eq!(HalfYear::parse("H3"), None);
    }

    #[test]
    fn quarter_number_round_trips_through_serde() {
        let quarter: FiscalQuarter = serde_json::from_str("3").expect("valid quarter");
        assert_eq!(quarter, FiscalQuarter::Q3);
        assert!(serde_json::from_str::<FiscalQuarter>("5").is_err());
        assert_eq!(serde_json::to_string(&FiscalQuarter::Q4).expect("serializes"), "4");
    }
}
