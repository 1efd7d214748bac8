//! Financial period types.

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use coffer_shared::types::{TenantId, UserId};
use serde::{Deserialize, Serialize};

use super::error::PeriodError;

/// Monthly period code, rendered as `YYYY-MM`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PeriodCode {
    year: i32,
    month: u32,
}

impl PeriodCode {
    /// Creates a code from year and month.
    ///
    /// # Errors
    ///
    /// Returns `InvalidPeriodCode` if the month is outside 1..=12 or the year
    /// is outside 1900..=9999.
    pub fn new(year: i32, month: u32) -> Result<Self, PeriodError> {
        if !(1..=12).contains(&month) || !(1900..=9999).contains(&year) {
            return Err(PeriodError::InvalidPeriodCode(format!("{year}-{month:02}")));
        }
        Ok(Self { year, month })
    }

    /// Period containing `date`.
    #[must_use]
    pub fn from_date(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }

    /// Period containing `now`.
    #[must_use]
    pub fn current(now: DateTime<Utc>) -> Self {
        Self::from_date(now.date_naive())
    }

    /// Calendar year.
    #[must_use]
    pub const fn year(&self) -> i32 {
        self.year
    }

    /// Calendar month (1-12).
    #[must_use]
    pub const fn month(&self) -> u32 {
        self.month
    }

    /// First day of the period.
    #[must_use]
    pub fn start_date(&self) -> NaiveDate {
        NaiveDate::from_ymd_opt(self.year, self.month, 1).unwrap_or(NaiveDate::MIN)
    }

    /// Last day of the period.
    #[must_use]
    pub fn end_date(&self) -> NaiveDate {
        self.next()
            .start_date()
            .pred_opt()
            .unwrap_or(NaiveDate::MAX)
    }

    /// The following month.
    #[must_use]
    pub const fn next(&self) -> Self {
        if self.month == 12 {
            Self {
                year: self.year + 1,
                month: 1,
            }
        } else {
            Self {
                year: self.year,
                month: self.month + 1,
            }
        }
    }

    /// Returns true if `date` falls inside the period.
    #[must_use]
    pub fn contains(&self, date: NaiveDate) -> bool {
        Self::from_date(date) == *self
    }
}

impl std::fmt::Display for PeriodCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

impl std::str::FromStr for PeriodCode {
    type Err = PeriodError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || PeriodError::InvalidPeriodCode(s.to_string());
        let (year, month) = s.trim().split_once('-').ok_or_else(invalid)?;
        if year.len() != 4 || month.len() != 2 {
            return Err(invalid());
        }
        let year: i32 = year.parse().map_err(|_| invalid())?;
        let month: u32 = month.parse().map_err(|_| invalid())?;
        Self::new(year, month).map_err(|_| invalid())
    }
}

impl TryFrom<String> for PeriodCode {
    type Error = PeriodError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<PeriodCode> for String {
    fn from(code: PeriodCode) -> Self {
        code.to_string()
    }
}

/// Status of a financial period.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PeriodStatus {
    /// Accepts postings.
    Open,
    /// Rejects postings.
    Closed,
}

impl PeriodStatus {
    /// Returns the canonical string representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Open => "OPEN",
            Self::Closed => "CLOSED",
        }
    }
}

impl std::fmt::Display for PeriodStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for PeriodStatus {
    type Err = PeriodError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "OPEN" => Ok(Self::Open),
            "CLOSED" => Ok(Self::Closed),
            other => Err(PeriodError::Storage(format!("unknown period status: {other}"))),
        }
    }
}

/// A monthly financial period of one tenant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FinancialPeriod {
    /// Owning tenant.
    pub tenant_id: TenantId,
    /// Period code.
    pub code: PeriodCode,
    /// Current status.
    pub status: PeriodStatus,
    /// First day.
    pub start_date: NaiveDate,
    /// Last day.
    pub end_date: NaiveDate,
    /// Last close time.
    pub closed_at: Option<DateTime<Utc>>,
    /// Who closed it last.
    pub closed_by: Option<UserId>,
    /// Last reopen time.
    pub reopened_at: Option<DateTime<Utc>>,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last status change.
    pub updated_at: DateTime<Utc>,
}

impl FinancialPeriod {
    /// Creates an OPEN period.
    #[must_use]
    pub fn open(tenant_id: TenantId, code: PeriodCode, now: DateTime<Utc>) -> Self {
        Self {
            tenant_id,
            code,
            status: PeriodStatus::Open,
            start_date: code.start_date(),
            end_date: code.end_date(),
            closed_at: None,
            closed_by: None,
            reopened_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Returns true if postings are accepted.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.status == PeriodStatus::Open
    }

    /// Fails with `PeriodClosed` unless the period is open.
    ///
    /// # Errors
    ///
    /// Returns `PeriodClosed`.
    pub fn ensure_open(&self) -> Result<(), PeriodError> {
        if self.is_open() {
            Ok(())
        } else {
            Err(PeriodError::PeriodClosed(self.code))
        }
    }

    /// OPEN → CLOSED.
    ///
    /// # Errors
    ///
    /// Returns `PeriodAlreadyClosed`.
    pub fn close(
        &mut self,
        closed_by: Option<UserId>,
        now: DateTime<Utc>,
    ) -> Result<(), PeriodError> {
        if !self.is_open() {
            return Err(PeriodError::PeriodAlreadyClosed(self.code));
        }
        self.status = PeriodStatus::Closed;
        self.closed_at = Some(now);
        self.closed_by = closed_by;
        self.updated_at = now;
        Ok(())
    }

    /// CLOSED → OPEN.
    ///
    /// # Errors
    ///
    /// Returns `PeriodAlreadyOpen`.
    pub fn reopen(&mut self, now: DateTime<Utc>) -> Result<(), PeriodError> {
        if self.is_open() {
            return Err(PeriodError::PeriodAlreadyOpen(self.code));
        }
        self.status = PeriodStatus::Open;
        self.reopened_at = Some(now);
        self.updated_at = now;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("2025-01", 2025, 1)]
    #[case("1999-12", 1999, 12)]
    #[case(" 2026-07 ", 2026, 7)]
    fn test_parse_valid_codes(#[case] input: &str, #[case] year: i32, #[case] month: u32) {
        let code: PeriodCode = input.parse().unwrap();
        assert_eq!(code.year(), year);
        assert_eq!(code.month(), month);
    }

    #[rstest]
    #[case("2025-13")]
    #[case("2025-00")]
    #[case("2025-1")]
    #[case("25-01")]
    #[case("2025/01")]
    #[case("")]
    fn test_parse_invalid_codes(#[case] input: &str) {
        let err = input.parse::<PeriodCode>().unwrap_err();
        assert_eq!(err.error_code(), "INVALID_PERIOD_CODE");
    }

    #[test]
    fn test_date_range() {
        let feb: PeriodCode = "2024-02".parse().unwrap();
        assert_eq!(feb.start_date(), NaiveDate::from_ymd_opt(2024, 2, 1).unwrap());
        assert_eq!(feb.end_date(), NaiveDate::from_ymd_opt(2024, 2, 29).unwrap());

        let dec: PeriodCode = "2024-12".parse().unwrap();
        assert_eq!(dec.next().to_string(), "2025-01");
        assert_eq!(dec.end_date(), NaiveDate::from_ymd_opt(2024, 12, 31).unwrap());
        assert!(dec.contains(NaiveDate::from_ymd_opt(2024, 12, 15).unwrap()));
        assert!(!dec.contains(NaiveDate::from_ymd_opt(2025, 1, 1).unwrap()));
    }

    #[test]
    fn test_codes_order_chronologically() {
        let a: PeriodCode = "2024-12".parse().unwrap();
        let b: PeriodCode = "2025-01".parse().unwrap();
        assert!(a < b);
    }

    #[test]
    fn test_serde_as_string() {
        let code: PeriodCode = "2025-03".parse().unwrap();
        assert_eq!(serde_json::to_string(&code).unwrap(), "\"2025-03\"");
        assert!(serde_json::from_str::<PeriodCode>("\"2025-3\"").is_err());
    }

    #[test]
    fn test_close_and_reopen() {
        let code: PeriodCode = "2025-01".parse().unwrap();
        let mut period = FinancialPeriod::open(TenantId::new(), code, Utc::now());
        assert!(period.ensure_open().is_ok());

        let user = UserId::new();
        period.close(Some(user), Utc::now()).unwrap();
        assert_eq!(period.closed_by, Some(user));
        assert_eq!(period.ensure_open().unwrap_err().error_code(), "PERIOD_CLOSED");
        assert_eq!(
            period.close(None, Utc::now()).unwrap_err().error_code(),
            "PERIOD_ALREADY_CLOSED"
        );

        period.reopen(Utc::now()).unwrap();
        assert!(period.is_open());
        assert!(period.reopened_at.is_some());
        assert_eq!(
            period.reopen(Utc::now()).unwrap_err().error_code(),
            "PERIOD_ALREADY_OPEN"
        );
    }
}
