//! Derived metrics over fetched grants and recipients
//!
//! Every function here is pure and total: records with a missing or
//! unparseable date or value are skipped one by one, never failing the
//! whole computation. Results are recomputed on each call.
//!
//! - `funding`: growth trend, agency specialization, yearly totals
//! - `recipients`: concentration, active share, rankings
//! - `duration`: average grant length, active period

pub mod duration;
pub mod funding;
pub mod recipients;

pub use duration::{active_period, avg_grant_duration, ActivePeriod, GrantDuration};
pub use funding::{
    agencies, agency_specialization, annual_averages, funding_growth, yearly_funding,
    AgencyShare, AgencySpecialization, AnnualAverages, FundingGrowth, GrowthStatus,
    Specialization, YearlyFunding,
};
pub use recipients::{
    active_recipients, recipient_concentration, recipient_funding, top_recipients,
    ActiveRecipients, ConcentrationRating, RecipientConcentration, RecipientRanking, RecipientShare,
};

use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime};
use grant_api_client::{Grant, Recipient};
use serde::Serialize;

/// Window used for the active-recipients figure
pub const DEFAULT_ACTIVE_WINDOW_YEARS: u32 = 2;

/// Direction of a funding trend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TrendDirection {
    Up,
    Down,
    Neutral,
}

/// All headline metrics for one result set
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalyticsSnapshot {
    pub growth: FundingGrowth,
    pub specialization: AgencySpecialization,
    pub concentration: RecipientConcentration,
    pub duration: GrantDuration,
    pub active_recipients: ActiveRecipients,
    pub total_funding: f64,
}

impl AnalyticsSnapshot {
    /// Compute every metric; `now` anchors the active-recipient window
    ///
    /// Concentration is measured within the recipient list itself, so the
    /// top three never exceed the total they are divided by.
    pub fn compute(grants: &[Grant], recipients: &[Recipient], now: NaiveDateTime) -> Self {
        let total_funding = grants.iter().filter_map(grant_value).sum();
        Self {
            growth: funding_growth(grants),
            specialization: agency_specialization(grants),
            concentration: recipient_concentration(recipients, recipient_funding(recipients)),
            duration: avg_grant_duration(grants),
            active_recipients: active_recipients(
                recipients,
                grants,
                DEFAULT_ACTIVE_WINDOW_YEARS,
                now,
            ),
            total_funding,
        }
    }
}

/// Parse an ISO-8601 date or timestamp
pub(crate) fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.naive_utc());
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(dt);
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f") {
        return Some(dt);
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
}

pub(crate) fn parse_year(raw: Option<&str>) -> Option<i32> {
    raw.and_then(parse_timestamp).map(|dt| dt.year())
}

pub(crate) fn grant_value(grant: &Grant) -> Option<f64> {
    grant.agreement_value.filter(|v| v.is_finite())
}

/// Percentage of `part` in `whole`
pub(crate) fn percent(part: f64, whole: f64) -> f64 {
    part * 100.0 / whole
}

/// `1234567` -> `"1,234,567"`
pub(crate) fn group_thousands(n: usize) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}
