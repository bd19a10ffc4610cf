//! Grant length and activity span

use super::{parse_timestamp, parse_year};
use grant_api_client::Grant;
use serde::Serialize;

/// A month is counted as 30 days
const DAYS_PER_MONTH: f64 = 30.0;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GrantDuration {
    pub months: u32,
    pub text: String,
}

impl GrantDuration {
    fn not_available() -> Self {
        Self {
            months: 0,
            text: "N/A".to_string(),
        }
    }

    fn from_months(months: u32) -> Self {
        let text = if months < 12 {
            format!("{} months", months)
        } else {
            let years = months / 12;
            let remaining = months % 12;
            let years_text = format!("{} {}", years, if years == 1 { "year" } else { "years" });
            if remaining == 0 {
                years_text
            } else {
                format!(
                    "{}, {} {}",
                    years_text,
                    remaining,
                    if remaining == 1 { "month" } else { "months" }
                )
            }
        };
        Self { months, text }
    }
}

/// Average agreement length, in whole months
///
/// Each grant's length is rounded to months first; grants without both
/// dates or with a non-positive length are left out.
pub fn avg_grant_duration(grants: &[Grant]) -> GrantDuration {
    let durations: Vec<f64> = grants
        .iter()
        .filter_map(|grant| {
            let start = parse_timestamp(grant.agreement_start_date.as_deref()?)?;
            let end = parse_timestamp(grant.agreement_end_date.as_deref()?)?;
            let days = (end - start).num_seconds() as f64 / 86_400.0;
            let months = (days / DAYS_PER_MONTH).round();
            (months > 0.0).then_some(months)
        })
        .collect();

    if durations.is_empty() {
        return GrantDuration::not_available();
    }
    let average = durations.iter().sum::<f64>() / durations.len() as f64;
    GrantDuration::from_months(average.round() as u32)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActivePeriod {
    pub text: String,
    /// Calendar years covered, both ends included
    pub years: i32,
}

/// `"2015 - 2020"` from the first and last activity dates
pub fn active_period(first: Option<&str>, last: Option<&str>) -> ActivePeriod {
    match (parse_year(first), parse_year(last)) {
        (Some(first_year), Some(last_year)) => ActivePeriod {
            text: format!("{} - {}", first_year, last_year),
            years: last_year - first_year + 1,
        },
        _ => ActivePeriod {
            text: "N/A".to_string(),
            years: 0,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grant(start: Option<&str>, end: Option<&str>) -> Grant {
        Grant {
            agreement_start_date: start.map(str::to_string),
            agreement_end_date: end.map(str::to_string),
            ..Default::default()
        }
    }

    #[test]
    fn test_duration_under_a_year() {
        // 90 days and 180 days -> 3 and 6 months
        let result = avg_grant_duration(&[
            grant(Some("2020-01-01"), Some("2020-03-31")),
            grant(Some("2020-01-01"), Some("2020-06-29")),
        ]);
        assert_eq!(result.months, 5);
        assert_eq!(result.text, "5 months");
    }

    #[test]
    fn test_duration_years_and_months() {
        // 1110 days -> 37 months
        let result = avg_grant_duration(&[grant(Some("2020-01-01"), Some("2023-01-15"))]);
        assert_eq!(result.months, 37);
        assert_eq!(result.text, "3 years, 1 month");

        // 360 days -> 12 months
        let result = avg_grant_duration(&[grant(Some("2021-01-01"), Some("2021-12-27"))]);
        assert_eq!(result.text, "1 year");
    }

    #[test]
    fn test_duration_skips_bad_records() {
        let result = avg_grant_duration(&[
            grant(None, Some("2020-01-01")),
            grant(Some("2021-01-01"), Some("2020-01-01")),
            grant(Some("bogus"), Some("2020-01-01")),
        ]);
        assert_eq!(result, GrantDuration::not_available());
    }

    #[test]
    fn test_active_period() {
        let period = active_period(Some("2015-04-01"), Some("2020-03-31"));
        assert_eq!(period.text, "2015 - 2020");
        assert_eq!(period.years, 6);

        assert_eq!(active_period(None, Some("2020-01-01")).text, "N/A");
        assert_eq!(active_period(Some("x"), Some("2020-01-01")).years, 0);
    }
}
