//! Facet selection for grant search
//!
//! `FilterState` is an immutable value: every `with_*` call returns a new
//! state. Ranges that cover the whole domain (see [`FilterLimits`]) are
//! "unset" and never reach the wire as a restrictive filter.

use crate::error::{Result, SdkError};
use chrono::{Datelike, NaiveDate, Utc};
use grant_api_client::{DateRangeWire, SearchFilters, ValueRangeWire, YearRangeWire};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Lowest year a grant can start in
pub const MIN_YEAR: i32 = 1900;
/// Upper bound of the agreement value slider
pub const MAX_VALUE: f64 = 200_000_000.0;

/// Domain-wide bounds for the range facets
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FilterLimits {
    pub year_min: i32,
    pub year_max: i32,
    pub value_min: f64,
    pub value_max: f64,
    pub date_min: NaiveDate,
    pub date_max: NaiveDate,
}

impl Default for FilterLimits {
    fn default() -> Self {
        Self::for_today(Utc::now().date_naive())
    }
}

impl FilterLimits {
    /// Limits anchored at the given day (years and dates end there)
    pub fn for_today(today: NaiveDate) -> Self {
        Self {
            year_min: MIN_YEAR,
            year_max: today.year(),
            value_min: 0.0,
            value_max: MAX_VALUE,
            date_min: NaiveDate::from_ymd_opt(1990, 1, 1).unwrap_or(NaiveDate::MIN),
            date_max: today,
        }
    }
}

/// Inclusive start/end years
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct YearRange {
    pub start: i32,
    pub end: i32,
}

impl YearRange {
    /// Restrictive iff it excludes part of the domain
    pub fn is_active(&self, limits: &FilterLimits) -> bool {
        self.start > limits.year_min || self.end < limits.year_max
    }
}

/// Inclusive agreement value bounds
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ValueRange {
    pub min: f64,
    pub max: f64,
}

impl ValueRange {
    pub fn is_active(&self, limits: &FilterLimits) -> bool {
        self.min > limits.value_min || self.max < limits.value_max
    }
}

/// Inclusive agreement date bounds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub from: NaiveDate,
    pub to: NaiveDate,
}

impl DateRange {
    pub fn is_active(&self, limits: &FilterLimits) -> bool {
        self.from > limits.date_min || self.to < limits.date_max
    }
}

/// Multi-select facets
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Facet {
    Agency,
    Country,
    Province,
    City,
}

impl Facet {
    pub const ALL: [Facet; 4] = [Facet::Agency, Facet::Country, Facet::Province, Facet::City];

    pub fn label(&self) -> &'static str {
        match self {
            Facet::Agency => "Agency",
            Facet::Country => "Country",
            Facet::Province => "Province",
            Facet::City => "City",
        }
    }
}

/// Current facet selection
///
/// Sets are ordered so two states built in different insertion orders
/// compare and serialize identically.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FilterState {
    year_range: Option<YearRange>,
    value_range: Option<ValueRange>,
    date_range: Option<DateRange>,
    agencies: BTreeSet<String>,
    countries: BTreeSet<String>,
    provinces: BTreeSet<String>,
    cities: BTreeSet<String>,
}

impl FilterState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_year_range(mut self, start: i32, end: i32) -> Self {
        self.year_range = Some(YearRange { start, end });
        self
    }

    pub fn with_value_range(mut self, min: f64, max: f64) -> Self {
        self.value_range = Some(ValueRange { min, max });
        self
    }

    pub fn with_date_range(mut self, from: NaiveDate, to: NaiveDate) -> Self {
        self.date_range = Some(DateRange { from, to });
        self
    }

    pub fn without_year_range(mut self) -> Self {
        self.year_range = None;
        self
    }

    pub fn without_value_range(mut self) -> Self {
        self.value_range = None;
        self
    }

    pub fn without_date_range(mut self) -> Self {
        self.date_range = None;
        self
    }

    /// Add one value to a multi-select facet; blank values are ignored
    pub fn with_value(mut self, facet: Facet, value: impl AsRef<str>) -> Self {
        let value = value.as_ref().trim();
        if !value.is_empty() {
            self.set_mut(facet).insert(value.to_string());
        }
        self
    }

    pub fn with_values<I, S>(self, facet: Facet, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        values
            .into_iter()
            .fold(self, |state, value| state.with_value(facet, value))
    }

    pub fn without_value(mut self, facet: Facet, value: &str) -> Self {
        self.set_mut(facet).remove(value.trim());
        self
    }

    pub fn with_agency(self, agency: impl AsRef<str>) -> Self {
        self.with_value(Facet::Agency, agency)
    }

    pub fn with_country(self, country: impl AsRef<str>) -> Self {
        self.with_value(Facet::Country, country)
    }

    pub fn with_province(self, province: impl AsRef<str>) -> Self {
        self.with_value(Facet::Province, province)
    }

    pub fn with_city(self, city: impl AsRef<str>) -> Self {
        self.with_value(Facet::City, city)
    }

    pub fn year_range(&self) -> Option<YearRange> {
        self.year_range
    }

    pub fn value_range(&self) -> Option<ValueRange> {
        self.value_range
    }

    pub fn date_range(&self) -> Option<DateRange> {
        self.date_range
    }

    pub fn values(&self, facet: Facet) -> &BTreeSet<String> {
        match facet {
            Facet::Agency => &self.agencies,
            Facet::Country => &self.countries,
            Facet::Province => &self.provinces,
            Facet::City => &self.cities,
        }
    }

    fn set_mut(&mut self, facet: Facet) -> &mut BTreeSet<String> {
        match facet {
            Facet::Agency => &mut self.agencies,
            Facet::Country => &mut self.countries,
            Facet::Province => &mut self.provinces,
            Facet::City => &mut self.cities,
        }
    }

    /// Reject inverted, non-numeric or unbounded ranges
    pub fn validate(&self) -> Result<()> {
        if let Some(years) = self.year_range {
            if years.start > years.end {
                return Err(SdkError::Validation(format!(
                    "year range start {} is after end {}",
                    years.start, years.end
                )));
            }
        }
        if let Some(values) = self.value_range {
            if !values.min.is_finite() || !values.max.is_finite() {
                return Err(SdkError::Validation(format!(
                    "value range bounds must be finite, got {} to {}",
                    values.min, values.max
                )));
            }
            if values.min > values.max {
                return Err(SdkError::Validation(format!(
                    "value range min {} is above max {}",
                    values.min, values.max
                )));
            }
        }
        if let Some(dates) = self.date_range {
            if dates.from > dates.to {
                return Err(SdkError::Validation(format!(
                    "date range from {} is after to {}",
                    dates.from, dates.to
                )));
            }
        }
        Ok(())
    }

    /// Same selection with full-domain ranges dropped
    pub fn normalized(&self, limits: &FilterLimits) -> Self {
        Self {
            year_range: self.year_range.filter(|r| r.is_active(limits)),
            value_range: self.value_range.filter(|r| r.is_active(limits)),
            date_range: self.date_range.filter(|r| r.is_active(limits)),
            ..self.clone()
        }
    }

    pub fn is_year_range_active(&self, limits: &FilterLimits) -> bool {
        self.year_range.is_some_and(|r| r.is_active(limits))
    }

    pub fn is_value_range_active(&self, limits: &FilterLimits) -> bool {
        self.value_range.is_some_and(|r| r.is_active(limits))
    }

    pub fn is_date_range_active(&self, limits: &FilterLimits) -> bool {
        self.date_range.is_some_and(|r| r.is_active(limits))
    }

    /// One entry per restrictive facet, in display order
    pub fn active_filters(&self, limits: &FilterLimits) -> Vec<ActiveFilter> {
        let mut active = Vec::new();
        if let Some(years) = self.year_range.filter(|r| r.is_active(limits)) {
            active.push(ActiveFilter::Years(years));
        }
        if let Some(values) = self.value_range.filter(|r| r.is_active(limits)) {
            active.push(ActiveFilter::Value(values));
        }
        if let Some(dates) = self.date_range.filter(|r| r.is_active(limits)) {
            active.push(ActiveFilter::Dates(dates));
        }
        for facet in Facet::ALL {
            for value in self.values(facet) {
                active.push(ActiveFilter::Selected {
                    facet,
                    value: value.clone(),
                });
            }
        }
        active
    }

    pub fn is_empty(&self, limits: &FilterLimits) -> bool {
        self.active_filters(limits).is_empty()
    }

    /// Wire form carrying only restrictive facets
    pub fn to_wire(&self, limits: &FilterLimits) -> SearchFilters {
        let collect = |facet| self.values(facet).iter().cloned().collect();
        SearchFilters {
            year_range: self
                .year_range
                .filter(|r| r.is_active(limits))
                .map(|r| YearRangeWire {
                    start: r.start,
                    end: r.end,
                }),
            value_range: self
                .value_range
                .filter(|r| r.is_active(limits))
                .map(|r| ValueRangeWire {
                    min: r.min,
                    max: r.max,
                }),
            date_range: self
                .date_range
                .filter(|r| r.is_active(limits))
                .map(|r| DateRangeWire {
                    from: r.from.format("%Y-%m-%d").to_string(),
                    to: r.to.format("%Y-%m-%d").to_string(),
                }),
            agencies: collect(Facet::Agency),
            countries: collect(Facet::Country),
            provinces: collect(Facet::Province),
            cities: collect(Facet::City),
        }
    }
}

/// A single restrictive facet, for filter chips and summaries
#[derive(Debug, Clone, PartialEq)]
pub enum ActiveFilter {
    Years(YearRange),
    Value(ValueRange),
    Dates(DateRange),
    Selected { facet: Facet, value: String },
}

impl fmt::Display for ActiveFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActiveFilter::Years(r) => write!(f, "Years: {} - {}", r.start, r.end),
            ActiveFilter::Value(r) => write!(f, "Value: ${:.0} - ${:.0}", r.min, r.max),
            ActiveFilter::Dates(r) => write!(f, "Dates: {} - {}", r.from, r.to),
            ActiveFilter::Selected { facet, value } => write!(f, "{}: {}", facet.label(), value),
        }
    }
}
