//! Funding trends and agency mix

use super::{grant_value, parse_year, percent, TrendDirection};
use grant_api_client::Grant;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// How a growth figure was obtained
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GrowthStatus {
    Calculated,
    /// Fewer than two distinct years with funding
    InsufficientData,
    /// The earliest year's grants net to zero
    ZeroBase,
}

/// Change in funding between the first and last year on record
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FundingGrowth {
    pub status: GrowthStatus,
    pub text: String,
    pub percent_change: f64,
    pub first_year_value: f64,
    pub last_year_value: f64,
    /// Number of distinct years with funding
    pub years_span: usize,
    pub trend: TrendDirection,
}

impl FundingGrowth {
    fn insufficient() -> Self {
        Self {
            status: GrowthStatus::InsufficientData,
            text: "Insufficient data".to_string(),
            percent_change: 0.0,
            first_year_value: 0.0,
            last_year_value: 0.0,
            years_span: 0,
            trend: TrendDirection::Neutral,
        }
    }
}

/// Funding totals per start year
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct YearlyFunding {
    pub by_year: BTreeMap<i32, f64>,
    pub by_year_and_agency: BTreeMap<i32, BTreeMap<String, f64>>,
}

/// Sum grant values by start year, and by year and agency
///
/// Zero-valued grants are skipped and do not mark their year as present.
pub fn yearly_funding(grants: &[Grant]) -> YearlyFunding {
    let mut yearly = YearlyFunding::default();
    for grant in grants {
        let (Some(year), Some(value)) = (
            parse_year(grant.agreement_start_date.as_deref()),
            grant_value(grant),
        ) else {
            continue;
        };
        if value == 0.0 {
            continue;
        }
        *yearly.by_year.entry(year).or_default() += value;
        if let Some(agency) = agency_of(grant) {
            *yearly
                .by_year_and_agency
                .entry(year)
                .or_default()
                .entry(agency.to_string())
                .or_default() += value;
        }
    }
    yearly
}

pub fn funding_growth(grants: &[Grant]) -> FundingGrowth {
    let by_year = yearly_funding(grants).by_year;
    let years_span = by_year.len();

    let (Some((_, &first)), Some((_, &last))) = (by_year.first_key_value(), by_year.last_key_value())
    else {
        return FundingGrowth::insufficient();
    };
    if years_span < 2 {
        return FundingGrowth::insufficient();
    }
    if first == 0.0 {
        return FundingGrowth {
            status: GrowthStatus::ZeroBase,
            text: "Cannot calculate (zero base value)".to_string(),
            percent_change: 0.0,
            first_year_value: 0.0,
            last_year_value: last,
            years_span,
            trend: TrendDirection::Neutral,
        };
    }

    let percent_change = percent(last - first, first);
    let trend = if percent_change > 0.0 {
        TrendDirection::Up
    } else if percent_change < 0.0 {
        TrendDirection::Down
    } else {
        TrendDirection::Neutral
    };
    let sign = if percent_change > 0.0 { "+" } else { "" };

    FundingGrowth {
        status: GrowthStatus::Calculated,
        text: format!("{}{:.1}% over {} years", sign, percent_change, years_span),
        percent_change,
        first_year_value: first,
        last_year_value: last,
        years_span,
        trend,
    }
}

/// Share of funding held by the largest agency
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Specialization {
    HighlySpecialized,
    Specialized,
    Diversified,
    Unknown,
}

impl Specialization {
    fn from_share(top_percentage: f64) -> Self {
        if top_percentage > 80.0 {
            Self::HighlySpecialized
        } else if top_percentage > 50.0 {
            Self::Specialized
        } else {
            Self::Diversified
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::HighlySpecialized => "Highly Specialized",
            Self::Specialized => "Specialized",
            Self::Diversified => "Diversified",
            Self::Unknown => "Unknown",
        }
    }
}

impl fmt::Display for Specialization {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AgencyShare {
    pub agency: String,
    pub funding: f64,
    pub percentage: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AgencySpecialization {
    pub text: String,
    pub top_agency: Option<String>,
    pub top_percentage: f64,
    pub specialization: Specialization,
    /// Every agency, largest funding first
    pub agencies: Vec<AgencyShare>,
}

impl AgencySpecialization {
    fn unknown(text: &str) -> Self {
        Self {
            text: text.to_string(),
            top_agency: None,
            top_percentage: 0.0,
            specialization: Specialization::Unknown,
            agencies: Vec::new(),
        }
    }
}

/// Which agency dominates funding, and by how much
///
/// Grants without an agency or with a zero value carry no share.
pub fn agency_specialization(grants: &[Grant]) -> AgencySpecialization {
    if grants.is_empty() {
        return AgencySpecialization::unknown("No grants data");
    }

    let mut by_agency: BTreeMap<&str, f64> = BTreeMap::new();
    for grant in grants {
        let (Some(agency), Some(value)) = (agency_of(grant), grant_value(grant)) else {
            continue;
        };
        if value == 0.0 {
            continue;
        }
        *by_agency.entry(agency).or_default() += value;
    }

    let total: f64 = by_agency.values().sum();
    if by_agency.is_empty() || total == 0.0 {
        return AgencySpecialization::unknown("No agency data");
    }

    let mut shares: Vec<AgencyShare> = by_agency
        .into_iter()
        .map(|(agency, funding)| AgencyShare {
            agency: agency.to_string(),
            funding,
            percentage: percent(funding, total),
        })
        .collect();
    // BTreeMap order breaks ties by name
    shares.sort_by(|a, b| b.funding.total_cmp(&a.funding));

    let top = &shares[0];
    let specialization = Specialization::from_share(top.percentage);
    AgencySpecialization {
        text: format!("{}: {} ({:.1}%)", specialization, top.agency, top.percentage),
        top_agency: Some(top.agency.clone()),
        top_percentage: top.percentage,
        specialization,
        agencies: shares,
    }
}

/// Distinct agencies, alphabetical
pub fn agencies(grants: &[Grant]) -> Vec<String> {
    grants
        .iter()
        .filter_map(agency_of)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .map(str::to_string)
        .collect()
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct AnnualAverages {
    pub annual_funding: f64,
    pub annual_grant_count: f64,
    pub years_active: usize,
}

/// Funding and grant count per active year
pub fn annual_averages(grants: &[Grant]) -> AnnualAverages {
    let by_year = yearly_funding(grants).by_year;
    if by_year.is_empty() {
        return AnnualAverages::default();
    }
    let years = by_year.len() as f64;
    AnnualAverages {
        annual_funding: by_year.values().sum::<f64>() / years,
        annual_grant_count: grants.len() as f64 / years,
        years_active: by_year.len(),
    }
}

fn agency_of(grant: &Grant) -> Option<&str> {
    grant
        .org
        .as_deref()
        .map(str::trim)
        .filter(|org| !org.is_empty())
}
