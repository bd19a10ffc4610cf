//! Recipient-level metrics

use super::{group_thousands, parse_timestamp, percent};
use chrono::{Months, NaiveDateTime};
use grant_api_client::{Grant, Recipient};
use serde::Serialize;
use std::collections::HashSet;
use std::fmt;

/// Number of recipients counted in the concentration figure
const CONCENTRATION_TOP_N: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ConcentrationRating {
    HighlyConcentrated,
    ModeratelyConcentrated,
    Diverse,
    Unknown,
}

impl ConcentrationRating {
    fn from_share(concentration: f64) -> Self {
        if concentration > 80.0 {
            Self::HighlyConcentrated
        } else if concentration > 50.0 {
            Self::ModeratelyConcentrated
        } else {
            Self::Diverse
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::HighlyConcentrated => "Highly Concentrated",
            Self::ModeratelyConcentrated => "Moderately Concentrated",
            Self::Diverse => "Diverse",
            Self::Unknown => "Unknown",
        }
    }
}

impl fmt::Display for ConcentrationRating {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecipientShare {
    pub id: i64,
    pub name: Option<String>,
    pub funding: f64,
    pub percentage: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecipientConcentration {
    /// Percentage of `total_funding` held by the top three recipients
    pub concentration: f64,
    pub rating: ConcentrationRating,
    pub top_recipients: Vec<RecipientShare>,
}

/// How much of the funding goes to the three largest recipients
pub fn recipient_concentration(recipients: &[Recipient], total_funding: f64) -> RecipientConcentration {
    if recipients.is_empty() || !total_funding.is_finite() || total_funding <= 0.0 {
        return RecipientConcentration {
            concentration: 0.0,
            rating: ConcentrationRating::Unknown,
            top_recipients: Vec::new(),
        };
    }

    let top: Vec<RecipientShare> = ranked(recipients)
        .into_iter()
        .take(CONCENTRATION_TOP_N)
        .map(|(recipient, funding)| RecipientShare {
            id: recipient.recipient_id,
            name: recipient.legal_name.clone(),
            funding,
            percentage: percent(funding, total_funding),
        })
        .collect();
    let concentration = percent(top.iter().map(|r| r.funding).sum(), total_funding);

    RecipientConcentration {
        concentration,
        rating: ConcentrationRating::from_share(concentration),
        top_recipients: top,
    }
}

/// Summed funding of the recipients themselves; missing, non-finite and
/// negative amounts count as zero
pub fn recipient_funding(recipients: &[Recipient]) -> f64 {
    recipients
        .iter()
        .filter_map(|r| r.total_funding)
        .filter(|f| f.is_finite() && *f > 0.0)
        .sum()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecipientRanking {
    pub id: i64,
    pub name: Option<String>,
    pub funding: f64,
    pub grant_count: u64,
}

/// The `limit` best-funded recipients
pub fn top_recipients(recipients: &[Recipient], limit: usize) -> Vec<RecipientRanking> {
    ranked(recipients)
        .into_iter()
        .take(limit)
        .map(|(recipient, funding)| RecipientRanking {
            id: recipient.recipient_id,
            name: recipient.legal_name.clone(),
            funding,
            grant_count: recipient.grant_count.unwrap_or(0),
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActiveRecipients {
    pub active: usize,
    pub total: usize,
    pub percentage: f64,
    pub text: String,
}

/// Recipients with at least one grant starting within the last
/// `window_years` before `now`
pub fn active_recipients(
    recipients: &[Recipient],
    grants: &[Grant],
    window_years: u32,
    now: NaiveDateTime,
) -> ActiveRecipients {
    if recipients.is_empty() {
        return ActiveRecipients {
            active: 0,
            total: 0,
            percentage: 0.0,
            text: "N/A".to_string(),
        };
    }

    let cutoff = now
        .checked_sub_months(Months::new(window_years.saturating_mul(12)))
        .unwrap_or(NaiveDateTime::MIN);
    let recent: HashSet<i64> = grants
        .iter()
        .filter(|grant| {
            grant
                .agreement_start_date
                .as_deref()
                .and_then(parse_timestamp)
                .is_some_and(|start| start >= cutoff)
        })
        .filter_map(|grant| grant.recipient_id)
        .collect();

    let active = recipients
        .iter()
        .filter(|recipient| recent.contains(&recipient.recipient_id))
        .count();
    let total = recipients.len();
    let percentage = percent(active as f64, total as f64);

    ActiveRecipients {
        active,
        total,
        percentage,
        text: format!(
            "{} / {} ({:.1}%)",
            group_thousands(active),
            group_thousands(total),
            percentage
        ),
    }
}

/// Recipients by funding, largest first; missing funding counts as zero
fn ranked(recipients: &[Recipient]) -> Vec<(&Recipient, f64)> {
    let mut ranked: Vec<(&Recipient, f64)> = recipients
        .iter()
        .map(|r| (r, r.total_funding.filter(|f| f.is_finite()).unwrap_or(0.0)))
        .collect();
    ranked.sort_by(|a, b| b.1.total_cmp(&a.1));
    ranked
}
