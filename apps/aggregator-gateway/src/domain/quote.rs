//! Insurance Quote Types
//!
//! A quote is created once by the upstream aggregation system and filled in
//! incrementally as insurers respond; polling the same quote id returns
//! snapshots with a growing plan list. The quote id is stable across
//! snapshots, and merging is monotonic so plans already delivered to a
//! caller are not lost to a transient upstream omission.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

// =============================================================================
// Types
// =============================================================================

/// One applicant field and the value it was submitted with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldValue {
    /// Field name as defined by the aggregator.
    pub name: String,
    /// Submitted value.
    pub value: serde_json::Value,
}

/// A coverage feature described by the insurer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanFeature {
    /// Feature name.
    pub name: String,
    /// Feature description, when the insurer provides one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// An add-on rider priced separately from the base premium.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanAddOn {
    /// Add-on identifier.
    pub id: u64,
    /// Add-on name.
    pub name: String,
    /// Additional premium for the rider.
    pub premium: Decimal,
}

/// One insurer's priced offer within a quote.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Plan {
    /// Numeric plan identifier, unique within a quote.
    pub id: u64,
    /// Insurer name.
    pub insurer: String,
    /// Plan display name.
    pub name: String,
    /// Base premium amount.
    pub premium: Decimal,
    /// Sum insured.
    pub cover_amount: Decimal,
    /// Coverage features.
    #[serde(default)]
    pub features: Vec<PlanFeature>,
    /// Add-on riders.
    #[serde(default)]
    pub add_ons: Vec<PlanAddOn>,
}

/// Error descriptor attached to a quote by the upstream system.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuoteErrorInfo {
    /// Upstream error code, when provided.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    /// Human-readable message.
    pub message: String,
}

/// A server-side resource aggregating plan offers from multiple insurers
/// for one applicant submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quote {
    /// Quote identifier. Stable across snapshots of the same quote.
    pub id: String,
    /// Applicant field values the quote was requested with.
    #[serde(default)]
    pub field_values: Vec<FieldValue>,
    /// Plan offers received so far.
    #[serde(default)]
    pub plans: Vec<Plan>,
    /// Upstream error descriptor, when the quote run failed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<QuoteErrorInfo>,
    /// Creation timestamp reported by the upstream system.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

impl Quote {
    /// Merge a newer snapshot of the same quote into this one.
    ///
    /// Plans are unioned by id: entries present in both take the newer
    /// version in place, new entries append in arrival order, and entries
    /// missing from the newer snapshot are kept. A snapshot carrying an
    /// error descriptor supersedes the accumulated plan list wholesale.
    /// Scalar fields always come from the newer snapshot.
    #[must_use]
    pub fn merged_with(&self, newer: Self) -> Self {
        if newer.error.is_some() {
            return newer;
        }

        let mut plans = self.plans.clone();
        for plan in newer.plans {
            match plans.iter_mut().find(|existing| existing.id == plan.id) {
                Some(existing) => *existing = plan,
                None => plans.push(plan),
            }
        }

        Self { plans, ..newer }
    }

    /// Whether any insurer has responded with a plan yet.
    #[must_use]
    pub fn has_plans(&self) -> bool {
        !self.plans.is_empty()
    }
}
