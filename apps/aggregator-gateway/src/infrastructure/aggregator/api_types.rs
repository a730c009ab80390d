//! Aggregation API request and response types.
//!
//! Wire structs for the external aggregation API, which speaks camelCase
//! JSON. Responses deserialize leniently: collections default to empty and
//! optional fields to `None`, since insurers routinely omit sections while
//! a quote run is still in flight. Conversions into the domain model live
//! here, at the edge.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::ServiceCredentials;
use crate::domain::{FieldValue, Plan, PlanAddOn, PlanFeature, Quote, QuoteErrorInfo};

// ============================================================================
// Authentication Types
// ============================================================================

/// Body for POST /api/v1/user/verify-password.
#[derive(Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct LoginRequest {
    pub(super) user_id: String,
    pub(super) password: String,
    pub(super) sales_channel_id: String,
}

impl LoginRequest {
    pub(super) fn from_credentials(credentials: &ServiceCredentials) -> Self {
        Self {
            user_id: credentials.user_id().to_string(),
            password: credentials.password().to_string(),
            sales_channel_id: credentials.sales_channel_id().to_string(),
        }
    }
}

impl std::fmt::Debug for LoginRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoginRequest")
            .field("user_id", &"[REDACTED]")
            .field("password", &"[REDACTED]")
            .field("sales_channel_id", &self.sales_channel_id)
            .finish()
    }
}

// ============================================================================
// Quote Types
// ============================================================================

/// One applicant field in a quote request or response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuoteField {
    /// Field name as defined by the aggregator's form schema.
    pub name: String,
    /// Submitted or echoed value.
    #[serde(default)]
    pub value: Value,
}

impl QuoteField {
    pub(super) fn from_field_values(fields: Vec<FieldValue>) -> Vec<Self> {
        fields
            .into_iter()
            .map(|field| Self {
                name: field.name,
                value: field.value,
            })
            .collect()
    }
}

/// Body for POST /api/v1/quotes.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct CreateQuoteRequest {
    pub(super) field_values: Vec<QuoteField>,
}

/// Quote snapshot from GET /api/v1/quotes/{id} and POST /api/v1/quotes.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuoteResponse {
    /// Quote identifier, stable across snapshots.
    pub quote_id: String,
    /// Applicant fields the quote was created with.
    #[serde(default)]
    pub field_values: Vec<QuoteField>,
    /// Plan offers received from insurers so far.
    #[serde(default)]
    pub plans: Vec<PlanEntry>,
    /// Error descriptor, present when the quote run failed.
    #[serde(default)]
    pub error: Option<QuoteErrorEntry>,
    /// Creation timestamp, RFC3339.
    #[serde(default)]
    pub created_at: Option<String>,
}

/// One insurer's offer in a quote response.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanEntry {
    /// Numeric plan identifier, unique within the quote.
    pub plan_id: u64,
    /// Insurer name.
    pub insurer_name: String,
    /// Marketing name of the plan.
    pub plan_name: String,
    /// Annual premium.
    pub premium: Decimal,
    /// Sum insured.
    pub cover_amount: Decimal,
    #[serde(default)]
    pub features: Vec<FeatureEntry>,
    #[serde(default)]
    pub add_ons: Vec<AddOnEntry>,
}

/// Coverage feature within a plan.
#[derive(Debug, Clone, Deserialize)]
pub struct FeatureEntry {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

/// Add-on rider within a plan.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddOnEntry {
    pub add_on_id: u64,
    pub name: String,
    pub premium: Decimal,
}

/// Upstream error descriptor on a failed quote run.
#[derive(Debug, Clone, Deserialize)]
pub struct QuoteErrorEntry {
    #[serde(default)]
    pub code: Option<String>,
    pub message: String,
}

impl Quote {
    /// Convert a wire snapshot into the domain model.
    ///
    /// Timestamps that fail to parse are dropped rather than failing the
    /// whole snapshot.
    pub(crate) fn from_response(response: QuoteResponse) -> Self {
        let created_at = response
            .created_at
            .as_deref()
            .and_then(|raw| DateTime::parse_from_rfc3339(raw).ok())
            .map(|parsed| parsed.with_timezone(&Utc));

        Self {
            id: response.quote_id,
            field_values: response
                .field_values
                .into_iter()
                .map(|field| FieldValue {
                    name: field.name,
                    value: field.value,
                })
                .collect(),
            plans: response.plans.into_iter().map(Plan::from_entry).collect(),
            error: response.error.map(|error| QuoteErrorInfo {
                code: error.code,
                message: error.message,
            }),
            created_at,
        }
    }
}

impl Plan {
    pub(super) fn from_entry(entry: PlanEntry) -> Self {
        Self {
            id: entry.plan_id,
            insurer: entry.insurer_name,
            name: entry.plan_name,
            premium: entry.premium,
            cover_amount: entry.cover_amount,
            features: entry
                .features
                .into_iter()
                .map(|feature| PlanFeature {
                    name: feature.name,
                    description: feature.description,
                })
                .collect(),
            add_ons: entry
                .add_ons
                .into_iter()
                .map(|add_on| PlanAddOn {
                    id: add_on.add_on_id,
                    name: add_on.name,
                    premium: add_on.premium,
                })
                .collect(),
        }
    }
}

// ============================================================================
// Identity Verification Types
// ============================================================================

/// Body for POST /api/v1/kyc/ckyc/verify.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CkycVerifyRequest {
    /// Quote the verification belongs to.
    pub quote_id: String,
    /// Identity document type ("PAN", "AADHAAR", ...).
    pub document_type: String,
    /// Document number.
    pub document_number: String,
    /// Date of birth, `YYYY-MM-DD`.
    pub date_of_birth: String,
    /// Full name as printed on the document.
    pub full_name: String,
}

/// Result of a central-KYC lookup.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CkycVerifyResponse {
    /// Whether the registry matched the applicant.
    pub verified: bool,
    /// CKYC number on a successful match.
    #[serde(default)]
    pub ckyc_number: Option<String>,
    /// Reference id for the KYC attempt, used in later proposal calls.
    #[serde(default)]
    pub kyc_reference_id: Option<String>,
    /// Reason the lookup failed, when it did.
    #[serde(default)]
    pub failure_reason: Option<String>,
}

// ============================================================================
// Document Upload Types
// ============================================================================

/// Body for POST /api/v1/kyc/documents/presigned-url.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PresignedUploadRequest {
    /// Quote the document belongs to.
    pub quote_id: String,
    /// Original file name.
    pub file_name: String,
    /// MIME type of the upload.
    pub content_type: String,
    /// Document category ("IDENTITY_PROOF", "ADDRESS_PROOF", ...).
    pub document_category: String,
}

/// Presigned upload descriptor returned by the aggregator.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PresignedUploadResponse {
    /// Object-storage URL the document must be PUT to.
    pub upload_url: String,
    /// Storage key referenced by later proposal calls.
    #[serde(default)]
    pub object_key: Option<String>,
    /// URL validity window.
    #[serde(default)]
    pub expires_in_seconds: Option<u64>,
}

// ============================================================================
// Proposal Types
// ============================================================================

/// One field of an insurer-specific proposal form.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProposalField {
    /// Field name, submitted back with the proposal.
    pub name: String,
    /// Display label.
    #[serde(default)]
    pub label: Option<String>,
    /// Field type ("text", "date", "select", ...).
    pub field_type: String,
    /// Whether the insurer requires the field.
    #[serde(default)]
    pub required: bool,
    /// Allowed values for select fields.
    #[serde(default)]
    pub options: Vec<String>,
    /// Pre-filled value, when the aggregator derives one.
    #[serde(default)]
    pub default_value: Option<Value>,
}

/// Response from GET /api/v1/proposals/fields.
#[derive(Debug, Clone, Deserialize)]
pub struct ProposalFieldsResponse {
    #[serde(default)]
    pub fields: Vec<ProposalField>,
}

/// Body for POST /api/v1/proposals.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateProposalRequest {
    /// Quote the proposal is drawn from.
    pub quote_id: String,
    /// Selected plan.
    pub plan_id: u64,
    /// Completed proposal-form fields.
    pub field_values: Vec<QuoteField>,
    /// KYC reference from a successful identity verification.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kyc_reference_id: Option<String>,
}

/// Created proposal descriptor.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProposalResponse {
    /// Proposal identifier, used for payment.
    pub proposal_id: String,
    /// Insurer-side proposal status string.
    pub status: String,
    /// Final premium after underwriting, when already known.
    #[serde(default)]
    pub premium: Option<Decimal>,
}

// ============================================================================
// OTP Types
// ============================================================================

/// Body for POST /api/v1/otp/send.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SendOtpRequest {
    /// Destination mobile number.
    pub phone_number: String,
    /// What the OTP authorizes ("PROPOSAL_CONSENT", ...).
    pub purpose: String,
}

/// Response from POST /api/v1/otp/send.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendOtpResponse {
    /// Transaction id to present with the verification call.
    pub transaction_id: String,
    /// OTP validity window.
    #[serde(default)]
    pub expires_in_seconds: Option<u64>,
}

/// Body for POST /api/v1/otp/verify.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyOtpRequest {
    /// Transaction id from the send call.
    pub transaction_id: String,
    /// Code the applicant received.
    pub otp_code: String,
}

/// Response from POST /api/v1/otp/verify.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyOtpResponse {
    /// Whether the code matched.
    pub verified: bool,
    #[serde(default)]
    pub failure_reason: Option<String>,
}

// ============================================================================
// Payment Types
// ============================================================================

/// Body for POST /api/v1/payments.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessPaymentRequest {
    /// Proposal being paid for.
    pub proposal_id: String,
    /// Payment mode ("UPI", "CARD", "NETBANKING", ...).
    pub payment_mode: String,
    /// Where the payment gateway should send the applicant afterwards.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub return_url: Option<String>,
}

/// Payment descriptor returned by the aggregator.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentResponse {
    /// Payment transaction identifier.
    pub payment_id: String,
    /// Raw payment status string from the aggregator.
    pub status: String,
    /// Gateway page to redirect the applicant to, for redirect flows.
    #[serde(default)]
    pub redirect_url: Option<String>,
}

/// Parsed payment status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymentStatus {
    /// Payment created, applicant not yet redirected.
    Initiated,
    /// Awaiting confirmation from the payment gateway.
    Pending,
    /// Payment captured.
    Success,
    /// Payment declined or abandoned.
    Failed,
}

impl PaymentResponse {
    /// Parse the vendor status string leniently.
    #[must_use]
    pub fn parsed_status(&self) -> PaymentStatus {
        parse_payment_status(&self.status)
    }
}

pub(super) fn parse_payment_status(status: &str) -> PaymentStatus {
    match status.to_ascii_uppercase().as_str() {
        "INITIATED" | "CREATED" => PaymentStatus::Initiated,
        "SUCCESS" | "CAPTURED" | "PAID" => PaymentStatus::Success,
        "FAILED" | "DECLINED" | "CANCELLED" => PaymentStatus::Failed,
        // "PENDING" and unknown statuses stay pending until confirmed
        _ => PaymentStatus::Pending,
    }
}
