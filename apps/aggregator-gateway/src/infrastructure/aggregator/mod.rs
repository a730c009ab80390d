//! Aggregation API Integration
//!
//! Everything that talks to the external insurance aggregation API:
//!
//! - **token**: shared bearer-token store with a refresh generation
//! - **client**: relay-level HTTP client (header contract, 401 protocol)
//! - **api_types**: camelCase wire structs and domain conversions
//! - **operations**: the typed operation surface

pub mod api_types;
pub mod client;
pub mod operations;
pub mod token;

pub use api_types::{
    AddOnEntry, CkycVerifyRequest, CkycVerifyResponse, CreateProposalRequest, FeatureEntry,
    PaymentResponse, PaymentStatus, PlanEntry, PresignedUploadRequest, PresignedUploadResponse,
    ProcessPaymentRequest, ProposalField, ProposalFieldsResponse, ProposalResponse, QuoteErrorEntry,
    QuoteField, QuoteResponse, SendOtpRequest, SendOtpResponse, VerifyOtpRequest, VerifyOtpResponse,
};
pub use client::{AggregatorHttpClient, RelayResponse};
pub use operations::AggregatorClient;
pub use token::{TokenSnapshot, TokenStore};
