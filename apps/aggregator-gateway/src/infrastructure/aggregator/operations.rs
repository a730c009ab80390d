//! Typed operations against the aggregation API.
//!
//! Each method wraps the authenticating client's `request`, so every call
//! inherits the token attach / 401 refresh / bounded replay protocol.
//! Requests serialize to the vendor's camelCase wire format; responses
//! deserialize through the lenient structs in `api_types` and convert to
//! the domain model at this edge.

use async_trait::async_trait;
use reqwest::Method;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::application::ports::QuoteSource;
use crate::domain::{FieldValue, Quote};
use crate::error::GatewayError;

use super::api_types::{
    CkycVerifyRequest, CkycVerifyResponse, CreateProposalRequest, CreateQuoteRequest,
    PaymentResponse, PresignedUploadRequest, PresignedUploadResponse, ProcessPaymentRequest,
    ProposalField, ProposalFieldsResponse, ProposalResponse, QuoteField, QuoteResponse,
    SendOtpRequest, SendOtpResponse, VerifyOtpRequest, VerifyOtpResponse,
};
use super::client::AggregatorHttpClient;

const QUOTES_ENDPOINT: &str = "/api/v1/quotes";
const CKYC_VERIFY_ENDPOINT: &str = "/api/v1/kyc/ckyc/verify";
const PRESIGNED_URL_ENDPOINT: &str = "/api/v1/kyc/documents/presigned-url";
const PROPOSAL_FIELDS_ENDPOINT: &str = "/api/v1/proposals/fields";
const OTP_SEND_ENDPOINT: &str = "/api/v1/otp/send";
const OTP_VERIFY_ENDPOINT: &str = "/api/v1/otp/verify";
const PROPOSALS_ENDPOINT: &str = "/api/v1/proposals";
const PAYMENTS_ENDPOINT: &str = "/api/v1/payments";

/// Typed client for the aggregation API's operation surface.
#[derive(Debug, Clone)]
pub struct AggregatorClient {
    http: AggregatorHttpClient,
}

impl AggregatorClient {
    /// Wrap an authenticating HTTP client.
    #[must_use]
    pub const fn new(http: AggregatorHttpClient) -> Self {
        Self { http }
    }

    /// The underlying relay-level client.
    #[must_use]
    pub const fn http(&self) -> &AggregatorHttpClient {
        &self.http
    }

    /// Issue a typed call and deserialize the successful body.
    async fn call<T, B>(
        &self,
        endpoint: &str,
        method: Method,
        body: Option<&B>,
    ) -> Result<T, GatewayError>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let response = self.http.request(endpoint, method, body).await?;
        serde_json::from_value(response.body).map_err(|e| {
            GatewayError::Transport(format!("malformed response from {endpoint}: {e}"))
        })
    }

    /// Log in with the configured service credentials and return the
    /// issued bearer token.
    ///
    /// # Errors
    ///
    /// Returns `Authentication` when the aggregator rejects the
    /// credentials.
    pub async fn authenticate(&self) -> Result<String, GatewayError> {
        self.http.authenticate().await
    }

    /// Create a quote from applicant field values.
    ///
    /// The response carries only the insurers that replied synchronously;
    /// the rest arrive across subsequent `quote_by_id` snapshots.
    ///
    /// # Errors
    ///
    /// Returns `Upstream` with the aggregator's body when the submission
    /// is rejected.
    pub async fn create_quote(&self, fields: Vec<FieldValue>) -> Result<Quote, GatewayError> {
        let request = CreateQuoteRequest {
            field_values: QuoteField::from_field_values(fields),
        };
        let response: QuoteResponse = self
            .call(QUOTES_ENDPOINT, Method::POST, Some(&request))
            .await?;
        let quote = Quote::from_response(response);
        tracing::info!(
            quote_id = %quote.id,
            plans = quote.plans.len(),
            "Quote created"
        );
        Ok(quote)
    }

    /// Fetch the current snapshot of a quote.
    ///
    /// # Errors
    ///
    /// Returns `Upstream` when the quote does not exist or the fetch is
    /// rejected.
    pub async fn quote_by_id(&self, quote_id: &str) -> Result<Quote, GatewayError> {
        let endpoint = format!("{QUOTES_ENDPOINT}/{quote_id}");
        let response: QuoteResponse = self.call(&endpoint, Method::GET, None::<&Value>).await?;
        let quote = Quote::from_response(response);
        tracing::debug!(
            quote_id = %quote.id,
            plans = quote.plans.len(),
            "Quote snapshot fetched"
        );
        Ok(quote)
    }

    /// Verify an applicant's identity against the central KYC registry.
    ///
    /// # Errors
    ///
    /// Returns `Upstream` when the registry call is rejected. A
    /// non-matching applicant is a successful response with
    /// `verified: false`.
    pub async fn verify_identity(
        &self,
        request: CkycVerifyRequest,
    ) -> Result<CkycVerifyResponse, GatewayError> {
        let response: CkycVerifyResponse = self
            .call(CKYC_VERIFY_ENDPOINT, Method::POST, Some(&request))
            .await?;
        tracing::info!(
            quote_id = %request.quote_id,
            document_type = %request.document_type,
            verified = response.verified,
            "Identity verification completed"
        );
        Ok(response)
    }

    /// Request a presigned URL for a KYC document upload.
    ///
    /// # Errors
    ///
    /// Returns `Upstream` when the aggregator declines to issue one.
    pub async fn presigned_upload_url(
        &self,
        request: PresignedUploadRequest,
    ) -> Result<PresignedUploadResponse, GatewayError> {
        let response: PresignedUploadResponse = self
            .call(PRESIGNED_URL_ENDPOINT, Method::POST, Some(&request))
            .await?;
        tracing::debug!(
            quote_id = %request.quote_id,
            document_category = %request.document_category,
            "Presigned upload URL issued"
        );
        Ok(response)
    }

    /// Upload a KYC document to a presigned URL.
    ///
    /// Goes directly to object storage, bypassing the relay header
    /// contract.
    ///
    /// # Errors
    ///
    /// Returns `Upstream` when the storage service rejects the upload.
    pub async fn upload_kyc_document(
        &self,
        upload_url: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<(), GatewayError> {
        let size = bytes.len();
        self.http.upload(upload_url, bytes, content_type).await?;
        tracing::info!(size_bytes = size, "KYC document uploaded");
        Ok(())
    }

    /// Fetch the insurer-specific proposal form schema for a plan.
    ///
    /// # Errors
    ///
    /// Returns `Upstream` when the plan is unknown to the aggregator.
    pub async fn proposal_fields(
        &self,
        quote_id: &str,
        plan_id: u64,
    ) -> Result<Vec<ProposalField>, GatewayError> {
        let endpoint = format!("{PROPOSAL_FIELDS_ENDPOINT}?quoteId={quote_id}&planId={plan_id}");
        let response: ProposalFieldsResponse =
            self.call(&endpoint, Method::GET, None::<&Value>).await?;
        tracing::debug!(
            quote_id = %quote_id,
            plan_id = plan_id,
            fields = response.fields.len(),
            "Proposal form schema fetched"
        );
        Ok(response.fields)
    }

    /// Send a consent OTP to the applicant.
    ///
    /// # Errors
    ///
    /// Returns `Upstream` when the aggregator refuses to dispatch one.
    pub async fn send_otp(&self, request: SendOtpRequest) -> Result<SendOtpResponse, GatewayError> {
        let response: SendOtpResponse = self
            .call(OTP_SEND_ENDPOINT, Method::POST, Some(&request))
            .await?;
        // The phone number and code never reach the logs.
        tracing::info!(purpose = %request.purpose, "OTP dispatched");
        Ok(response)
    }

    /// Verify an OTP the applicant received.
    ///
    /// # Errors
    ///
    /// Returns `Upstream` when the transaction is unknown or expired. A
    /// wrong code is a successful response with `verified: false`.
    pub async fn verify_otp(
        &self,
        request: VerifyOtpRequest,
    ) -> Result<VerifyOtpResponse, GatewayError> {
        let response: VerifyOtpResponse = self
            .call(OTP_VERIFY_ENDPOINT, Method::POST, Some(&request))
            .await?;
        tracing::info!(verified = response.verified, "OTP verification completed");
        Ok(response)
    }

    /// Create a proposal from a quote, a selected plan, and the completed
    /// proposal form.
    ///
    /// # Errors
    ///
    /// Returns `Upstream` with the insurer's validation errors when the
    /// proposal is rejected.
    pub async fn create_proposal(
        &self,
        request: CreateProposalRequest,
    ) -> Result<ProposalResponse, GatewayError> {
        let response: ProposalResponse = self
            .call(PROPOSALS_ENDPOINT, Method::POST, Some(&request))
            .await?;
        tracing::info!(
            quote_id = %request.quote_id,
            plan_id = request.plan_id,
            proposal_id = %response.proposal_id,
            status = %response.status,
            "Proposal created"
        );
        Ok(response)
    }

    /// Initiate payment for a proposal.
    ///
    /// # Errors
    ///
    /// Returns `Upstream` when the payment cannot be initiated.
    pub async fn process_payment(
        &self,
        request: ProcessPaymentRequest,
    ) -> Result<PaymentResponse, GatewayError> {
        let response: PaymentResponse = self
            .call(PAYMENTS_ENDPOINT, Method::POST, Some(&request))
            .await?;
        tracing::info!(
            proposal_id = %request.proposal_id,
            payment_id = %response.payment_id,
            status = %response.status,
            "Payment initiated"
        );
        Ok(response)
    }
}

#[async_trait]
impl QuoteSource for AggregatorClient {
    async fn quote_by_id(&self, quote_id: &str) -> Result<Quote, GatewayError> {
        Self::quote_by_id(self, quote_id).await
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use wiremock::matchers::{body_json, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use crate::config::{AggregatorSettings, ServiceCredentials};
    use crate::infrastructure::aggregator::api_types::PaymentStatus;
    use crate::infrastructure::aggregator::token::TokenStore;

    use super::*;

    fn client_for(server: &MockServer) -> AggregatorClient {
        let settings = AggregatorSettings::new(
            server.uri(),
            ServiceCredentials::new(
                "svc-user".to_string(),
                "svc-pass".to_string(),
                "CH-42".to_string(),
            ),
        );
        let http = AggregatorHttpClient::new(settings, TokenStore::new()).unwrap();
        http.tokens().store("tok");
        AggregatorClient::new(http)
    }

    #[tokio::test]
    async fn create_quote_posts_camel_case_fields() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/v1/quotes"))
            .and(body_json(json!({
                "fieldValues": [{ "name": "pincode", "value": "560001" }]
            })))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({
                "quoteId": "Q-1",
                "plans": []
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server);
        let quote = client
            .create_quote(vec![FieldValue {
                name: "pincode".to_string(),
                value: json!("560001"),
            }])
            .await
            .unwrap();

        assert_eq!(quote.id, "Q-1");
        assert!(quote.plans.is_empty());
    }

    #[tokio::test]
    async fn quote_by_id_targets_the_quote_path() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/quotes/Q-77"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "quoteId": "Q-77",
                "plans": [{
                    "planId": 1,
                    "insurerName": "Aster Health",
                    "planName": "Aster Secure",
                    "premium": 9999,
                    "coverAmount": 300000
                }]
            })))
            .mount(&server)
            .await;

        let client = client_for(&server);
        let quote = client.quote_by_id("Q-77").await.unwrap();
        assert_eq!(quote.id, "Q-77");
        assert_eq!(quote.plans[0].insurer, "Aster Health");
    }

    #[tokio::test]
    async fn proposal_fields_sends_query_params() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/proposals/fields"))
            .and(query_param("quoteId", "Q-5"))
            .and(query_param("planId", "9"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "fields": [
                    { "name": "nomineeName", "fieldType": "text", "required": true },
                    { "name": "nomineeRelation", "fieldType": "select",
                      "options": ["SPOUSE", "PARENT"] }
                ]
            })))
            .mount(&server)
            .await;

        let client = client_for(&server);
        let fields = client.proposal_fields("Q-5", 9).await.unwrap();
        assert_eq!(fields.len(), 2);
        assert!(fields[0].required);
        assert_eq!(fields[1].options, vec!["SPOUSE", "PARENT"]);
    }

    #[tokio::test]
    async fn rejected_proposal_surfaces_upstream_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/v1/proposals"))
            .respond_with(ResponseTemplate::new(422).set_body_json(json!({
                "error": "nominee details incomplete"
            })))
            .mount(&server)
            .await;

        let client = client_for(&server);
        let err = client
            .create_proposal(CreateProposalRequest {
                quote_id: "Q-5".to_string(),
                plan_id: 9,
                field_values: Vec::new(),
                kyc_reference_id: None,
            })
            .await
            .unwrap_err();

        match err {
            GatewayError::Upstream { status, body } => {
                assert_eq!(status, 422);
                assert_eq!(body["error"], "nominee details incomplete");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn malformed_success_body_is_reported() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/v1/otp/send"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "unexpected": true })))
            .mount(&server)
            .await;

        let client = client_for(&server);
        let err = client
            .send_otp(SendOtpRequest {
                phone_number: "9900112233".to_string(),
                purpose: "PROPOSAL_CONSENT".to_string(),
            })
            .await
            .unwrap_err();

        assert!(matches!(err, GatewayError::Transport(_)));
    }

    #[tokio::test]
    async fn payment_response_exposes_parsed_status() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/v1/payments"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "paymentId": "PAY-1",
                "status": "CAPTURED",
                "redirectUrl": "https://pay.example.com/r/PAY-1"
            })))
            .mount(&server)
            .await;

        let client = client_for(&server);
        let payment = client
            .process_payment(ProcessPaymentRequest {
                proposal_id: "PR-1".to_string(),
                payment_mode: "UPI".to_string(),
                return_url: None,
            })
            .await
            .unwrap();

        assert_eq!(payment.parsed_status(), PaymentStatus::Success);
        assert_eq!(
            payment.redirect_url.as_deref(),
            Some("https://pay.example.com/r/PAY-1")
        );
    }
}
