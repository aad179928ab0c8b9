//! JSON API for offers, product pricing and client discounts.
//!
//! - `POST   /api/offers`                                  create a draft offer
//! - `GET    /api/offers/{id}`                             read an offer with its lines
//! - `PATCH  /api/offers/{id}/status`                      apply a status transition
//! - `DELETE /api/offers/{id}`                             delete an offer and its lines
//! - `GET    /api/offers/{id}/margin`                      realized margin report
//! - `GET    /api/products/search?q=&limit=`               product autosuggest
//! - `GET    /api/products/{id}/pricing?client_id=&date=`  pricing lookup
//! - `PUT    /api/products/{id}/pricing`                   pricing configuration
//! - `GET    /api/products/{id}/history?limit=`            price history, newest first
//! - `PUT    /api/clients/{client_id}/discounts/{product_id}` client discount
//!
//! The acting user comes from the `x-user-id` header. Authentication happens
//! upstream.

use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    routing::{get, patch, post, put},
    Json, Router,
};
use chrono::{DateTime, NaiveDate, Utc};
use offerdesk_core::cpq::margin::PriceResolution;
use offerdesk_core::cpq::report::QuoteMarginReport;
use offerdesk_core::domain::client::{ClientDiscount, ClientId};
use offerdesk_core::domain::product::{PriceHistoryEntry, ProductId, ProductSuggestion};
use offerdesk_core::domain::quote::{Quote, QuoteId};
use offerdesk_core::domain::user::UserId;
use offerdesk_core::errors::{ApplicationError, InterfaceError};
use offerdesk_core::ports::PricingStore;
use offerdesk_core::services::{
    DiscountRequest, NewQuote, PricingConfigRequest, PricingConfigResponse, PricingService,
    QuoteService,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{error, warn};
use uuid::Uuid;

pub const USER_HEADER: &str = "x-user-id";
pub const REQUEST_ID_HEADER: &str = "x-request-id";

const DEFAULT_SUGGESTION_LIMIT: u32 = 10;
const DEFAULT_HISTORY_LIMIT: u32 = 20;

pub struct ApiState<S> {
    pub pricing: PricingService<S>,
    pub quotes: QuoteService<S>,
}

impl<S> Clone for ApiState<S> {
    fn clone(&self) -> Self {
        Self { pricing: self.pricing.clone(), quotes: self.quotes.clone() }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ApiError {
    pub error: String,
    pub correlation_id: String,
}

type ApiFailure = (StatusCode, Json<ApiError>);
type ApiResult<T> = Result<Json<T>, ApiFailure>;

/// An offer as returned to clients, with its validity window resolved.
#[derive(Clone, Debug, Serialize)]
pub struct OfferView {
    #[serde(flatten)]
    pub quote: Quote,
    pub expires_at: DateTime<Utc>,
    pub expired: bool,
}

impl OfferView {
    fn at(quote: Quote, now: DateTime<Utc>) -> Self {
        Self { expires_at: quote.expires_at(), expired: quote.is_expired(now), quote }
    }
}

impl From<Quote> for OfferView {
    fn from(quote: Quote) -> Self {
        Self::at(quote, Utc::now())
    }
}

#[derive(Debug, Deserialize)]
pub struct StatusUpdateRequest {
    pub status: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct PricingLookupQuery {
    pub client_id: Option<String>,
    pub date: Option<NaiveDate>,
}

#[derive(Debug, Deserialize)]
pub struct PricingConfigBody {
    pub cost_price: Decimal,
    pub margin_percent: Decimal,
    #[serde(default)]
    pub min_margin_percent: Option<Decimal>,
    #[serde(default)]
    pub max_discount_percent: Option<Decimal>,
}

#[derive(Debug, Deserialize)]
pub struct DiscountBody {
    pub discount_percent: Decimal,
    #[serde(default)]
    pub valid_from: Option<NaiveDate>,
    #[serde(default)]
    pub valid_until: Option<NaiveDate>,
}

#[derive(Debug, Default, Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    pub q: String,
    pub limit: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
pub struct HistoryQuery {
    pub limit: Option<u32>,
}

pub fn router<S>(state: ApiState<S>) -> Router
where
    S: PricingStore + 'static,
{
    Router::new()
        .route("/api/offers", post(create_offer::<S>))
        .route("/api/offers/{id}", get(get_offer::<S>).delete(delete_offer::<S>))
        .route("/api/offers/{id}/status", patch(update_offer_status::<S>))
        .route("/api/offers/{id}/margin", get(offer_margin::<S>))
        .route("/api/products/search", get(search_products::<S>))
        .route(
            "/api/products/{id}/pricing",
            get(lookup_pricing::<S>).put(configure_pricing::<S>),
        )
        .route("/api/products/{id}/history", get(price_history::<S>))
        .route("/api/clients/{client_id}/discounts/{product_id}", put(configure_discount::<S>))
        .with_state(state)
}

fn correlation_id(headers: &HeaderMap) -> String {
    headers
        .get(REQUEST_ID_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| format!("req-{}", Uuid::new_v4().simple()))
}

fn acting_user(headers: &HeaderMap, correlation_id: &str) -> Result<UserId, ApiFailure> {
    headers
        .get(USER_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(|value| UserId(value.to_string()))
        .ok_or_else(|| {
            (
                StatusCode::BAD_REQUEST,
                Json(ApiError {
                    error: format!("{USER_HEADER} header is required"),
                    correlation_id: correlation_id.to_string(),
                }),
            )
        })
}

fn failure(error: ApplicationError, correlation_id: &str) -> ApiFailure {
    let interface = error.into_interface(correlation_id);
    let status = match &interface {
        InterfaceError::BadRequest { .. } => StatusCode::BAD_REQUEST,
        InterfaceError::NotFound { .. } => StatusCode::NOT_FOUND,
        InterfaceError::ServiceUnavailable { message, .. } => {
            error!(
                event_name = "api.request.unavailable",
                correlation_id = %correlation_id,
                error = %message,
                "request failed on persistence"
            );
            StatusCode::SERVICE_UNAVAILABLE
        }
        InterfaceError::Internal { message, .. } => {
            error!(
                event_name = "api.request.internal_error",
                correlation_id = %correlation_id,
                error = %message,
                "request failed"
            );
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };
    if status.is_client_error() {
        warn!(
            event_name = "api.request.rejected",
            correlation_id = %correlation_id,
            status = status.as_u16(),
            error = %interface.user_message(),
            "request rejected"
        );
    }

    (
        status,
        Json(ApiError {
            error: interface.user_message(),
            correlation_id: interface.correlation_id().to_string(),
        }),
    )
}

pub async fn create_offer<S: PricingStore>(
    State(state): State<ApiState<S>>,
    headers: HeaderMap,
    Json(body): Json<NewQuote>,
) -> Result<(StatusCode, Json<OfferView>), ApiFailure> {
    let correlation_id = correlation_id(&headers);
    let user = acting_user(&headers, &correlation_id)?;

    let quote =
        state.quotes.create(&user, body).await.map_err(|error| failure(error, &correlation_id))?;
    Ok((StatusCode::CREATED, Json(quote.into())))
}

pub async fn get_offer<S: PricingStore>(
    State(state): State<ApiState<S>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> ApiResult<OfferView> {
    let correlation_id = correlation_id(&headers);
    state
        .quotes
        .find(&QuoteId(id))
        .await
        .map(|quote| Json(quote.into()))
        .map_err(|error| failure(error, &correlation_id))
}

pub async fn update_offer_status<S: PricingStore>(
    State(state): State<ApiState<S>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(body): Json<StatusUpdateRequest>,
) -> ApiResult<OfferView> {
    let correlation_id = correlation_id(&headers);
    state
        .quotes
        .update_status(&QuoteId(id), &body.status)
        .await
        .map(|quote| Json(quote.into()))
        .map_err(|error| failure(error, &correlation_id))
}

pub async fn delete_offer<S: PricingStore>(
    State(state): State<ApiState<S>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiFailure> {
    let correlation_id = correlation_id(&headers);
    state
        .quotes
        .delete(&QuoteId(id))
        .await
        .map(|()| StatusCode::NO_CONTENT)
        .map_err(|error| failure(error, &correlation_id))
}

pub async fn offer_margin<S: PricingStore>(
    State(state): State<ApiState<S>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> ApiResult<QuoteMarginReport> {
    let correlation_id = correlation_id(&headers);
    state
        .quotes
        .margin_report(&QuoteId(id))
        .await
        .map(Json)
        .map_err(|error| failure(error, &correlation_id))
}

pub async fn lookup_pricing<S: PricingStore>(
    State(state): State<ApiState<S>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Query(query): Query<PricingLookupQuery>,
) -> ApiResult<PriceResolution> {
    let correlation_id = correlation_id(&headers);
    let user = acting_user(&headers, &correlation_id)?;
    let client_id = query
        .client_id
        .filter(|client_id| !client_id.trim().is_empty())
        .map(ClientId);
    let today = query.date.unwrap_or_else(|| Utc::now().date_naive());

    state
        .pricing
        .lookup(&user, &ProductId(id), client_id.as_ref(), today)
        .await
        .map(Json)
        .map_err(|error| failure(error, &correlation_id))
}

pub async fn configure_pricing<S: PricingStore>(
    State(state): State<ApiState<S>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(body): Json<PricingConfigBody>,
) -> ApiResult<PricingConfigResponse> {
    let correlation_id = correlation_id(&headers);
    let user = acting_user(&headers, &correlation_id)?;
    let request = PricingConfigRequest {
        product_id: ProductId(id),
        cost_price: body.cost_price,
        margin_percent: body.margin_percent,
        min_margin_percent: body.min_margin_percent,
        max_discount_percent: body.max_discount_percent,
    };

    state
        .pricing
        .configure(&user, request)
        .await
        .map(Json)
        .map_err(|error| failure(error, &correlation_id))
}

pub async fn configure_discount<S: PricingStore>(
    State(state): State<ApiState<S>>,
    headers: HeaderMap,
    Path((client_id, product_id)): Path<(String, String)>,
    Json(body): Json<DiscountBody>,
) -> ApiResult<ClientDiscount> {
    let correlation_id = correlation_id(&headers);
    let user = acting_user(&headers, &correlation_id)?;
    let request = DiscountRequest {
        client_id: ClientId(client_id),
        product_id: ProductId(product_id),
        discount_percent: body.discount_percent,
        valid_from: body.valid_from,
        valid_until: body.valid_until,
    };

    state
        .pricing
        .configure_discount(&user, request)
        .await
        .map(Json)
        .map_err(|error| failure(error, &correlation_id))
}

pub async fn search_products<S: PricingStore>(
    State(state): State<ApiState<S>>,
    headers: HeaderMap,
    Query(query): Query<SearchQuery>,
) -> ApiResult<Vec<ProductSuggestion>> {
    let correlation_id = correlation_id(&headers);
    let user = acting_user(&headers, &correlation_id)?;

    state
        .pricing
        .suggest_products(&user, &query.q, query.limit.unwrap_or(DEFAULT_SUGGESTION_LIMIT))
        .await
        .map(Json)
        .map_err(|error| failure(error, &correlation_id))
}

pub async fn price_history<S: PricingStore>(
    State(state): State<ApiState<S>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Query(query): Query<HistoryQuery>,
) -> ApiResult<Vec<PriceHistoryEntry>> {
    let correlation_id = correlation_id(&headers);
    let user = acting_user(&headers, &correlation_id)?;

    state
        .pricing
        .price_history(&user, &ProductId(id), query.limit.unwrap_or(DEFAULT_HISTORY_LIMIT))
        .await
        .map(Json)
        .map_err(|error| failure(error, &correlation_id))
}
