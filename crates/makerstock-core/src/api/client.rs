//! API client for the makerspace inventory backend.
//!
//! Reads go to the scripted backend as `GET ?action=...` queries; the
//! case and component lists and live stock are cached through the shared
//! `CacheManager`. Writes are `text/plain` JSON posts and are never cached.

use std::sync::Arc;

use reqwest::Url;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::cache::CacheManager;
use crate::config::Config;
use crate::models::{Holding, StockItem, Transaction, UserStatus, WriteOutcome, WriteResponse};

use super::transport::{HttpResponse, ReqwestTransport, Transport};
use super::validation::{validate_not_empty, validate_positive_int};
use super::ApiError;

// ============================================================================
// Constants
// ============================================================================

/// Base URL of the spreadsheet values API
const SHEETS_API_BASE_URL: &str = "https://sheets.googleapis.com/v4/spreadsheets";

/// Live stock range, header row skipped
const LIVE_STOCK_RANGE: &str = "Live_Stock!A2:F";

/// Cache key for the case list
pub const CASES_CACHE_KEY: &str = "getCases";

/// Cache key for live stock, shared by both sources
pub const LIVE_STOCK_CACHE_KEY: &str = "getLiveStock";

/// Cache key for the component list of one case
pub fn components_cache_key(case_name: &str) -> String {
    format!("getComponents:{}", case_name)
}

/// Response shape of the spreadsheet values API
#[derive(Debug, Deserialize)]
struct SheetsValuesResponse {
    #[serde(default)]
    range: Option<String>,
    #[serde(rename = "majorDimension", default)]
    major_dimension: Option<String>,
    /// Omitted entirely when the range is empty
    #[serde(default)]
    values: Vec<Vec<String>>,
}

#[derive(Clone)]
struct SheetsCredentials {
    api_key: String,
    spreadsheet_id: String,
}

/// Inventory API client.
/// Clone is cheap - the transport and cache are shared.
#[derive(Clone)]
pub struct ApiClient {
    transport: Arc<dyn Transport>,
    cache: Arc<CacheManager>,
    backend_url: Option<Url>,
    sheets: Option<SheetsCredentials>,
}

impl ApiClient {
    /// Create a client that talks HTTP through `reqwest`
    pub fn new(config: &Config, cache: Arc<CacheManager>) -> Result<Self, ApiError> {
        let transport = Arc::new(ReqwestTransport::new()?);
        Ok(Self::with_transport(config, cache, transport))
    }

    pub fn with_transport(
        config: &Config,
        cache: Arc<CacheManager>,
        transport: Arc<dyn Transport>,
    ) -> Self {
        let backend_url = config.backend_url().and_then(|raw| match Url::parse(raw) {
            Ok(url) => Some(url),
            Err(e) => {
                warn!(error = %e, "Backend URL is not a valid URL");
                None
            }
        });

        let sheets = config
            .sheets_credentials()
            .map(|(api_key, spreadsheet_id)| SheetsCredentials {
                api_key: api_key.to_string(),
                spreadsheet_id: spreadsheet_id.to_string(),
            });

        Self {
            transport,
            cache,
            backend_url,
            sheets,
        }
    }

    pub fn cache(&self) -> &CacheManager {
        &self.cache
    }

    /// Whether live stock is read from the spreadsheet values API
    pub fn uses_sheets(&self) -> bool {
        self.sheets.is_some()
    }

    fn backend_url(&self) -> Result<Url, ApiError> {
        self.backend_url
            .clone()
            .ok_or(ApiError::NotConfigured("Backend URL"))
    }

    fn parse<T: DeserializeOwned>(response: HttpResponse) -> Result<T, ApiError> {
        if !response.is_success() {
            return Err(ApiError::from_status(response.status, &response.body));
        }
        serde_json::from_str(&response.body)
            .map_err(|e| ApiError::InvalidResponse(format!("unexpected response shape: {}", e)))
    }

    // ===== Request Layer =====

    /// GET the backend with `params` as the query string.
    async fn get<T: DeserializeOwned>(&self, params: &[(&str, &str)]) -> Result<T, ApiError> {
        let mut url = self.backend_url()?;
        url.query_pairs_mut().extend_pairs(params);

        let action = params.iter().find(|(k, _)| *k == "action").map(|(_, v)| *v);
        debug!(action = ?action, "Backend GET");

        let response = self.transport.get(url).await?;
        if !response.is_success() {
            return Err(ApiError::from_status(response.status, &response.body));
        }

        // The backend reports failures as a 200 with an `{error}` object
        let value: Value = serde_json::from_str(&response.body)
            .map_err(|e| ApiError::InvalidResponse(format!("response is not JSON: {}", e)))?;
        if let Some(message) = value.get("error").and_then(Value::as_str) {
            return Err(ApiError::BackendError(message.to_string()));
        }
        serde_json::from_value(value)
            .map_err(|e| ApiError::InvalidResponse(format!("unexpected response shape: {}", e)))
    }

    /// POST `body` to the backend as `text/plain` JSON.
    async fn post<T: DeserializeOwned, B: Serialize>(&self, body: &B) -> Result<T, ApiError> {
        let url = self.backend_url()?;
        let text = serde_json::to_string(body).map_err(|e| ApiError::Encode(e.to_string()))?;
        let response = self.transport.post_text(url, text).await?;
        Self::parse(response)
    }

    /// GET with cache: fresh cached data if present, otherwise fetch and cache.
    /// Concurrent misses on the same key may both reach the network.
    async fn cached_get<T>(&self, cache_key: &str, params: &[(&str, &str)]) -> Result<T, ApiError>
    where
        T: DeserializeOwned + Serialize,
    {
        if let Some(hit) = self.cache.get_fresh(cache_key) {
            debug!(cache = cache_key, "Cache hit");
            return Ok(hit);
        }

        let data: T = self.get(params).await?;
        self.cache.set(cache_key, &data);
        Ok(data)
    }

    // ===== Data Fetching Methods =====

    /// Fetch all case names
    pub async fn fetch_cases(&self) -> Result<Vec<String>, ApiError> {
        self.cached_get(CASES_CACHE_KEY, &[("action", "getCases")]).await
    }

    /// Fetch the component names stored in one case
    pub async fn fetch_components_by_case(&self, case_name: &str) -> Result<Vec<String>, ApiError> {
        validate_not_empty(case_name, "Case name")?;
        self.cached_get(
            &components_cache_key(case_name),
            &[("action", "getComponents"), ("case", case_name)],
        )
        .await
    }

    /// Fetch what a user currently has borrowed. Never cached.
    pub async fn fetch_user_holdings(&self, user_id: &str) -> Result<Vec<Holding>, ApiError> {
        validate_not_empty(user_id, "User ID")?;
        self.get(&[("action", "getUserHoldings"), ("userId", user_id.trim())])
            .await
    }

    /// Check whether a user is checked in at the makerspace. Never cached.
    pub async fn verify_user(&self, user_id: &str) -> Result<UserStatus, ApiError> {
        validate_not_empty(user_id, "User ID")?;
        self.get(&[("action", "validateUser"), ("userId", user_id.trim())])
            .await
    }

    /// Fetch live stock, preferring the spreadsheet values API when
    /// credentials are configured. Cached under one key for both sources.
    pub async fn fetch_live_stock(&self) -> Result<Vec<StockItem>, ApiError> {
        if let Some(hit) = self.cache.get_fresh(LIVE_STOCK_CACHE_KEY) {
            debug!(cache = LIVE_STOCK_CACHE_KEY, "Cache hit");
            return Ok(hit);
        }
        self.refresh_live_stock().await
    }

    /// Fetch live stock from the network even when the cache is fresh.
    /// The cached entry is only replaced on success, so a failed refresh
    /// leaves the previous data in place.
    pub async fn refresh_live_stock(&self) -> Result<Vec<StockItem>, ApiError> {
        let items = match &self.sheets {
            Some(credentials) => self.fetch_live_stock_from_sheets(credentials).await?,
            None => self.get(&[("action", "getLiveStock")]).await?,
        };
        debug!(count = items.len(), "Live stock fetched");

        self.cache.set(LIVE_STOCK_CACHE_KEY, &items);
        Ok(items)
    }

    /// Cached live stock regardless of age, for stale-while-revalidate.
    pub fn cached_live_stock(&self) -> Option<Vec<StockItem>> {
        self.cache.get_stale(LIVE_STOCK_CACHE_KEY)
    }

    fn sheets_url(credentials: &SheetsCredentials) -> Result<Url, ApiError> {
        let mut url =
            Url::parse(SHEETS_API_BASE_URL).map_err(|e| ApiError::InvalidUrl(e.to_string()))?;
        url.path_segments_mut()
            .map_err(|_| ApiError::InvalidUrl(SHEETS_API_BASE_URL.to_string()))?
            .push(&credentials.spreadsheet_id)
            .push("values")
            .push(LIVE_STOCK_RANGE);
        url.query_pairs_mut().append_pair("key", &credentials.api_key);
        Ok(url)
    }

    async fn fetch_live_stock_from_sheets(
        &self,
        credentials: &SheetsCredentials,
    ) -> Result<Vec<StockItem>, ApiError> {
        let url = Self::sheets_url(credentials)?;
        let response = self.transport.get(url).await?;
        let sheet: SheetsValuesResponse = Self::parse(response)?;
        debug!(
            range = ?sheet.range,
            dimension = ?sheet.major_dimension,
            rows = sheet.values.len(),
            "Sheet values received"
        );

        Ok(sheet
            .values
            .iter()
            .filter_map(|row| StockItem::from_sheet_row(row))
            .collect())
    }

    // ===== Transactions =====

    /// Borrow `quantity` of `component` from `case_name`.
    ///
    /// A backend refusal (e.g. not enough stock) comes back as an unsuccessful
    /// `WriteOutcome`; only transport and validation failures are errors.
    pub async fn borrow_component(
        &self,
        user_id: &str,
        case_name: &str,
        component: &str,
        quantity: u32,
    ) -> Result<WriteOutcome, ApiError> {
        validate_not_empty(user_id, "User ID")?;
        validate_not_empty(case_name, "Case name")?;
        validate_not_empty(component, "Component")?;
        validate_positive_int(quantity as f64, "Quantity")?;

        self.submit(Transaction::Borrow {
            user_id: user_id.trim().to_string(),
            case_name: case_name.to_string(),
            component: component.to_string(),
            quantity,
        })
        .await
    }

    /// Return `quantity` of a borrowed `component`.
    pub async fn return_component(
        &self,
        user_id: &str,
        component: &str,
        quantity: u32,
    ) -> Result<WriteOutcome, ApiError> {
        validate_not_empty(user_id, "User ID")?;
        validate_not_empty(component, "Component")?;
        validate_positive_int(quantity as f64, "Quantity")?;

        self.submit(Transaction::Return {
            user_id: user_id.trim().to_string(),
            component: component.to_string(),
            quantity,
        })
        .await
    }

    // No cache invalidation: the backend expires its own cache on writes and
    // cached stock refreshes once the TTL lapses.
    async fn submit(&self, transaction: Transaction) -> Result<WriteOutcome, ApiError> {
        let reply: WriteResponse = self.post(&transaction).await?;
        let outcome = reply.into_outcome(&transaction)?;

        if outcome.success {
            info!(message = %outcome.message, "Transaction accepted");
        } else {
            warn!(reason = %outcome.message, "Transaction rejected by backend");
        }
        Ok(outcome)
    }
}
