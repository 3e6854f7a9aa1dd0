//! Google Sheets remote mirror client.
//!
//! Speaks the v4 values API over HTTPS against a single sheet ("Fuel
//! Entries", columns A..O). Responsibilities end at the HTTP boundary:
//! tokens come from a [`TokenProvider`] and acquiring/refreshing them is an
//! external concern. A 401 maps to [`SyncError::AuthExpired`] so the
//! coordinator can stop retrying and ask for re-authentication.

use reqwest::{Method, StatusCode};
use std::future::Future;
use std::time::Duration;

use super::rows::HEADER_ROW;
use super::{
    RemoteMirror, SyncError, SETTING_ACCESS_TOKEN, SETTING_TOKEN_EXPIRES_AT,
};
use crate::store::LocalStore;

const DEFAULT_BASE_URL: &str = "https://sheets.googleapis.com";
const SHEET_TITLE: &str = "Fuel Entries";
const DATA_RANGE: &str = "'Fuel Entries'!A2:O";
const HEADER_RANGE: &str = "'Fuel Entries'!A1:O1";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Supplies a currently-valid bearer token, or [`SyncError::AuthExpired`]
/// when there is none to supply.
pub trait TokenProvider: Send + Sync {
    fn access_token(&self) -> impl Future<Output = Result<String, SyncError>> + Send;
}

/// Token provider backed by store settings: the token itself plus an
/// optional expiry in Unix milliseconds. An empty, missing, or expired
/// token yields `AuthExpired`.
#[derive(Clone)]
pub struct StoredTokenProvider {
    store: LocalStore,
}

impl StoredTokenProvider {
    pub fn new(store: LocalStore) -> Self {
        Self { store }
    }
}

impl TokenProvider for StoredTokenProvider {
    async fn access_token(&self) -> Result<String, SyncError> {
        let token = self
            .store
            .get_setting(SETTING_ACCESS_TOKEN)
            .await
            .filter(|t| !t.is_empty())
            .ok_or(SyncError::AuthExpired)?;

        if let Some(expires_at) = self.store.get_setting(SETTING_TOKEN_EXPIRES_AT).await {
            if let Ok(at_millis) = expires_at.parse::<i64>() {
                if chrono::Utc::now().timestamp_millis() >= at_millis {
                    return Err(SyncError::AuthExpired);
                }
            }
        }

        Ok(token)
    }
}

pub struct SheetsClient<T: TokenProvider> {
    http: reqwest::Client,
    base_url: String,
    spreadsheet_id: Option<String>,
    tokens: T,
}

impl<T: TokenProvider> SheetsClient<T> {
    pub fn new(spreadsheet_id: Option<String>, tokens: T) -> Result<Self, SyncError> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| SyncError::Transport(e.to_string()))?;

        Ok(Self {
            http,
            base_url: DEFAULT_BASE_URL.to_string(),
            spreadsheet_id,
            tokens,
        })
    }

    fn values_url(&self, range: &str) -> Result<String, SyncError> {
        let id = self.spreadsheet_id.as_ref().ok_or(SyncError::NotConfigured)?;
        Ok(format!(
            "{}/v4/spreadsheets/{}/values/{}",
            self.base_url,
            id,
            urlencoding::encode(range)
        ))
    }

    async fn request(
        &self,
        method: Method,
        url: String,
        body: Option<serde_json::Value>,
    ) -> Result<serde_json::Value, SyncError> {
        let token = self.tokens.access_token().await?;

        let mut request = self.http.request(method, url).bearer_auth(token);
        if let Some(body) = body {
            request = request.json(&body);
        }

        let response = request
            .send()
            .await
            .map_err(|e| SyncError::Transport(e.to_string()))?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED {
            return Err(SyncError::AuthExpired);
        }
        if !status.is_success() {
            let message = response
                .json::<serde_json::Value>()
                .await
                .ok()
                .and_then(|v| {
                    v.get("error")
                        .and_then(|e| e.get("message"))
                        .and_then(|m| m.as_str())
                        .map(String::from)
                })
                .unwrap_or_else(|| status.to_string());
            return Err(SyncError::Api {
                status: status.as_u16(),
                message,
            });
        }

        response
            .json()
            .await
            .map_err(|e| SyncError::Transport(e.to_string()))
    }

    /// Creates a new spreadsheet holding the "Fuel Entries" sheet and
    /// returns its id. Does not write the header row; call
    /// [`Self::write_header_row`] once the id is stored.
    pub async fn create_spreadsheet(&self, title: &str) -> Result<String, SyncError> {
        let body = serde_json::json!({
            "properties": { "title": title },
            "sheets": [
                { "properties": { "sheetId": 0, "title": SHEET_TITLE } }
            ]
        });

        let url = format!("{}/v4/spreadsheets", self.base_url);
        let response = self.request(Method::POST, url, Some(body)).await?;

        response
            .get("spreadsheetId")
            .and_then(|v| v.as_str())
            .map(String::from)
            .ok_or_else(|| SyncError::Transport("create response missing spreadsheetId".into()))
    }

    /// Writes the fixed header row into A1:O1.
    pub async fn write_header_row(&self) -> Result<(), SyncError> {
        let headers: Vec<String> = HEADER_ROW.iter().map(|h| h.to_string()).collect();
        let url = format!(
            "{}?valueInputOption=RAW",
            self.values_url(HEADER_RANGE)?
        );
        let body = serde_json::json!({ "values": [headers] });
        self.request(Method::PUT, url, Some(body)).await?;
        Ok(())
    }
}

impl<T: TokenProvider> RemoteMirror for SheetsClient<T> {
    async fn read_rows(&self) -> Result<Vec<Vec<String>>, SyncError> {
        let url = self.values_url(DATA_RANGE)?;
        let response = self.request(Method::GET, url, None).await?;

        let rows = response
            .get("values")
            .and_then(|v| v.as_array())
            .map(|rows| {
                rows.iter()
                    .map(|row| {
                        row.as_array()
                            .map(|cells| {
                                cells
                                    .iter()
                                    .map(|c| c.as_str().unwrap_or_default().to_string())
                                    .collect()
                            })
                            .unwrap_or_default()
                    })
                    .collect()
            })
            .unwrap_or_default();

        Ok(rows)
    }

    async fn overwrite_rows(&self, rows: Vec<Vec<String>>) -> Result<(), SyncError> {
        let clear_url = format!("{}:clear", self.values_url(DATA_RANGE)?);
        self.request(Method::POST, clear_url, None).await?;

        let write_url = format!(
            "{}/v4/spreadsheets/{}/values/{}?valueInputOption=RAW",
            self.base_url,
            self.spreadsheet_id.as_ref().ok_or(SyncError::NotConfigured)?,
            urlencoding::encode("'Fuel Entries'!A2")
        );
        let body = serde_json::json!({ "values": rows });
        self.request(Method::PUT, write_url, Some(body)).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::FlatTextEngine;
    use tempfile::TempDir;

    struct NoToken;

    impl TokenProvider for NoToken {
        async fn access_token(&self) -> Result<String, SyncError> {
            Err(SyncError::AuthExpired)
        }
    }

    async fn test_store() -> (LocalStore, TempDir) {
        let temp = TempDir::new().unwrap();
        let engine = FlatTextEngine::open(temp.path().join("data.json")).await;
        (LocalStore::from_flat(engine), temp)
    }

    #[test]
    fn test_values_url_percent_encodes_range() {
        let client = SheetsClient::new(Some("sheet-123".to_string()), NoToken).unwrap();
        let url = client.values_url(DATA_RANGE).unwrap();
        assert_eq!(
            url,
            "https://sheets.googleapis.com/v4/spreadsheets/sheet-123/values/%27Fuel%20Entries%27%21A2%3AO"
        );
    }

    #[test]
    fn test_values_url_without_spreadsheet_is_not_configured() {
        let client = SheetsClient::new(None, NoToken).unwrap();
        assert!(matches!(
            client.values_url(DATA_RANGE),
            Err(SyncError::NotConfigured)
        ));
    }

    #[tokio::test]
    async fn test_stored_token_missing_is_auth_expired() {
        let (store, _temp) = test_store().await;
        let provider = StoredTokenProvider::new(store);
        assert!(matches!(
            provider.access_token().await,
            Err(SyncError::AuthExpired)
        ));
    }

    #[tokio::test]
    async fn test_stored_token_empty_is_auth_expired() {
        let (store, _temp) = test_store().await;
        store.set_setting(SETTING_ACCESS_TOKEN, "").await;
        let provider = StoredTokenProvider::new(store);
        assert!(matches!(
            provider.access_token().await,
            Err(SyncError::AuthExpired)
        ));
    }

    #[tokio::test]
    async fn test_stored_token_expired_is_auth_expired() {
        let (store, _temp) = test_store().await;
        store.set_setting(SETTING_ACCESS_TOKEN, "tok").await;
        store.set_setting(SETTING_TOKEN_EXPIRES_AT, "1000").await;
        let provider = StoredTokenProvider::new(store);
        assert!(matches!(
            provider.access_token().await,
            Err(SyncError::AuthExpired)
        ));
    }

    #[tokio::test]
    async fn test_stored_token_valid_is_returned() {
        let (store, _temp) = test_store().await;
        store.set_setting(SETTING_ACCESS_TOKEN, "tok").await;
        let far_future = chrono::Utc::now().timestamp_millis() + 3_600_000;
        store
            .set_setting(SETTING_TOKEN_EXPIRES_AT, &far_future.to_string())
            .await;

        let provider = StoredTokenProvider::new(store);
        assert_eq!(provider.access_token().await.unwrap(), "tok");
    }
}
