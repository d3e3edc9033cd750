use reqwest::Client;
use serde_json::{json, Value};

use crate::domain::errors::DomainError;

use super::table_client::{Row, TableAction, TableClient};

/// Client for the remote table API.
///
/// Each request is `POST {base}/apps/{app}/tables/{table}/Action` carrying the
/// action name and the rows; the access key travels in the
/// `ApplicationAccessKey` header.
pub struct HttpTableClient {
    client: Client,
    base_url: String,
    app_id: String,
    access_key: String,
    locale: String,
}

impl HttpTableClient {
    pub fn new(base_url: &str, app_id: &str, access_key: &str) -> Result<Self, DomainError> {
        let client = Client::builder()
            .build()
            .map_err(|e| DomainError::Internal(format!("cannot build HTTP client: {e}")))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            app_id: app_id.to_string(),
            access_key: access_key.to_string(),
            locale: "vi-VN".to_string(),
        })
    }

    fn action_url(&self, table: &str) -> String {
        format!(
            "{}/apps/{}/tables/{}/Action",
            self.base_url, self.app_id, table
        )
    }

    fn body(&self, action: TableAction, rows: Vec<Row>) -> Value {
        json!({
            "Action": action.as_str(),
            "Properties": { "Locale": self.locale },
            "Rows": rows,
        })
    }
}

impl TableClient for HttpTableClient {
    async fn request(
        &self,
        table: &str,
        action: TableAction,
        rows: Vec<Row>,
    ) -> Result<Vec<Row>, DomainError> {
        let resp = self
            .client
            .post(self.action_url(table))
            .header("ApplicationAccessKey", &self.access_key)
            .json(&self.body(action, rows))
            .send()
            .await
            .map_err(|e| DomainError::Remote(format!("{action} {table}: {e}")))?;

        let status = resp.status();
        let text = resp
            .text()
            .await
            .map_err(|e| DomainError::Remote(format!("{action} {table}: {e}")))?;
        if !status.is_success() {
            return Err(DomainError::Remote(format!(
                "{action} {table} returned {status}: {text}"
            )));
        }
        parse_rows(&text)
    }
}

/// The service answers with a bare row array, an object holding `Rows`, or
/// nothing at all.
pub fn parse_rows(text: &str) -> Result<Vec<Row>, DomainError> {
    if text.trim().is_empty() {
        return Ok(Vec::new());
    }
    let value: Value = serde_json::from_str(text)
        .map_err(|e| DomainError::Remote(format!("unreadable response: {e}")))?;
    let rows = match value {
        Value::Array(rows) => rows,
        Value::Object(mut obj) => match obj.remove("Rows") {
            Some(Value::Array(rows)) => rows,
            _ => return Err(DomainError::Remote("response has no Rows array".to_string())),
        },
        other => {
            return Err(DomainError::Remote(format!(
                "unexpected response shape: {other}"
            )))
        }
    };
    rows.into_iter()
        .map(|row| match row {
            Value::Object(map) => Ok(map),
            other => Err(DomainError::Remote(format!("row is not an object: {other}"))),
        })
        .collect()
}
