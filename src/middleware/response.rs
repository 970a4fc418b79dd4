use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::Serialize;
use serde_json::{json, Map, Value};

/// Wrapper for API responses that adds the `{success:true, data}` envelope.
#[derive(Debug)]
pub struct ApiResponse<T: Serialize> {
    pub data: T,
    pub status_code: Option<StatusCode>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            data,
            status_code: None,
        }
    }

    pub fn with_status(data: T, status_code: StatusCode) -> Self {
        Self {
            data,
            status_code: Some(status_code),
        }
    }

    pub fn created(data: T) -> Self {
        Self::with_status(data, StatusCode::CREATED)
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        let status = self.status_code.unwrap_or(StatusCode::OK);

        let data_value = match serde_json::to_value(&self.data) {
            Ok(value) => value,
            Err(e) => {
                tracing::error!("failed to serialize response data: {}", e);
                return (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({
                        "success": false,
                        "error": { "code": "SERVER_ERROR", "message": "Failed to format response" }
                    })),
                )
                    .into_response();
            }
        };

        (status, Json(json!({ "success": true, "data": data_value }))).into_response()
    }
}

pub type ApiResult<T> = Result<ApiResponse<T>, crate::error::ApiError>;

/// List envelope: `{success, count, totalCount, resPerPage, <plural>: [...]}`.
#[derive(Debug)]
pub struct ListResponse {
    key: &'static str,
    rows: Vec<Map<String, Value>>,
    total: i64,
    per_page: i64,
}

impl ListResponse {
    pub fn new(key: &'static str, rows: Vec<Map<String, Value>>, total: i64, per_page: i64) -> Self {
        Self {
            key,
            rows,
            total,
            per_page,
        }
    }

    pub fn to_json(&self) -> Value {
        let mut body = Map::new();
        body.insert("success".to_string(), Value::Bool(true));
        body.insert("count".to_string(), Value::from(self.rows.len() as i64));
        body.insert("totalCount".to_string(), Value::from(self.total));
        body.insert("resPerPage".to_string(), Value::from(self.per_page));
        body.insert(
            self.key.to_string(),
            Value::Array(self.rows.iter().cloned().map(Value::Object).collect()),
        );
        Value::Object(body)
    }
}

impl IntoResponse for ListResponse {
    fn into_response(self) -> Response {
        (StatusCode::OK, Json(self.to_json())).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn list_envelope_carries_counts_and_plural_key() {
        let mut row = Map::new();
        row.insert("id".to_string(), Value::String("EC001".to_string()));
        let body = ListResponse::new("schools", vec![row], 12, 25).to_json();
        assert_eq!(body["success"], true);
        assert_eq!(body["count"], 1);
        assert_eq!(body["totalCount"], 12);
        assert_eq!(body["resPerPage"], 25);
        assert_eq!(body["schools"][0]["id"], "EC001");
    }
}
