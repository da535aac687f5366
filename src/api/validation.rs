use actix_web::HttpResponse;
use actix_web::error::InternalError;
use serde::Serialize;

/// JSON error envelope shared by every endpoint
#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub fields: serde_json::Value,
}

impl ErrorResponse {
    pub fn message(error: &str, message: impl Into<String>) -> Self {
        Self {
            error: error.to_string(),
            fields: serde_json::json!({ "message": message.into() }),
        }
    }
}

/// Struct-level checks are reported by validator under `__all__`
const STRUCT_LEVEL_KEY: &str = "__all__";

fn bad_request(body: ErrorResponse) -> actix_web::Error {
    InternalError::from_response("", HttpResponse::BadRequest().json(body)).into()
}

fn deserialize_message(error: &str) -> &'static str {
    if error.contains("EOF while parsing") {
        "Request body is empty. Expected JSON payload"
    } else if error.contains("unknown variant") {
        "Invalid enum value. Check allowed values for this field"
    } else if error.contains("missing field") {
        "A required field is missing"
    } else {
        "Invalid JSON format"
    }
}

/// JsonConfig that turns extractor failures into the error envelope
pub fn json_config() -> actix_web_validator::JsonConfig {
    actix_web_validator::JsonConfig::default().error_handler(|err, _req| match err {
        actix_web_validator::Error::Validate(validation_errors) => {
            let mut fields = serde_json::Map::new();
            for (field, errors) in validation_errors.field_errors() {
                let messages: Vec<String> = errors
                    .iter()
                    .map(|e| {
                        e.message
                            .as_ref()
                            .map(|m| m.to_string())
                            .unwrap_or_else(|| format!("Validation error in field: {}", field))
                    })
                    .collect();
                let field: &str = &field;
                let key = if field == STRUCT_LEVEL_KEY { "order" } else { field };
                fields.insert(key.to_string(), serde_json::json!({ "errors": messages }));
            }

            bad_request(ErrorResponse {
                error: "Validation failed".to_string(),
                fields: serde_json::Value::Object(fields),
            })
        }
        actix_web_validator::Error::Deserialize(de_err) => bad_request(ErrorResponse::message(
            "Request validation failed",
            deserialize_message(&de_err.to_string()),
        )),
        _ => bad_request(ErrorResponse::message("Validation failed", "Validation error")),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserialize_errors_map_to_readable_messages() {
        assert_eq!(
            deserialize_message("EOF while parsing a value at line 1 column 0"),
            "Request body is empty. Expected JSON payload"
        );
        assert_eq!(
            deserialize_message("unknown variant `sepia`, expected one of ..."),
            "Invalid enum value. Check allowed values for this field"
        );
        assert_eq!(deserialize_message("missing field `email`"), "A required field is missing");
        assert_eq!(deserialize_message("expected `,` or `}`"), "Invalid JSON format");
    }
}
