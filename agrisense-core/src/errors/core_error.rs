use std::collections::BTreeMap;
use std::error::Error as StdError;
use std::fmt;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum CoreErrorKind {
    NotFound,
    Validation,
    Conflict,
    Forbidden,
    Unauthorized,
    /// An upstream service could not be reached or is not configured.
    Unavailable,
    /// An upstream service did not answer in time.
    Timeout,
    Internal,
}

/// Error shared by every service in the crate.
///
/// `fields` carries extra key/value context that the HTTP layer merges into
/// the JSON error body next to `error`.
#[derive(Debug)]
pub struct CoreError {
    kind: CoreErrorKind,
    message: String,
    fields: Option<BTreeMap<String, String>>,
    source: Option<Box<dyn StdError + Send + Sync>>,
}

impl CoreError {
    pub fn new(kind: CoreErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            fields: None,
            source: None,
        }
    }

    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        let entity = entity.into();
        let mut fields = BTreeMap::new();
        fields.insert("entity".to_string(), entity.clone());
        fields.insert("id".to_string(), id.into());

        Self {
            kind: CoreErrorKind::NotFound,
            message: format!("{} not found", entity),
            fields: Some(fields),
            source: None,
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(CoreErrorKind::Validation, message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(CoreErrorKind::Conflict, message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(CoreErrorKind::Forbidden, message)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(CoreErrorKind::Unauthorized, message)
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::new(CoreErrorKind::Unavailable, message)
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(CoreErrorKind::Timeout, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(CoreErrorKind::Internal, message)
    }

    pub fn with_fields(mut self, fields: BTreeMap<String, String>) -> Self {
        self.fields = Some(fields);
        self
    }

    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields
            .get_or_insert_with(BTreeMap::new)
            .insert(key.into(), value.into());
        self
    }

    pub fn with_source<E>(mut self, source: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        self.source = Some(Box::new(source));
        self
    }

    pub fn kind(&self) -> CoreErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn fields(&self) -> Option<&BTreeMap<String, String>> {
        self.fields.as_ref()
    }

    pub fn http_status_code(&self) -> u16 {
        match self.kind {
            CoreErrorKind::NotFound => 404,
            CoreErrorKind::Validation => 400,
            CoreErrorKind::Conflict => 409,
            CoreErrorKind::Forbidden => 403,
            CoreErrorKind::Unauthorized => 401,
            CoreErrorKind::Unavailable => 503,
            CoreErrorKind::Timeout => 504,
            CoreErrorKind::Internal => 500,
        }
    }
}

impl fmt::Display for CoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}: {}", self.kind, self.message)
    }
}

impl StdError for CoreError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.source
            .as_ref()
            .map(|source| source.as_ref() as &(dyn StdError + 'static))
    }
}

impl From<anyhow::Error> for CoreError {
    fn from(err: anyhow::Error) -> Self {
        CoreError::internal("Unhandled error").with_source(AnyhowSource(err))
    }
}

impl From<sea_orm::DbErr> for CoreError {
    fn from(err: sea_orm::DbErr) -> Self {
        CoreError::internal("Database error").with_source(err)
    }
}

#[derive(Debug)]
struct AnyhowSource(anyhow::Error);

impl fmt::Display for AnyhowSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#}", self.0)
    }
}

impl StdError for AnyhowSource {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_carries_entity_and_id() {
        let err = CoreError::not_found("Booking", "12");
        assert_eq!(err.kind(), CoreErrorKind::NotFound);
        assert_eq!(err.message(), "Booking not found");
        let fields = err.fields().unwrap();
        assert_eq!(fields.get("entity").map(String::as_str), Some("Booking"));
        assert_eq!(fields.get("id").map(String::as_str), Some("12"));
    }

    #[test]
    fn status_codes_follow_kind() {
        assert_eq!(CoreError::validation("bad").http_status_code(), 400);
        assert_eq!(CoreError::unauthorized("who").http_status_code(), 401);
        assert_eq!(CoreError::forbidden("no").http_status_code(), 403);
        assert_eq!(CoreError::conflict("taken").http_status_code(), 409);
        assert_eq!(CoreError::unavailable("down").http_status_code(), 503);
        assert_eq!(CoreError::timeout("slow").http_status_code(), 504);
        assert_eq!(CoreError::internal("boom").http_status_code(), 500);
    }

    #[test]
    fn with_field_accumulates() {
        let err = CoreError::internal("Model server error: 502")
            .with_field("details", "bad gateway")
            .with_field("success", "false");
        assert_eq!(err.fields().unwrap().len(), 2);
    }

    #[test]
    fn anyhow_errors_become_internal() {
        let err: CoreError = anyhow::anyhow!("disk full").into();
        assert_eq!(err.kind(), CoreErrorKind::Internal);
        assert!(err.source().unwrap().to_string().contains("disk full"));
    }
}
