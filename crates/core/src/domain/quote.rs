use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::errors::RetrievalError;

pub const RECORDS_FIELD: &str = "Data";
pub const NEXT_PAGE_FIELD: &str = "next_page";
pub const EMAIL_FIELD: &str = "email";
/// Column header carrying the address in workbook exports.
pub const EXPORT_EMAIL_FIELD: &str = "Email";

/// A single upstream quote, kept exactly as received.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QuoteRecord(Value);

impl QuoteRecord {
    pub fn email(&self) -> Option<&str> {
        self.text_field(EMAIL_FIELD)
    }

    pub fn text_field(&self, field: &str) -> Option<&str> {
        self.0.get(field).and_then(Value::as_str)
    }

    /// `query` must already be lower-cased.
    pub fn belongs_to(&self, query: &str) -> bool {
        self.belongs_to_on(EMAIL_FIELD, query)
    }

    /// Same rule as [`QuoteRecord::belongs_to`], reading the address from `field`.
    pub fn belongs_to_on(&self, field: &str, query: &str) -> bool {
        self.text_field(field).map(|email| email.to_lowercase() == query).unwrap_or(false)
    }

    pub fn as_value(&self) -> &Value {
        &self.0
    }

    pub fn into_value(self) -> Value {
        self.0
    }
}

impl From<Value> for QuoteRecord {
    fn from(value: Value) -> Self {
        Self(value)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PageCursor(pub String);

#[derive(Clone, Debug, PartialEq)]
pub struct Page {
    pub records: Vec<QuoteRecord>,
    pub next_page: Option<PageCursor>,
}

impl Page {
    /// Validates the shape of one upstream page body.
    ///
    /// `status` is the HTTP status the body arrived with and is carried into
    /// the error so callers can report it.
    pub fn from_body(status: u16, body: Value) -> Result<Self, RetrievalError> {
        let mut object = match body {
            Value::Object(object) => object,
            other => {
                return Err(RetrievalError::malformed(
                    status,
                    format!("page body is {}", describe(&other)),
                ))
            }
        };

        let records = take_records(status, &mut object)?;
        let next_page = match object.remove(NEXT_PAGE_FIELD) {
            None | Some(Value::Null) => None,
            Some(Value::String(token)) if token.is_empty() => None,
            Some(Value::String(token)) => Some(PageCursor(token)),
            Some(Value::Number(number)) => Some(PageCursor(number.to_string())),
            Some(other) => {
                return Err(RetrievalError::malformed(
                    status,
                    format!("`{NEXT_PAGE_FIELD}` is {}", describe(&other)),
                ))
            }
        };

        Ok(Self { records, next_page })
    }
}

/// Pulls the record array out of a response object, rejecting any other shape.
pub fn take_records(
    status: u16,
    object: &mut Map<String, Value>,
) -> Result<Vec<QuoteRecord>, RetrievalError> {
    match object.remove(RECORDS_FIELD) {
        Some(Value::Array(items)) => Ok(items.into_iter().map(QuoteRecord::from).collect()),
        other => Err(RetrievalError::malformed(
            status,
            format!(
                "`{RECORDS_FIELD}` is {}",
                other.as_ref().map(describe).unwrap_or("missing")
            ),
        )),
    }
}

fn describe(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Successful retrieval. An empty `records` list is still a success.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct QuoteMatches {
    pub records: Vec<QuoteRecord>,
    #[serde(skip)]
    pub pages_fetched: u32,
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{Page, PageCursor, QuoteRecord};
    use crate::errors::RetrievalError;

    #[test]
    fn record_match_is_case_insensitive_and_exact() {
        let record = QuoteRecord::from(json!({ "email": "Jane.Doe@Example.com", "total": 12 }));

        assert!(record.belongs_to("jane.doe@example.com"));
        assert!(!record.belongs_to("jane.doe@example.co"));
        assert!(!record.belongs_to("doe@example.com"));
    }

    #[test]
    fn surrounding_whitespace_is_not_normalized() {
        let record = QuoteRecord::from(json!({ "email": " jane@example.com" }));
        assert!(!record.belongs_to("jane@example.com"));
    }

    #[test]
    fn records_without_string_email_never_match() {
        assert!(!QuoteRecord::from(json!({ "id": 7 })).belongs_to("a@x.com"));
        assert!(!QuoteRecord::from(json!({ "email": null })).belongs_to("a@x.com"));
        assert!(!QuoteRecord::from(json!({ "email": 42 })).belongs_to("42"));
        assert!(!QuoteRecord::from(json!("a@x.com")).belongs_to("a@x.com"));
    }

    #[test]
    fn page_parses_records_and_string_cursor() {
        let page = Page::from_body(
            200,
            json!({ "Data": [{ "email": "a@x.com" }], "next_page": "tok-2" }),
        )
        .expect("page should parse");

        assert_eq!(page.records.len(), 1);
        assert_eq!(page.next_page, Some(PageCursor("tok-2".to_string())));
    }

    #[test]
    fn numeric_cursor_is_carried_as_text() {
        let page = Page::from_body(200, json!({ "Data": [], "next_page": 3 }))
            .expect("page should parse");
        assert_eq!(page.next_page, Some(PageCursor("3".to_string())));
    }

    #[test]
    fn null_missing_or_empty_cursor_ends_pagination() {
        for body in [
            json!({ "Data": [] }),
            json!({ "Data": [], "next_page": null }),
            json!({ "Data": [], "next_page": "" }),
        ] {
            let page = Page::from_body(200, body).expect("page should parse");
            assert_eq!(page.next_page, None);
        }
    }

    #[test]
    fn cursor_that_cannot_be_sent_back_is_malformed() {
        for cursor in [json!(true), json!(["p2"]), json!({ "page": 2 })] {
            let error = Page::from_body(200, json!({ "Data": [], "next_page": cursor }))
                .expect_err("non-scalar cursor must be rejected");
            assert!(matches!(error, RetrievalError::MalformedBody { status: 200, .. }));
        }
    }

    #[test]
    fn export_rows_match_on_their_own_column() {
        let row = QuoteRecord::from(json!({ "Email": "Jane@Example.com", "email": "" }));

        assert!(row.belongs_to_on("Email", "jane@example.com"));
        assert!(!row.belongs_to("jane@example.com"));
    }

    #[test]
    fn non_array_records_field_is_malformed() {
        for data in [json!(null), json!({ "email": "a@x.com" }), json!("rows")] {
            let error = Page::from_body(200, json!({ "Data": data, "next_page": null }))
                .expect_err("non-array Data must be rejected");
            assert!(matches!(error, RetrievalError::MalformedBody { status: 200, .. }));
        }

        let missing = Page::from_body(200, json!({ "next_page": null }))
            .expect_err("missing Data must be rejected");
        assert!(matches!(missing, RetrievalError::MalformedBody { .. }));
    }

    #[test]
    fn non_object_body_is_malformed() {
        let error = Page::from_body(200, json!([{ "email": "a@x.com" }]))
            .expect_err("array body must be rejected");
        assert!(matches!(error, RetrievalError::MalformedBody { .. }));
    }

    #[test]
    fn record_fields_pass_through_untouched() {
        let raw = json!({ "email": "a@x.com", "amount": "19.99", "nested": { "k": [1, 2] } });
        let page = Page::from_body(200, json!({ "Data": [raw.clone()] })).expect("page");

        assert_eq!(page.records[0].as_value(), &raw);
    }
}
