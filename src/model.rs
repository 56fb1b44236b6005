use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::amount::{Amount, AmountConstraints, AmountError, ConstraintViolation, IntoAmount};

/// Literal `result` value of a successful invoice creation.
pub const SUCCESS_RESULT: &str = "success";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
    #[default]
    Rub,
    Btc,
    Eth,
}

impl Currency {
    pub const ALL: [Currency; 3] = [Currency::Rub, Currency::Btc, Currency::Eth];

    pub fn as_str(self) -> &'static str {
        match self {
            Currency::Rub => "RUB",
            Currency::Btc => "BTC",
            Currency::Eth => "ETH",
        }
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Currency {
    type Err = FieldIssue;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Currency::ALL
            .into_iter()
            .find(|currency| currency.as_str() == s)
            .ok_or_else(|| FieldIssue::InvalidCurrency(s.to_string()))
    }
}

/// What is wrong with a single field.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FieldIssue {
    #[error("field required")]
    Missing,
    #[error("invalid JSON: {0}")]
    InvalidJson(String),
    #[error("extra fields not permitted")]
    Unknown,
    #[error("expected {0}")]
    WrongType(&'static str),
    #[error("value {0:?} is not a valid currency; permitted: 'RUB', 'BTC', 'ETH'")]
    InvalidCurrency(String),
    #[error("ensure this value has at least 1 item")]
    Empty,
    #[error("unexpected value {actual:?}; permitted: {expected:?}")]
    UnexpectedValue {
        expected: &'static str,
        actual: String,
    },
    #[error(transparent)]
    InvalidAmount(#[from] AmountError),
    #[error(transparent)]
    Constraint(#[from] ConstraintViolation),
}

#[derive(Debug, Clone, PartialEq)]
pub struct FieldError {
    /// Dotted path of the offending field, e.g. `payment_currencies.1`.
    pub field: String,
    pub issue: FieldIssue,
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.issue)
    }
}

/// Every field that failed validation while building `model`.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationError {
    model: &'static str,
    errors: Vec<FieldError>,
}

impl ValidationError {
    pub fn new(model: &'static str, errors: Vec<FieldError>) -> Self {
        Self { model, errors }
    }

    pub fn single(model: &'static str, field: impl Into<String>, issue: FieldIssue) -> Self {
        Self::new(
            model,
            vec![FieldError {
                field: field.into(),
                issue,
            }],
        )
    }

    pub fn model(&self) -> &'static str {
        self.model
    }

    pub fn errors(&self) -> &[FieldError] {
        &self.errors
    }

    /// Names of the offending fields, in the order they were found.
    pub fn fields(&self) -> Vec<&str> {
        self.errors.iter().map(|e| e.field.as_str()).collect()
    }

    pub fn issue_for(&self, field: &str) -> Option<&FieldIssue> {
        self.errors
            .iter()
            .find(|e| e.field == field)
            .map(|e| &e.issue)
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let count = self.errors.len();
        write!(
            f,
            "{count} validation error{} for {}",
            if count == 1 { "" } else { "s" },
            self.model
        )?;
        for error in &self.errors {
            write!(f, "; {error}")?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationError {}

/// Pulls typed fields out of a JSON object, recording every failure instead of
/// stopping at the first one. Keys left over at the end are unknown fields.
struct FieldReader {
    model: &'static str,
    object: Map<String, Value>,
    errors: Vec<FieldError>,
}

impl FieldReader {
    fn new(model: &'static str, value: Value) -> Result<Self, ValidationError> {
        match value {
            Value::Object(object) => Ok(Self {
                model,
                object,
                errors: Vec::new(),
            }),
            _ => Err(ValidationError::single(
                model,
                "__root__",
                FieldIssue::WrongType("object"),
            )),
        }
    }

    fn fail(&mut self, field: impl Into<String>, issue: FieldIssue) {
        self.errors.push(FieldError {
            field: field.into(),
            issue,
        });
    }

    fn required(&mut self, field: &str) -> Option<Value> {
        let value = self.object.remove(field);
        if value.is_none() {
            self.fail(field, FieldIssue::Missing);
        }
        value
    }

    fn string(&mut self, field: &str) -> Option<String> {
        match self.required(field)? {
            Value::String(s) => Some(s),
            _ => {
                self.fail(field, FieldIssue::WrongType("string"));
                None
            }
        }
    }

    fn bool_or(&mut self, field: &str, default: bool) -> Option<bool> {
        match self.object.remove(field) {
            None => Some(default),
            Some(Value::Bool(b)) => Some(b),
            Some(_) => {
                self.fail(field, FieldIssue::WrongType("boolean"));
                None
            }
        }
    }

    fn parse_currency(&mut self, field: String, value: Value) -> Option<Currency> {
        match value {
            Value::String(code) => match code.parse() {
                Ok(currency) => Some(currency),
                Err(issue) => {
                    self.fail(field, issue);
                    None
                }
            },
            _ => {
                self.fail(field, FieldIssue::WrongType("string"));
                None
            }
        }
    }

    fn currency_or(&mut self, field: &str, default: Currency) -> Option<Currency> {
        match self.object.remove(field) {
            None => Some(default),
            Some(value) => self.parse_currency(field.to_string(), value),
        }
    }

    fn currency_list(&mut self, field: &str) -> Option<Vec<Currency>> {
        let items = match self.required(field)? {
            Value::Array(items) => items,
            _ => {
                self.fail(field, FieldIssue::WrongType("array"));
                return None;
            }
        };
        if items.is_empty() {
            self.fail(field, FieldIssue::Empty);
            return None;
        }

        let mut currencies = Vec::with_capacity(items.len());
        let mut valid = true;
        for (index, item) in items.into_iter().enumerate() {
            match self.parse_currency(format!("{field}.{index}"), item) {
                Some(currency) => currencies.push(currency),
                None => valid = false,
            }
        }
        valid.then_some(currencies)
    }

    fn amount(&mut self, field: &str, constraints: &AmountConstraints) -> Option<Amount> {
        let parsed = match self.required(field)? {
            Value::Number(number) => {
                if let Some(i) = number.as_i64() {
                    Ok(Amount::from(i))
                } else if let Some(u) = number.as_u64() {
                    Ok(Amount::from(u))
                } else {
                    number.to_string().parse::<Amount>()
                }
            }
            Value::String(s) => s.parse::<Amount>(),
            _ => {
                self.fail(field, FieldIssue::WrongType("number"));
                return None;
            }
        };

        match parsed.map_err(FieldIssue::from).and_then(|amount| {
            constraints.validate(amount).map_err(FieldIssue::from)
        }) {
            Ok(amount) => Some(amount),
            Err(issue) => {
                self.fail(field, issue);
                None
            }
        }
    }

    fn optional_object(&mut self, field: &str) -> Option<Option<Map<String, Value>>> {
        match self.object.remove(field) {
            None | Some(Value::Null) => Some(None),
            Some(Value::Object(map)) => Some(Some(map)),
            Some(_) => {
                self.fail(field, FieldIssue::WrongType("object"));
                None
            }
        }
    }

    fn string_map(&mut self, field: &str) -> Option<BTreeMap<String, String>> {
        let object = match self.required(field)? {
            Value::Object(object) => object,
            _ => {
                self.fail(field, FieldIssue::WrongType("object"));
                return None;
            }
        };

        let mut map = BTreeMap::new();
        let mut valid = true;
        for (key, value) in object {
            match value {
                Value::String(s) => {
                    map.insert(key, s);
                }
                _ => {
                    self.fail(format!("{field}.{key}"), FieldIssue::WrongType("string"));
                    valid = false;
                }
            }
        }
        valid.then_some(map)
    }

    /// Rejects leftover keys, then builds the value if nothing failed.
    ///
    /// `build` only returns `None` when a field read above already recorded
    /// an error.
    fn finish<T>(mut self, build: impl FnOnce() -> Option<T>) -> Result<T, ValidationError> {
        let unknown: Vec<String> = self.object.keys().cloned().collect();
        for key in unknown {
            self.fail(key, FieldIssue::Unknown);
        }
        match build() {
            Some(value) if self.errors.is_empty() => Ok(value),
            _ => Err(ValidationError::new(self.model, self.errors)),
        }
    }
}

/// Invoice creation request.
///
/// Built either through [`InvoiceData::new`] or by decoding a JSON object
/// (`TryFrom<Value>` / `Deserialize`), both of which validate every field.
/// There are no setters; the `with_*` methods consume the value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Value")]
pub struct InvoiceData {
    payment_currencies: Vec<Currency>,
    currency: Currency,
    amount: Amount,
    description: String,
    header: String,
    is_convert_payments: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<Map<String, Value>>,
}

impl InvoiceData {
    pub const MODEL: &'static str = "InvoiceData";

    /// Creates an invoice in the default currency (RUB) without payment
    /// conversion or extra data.
    ///
    /// # Errors
    ///
    /// Returns a [`ValidationError`] naming every offending field when
    /// `payment_currencies` is empty or `amount` is not a valid amount of at
    /// least [`InvoiceData::min_amount`].
    pub fn new(
        payment_currencies: Vec<Currency>,
        amount: impl IntoAmount,
        description: impl Into<String>,
        header: impl Into<String>,
    ) -> Result<Self, ValidationError> {
        let mut errors = Vec::new();
        if payment_currencies.is_empty() {
            errors.push(FieldError {
                field: "payment_currencies".to_string(),
                issue: FieldIssue::Empty,
            });
        }
        let amount = amount
            .into_amount()
            .map_err(FieldIssue::from)
            .and_then(|amount| {
                Self::amount_constraints()
                    .validate(amount)
                    .map_err(FieldIssue::from)
            });
        let amount = match amount {
            Ok(amount) => amount,
            Err(issue) => {
                errors.push(FieldError {
                    field: "amount".to_string(),
                    issue,
                });
                Amount::ZERO
            }
        };
        if !errors.is_empty() {
            return Err(ValidationError::new(Self::MODEL, errors));
        }

        Ok(Self {
            payment_currencies,
            currency: Currency::default(),
            amount,
            description: description.into(),
            header: header.into(),
            is_convert_payments: false,
            data: None,
        })
    }

    /// Smallest amount an invoice may be issued for: `0.00000001`.
    pub fn min_amount() -> Amount {
        Amount::new(Decimal::new(1, 8))
    }

    /// Bounds applied to the `amount` field.
    pub fn amount_constraints() -> AmountConstraints {
        AmountConstraints::new().ge(Self::min_amount())
    }

    pub fn with_currency(mut self, currency: Currency) -> Self {
        self.currency = currency;
        self
    }

    pub fn with_convert_payments(mut self, is_convert_payments: bool) -> Self {
        self.is_convert_payments = is_convert_payments;
        self
    }

    pub fn with_data(mut self, data: Map<String, Value>) -> Self {
        self.data = Some(data);
        self
    }

    pub fn payment_currencies(&self) -> &[Currency] {
        &self.payment_currencies
    }

    pub fn currency(&self) -> Currency {
        self.currency
    }

    pub fn amount(&self) -> Amount {
        self.amount
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn header(&self) -> &str {
        &self.header
    }

    pub fn is_convert_payments(&self) -> bool {
        self.is_convert_payments
    }

    pub fn data(&self) -> Option<&Map<String, Value>> {
        self.data.as_ref()
    }
}

impl TryFrom<Value> for InvoiceData {
    type Error = ValidationError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        let mut reader = FieldReader::new(Self::MODEL, value)?;
        let payment_currencies = reader.currency_list("payment_currencies");
        let currency = reader.currency_or("currency", Currency::default());
        let amount = reader.amount("amount", &Self::amount_constraints());
        let description = reader.string("description");
        let header = reader.string("header");
        let is_convert_payments = reader.bool_or("is_convert_payments", false);
        let data = reader.optional_object("data");

        reader.finish(|| {
            Some(Self {
                payment_currencies: payment_currencies?,
                currency: currency?,
                amount: amount?,
                description: description?,
                header: header?,
                is_convert_payments: is_convert_payments?,
                data: data?,
            })
        })
    }
}

/// Successful answer to an invoice creation request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Value")]
pub struct CreateInvoiceResponse {
    result: String,
    id: String,
    link: String,
    addresses: BTreeMap<String, String>,
}

impl CreateInvoiceResponse {
    pub const MODEL: &'static str = "CreateInvoiceResponse";

    pub fn result(&self) -> &str {
        &self.result
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Payment page URL.
    pub fn link(&self) -> &str {
        &self.link
    }

    /// Deposit addresses keyed by currency code.
    pub fn addresses(&self) -> &BTreeMap<String, String> {
        &self.addresses
    }

    pub fn address(&self, code: &str) -> Option<&str> {
        self.addresses.get(code).map(String::as_str)
    }
}

impl TryFrom<Value> for CreateInvoiceResponse {
    type Error = ValidationError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        let mut reader = FieldReader::new(Self::MODEL, value)?;
        let result = reader.string("result").and_then(|result| {
            if result == SUCCESS_RESULT {
                Some(result)
            } else {
                reader.fail(
                    "result",
                    FieldIssue::UnexpectedValue {
                        expected: SUCCESS_RESULT,
                        actual: result,
                    },
                );
                None
            }
        });
        let id = reader.string("id");
        let link = reader.string("link");
        let addresses = reader.string_map("addresses");

        reader.finish(|| {
            Some(Self {
                result: result?,
                id: id?,
                link: link?,
                addresses: addresses?,
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn invoice_json() -> Value {
        json!({
            "payment_currencies": ["ETH", "BTC"],
            "currency": "RUB",
            "amount": 100,
            "description": "Any text",
            "header": "Any text",
            "is_convert_payments": true,
            "data": {"id": 1234, "item": "notebook"}
        })
    }

    #[test]
    fn test_currency_codes() {
        assert_eq!(Currency::default(), Currency::Rub);
        assert_eq!(Currency::Btc.to_string(), "BTC");
        assert_eq!("ETH".parse::<Currency>().unwrap(), Currency::Eth);
        assert_eq!(
            "USD".parse::<Currency>().unwrap_err(),
            FieldIssue::InvalidCurrency("USD".to_string())
        );
        assert_eq!(serde_json::to_string(&Currency::Rub).unwrap(), "\"RUB\"");
    }

    #[test]
    fn test_invoice_from_value() {
        let invoice = InvoiceData::try_from(invoice_json()).unwrap();
        assert_eq!(invoice.payment_currencies(), &[Currency::Eth, Currency::Btc]);
        assert_eq!(invoice.currency(), Currency::Rub);
        assert_eq!(invoice.amount(), Amount::from(100));
        assert!(invoice.is_convert_payments());
        assert_eq!(invoice.data().unwrap()["item"], "notebook");
    }

    #[test]
    fn test_invoice_defaults() {
        let invoice = InvoiceData::try_from(json!({
            "payment_currencies": ["BTC"],
            "amount": "0.5",
            "description": "d",
            "header": "h"
        }))
        .unwrap();
        assert_eq!(invoice.currency(), Currency::Rub);
        assert!(!invoice.is_convert_payments());
        assert!(invoice.data().is_none());
    }

    #[test]
    fn test_invoice_collects_every_error() {
        let err = InvoiceData::try_from(json!({
            "payment_currencies": ["ETH", "DOGE"],
            "currency": 5,
            "amount": -1,
            "header": "h",
            "sign": "abc"
        }))
        .unwrap_err();

        assert_eq!(err.model(), "InvoiceData");
        assert_eq!(
            err.fields(),
            vec!["payment_currencies.1", "currency", "amount", "description", "sign"]
        );
        assert_eq!(err.issue_for("sign"), Some(&FieldIssue::Unknown));
        assert_eq!(err.issue_for("description"), Some(&FieldIssue::Missing));
        assert!(matches!(
            err.issue_for("amount"),
            Some(FieldIssue::Constraint(ConstraintViolation::GreaterThanOrEqual { .. }))
        ));
    }

    #[test]
    fn test_invoice_rejects_non_object() {
        let err = InvoiceData::try_from(json!([1, 2])).unwrap_err();
        assert_eq!(err.fields(), vec!["__root__"]);
    }

    #[test]
    fn test_new_validates_amount() {
        let err = InvoiceData::new(vec![Currency::Btc], -1, "d", "h").unwrap_err();
        assert_eq!(err.fields(), vec!["amount"]);

        let err = InvoiceData::new(vec![], "x", "d", "h").unwrap_err();
        assert_eq!(err.fields(), vec!["payment_currencies", "amount"]);

        let invoice = InvoiceData::new(vec![Currency::Btc], "0.00000001", "d", "h").unwrap();
        assert_eq!(invoice.amount().to_string(), "0.00000001");
    }

    #[test]
    fn test_response_requires_success_literal() {
        let err = CreateInvoiceResponse::try_from(json!({
            "result": "error",
            "id": "x",
            "link": "https://example.org",
            "addresses": {"BTC": 1}
        }))
        .unwrap_err();
        assert_eq!(err.fields(), vec!["result", "addresses.BTC"]);
        assert!(err.to_string().starts_with("2 validation errors for CreateInvoiceResponse"));
    }
}
