//! Payment method codec
//!
//! The `metodo_pago` column holds either a plain method name (`"efectivo"`)
//! or a JSON array of `{metodo, monto}` for mixed payments.

use serde::{Deserialize, Serialize};

/// Method assumed when the column is empty
pub const DEFAULT_METHOD: &str = "efectivo";

/// Methods that never involve cash handling at the door
const DIGITAL_ONLY: &[&str] = &["transferencia", "link de pago", "link"];

/// One part of a mixed payment
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PaymentPart {
    #[serde(rename = "metodo")]
    pub method: String,
    #[serde(rename = "monto")]
    pub amount: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PaymentMethod {
    Single(String),
    Mixed(Vec<PaymentPart>),
}

impl PaymentMethod {
    /// Decode the stored column. Anything that is not a non-empty JSON array
    /// is treated as a single method name.
    pub fn parse(raw: Option<&str>) -> Self {
        let Some(raw) = raw.map(str::trim).filter(|s| !s.is_empty()) else {
            return Self::Single(DEFAULT_METHOD.to_string());
        };
        if raw.starts_with('[')
            && let Ok(parts) = serde_json::from_str::<Vec<PaymentPart>>(raw)
            && !parts.is_empty()
        {
            return Self::Mixed(parts);
        }
        Self::Single(raw.to_string())
    }

    /// Encode for storage.
    pub fn to_stored(&self) -> String {
        match self {
            Self::Single(method) => method.clone(),
            Self::Mixed(parts) => {
                serde_json::to_string(parts).unwrap_or_else(|_| DEFAULT_METHOD.to_string())
            }
        }
    }

    /// Compact text: "Efectivo" or "Transferencia: $30.000 + Efectivo: $20.000".
    pub fn display_text(&self) -> String {
        match self {
            Self::Single(method) => capitalize_first(method),
            Self::Mixed(parts) => parts
                .iter()
                .map(|p| format!("{}: ${}", capitalize_first(&p.method), format_amount(p.amount)))
                .collect::<Vec<_>>()
                .join(" + "),
        }
    }

    pub fn is_mixed(&self) -> bool {
        matches!(self, Self::Mixed(_))
    }

    /// Single digital method; cash tendered/change is irrelevant.
    pub fn is_digital_only(&self) -> bool {
        match self {
            Self::Single(method) => {
                let lower = method.to_lowercase();
                DIGITAL_ONLY.contains(&lower.as_str())
            }
            Self::Mixed(_) => false,
        }
    }
}

impl Default for PaymentMethod {
    fn default() -> Self {
        Self::Single(DEFAULT_METHOD.to_string())
    }
}

fn capitalize_first(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Format an amount with es-AR grouping: `15500` → `15.500`, `12.5` → `12,5`.
pub fn format_amount(amount: f64) -> String {
    let cents = (amount.abs() * 100.0).round() as u64;
    let whole = cents / 100;
    let frac = cents % 100;

    let digits = whole.to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push('.');
        }
        grouped.push(ch);
    }

    let mut out = String::new();
    if amount < 0.0 && cents > 0 {
        out.push('-');
    }
    out.push_str(&grouped);
    if frac > 0 {
        let frac = format!("{:02}", frac);
        out.push(',');
        out.push_str(frac.trim_end_matches('0'));
    }
    out
}
