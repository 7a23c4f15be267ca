//! Pickup / delivery classification and order age

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Lower-cased address fragments that mean "customer picks up in store"
const PICKUP_MARKERS: &[&str] = &["retira", "retiro"];

/// Whole-address pickup marker
const PICKUP_EXACT: &str = "local";

/// Minutes after which a pending order is flagged urgent
pub const URGENT_AFTER_MINUTES: i64 = 15;

/// True when the address is absent/blank or names an in-store pickup marker.
pub fn is_pickup_address(address: Option<&str>) -> bool {
    match address.map(str::trim) {
        None | Some("") => true,
        Some(addr) => {
            let lower = addr.to_lowercase();
            lower == PICKUP_EXACT || PICKUP_MARKERS.iter().any(|m| lower.contains(m))
        }
    }
}

/// How the order leaves the store (`tipo` on notifications)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FulfillmentKind {
    #[serde(rename = "retiro")]
    Pickup,
    #[serde(rename = "envio")]
    Delivery,
}

impl FulfillmentKind {
    pub fn for_address(address: Option<&str>) -> Self {
        if is_pickup_address(address) {
            Self::Pickup
        } else {
            Self::Delivery
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pickup => "retiro",
            Self::Delivery => "envio",
        }
    }

    /// State reached when staff press the dispatch button
    pub fn dispatch_state(&self) -> DispatchState {
        match self {
            Self::Pickup => DispatchState::ReadyForPickup,
            Self::Delivery => DispatchState::CourierDeparted,
        }
    }
}

/// Dispatch state announced on notifications (`estado`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DispatchState {
    #[serde(rename = "listo_para_retirar")]
    ReadyForPickup,
    #[serde(rename = "cadete_salio")]
    CourierDeparted,
}

impl DispatchState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ReadyForPickup => "listo_para_retirar",
            Self::CourierDeparted => "cadete_salio",
        }
    }
}

/// Elapsed time since creation, for kitchen display
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrderAge {
    pub minutes: i64,
}

impl OrderAge {
    pub fn since(created_at: DateTime<Utc>, now: DateTime<Utc>) -> Self {
        let elapsed = now.signed_duration_since(created_at).max(Duration::zero());
        Self {
            minutes: elapsed.num_minutes(),
        }
    }

    pub fn is_just_arrived(&self) -> bool {
        self.minutes < 1
    }

    pub fn is_urgent(&self) -> bool {
        self.minutes >= URGENT_AFTER_MINUTES
    }

    /// "Recién llegado", "5 min", "1h 20m"
    pub fn label(&self) -> String {
        match self.minutes {
            m if m < 1 => "Recién llegado".to_string(),
            m if m < 60 => format!("{m} min"),
            m => format!("{}h {}m", m / 60, m % 60),
        }
    }
}
