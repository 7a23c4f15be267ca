//! Daily order-number lookups
//!
//! Order numbers reset every day in the store's timezone, so a number only
//! identifies an order together with the day it was created.

use chrono::{DateTime, TimeZone, Utc};
use chrono_tz::Tz;
use shared::Order;

use crate::error::StoreResult;
use crate::store::{OrderQuery, OrderStore};

/// Local midnight of `now`'s day in `tz`, as UTC
pub fn today_start(tz: Tz, now: DateTime<Utc>) -> DateTime<Utc> {
    let local_midnight = now.with_timezone(&tz).date_naive().and_time(chrono::NaiveTime::MIN);
    tz.from_local_datetime(&local_midnight)
        .earliest()
        .map(|start| start.with_timezone(&Utc))
        .unwrap_or(now)
}

/// Most recent order created today with `order_number`
pub async fn find_todays_order(
    store: &dyn OrderStore,
    order_number: u32,
    tz: Tz,
    now: DateTime<Utc>,
) -> StoreResult<Option<Order>> {
    let query = OrderQuery::latest_numbered(order_number, today_start(tz, now));
    Ok(store.select(&query).await?.into_iter().next())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryOrderStore;
    use chrono::Duration;

    const TZ: Tz = chrono_tz::America::Argentina::Buenos_Aires;

    #[test]
    fn test_today_start_uses_local_day() {
        // 01:30 UTC is still the previous evening in Buenos Aires (UTC-3)
        let now = Utc.with_ymd_and_hms(2026, 10, 19, 1, 30, 0).unwrap();
        let start = today_start(TZ, now);
        assert_eq!(start, Utc.with_ymd_and_hms(2026, 10, 18, 3, 0, 0).unwrap());
    }

    #[tokio::test]
    async fn test_finds_latest_of_today_only() {
        let now = Utc.with_ymd_and_hms(2026, 10, 18, 22, 0, 0).unwrap();
        let store = MemoryOrderStore::new();
        store.seed([
            Order::new("yesterday", 3, "A", 1.0, now - Duration::days(1)),
            Order::new("early", 3, "B", 1.0, now - Duration::hours(5)),
            Order::new("late", 3, "C", 1.0, now - Duration::hours(1)),
            Order::new("other", 4, "D", 1.0, now),
        ]);

        let found = find_todays_order(&store, 3, TZ, now).await.unwrap();
        assert_eq!(found.map(|o| o.id).as_deref(), Some("late"));
        assert!(find_todays_order(&store, 9, TZ, now).await.unwrap().is_none());
    }
}
