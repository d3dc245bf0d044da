pub mod admin;
pub mod analytics;
pub mod cart;
pub mod comments;
pub mod dashboard;
pub mod events;
pub mod guest;
pub mod tickets;

use axum::Router;
use std::sync::Arc;

/// Все маршруты `/api`. Analytics is mounted only when the feature flag is on.
pub fn routes(enable_analytics: bool) -> Router<Arc<crate::AppState>> {
    let router = Router::new()
        .merge(events::routes())
        .merge(comments::routes())
        .merge(cart::routes())
        .merge(tickets::routes())
        .merge(guest::routes())
        .merge(dashboard::routes())
        .merge(admin::routes());

    if enable_analytics {
        router.merge(analytics::routes())
    } else {
        router
    }
}

/// Деньги в ответах: две цифры после точки.
pub(crate) fn money(value: f64) -> String {
    format!("{:.2}", value)
}

#[cfg(test)]
mod tests {
    use super::money;

    #[test]
    fn money_has_two_decimals() {
        assert_eq!(money(0.0), "0.00");
        assert_eq!(money(37.5), "37.50");
        assert_eq!(money(19.999), "20.00");
    }
}
