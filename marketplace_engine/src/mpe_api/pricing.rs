//! The single source of truth for tax and shipping.
use log::*;
use serde::{Deserialize, Serialize};

use crate::{
    db_types::{Cents, OrderTotals},
    mpe_api::errors::MarketplaceError,
};

pub const DEFAULT_TAX_RATE_BPS: i64 = 800;
pub const DEFAULT_FLAT_SHIPPING: i64 = 1_000;
pub const DEFAULT_FREE_SHIPPING_THRESHOLD: i64 = 10_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricingPolicy {
    /// Sales tax in basis points (1/100th of a percent). 800 is 8%.
    pub tax_rate_bps: i64,
    pub flat_shipping: Cents,
    /// Orders with a subtotal at or above this ship free
    pub free_shipping_threshold: Cents,
}

impl Default for PricingPolicy {
    fn default() -> Self {
        Self {
            tax_rate_bps: DEFAULT_TAX_RATE_BPS,
            flat_shipping: Cents::from(DEFAULT_FLAT_SHIPPING),
            free_shipping_threshold: Cents::from(DEFAULT_FREE_SHIPPING_THRESHOLD),
        }
    }
}

impl PricingPolicy {
    pub fn new(tax_rate_bps: i64, flat_shipping: Cents, free_shipping_threshold: Cents) -> Self {
        Self { tax_rate_bps, flat_shipping, free_shipping_threshold }
    }

    pub fn from_env_or_default() -> Self {
        let default = Self::default();
        let read = |var: &str, default: i64| -> i64 {
            std::env::var(var).ok().and_then(|s| s.parse::<i64>().ok()).filter(|v| *v >= 0).unwrap_or_else(|| {
                debug!("🪛️ {var} is not set or invalid. Using {default}");
                default
            })
        };
        let tax_rate_bps = read("MKT_TAX_RATE_BPS", default.tax_rate_bps);
        let flat_shipping = read("MKT_FLAT_SHIPPING_CENTS", default.flat_shipping.value());
        let threshold = read("MKT_FREE_SHIPPING_THRESHOLD_CENTS", default.free_shipping_threshold.value());
        Self::new(tax_rate_bps, Cents::from(flat_shipping), Cents::from(threshold))
    }

    /// Tax on the subtotal, rounded half up to the nearest cent. `None` if the result does not fit in an `i64`.
    pub fn tax(&self, subtotal: Cents) -> Option<Cents> {
        let t = (i128::from(subtotal.value()) * i128::from(self.tax_rate_bps) + 5_000) / 10_000;
        i64::try_from(t).ok().map(Cents::from)
    }

    pub fn shipping(&self, subtotal: Cents) -> Cents {
        if subtotal.value() == 0 || subtotal >= self.free_shipping_threshold {
            Cents::default()
        } else {
            self.flat_shipping
        }
    }

    pub fn quote(&self, subtotal: Cents) -> Result<OrderTotals, MarketplaceError> {
        let too_large = || MarketplaceError::InvalidRequest(format!("An order of {subtotal} is too large to price"));
        let tax = self.tax(subtotal).ok_or_else(too_large)?;
        let shipping = self.shipping(subtotal);
        let total = subtotal.checked_add(tax).and_then(|t| t.checked_add(shipping)).ok_or_else(too_large)?;
        Ok(OrderTotals { subtotal, tax, shipping, total })
    }
}

/// Sums `unit price × quantity` over the lines. Quantities come straight from the client, so an amount that does not
/// fit in an `i64` is an invalid request rather than a panic.
pub fn subtotal<I>(lines: I) -> Result<Cents, MarketplaceError>
where I: IntoIterator<Item = (Cents, i64)> {
    lines.into_iter().try_fold(Cents::default(), |acc, (unit_price, quantity)| {
        unit_price
            .checked_mul(quantity)
            .and_then(|amount| acc.checked_add(amount))
            .ok_or_else(|| MarketplaceError::InvalidRequest("The order total is too large".into()))
    })
}
