//! Re-expressing exchange rates relative to a newly promoted main coin.
//!
//! Rates are stored as "units of this coin per one unit of main". When a
//! coin with rate `k` becomes main, every other rate `r` becomes `r / k`,
//! rounded half away from zero, and the new main's own rate becomes 1.

use chrono::{DateTime, Utc};
use rust_decimal::{Decimal, RoundingStrategy};

use coinset_common::{Coin, CoinError, CoinId, CoinPatch, RateChangeReason, Result, ShortCode};

/// Divide `rate` by the promoted coin's old rate and round to `scale`
/// decimal places. Returns `None` if the divisor is not positive or the
/// division overflows.
pub fn rescale_rate(rate: Decimal, promoted_rate: Decimal, scale: u32) -> Option<Decimal> {
    if promoted_rate <= Decimal::ZERO {
        return None;
    }
    rate.checked_div(promoted_rate)
        .map(|r| r.round_dp_with_strategy(scale, RoundingStrategy::MidpointAwayFromZero))
}

/// A planned rate rewrite for one coin.
#[derive(Debug, Clone, PartialEq)]
pub struct RateChange {
    pub coin_id: CoinId,
    pub short_code: ShortCode,
    pub previous: Decimal,
    pub rescaled: Decimal,
    patch: CoinPatch,
}

impl RateChange {
    /// The update that applies this change, rate log included.
    pub fn patch(&self) -> &CoinPatch {
        &self.patch
    }
}

/// Plan the rewrite of every coin in `others` for the promotion of
/// `promoted`. Coins whose rounded rate does not change are left out.
///
/// Fails if any rate would round to zero; nothing should be written then.
pub fn plan_rescale(
    others: &[Coin],
    promoted: &Coin,
    scale: u32,
    at: DateTime<Utc>,
) -> Result<Vec<RateChange>> {
    let divisor = promoted.exchange_rate;
    let mut changes = Vec::new();

    for coin in others.iter().filter(|c| c.id != promoted.id) {
        let rescaled = rescale_rate(coin.exchange_rate, divisor, scale).ok_or_else(|| {
            CoinError::invariant(format!(
                "cannot rescale {} by rate {divisor} of {}",
                coin.short_code, promoted.short_code
            ))
        })?;

        if rescaled.is_zero() {
            return Err(CoinError::invariant(format!(
                "rate of {} rounds to zero relative to {}",
                coin.short_code, promoted.short_code
            )));
        }
        if rescaled == coin.exchange_rate {
            continue;
        }

        let reason = RateChangeReason::Rescaled {
            main: promoted.short_code.clone(),
        };
        changes.push(RateChange {
            coin_id: coin.id,
            short_code: coin.short_code.clone(),
            previous: coin.exchange_rate,
            rescaled,
            patch: CoinPatch::new()
                .rate(rescaled)
                .history(coin.history_with_current_rate(reason, at)),
        });
    }

    Ok(changes)
}

/// The update that makes `coin` main with rate 1. The old rate is logged
/// only when it was not already 1.
pub fn promotion_patch(coin: &Coin, at: DateTime<Utc>) -> CoinPatch {
    let patch = CoinPatch::new().main(true);
    if coin.exchange_rate == Decimal::ONE {
        return patch;
    }
    patch
        .rate(Decimal::ONE)
        .history(coin.history_with_current_rate(RateChangeReason::Promoted, at))
}
