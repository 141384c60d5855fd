//! Choosing the currency for a unit of work.
//!
//! Candidates are tried in priority order; the first one that names an
//! active coin wins. Otherwise the main coin is used, and if the set has
//! no main coin, the configured fallback code. Resolution never fails.

use serde::Serialize;
use tracing::{debug, instrument, warn};

use coinset_common::ShortCode;
use coinset_store::CoinCache;

use crate::config::FxConfig;
use crate::context::{CandidateSource, CurrencyContext};

/// Outcome of a resolution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Resolution {
    pub code: ShortCode,
    pub source: CandidateSource,
}

/// Picks the current currency from ordered candidates.
#[derive(Debug, Clone)]
pub struct CurrencyResolver {
    fallback: ShortCode,
}

impl CurrencyResolver {
    pub fn new(config: &FxConfig) -> Self {
        Self {
            fallback: config.fallback_currency.clone(),
        }
    }

    /// Resolve the candidates of a context.
    #[instrument(skip_all)]
    pub async fn resolve(&self, cache: &CoinCache, context: &CurrencyContext) -> Resolution {
        self.resolve_candidates(cache, context.candidates()).await
    }

    /// Resolve a plain ordered list of optional codes.
    pub async fn resolve_codes(&self, cache: &CoinCache, codes: &[Option<&str>]) -> ShortCode {
        let candidates = codes.iter().map(|code| (CandidateSource::Override, *code));
        self.resolve_candidates(cache, candidates).await.code
    }

    /// Resolve labelled candidates, highest priority first.
    pub async fn resolve_candidates<'a, I>(&self, cache: &CoinCache, candidates: I) -> Resolution
    where
        I: IntoIterator<Item = (CandidateSource, Option<&'a str>)>,
    {
        let parsed: Vec<(CandidateSource, ShortCode)> = candidates
            .into_iter()
            .filter_map(|(source, raw)| match ShortCode::parse(raw?) {
                Ok(code) => Some((source, code)),
                Err(err) => {
                    debug!(?source, error = %err, "Ignoring malformed currency candidate");
                    None
                }
            })
            .collect();

        if parsed.len() > 1 {
            if let Err(err) = cache.warm(parsed.iter().map(|(_, code)| code.clone())).await {
                warn!(error = %err, "Could not warm coin cache for candidates");
            }
        }

        for (source, code) in parsed {
            match cache.by_code(&code).await {
                Ok(Some(coin)) if coin.active => {
                    debug!(code = %coin.short_code, ?source, "Currency resolved");
                    return Resolution {
                        code: coin.short_code,
                        source,
                    };
                }
                Ok(Some(_)) => debug!(code = %code, ?source, "Candidate coin is inactive"),
                Ok(None) => debug!(code = %code, ?source, "Candidate coin is unknown"),
                Err(err) => warn!(code = %code, error = %err, "Candidate lookup failed"),
            }
        }

        match cache.main().await {
            Ok(Some(main)) => Resolution {
                code: main.short_code,
                source: CandidateSource::Main,
            },
            Ok(None) => {
                warn!(fallback = %self.fallback, "No main coin, using fallback currency");
                self.fallback()
            }
            Err(err) => {
                warn!(error = %err, fallback = %self.fallback, "Main coin lookup failed");
                self.fallback()
            }
        }
    }

    fn fallback(&self) -> Resolution {
        Resolution {
            code: self.fallback.clone(),
            source: CandidateSource::Fallback,
        }
    }
}
