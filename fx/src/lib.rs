//! Coinset FX
//!
//! Display-side currency handling for one unit of work: choosing the
//! current currency, converting minor-unit amounts between coins and
//! rendering them with the coin's symbol.
//!
//! # Example
//!
//! ```rust,ignore
//! use coinset_fx::{CurrencyContext, CurrencyService, FxConfig, UnitOfWork};
//!
//! let service = CurrencyService::new(FxConfig::default());
//! let uow = UnitOfWork::new(store.clone(), CurrencyContext::new().with_header("EUR"));
//!
//! let cents = service.convert_amount(&uow, 150_000, None, None).await;
//! let text = service.format_current(&uow, cents).await;
//! ```

pub mod capabilities;
pub mod config;
pub mod context;
pub mod conversion;
pub mod engine;
pub mod error;
pub mod format;
pub mod resolver;

pub use capabilities::{CapabilityProvider, CapabilityRegistry};
pub use config::FxConfig;
pub use context::{CandidateSource, CurrencyContext, UnitOfWork};
pub use conversion::{convert_minor_units, effective_rate};
pub use engine::{CurrencyService, ServiceStats};
pub use error::{FxError, FxResult};
pub use format::{format_coin, format_unknown, format_with_symbol};
pub use resolver::{CurrencyResolver, Resolution};
