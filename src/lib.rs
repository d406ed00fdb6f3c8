//! # smsproxy
//!
//! Proxies free-form text messages to a carrier SMS gateway.
//!
//! ## Features
//!
//! - **Concatenated SMS**: bodies over 160 characters are split into 153
//!   character parts, each carrying a user data header the handset uses to
//!   reassemble them
//! - **Rate limited dispatch**: one worker sends every part under a shared
//!   token bucket (one part per second by default)
//! - **Aggregated outcome**: callers wait for a single `Success`/`Failed`
//!   result covering all parts of their message
//! - **Comprehensive configuration**: file and environment based configuration
//! - **Observability**: structured logging via `tracing`
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use smsproxy::prelude::*;
//! use sms_messagebird::MessageBirdClient;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = AppConfig::load()?;
//!     let carrier = Arc::new(MessageBirdClient::new(config.carrier.access_key.clone()));
//!     let limiter = rate_limiter::from_config(&config.rate_limit);
//!     let (dispatcher, worker) = Dispatcher::spawn(carrier, limiter, &config.dispatch);
//!
//!     let outcome = dispatcher
//!         .submit(Message::new("MessageBird", "31612345678", "Hello from smsproxy!"))
//!         .await?;
//!     println!("{}", serde_json::to_string(&outcome)?);
//!
//!     dispatcher.stop();
//!     worker.await?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod dispatch;
pub mod logging;
pub mod rate_limiter;

pub use config::*;

/// Common imports for smsproxy usage
pub mod prelude {
    pub use crate::config::{
        AppConfig, CarrierConfig, DispatchConfig, LoggingConfig, RateLimitConfig, ServerConfig,
    };
    pub use crate::dispatch::Dispatcher;
    pub use crate::rate_limiter::{
        self, RateLimitResult, RateLimiter, TokenSource, Unlimited,
    };
    pub use sms_core::*;
}
