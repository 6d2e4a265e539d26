//! Application state shared across handlers.

use std::sync::Arc;

use sqlx::PgPool;

use crate::config::StorefrontConfig;
use crate::services::auth::TokenService;
use crate::services::email::EmailService;
use crate::services::payments::{PaymentGateway, StripeGateway};

/// Error building the application state.
#[derive(Debug, thiserror::Error)]
pub enum StateError {
    #[error("email transport: {0}")]
    Email(#[from] lettre::transport::smtp::Error),
}

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc` and provides access to
/// shared resources like database connections and configuration.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: StorefrontConfig,
    pool: PgPool,
    tokens: TokenService,
    email: EmailService,
    payments: Arc<dyn PaymentGateway>,
}

impl AppState {
    /// Create the production state: Stripe payments and SMTP email (when
    /// configured).
    ///
    /// # Errors
    ///
    /// Returns an error if the SMTP relay cannot be configured.
    pub fn new(config: StorefrontConfig, pool: PgPool) -> Result<Self, StateError> {
        let email = EmailService::new(config.email.as_ref())?;
        let payments = Arc::new(StripeGateway::new(&config.payments, &config.client_url));
        Ok(Self::with_services(config, pool, email, payments))
    }

    /// Create a state around explicit email and payment services.
    #[must_use]
    pub fn with_services(
        config: StorefrontConfig,
        pool: PgPool,
        email: EmailService,
        payments: Arc<dyn PaymentGateway>,
    ) -> Self {
        let tokens = TokenService::new(&config.tokens);
        Self {
            inner: Arc::new(AppStateInner {
                config,
                pool,
                tokens,
                email,
                payments,
            }),
        }
    }

    /// Get a reference to the storefront configuration.
    #[must_use]
    pub fn config(&self) -> &StorefrontConfig {
        &self.inner.config
    }

    /// Get a reference to the database connection pool.
    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.inner.pool
    }

    /// Access and refresh token issuer.
    #[must_use]
    pub fn tokens(&self) -> &TokenService {
        &self.inner.tokens
    }

    #[must_use]
    pub fn email(&self) -> &EmailService {
        &self.inner.email
    }

    /// Checkout session provider.
    #[must_use]
    pub fn payments(&self) -> &dyn PaymentGateway {
        self.inner.payments.as_ref()
    }
}
