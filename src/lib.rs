pub mod config;
pub mod db;
pub mod domain;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod rails;
pub mod services;

use axum::{
    Router,
    routing::{get, post},
};
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::rails::{MpesaClient, PayPalClient, RateClient};
use crate::services::Reconciler;

#[derive(Clone)]
pub struct AppState {
    pub db: sqlx::PgPool,
    pub config: Config,
    pub mpesa: MpesaClient,
    pub paypal: PayPalClient,
    pub rates: RateClient,
    pub reconciler: Reconciler,
}

impl AppState {
    pub fn new(db: sqlx::PgPool, config: Config) -> Self {
        let mpesa = MpesaClient::new(config.mpesa_api_url.clone(), config.mpesa_api_key.clone());
        let paypal = PayPalClient::new(
            config.paypal_api_url.clone(),
            config.paypal_client_id.clone(),
            config.paypal_client_secret.clone(),
        );
        let rates = RateClient::new(
            config.exchange_rate_url.clone(),
            config.usd_kes_fallback_rate,
        );
        let reconciler = Reconciler::new(db.clone());

        Self {
            db,
            config,
            mpesa,
            paypal,
            rates,
            reconciler,
        }
    }
}

pub fn create_app(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/payments/mpesa/topup", post(handlers::topup::mpesa_topup))
        .route(
            "/payments/card/checkout",
            post(handlers::checkout::card_checkout),
        )
        .route(
            "/payments/card/capture",
            post(handlers::checkout::card_capture),
        )
        .route("/payments/webhook", post(handlers::webhook::rail_callback))
        .route(
            "/payments/status/:reference",
            get(handlers::webhook::payment_status),
        )
        .route("/wallet", get(handlers::wallet::get_wallet))
        .route(
            "/subscriptions/checkout",
            post(handlers::subscriptions::checkout),
        )
        .route("/subscriptions/pay", post(handlers::subscriptions::pay))
        .route(
            "/withdrawals",
            post(handlers::withdrawals::request_withdrawal),
        )
        .route("/admin/payments", get(handlers::admin::list_payments))
        .route(
            "/admin/withdrawals/approve",
            post(handlers::admin::approve_withdrawal),
        )
        .route(
            "/admin/accounts/approve",
            post(handlers::admin::approve_account),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
