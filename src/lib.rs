// src/lib.rs

use sea_orm::DatabaseConnection;
use std::sync::Arc;

use config::AppConfig;
use services::gateway::PaymentGateway;

#[derive(Clone)]
pub struct AppState {
    pub db: DatabaseConnection,
    pub gateway: Arc<dyn PaymentGateway>,
    pub config: Arc<AppConfig>,
}

pub mod config;
pub mod error;

pub mod entities {
    pub mod prelude;
    pub mod apartments;
    pub mod beds;
    pub mod booking_orders;
    pub mod bookings;
    pub mod manual_payments;
    pub mod messages;
    pub mod payments;
    pub mod rooms;
    pub mod seller_verifications;
    pub mod users;
    pub mod webhook_events;
}

pub mod models {
    pub mod account;
    pub mod booking;
    pub mod chat;
    pub mod common;
    pub mod payment;
}

pub mod services {
    pub mod accounts;
    pub mod booking;
    pub mod gateway;
    pub mod inventory;
    pub mod manual_payment;
    pub mod messaging;
    pub mod mock_gateway;
    pub mod reconciliation;
    pub mod seller_gate;
}

pub mod handlers {
    pub mod accounts;
    pub mod admin;
    pub mod auth;
    pub mod bookings;
    pub mod chat;
    pub mod payments;
    pub mod routes;
}
