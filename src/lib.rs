pub mod authentication;
pub mod configuration;
pub mod domain;
pub mod email_client;
pub mod otp_email;
pub mod otp_service;
pub mod routes;
pub mod startup;
pub mod store;
pub mod telemetry;
pub mod utils;
