//! Domain services used by the HTTP routes.
//!
//! ARCHITECTURE
//! ============
//! Service modules own business logic and persistence concerns so route
//! handlers can stay focused on request parsing, auth and cookies.
//! Outbound integrations (payment gateway, image host, OAuth, mail) live
//! here too, behind plain functions or small clients.

pub mod auth;
pub mod cart;
pub mod catalog;
pub mod email_auth;
pub mod inventory;
pub mod media;
pub mod order;
pub mod payment;
pub mod pricing;
pub mod session;
pub mod sweeper;
