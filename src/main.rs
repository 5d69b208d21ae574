mod config;
mod db;
mod error;
mod rate_limit;
mod routes;
mod services;
mod state;

use tracing_subscriber::EnvFilter;

use crate::config::{Config, MailConfig, MediaConfig, PaymentConfig};
use crate::services::auth::GoogleConfig;
use crate::services::media::MediaClient;
use crate::services::payment::PaymentClient;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // A missing .env file is normal in production.
    let _ = dotenvy::dotenv();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("storefront=info,tower_http=info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config = Config::from_env()?;
    let port = config.port;
    let pool = db::init_pool(&config.database_url, config.db_max_connections).await?;

    let google = GoogleConfig::from_env();
    if google.is_none() {
        tracing::warn!("GOOGLE_CLIENT_ID/SECRET/REDIRECT_URI not set; Google sign-in disabled");
    }
    let payments = PaymentConfig::from_env().map(PaymentClient::from);
    if payments.is_none() {
        tracing::warn!("PAYMENT_KEY_ID/SECRET not set; checkout disabled");
    }
    let media = MediaConfig::from_env().map(MediaClient::from);
    if media.is_none() {
        tracing::warn!("MEDIA_CLOUD_NAME/API_KEY/API_SECRET not set; image uploads disabled");
    }
    let mail = MailConfig::from_env();
    if mail.is_none() {
        tracing::warn!("RESEND_API_KEY/RESEND_FROM not set; login codes will not be mailed");
    }

    let state = state::AppState::new(pool, config)
        .with_google(google)
        .with_payments(payments)
        .with_media(media)
        .with_mail(mail);

    let _sweeper = services::sweeper::spawn_sweeper(state.clone());

    let app = routes::app(state);
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{port}")).await?;

    tracing::info!(%port, "storefront listening");
    axum::serve(listener, app).await?;
    Ok(())
}
