mod db;
mod rate_limit;
mod routes;
mod services;
mod state;

use std::sync::Arc;

use crate::services::auth::{AuthService, PasswordPolicy};
use crate::services::credential::{CredentialStore, MemoryCredentialStore, PgCredentialStore};
use crate::services::session::{MemorySessionStore, PgSessionStore, SessionIssuer, SessionStore};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt::init();

    let port: u16 = std::env::var("PORT")
        .unwrap_or_else(|_| "3000".into())
        .parse()
        .expect("invalid PORT");

    // DATABASE_URL selects the durable backend; without it the service runs
    // on in-memory stores, which is fine for local development only.
    let (credentials, sessions): (Arc<dyn CredentialStore>, Arc<dyn SessionStore>) =
        match std::env::var("DATABASE_URL") {
            Ok(database_url) => {
                let pool = db::init_pool(&database_url)
                    .await
                    .expect("database init failed");
                (Arc::new(PgCredentialStore::new(pool.clone())), Arc::new(PgSessionStore::new(pool)))
            }
            Err(_) => {
                tracing::warn!("DATABASE_URL not set — using in-memory stores, state is lost on restart");
                (Arc::new(MemoryCredentialStore::new()), Arc::new(MemorySessionStore::new()))
            }
        };

    let issuer = SessionIssuer::from_env(sessions);
    let auth = AuthService::new(credentials, issuer, PasswordPolicy::from_env());
    let state = state::AppState::new(auth);

    let app = routes::app(state);
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{port}"))
        .await
        .expect("failed to bind");

    tracing::info!(%port, "authgate listening");
    axum::serve(listener, app).await.expect("server failed");
}
