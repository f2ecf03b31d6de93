use std::{process::ExitCode, sync::Arc};

use tasktrack_server::{
    app_state::{AppState, SharedState},
    auth::ensure_default_user,
    data_access::data_context::DataContext,
    map_routes,
    media_service::MediaStore,
    notification_service::mailer_from_settings,
    settings::Settings,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer());

    #[cfg(feature = "console")]
    let registry = registry.with(console_subscriber::spawn());

    registry.init();
}

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing();

    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "server stopped");
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    // ── Settings ───────────────────────────────────────────────
    let settings = Settings::load()?;

    // ── Data store ─────────────────────────────────────────────
    let data_context = DataContext::open(&settings.database_path)?;

    if ensure_default_user(&data_context, &settings)? {
        tracing::info!(
            username = %settings.default_admin_username,
            "created default admin user"
        );
    }

    tracing::info!(
        tasks = data_context.list_tasks()?.len(),
        users = data_context.list_users()?.len(),
        path = %settings.database_path,
        "data store opened"
    );

    // ── Shared state ───────────────────────────────────────────
    let mailer = mailer_from_settings(&settings)?;
    let state: SharedState = Arc::new(AppState {
        data_context,
        media: MediaStore::new(settings.media_root.clone()),
        mailer,
        settings,
    });

    // ── Router ─────────────────────────────────────────────────
    let address = state.settings.bind_address();
    let app = map_routes(state);

    // ── Start ──────────────────────────────────────────────────
    let listener = tokio::net::TcpListener::bind(&address).await?;
    tracing::info!(%address, "server listening");

    axum::serve(listener, app).await?;
    Ok(())
}
