use std::time::Duration;

use crate::{config::Settings, error, info, server, warning};

/// Runs the API server until Ctrl-C. With `open`, the trending playlists
/// endpoint is opened in the default browser once the server is up.
pub async fn serve(settings: Settings, open: bool) {
    if settings.secret_key.is_none() {
        error!("SECRET_KEY must be set to run the server.");
    }

    let url = format!("http://{}/api/playlists/public/trending/", settings.server_addr);
    info!("Serving on http://{}", settings.server_addr);

    if open {
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(500)).await;
            if let Err(e) = webbrowser::open(&url) {
                warning!("Cannot open browser. Err: {}", e);
            }
        });
    }

    if let Err(e) = server::start_api_server(settings).await {
        error!("Server stopped with an error. Err: {}", e);
    }
}
