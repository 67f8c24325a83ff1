use tracing::{error, info};
use tracing_subscriber::EnvFilter;
use yatube::{AppState, config::Config, router};

#[tokio::main]
async fn main() -> std::io::Result<()> {
    dotenvy::dotenv().ok();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .compact()
        .init();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("Invalid configuration: {}", e);
            std::process::exit(1);
        }
    };

    let addr = config.bind_addr.clone();
    let app = router(AppState::new(config));

    // Start server
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    info!("Server running on http://{}", addr);
    info!("Endpoints:");
    info!("  GET       /                              - All posts (cached)");
    info!("  GET       /group/{{slug}}/                 - Posts in a group");
    info!("  GET       /profile/{{username}}/           - Posts by an author");
    info!("  GET       /posts/{{id}}/                   - Post with comments");
    info!("  GET       /follow/                       - Posts by followed authors (auth)");
    info!("  GET/POST  /create/                       - New post (auth)");
    info!("  GET/POST  /posts/{{id}}/edit/              - Edit post (auth, owner only)");
    info!("  DELETE    /posts/{{id}}/                   - Delete post (auth, owner only)");
    info!("  POST      /posts/{{id}}/comment/           - Comment (auth)");
    info!("  GET/POST  /profile/{{username}}/follow/    - Follow (auth)");
    info!("  GET/POST  /profile/{{username}}/unfollow/  - Unfollow (auth)");
    info!("  GET/POST  /create_group/                 - New group (auth)");
    info!("  POST      /auth/signup/  /auth/login/    - Accounts");

    axum::serve(listener, app).await
}
