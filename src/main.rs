use actix_web::{web, App, HttpServer};
use clap::Parser;
use geminichat::api::middleware::{cors, UserAuth};
use geminichat::auth::build_resolver;
use geminichat::chat::ChatService;
use geminichat::cli::{commands::{Cli, Commands}, run_cli};
use geminichat::config::AppConfig;
use geminichat::{db, llm};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    if !matches!(cli.command, Commands::Serve) {
        if let Err(e) = run_cli(cli.command, cli.config).await {
            error!("{:#}", e);
            std::process::exit(1);
        }
        return Ok(());
    }

    info!("Starting Gemini Chatbot Backend...");

    let config = match AppConfig::load(&cli.config) {
        Ok(c) => c,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    let db_pool = match db::get_connection(&config.database) {
        Ok(pool) => pool,
        Err(e) => {
            error!("Failed to initialize database: {}", e);
            std::process::exit(1);
        }
    };

    let llm_provider = match llm::create_provider(&config.gemini) {
        Ok(p) => p,
        Err(e) => {
            error!("Failed to initialize Gemini provider: {}", e);
            std::process::exit(1);
        }
    };

    let resolver = build_resolver(&config.auth);
    let chat = ChatService::new(db_pool, llm_provider, config.chat.clone());

    let host = config.server.host.clone();
    let port = config.server.port;
    let server_config = config.server.clone();

    info!("Server listening on {}:{} (model {})", host, port, config.gemini.model);

    HttpServer::new(move || {
        App::new()
            .app_data(web::Data::new(chat.clone()))
            .app_data(web::Data::new(resolver.clone()))
            .wrap(UserAuth)
            .wrap(cors(&server_config))
            .configure(geminichat::api::configure)
    })
    .bind((host, port))?
    .run()
    .await
}
