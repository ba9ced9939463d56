use actix_web::middleware::NormalizePath;
use actix_web::web::Data;
use actix_web::{App, HttpServer, Responder, get};
use std::sync::Arc;

mod api;
mod auth;
mod config;
mod db;
mod docs;
mod model;
mod models;
mod notify;
mod routes;
mod seed;
mod store;
mod workflow;

use config::Config;
use db::init_db;

use crate::docs::ApiDoc;
use crate::notify::{EmailSender, LogMailer, PushHub, RelayMailer};
use crate::routes::Limiters;
use crate::store::{MySqlStore, Stores, UserStore};
use crate::workflow::ApprovalWorkflow;
use anyhow::Context;
use tracing::{info, warn};
use tracing_appender::rolling;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[get("/")]
async fn index() -> impl Responder {
    "Leave approval service"
}

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env()?;

    // Rolling daily log
    let file_appender = rolling::daily("logs", "app.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::fmt()
        .with_writer(non_blocking)
        .with_max_level(tracing::Level::DEBUG)
        .with_ansi(false)
        .with_target(false)
        .with_level(true)
        .with_thread_ids(false)
        .with_thread_names(false)
        .pretty()
        .init();

    info!("Server starting...");

    let pool = init_db(&config.database_url, config.collaborator_timeout())
        .await
        .context("connecting to database")?;
    let stores = Stores::shared(Arc::new(MySqlStore::new(pool)));

    if let (Some(email), Some(password)) = (&config.seed_admin_email, &config.seed_admin_password)
    {
        seed::seed_admin(stores.users.as_ref(), email, password).await?;
    }

    let hub = Arc::new(PushHub::new(config.push_buffer));
    let mailer: Arc<dyn EmailSender> = match &config.mail_relay_url {
        Some(url) => {
            let client = reqwest::Client::builder()
                .timeout(config.collaborator_timeout())
                .build()
                .context("building mail relay client")?;
            Arc::new(RelayMailer::new(client, url.clone(), config.mail_from.clone()))
        }
        None => {
            warn!("MAIL_RELAY_URL not set; audit emails are only logged");
            Arc::new(LogMailer::new(config.mail_from.clone()))
        }
    };

    let workflow = Data::new(ApprovalWorkflow::new(
        stores.clone(),
        hub.clone(),
        mailer,
        config.workflow_settings(),
    ));
    let users: Data<dyn UserStore> = Data::from(stores.users.clone());
    let hub = Data::from(hub);
    let limiters = Limiters::from_config(&config)?;

    info!(
        addr = %config.server_addr,
        routing = %config.routing_policy,
        "Approval workflow ready"
    );

    let server_addr = config.server_addr.clone();
    let config_data = Data::new(config);

    HttpServer::new(move || {
        App::new()
            .wrap(actix_web::middleware::Logger::default())
            .wrap(NormalizePath::trim())
            .service(
                SwaggerUi::new("/swagger-ui/{_:.*}")
                    .url("/api-doc/openapi.json", ApiDoc::openapi()),
            )
            .app_data(config_data.clone())
            .app_data(workflow.clone())
            .app_data(users.clone())
            .app_data(hub.clone())
            .service(index)
            // auth + protected routes with rate limiting
            .configure(|cfg| routes::configure(cfg, &config_data, &limiters))
    })
    .bind(server_addr)?
    .run()
    .await?;

    Ok(())
}
