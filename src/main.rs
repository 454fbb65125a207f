mod context;
mod effects;
mod error;
mod handlers;
mod mailer;
mod middlewares;
pub mod models;
pub mod request;
pub mod resolver;
pub mod response;

use actix_web::web::{get, post, put, resource, scope, Data};
use actix_web::HttpServer;
use sqlx::postgres::PgPoolOptions;

use mailer::LogMailer;
use middlewares::jwt::{Jwt, JWT_SECRET};
use resolver::PgRecipientResolver;

#[actix_web::main]
async fn main() -> Result<(), std::io::Error> {
    dotenv::dotenv().ok();
    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "info,actix_web=info");
    }
    env_logger::init();
    let secret = dotenv::var(JWT_SECRET).expect("environment variable JWT_SECRET not been set");
    let database_url = dotenv::var("DATABASE_URL").expect("environment variable DATABASE_URL not been set");
    let bind_addr = dotenv::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:8000".into());
    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&database_url)
        .await
        .expect("failed to connect to database");
    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("failed to run database migrations");
    HttpServer::new(move || {
        actix_web::App::new()
            .wrap(actix_web::middleware::Logger::default())
            .app_data(Data::new(pool.clone()))
            .app_data(Data::new(LogMailer))
            .app_data(Data::new(PgRecipientResolver::new(pool.clone())))
            .service(
                scope("/api")
                    .service(resource("/login").route(post().to(handlers::login)))
                    .service(resource("/signup").route(post().to(handlers::signup)))
                    .service(
                        scope("")
                            .wrap(Jwt::new(secret.as_bytes().to_owned()))
                            .service(
                                scope("/applications")
                                    .route("", post().to(handlers::application::create))
                                    .route("", get().to(handlers::application::list)),
                            )
                            .service(
                                scope("/notifications")
                                    .route("", get().to(handlers::notification::list_own))
                                    .route("/{notification_id}/read", put().to(handlers::notification::mark_read))
                                    .route("/{notification_id}/click", put().to(handlers::notification::mark_clicked)),
                            )
                            .service(
                                scope("/payments")
                                    .service(
                                        resource("/verify")
                                            .route(post().to(handlers::payment::verify::<LogMailer>))
                                            .route(get().to(handlers::payment::list)),
                                    )
                                    .route("/verify/{application_id}/logs", get().to(handlers::payment::logs)),
                            )
                            .service(
                                scope("/admin").service(
                                    resource("/notifications")
                                        .route(post().to(handlers::notification::broadcast::<LogMailer, PgRecipientResolver>))
                                        .route(get().to(handlers::notification::broadcast_list)),
                                ),
                            ),
                    ),
            )
    })
    .bind(bind_addr)?
    .run()
    .await
}
