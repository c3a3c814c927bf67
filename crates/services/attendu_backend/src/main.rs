// File: services/attendu_backend/src/main.rs
use axum::{routing::get, Router};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use attendu_attendance::handlers::AttendanceState;
use attendu_attendance::pipeline::{NotificationDispatcher, SharedDirectory, SharedWriter};
use attendu_attendance::sweep::PendingSweep;
use attendu_config::load_config;
use attendu_store::{
    FirestoreAttendanceRepository, FirestoreClient, FirestoreDirectory,
    FirestoreNotificationWriter,
};

#[tokio::main]
async fn main() {
    attendu_common::logging::init();

    let config = Arc::new(load_config().expect("Failed to load config"));

    let firestore_config = config
        .firestore
        .clone()
        .expect("Missing [firestore] configuration");
    let store = Arc::new(
        FirestoreClient::new(firestore_config).expect("Failed to create Firestore client"),
    );

    let timezone: chrono_tz::Tz = config
        .attendance
        .timezone
        .parse()
        .expect("Invalid attendance.timezone");

    let directory: SharedDirectory = Arc::new(FirestoreDirectory::new(store.clone(), timezone));
    let writer: SharedWriter = Arc::new(FirestoreNotificationWriter::new(store.clone()));
    let repository: attendu_attendance::handlers::SharedRepository =
        Arc::new(FirestoreAttendanceRepository::new(store.clone()));

    let dispatcher = Arc::new(NotificationDispatcher::new(
        directory,
        writer,
        timezone,
        config.attendance.absence_alert_threshold,
    ));

    let state = Arc::new(AttendanceState {
        dispatcher: dispatcher.clone(),
        repository: repository.clone(),
    });

    let api_router = Router::new().route("/", get(|| async { "Welcome to AttendU API!" }));
    let attendance_router = attendu_attendance::routes(state);

    let api_router = Router::new().nest("/api", api_router.merge(attendance_router));

    // The delivery surface runs on another origin; CORS stays open here and
    // access control lives with authentication, which is out of this
    // service's scope.
    #[allow(unused_mut)] // for the openapi feature it needs to be mutable
    let mut app = api_router
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    // Conditionally add Swagger UI and JSON endpoint if openapi feature enabled
    #[cfg(feature = "openapi")]
    {
        use attendu_attendance::doc::AttendanceApiDoc;
        use utoipa::OpenApi;
        use utoipa_swagger_ui::SwaggerUi;

        let openapi_doc = AttendanceApiDoc::openapi();
        println!("📖 Adding Swagger UI at /api/docs");

        let swagger_ui =
            SwaggerUi::new("/api/docs").url("/api/docs/openapi.json", openapi_doc.clone());
        app = app.merge(swagger_ui);
    }

    if config.attendance.enable_sweep {
        let sweep = PendingSweep::new(
            repository,
            dispatcher,
            config.attendance.pending_recheck_minutes,
        );
        let period = Duration::from_secs(config.attendance.sweep_interval_secs);
        println!("Pending sweep enabled, every {}s", period.as_secs());
        tokio::spawn(async move {
            sweep.run(period).await;
        });
    }

    // Bind and serve
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = TcpListener::bind(&addr).await.unwrap();
    println!("Starting server at http://{}", addr);
    println!("API endpoints available at http://{}/api", addr);

    axum::serve(listener, app.into_make_service())
        .await
        .unwrap();
}
