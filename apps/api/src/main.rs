use std::net::SocketAddr;
use std::sync::Arc;

use dotenv::dotenv;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::{self, TraceLayer};
use tracing::{info, warn, Level};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod router;

use appointment_cell::handlers::AppointmentState;
use appointment_cell::{
    AppointmentBookingService, AppointmentStore, AvailabilityService, CaseRecordService,
    CaseRecordStore, InMemoryAppointmentStore, InMemoryCaseRecordStore, SupabaseAppointmentStore,
    SupabaseCaseRecordStore,
};
use schedule_cell::handlers::ScheduleState;
use schedule_cell::{InMemoryScheduleStore, ScheduleService, ScheduleStore, SupabaseScheduleStore};
use shared_config::AppConfig;
use shared_database::{
    InMemoryDirectory, ResourceDirectory, SchedulingLockManager, SupabaseClient, SupabaseDirectory,
};

struct Stores {
    schedules: Arc<dyn ScheduleStore>,
    appointments: Arc<dyn AppointmentStore>,
    case_records: Arc<dyn CaseRecordStore>,
    directory: Arc<dyn ResourceDirectory>,
}

fn build_stores(config: &AppConfig) -> Stores {
    if config.is_configured() {
        let supabase = Arc::new(SupabaseClient::new(config));
        Stores {
            schedules: Arc::new(SupabaseScheduleStore::new(supabase.clone())),
            appointments: Arc::new(SupabaseAppointmentStore::new(supabase.clone())),
            case_records: Arc::new(SupabaseCaseRecordStore::new(supabase.clone())),
            directory: Arc::new(SupabaseDirectory::new(supabase)),
        }
    } else {
        warn!("Supabase is not configured; scheduling data is kept in memory and lost on restart");
        Stores {
            schedules: Arc::new(InMemoryScheduleStore::new()),
            appointments: Arc::new(InMemoryAppointmentStore::new()),
            case_records: Arc::new(InMemoryCaseRecordStore::new()),
            directory: Arc::new(InMemoryDirectory::permissive()),
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,tower_http=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting clinic scheduling API server");

    let config = Arc::new(AppConfig::from_env());
    let stores = build_stores(&config);
    // Shared by every service.
    let locks = Arc::new(SchedulingLockManager::from_seconds(config.lock_timeout_seconds));

    let schedule_state = ScheduleState {
        config: config.clone(),
        service: Arc::new(ScheduleService::new(
            stores.schedules.clone(),
            stores.directory.clone(),
            locks.clone(),
        )),
    };

    let appointment_state = AppointmentState {
        config: config.clone(),
        booking: Arc::new(AppointmentBookingService::new(
            stores.appointments.clone(),
            stores.case_records.clone(),
            stores.directory.clone(),
            locks.clone(),
        )),
        availability: Arc::new(AvailabilityService::new(
            stores.schedules.clone(),
            stores.appointments.clone(),
        )),
        case_records: Arc::new(CaseRecordService::new(
            stores.case_records.clone(),
            stores.appointments.clone(),
            locks,
        )),
    };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = router::create_router(schedule_state, appointment_state)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(trace::DefaultMakeSpan::new().level(Level::INFO))
                .on_response(trace::DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(cors);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server_port));
    info!("Listening on {}", addr);

    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
