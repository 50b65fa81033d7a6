use axum::Router;
use daq_gateway::api::rest::{create_api_routes, SharedAppState};
use daq_gateway::config::settings::Settings;
use daq_gateway::drivers::simulated::SimulatedDriver;
use daq_gateway::drivers::traits::{DriverReading, EquipmentDriver, TagRequest};
use daq_gateway::logging::init_logging;
use daq_gateway::sender::channel::{log_batch, run_publisher, ChannelMessageSender};
use daq_gateway::sender::statistics::{ActivityRecorder, FilterStatistics};
use daq_gateway::sender::Dispatcher;
use daq_gateway::tags::engine::TagEngine;
use daq_gateway::tags::structures::{quality_code, Quality, TagId};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::sync::mpsc::unbounded_channel;
use tokio::sync::RwLock;
use tokio::time::{interval, Duration, Instant};
use tracing::{debug, error, info, warn};

const PUBLISH_BATCH_SIZE: usize = 100;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // --- Load Configuration ---
    let config_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("daq.toml"));
    let settings = match Settings::load(&config_path) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("FATAL: Failed to load configuration from {:?}: {}", config_path, e);
            std::process::exit(1);
        }
    };

    init_logging(&settings.logging.level, None);
    info!("DAQ Gateway starting...");
    let start_time = Instant::now();
    info!(
        "Configuration loaded: {} equipment, {} tags",
        settings.equipment.len(),
        settings.tags.len()
    );

    // --- Register Tags ---
    let tag_engine = Arc::new(TagEngine::new());
    for tag_config in settings.registrable_tags() {
        info!(
            "Registering tag #{} '{}' (Equipment: {}, Address: {})",
            tag_config.id, tag_config.name, tag_config.equipment_id, tag_config.address
        );
        tag_engine.register_tag(tag_config.to_snapshot());
    }
    info!("{} tags registered.", tag_engine.len());

    // --- Collaborators and Dispatcher ---
    let (message_sender, updates_rx) = ChannelMessageSender::new();
    tokio::spawn(run_publisher(updates_rx, PUBLISH_BATCH_SIZE, log_batch));

    let filter_stats = if settings.filter.enabled {
        let (tx, mut rx) = unbounded_channel();
        tokio::spawn(async move {
            while let Some(filtered) = rx.recv().await {
                debug!("filtered: {:?}", filtered);
            }
        });
        Arc::new(FilterStatistics::with_forward(tx))
    } else {
        Arc::new(FilterStatistics::new())
    };

    let dispatcher = Arc::new(Dispatcher::new(
        Arc::clone(&tag_engine),
        Arc::new(message_sender),
        filter_stats.clone(),
        Arc::new(ActivityRecorder::new()),
        Handle::current(),
    ));

    // --- Initialize Drivers ---
    let mut drivers: HashMap<String, Arc<dyn EquipmentDriver>> = HashMap::new();
    for equipment in &settings.equipment {
        info!("Initializing equipment: {} ({})", equipment.name, equipment.id);
        let driver: Arc<dyn EquipmentDriver> = Arc::new(SimulatedDriver::new(equipment.clone()));
        if let Err(e) = driver.connect().await {
            error!("Failed to connect equipment '{}': {}", equipment.id, e);
        }
        drivers.insert(equipment.id.clone(), driver);
    }
    let drivers = Arc::new(drivers);

    // --- Start Acquisition Loops ---
    for (equipment_id, driver) in drivers.iter() {
        let tags: Vec<(TagId, String)> = tag_engine
            .all_snapshots()
            .into_iter()
            .filter(|tag| &tag.equipment_id == equipment_id)
            .map(|tag| (tag.id, tag.driver_address))
            .collect();
        if tags.is_empty() {
            warn!("Equipment '{}' has no tags, not polling it.", equipment_id);
            continue;
        }
        tokio::spawn(acquisition_loop(Arc::clone(driver), tags, Arc::clone(&dispatcher)));
    }

    // --- Start API Server ---
    let bind = settings.server.bind.clone();
    let app_state = SharedAppState {
        tag_engine: Arc::clone(&tag_engine),
        dispatcher: Arc::clone(&dispatcher),
        filter_stats,
        start_time,
        settings: Arc::new(RwLock::new(settings)),
        drivers: Arc::clone(&drivers),
    };
    let app: Router = create_api_routes().with_state(app_state);

    let addr: SocketAddr = bind.parse()?;
    info!("API server listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Polls one equipment at its scan rate and feeds every reading to the dispatcher.
async fn acquisition_loop(driver: Arc<dyn EquipmentDriver>, tags: Vec<(TagId, String)>, dispatcher: Arc<Dispatcher>) {
    let equipment_id = driver.config().id.clone();
    let scan_rate = Duration::from_millis(driver.config().scan_rate_ms.max(1));
    let requests: Vec<TagRequest> = tags
        .iter()
        .map(|(_, address)| TagRequest {
            address: address.clone(),
        })
        .collect();
    info!(
        "Polling equipment '{}' every {}ms ({} tags)",
        equipment_id,
        scan_rate.as_millis(),
        tags.len()
    );

    let mut ticker = interval(scan_rate);
    loop {
        ticker.tick().await;
        match driver.read_tags(&requests).await {
            Ok(results) => {
                for (tag_id, address) in &tags {
                    match results.get(address).cloned() {
                        Some(DriverReading::Value {
                            value,
                            description,
                            timestamp,
                        }) => {
                            dispatcher.send_update(*tag_id, Some(value), description.as_deref(), Quality::ok(), Some(timestamp));
                        }
                        Some(DriverReading::Invalid {
                            quality_code: code,
                            description,
                        }) => {
                            dispatcher.send_invalid(*tag_id, code, Some(&description), None);
                        }
                        None => {
                            dispatcher.send_invalid(*tag_id, quality_code::UNKNOWN, Some("No reading returned"), None);
                        }
                    }
                }
            }
            Err(e) => {
                error!("Failed to read tags from equipment '{}': {}", equipment_id, e);
                for (tag_id, _) in &tags {
                    dispatcher.send_invalid(*tag_id, quality_code::DATA_UNAVAILABLE, Some(&e.to_string()), None);
                }
            }
        }
    }
}
