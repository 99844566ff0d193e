use std::io::{self, Write};
use std::path::PathBuf;

use anyhow::Context;
use clap::{ArgGroup, Parser, Subcommand};
use incident_route::view::{ReportList, WeatherWidget};
use incident_route::{
    ApiClient, App, Backend, ClientConfig, DistanceMetric, NotificationLevel, ProximityConfig,
    ReportId, RouteGeometry, Transition, DEFAULT_TOLERANCE_METERS,
};

#[derive(Parser)]
#[command(name = "incident-route")]
#[command(about = "Municipal incident reports: browse, resolve and check routes", long_about = None)]
struct Cli {
    /// Backend base URL (overrides INCIDENT_API_URL)
    #[arg(long, global = true)]
    base_url: Option<String>,
    /// Request timeout in seconds (overrides INCIDENT_API_TIMEOUT_SECS)
    #[arg(long, global = true)]
    timeout_secs: Option<u64>,
    /// Retries for GET requests (overrides INCIDENT_API_MAX_RETRIES)
    #[arg(long, global = true)]
    max_retries: Option<u32>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List active reports
    Reports,
    /// List resolved reports
    Resolved,
    /// Submit a new report
    Submit {
        #[arg(long = "type")]
        report_type: String,
        #[arg(long)]
        description: String,
        #[arg(long, allow_hyphen_values = true)]
        lat: f64,
        #[arg(long, allow_hyphen_values = true)]
        lng: f64,
        #[arg(long)]
        address: Option<String>,
    },
    /// Mark an active report as resolved
    Resolve {
        id: String,
        /// Skip the confirmation prompt
        #[arg(long)]
        yes: bool,
    },
    /// Move a resolved report back to active
    Undo {
        id: String,
        #[arg(long)]
        yes: bool,
    },
    /// Permanently delete a resolved report
    Delete {
        id: String,
        #[arg(long)]
        yes: bool,
    },
    /// List the active reports lying along a route
    #[command(group(
        ArgGroup::new("geometry")
            .args(["polyline", "points"])
            .required(true)
            .multiple(false)
    ))]
    CheckRoute {
        /// Encoded polyline (precision 5)
        #[arg(long, allow_hyphen_values = true)]
        polyline: Option<String>,
        /// JSON file holding `[[lat, lng], ...]`
        #[arg(long)]
        points: Option<PathBuf>,
        #[arg(long, env = "INCIDENT_ROUTE_TOLERANCE_METERS", default_value_t = DEFAULT_TOLERANCE_METERS)]
        tolerance_meters: f64,
        /// Measure distance on the sphere instead of in planar degrees
        #[arg(long)]
        geodesic: bool,
    },
    /// List flood risk alerts
    Alerts,
    /// Show the current forecast
    Weather,
    /// Show the client configuration served by the backend
    Config,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    let mut config = ClientConfig::from_env().context("invalid client configuration")?;
    if let Some(base_url) = cli.base_url {
        config.base_url = base_url;
    }
    if let Some(secs) = cli.timeout_secs {
        config.timeout = std::time::Duration::from_secs(secs);
    }
    if let Some(retries) = cli.max_retries {
        config.max_retries = retries;
    }
    let client = ApiClient::new(config).context("failed to build API client")?;

    match cli.command {
        Commands::Reports => {
            let mut app = App::new(client);
            let outcome = app.load_page().await;
            flush_notifications(&mut app);
            outcome.context("failed to load reports")?;
            print_list(&app.view().reports_list);
        }
        Commands::Resolved => {
            let mut app = App::new(client);
            let outcome = app.load_resolved().await;
            flush_notifications(&mut app);
            outcome.context("failed to load resolved reports")?;
            print_list(&app.view().resolved_list);
        }
        Commands::Submit {
            report_type,
            description,
            lat,
            lng,
            address,
        } => {
            let mut app = App::new(client);
            app.draft_mut().report_type = report_type;
            app.draft_mut().description = description;
            app.select_location(incident_route::GpsPoint::new(lat, lng), address);
            let outcome = app.submit().await;
            flush_notifications(&mut app);
            outcome.context("submission failed")?;
        }
        Commands::Resolve { id, yes } => {
            run_transition(client, &id, Transition::Resolve, yes).await?
        }
        Commands::Undo { id, yes } => run_transition(client, &id, Transition::Undo, yes).await?,
        Commands::Delete { id, yes } => {
            run_transition(client, &id, Transition::Delete, yes).await?
        }
        Commands::CheckRoute {
            polyline,
            points,
            tolerance_meters,
            geodesic,
        } => {
            let route = match (polyline, points) {
                (Some(encoded), _) => RouteGeometry::from_encoded_polyline(&encoded)
                    .context("invalid encoded polyline")?,
                (None, Some(path)) => {
                    let raw = std::fs::read_to_string(&path)
                        .with_context(|| format!("failed to read {}", path.display()))?;
                    let pairs: Vec<[f64; 2]> = serde_json::from_str(&raw)
                        .with_context(|| format!("{} is not a [[lat, lng], ...] array", path.display()))?;
                    RouteGeometry::from_lat_lngs(&pairs)
                        .with_context(|| format!("{} holds an invalid coordinate", path.display()))?
                }
                (None, None) => anyhow::bail!("either --polyline or --points is required"),
            };
            let proximity = ProximityConfig {
                tolerance_meters,
                metric: if geodesic {
                    DistanceMetric::Geodesic
                } else {
                    DistanceMetric::PlanarDegrees
                },
            };

            let mut app = App::with_proximity(client, proximity);
            let outcome = app.load_reports().await;
            flush_notifications(&mut app);
            outcome.context("failed to load reports")?;

            app.analyze_route(route);
            if let Some(panel) = &app.view().route_panel {
                println!("{}", panel.summary);
                print_list(&panel.list);
            }
        }
        Commands::Alerts => {
            let mut app = App::new(client);
            app.load_flood_alerts()
                .await
                .context("failed to load flood alerts")?;
            if app.view().flood_overlays.is_empty() {
                println!("Nenhum alerta de alagamento.");
            }
            for overlay in &app.view().flood_overlays {
                println!(
                    "- Risco {} em ({:.5}, {:.5}) raio {} m: {}",
                    overlay.risk_level,
                    overlay.center.latitude,
                    overlay.center.longitude,
                    overlay.radius_meters,
                    overlay.address.as_deref().unwrap_or("Não informado")
                );
            }
        }
        Commands::Weather => {
            let mut app = App::new(client);
            // The widget shows the unavailable state on failure
            let _ = app.load_weather().await;
            match &app.view().weather {
                WeatherWidget::Ready {
                    icon_url,
                    temperature,
                    description,
                } => println!("{} {} ({})", temperature, description, icon_url),
                WeatherWidget::Unavailable { message } => println!("{}", message),
                WeatherWidget::Loading => {}
            }
        }
        Commands::Config => {
            let config = client
                .map_config()
                .await
                .context("failed to load map configuration")?;
            println!("googleMapsApiKey: {}", config.google_maps_api_key);
        }
    }

    Ok(())
}

async fn run_transition(
    client: ApiClient,
    id: &str,
    transition: Transition,
    yes: bool,
) -> anyhow::Result<()> {
    let id = ReportId::from(id);
    if !yes && !confirm(transition.confirmation())? {
        println!("Cancelado.");
        return Ok(());
    }
    let mut app = App::new(client);

    // Both collections are needed to know where the report currently is
    let loaded = match app.load_reports().await {
        Ok(()) => app.load_resolved().await,
        Err(e) => Err(e),
    };
    flush_notifications(&mut app);
    loaded.context("failed to load reports")?;

    let outcome = app.transition(&id, transition).await;
    flush_notifications(&mut app);
    outcome.with_context(|| format!("{} of report {} failed", transition, id))?;
    println!("OK");
    Ok(())
}

fn confirm(prompt: &str) -> anyhow::Result<bool> {
    print!("{} [s/N] ", prompt);
    io::stdout().flush()?;
    let mut answer = String::new();
    io::stdin()
        .read_line(&mut answer)
        .context("failed to read confirmation")?;
    Ok(matches!(
        answer.trim().to_lowercase().as_str(),
        "s" | "sim" | "y" | "yes"
    ))
}

fn flush_notifications<B: Backend>(app: &mut App<B>) {
    for notification in app.take_notifications() {
        match notification.level {
            NotificationLevel::Info => println!("{}", notification.message),
            NotificationLevel::Error => eprintln!("{}", notification.message),
        }
    }
}

fn print_list(list: &ReportList) {
    if let Some(placeholder) = &list.placeholder {
        println!("{}", placeholder);
        return;
    }
    for item in &list.items {
        println!(
            "[{}] {}: {}\n    {}\n    {}",
            item.report_id, item.report_type, item.description, item.address, item.dates
        );
    }
}
