mod fixture;
mod render;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use apim_widgets::catalog::{ApiCatalogClient, HttpApiCatalogClient};
use apim_widgets::channel::ParameterMessage;
use apim_widgets::config::{DirectoryConfigSource, RuntimeConfig};
use apim_widgets::projection::Granularity;
use apim_widgets::query::{ApiSelection, Dimension, Selection};
use apim_widgets::state::params::ERROR_ANALYSIS_KEY;
use apim_widgets::state::LimitParams;
use apim_widgets::table::TableViewState;
use apim_widgets::widget::ApiErrorAnalysis;
use apim_widgets::{WidgetRegistry, WidgetServices, WidgetShell};
use apim_widgets_api::WidgetStatus;
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

use fixture::Fixture;

/// Default filter keeps HTTP client chatter out of the widget logs.
fn default_env_filter(verbose: u8) -> EnvFilter {
    let widgets = if verbose == 0 { "debug" } else { "trace" };
    EnvFilter::new(format!("info,reqwest=warn,hyper=warn,apim_widgets={}", widgets))
}

#[derive(Parser)]
#[command(name = "apim-widgets")]
#[command(version, about = "Run APIM analytics widgets from the terminal")]
struct Cli {
    /// Directory holding <widget>/widgetConf.json
    #[arg(long, env = "APIM_WIDGET_CONFIG_DIR", global = true)]
    config_dir: Option<PathBuf>,

    /// Trace widget internals (-v)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the available widgets
    List,

    /// List APIs from the analytics REST API (APIM_ANALYTICS_URL)
    Apis,

    /// Mount a widget, publish parameters and print the view it settles on
    Run(RunArgs),
}

#[derive(clap::Args)]
struct RunArgs {
    /// Widget id, e.g. APIMTopFaultyApis
    widget: String,

    /// Canned query rows and API list. Without APIs in it the catalog is
    /// fetched from APIM_ANALYTICS_URL when set
    #[arg(long)]
    data: PathBuf,

    /// Range start, RFC 3339 (default: 24 hours before --to)
    #[arg(long)]
    from: Option<DateTime<Utc>>,

    /// Range end, RFC 3339 (default: now)
    #[arg(long)]
    to: Option<DateTime<Utc>>,

    #[arg(long, default_value = "hour")]
    granularity: String,

    /// Selected API as NAME or NAME:VERSION; repeatable (default: All)
    #[arg(long = "api")]
    apis: Vec<String>,

    /// Row limit persisted for the widget
    #[arg(long)]
    limit: Option<String>,

    /// Resource selected in the error analysis widget, "TEMPLATE (METHOD)"
    #[arg(long)]
    resource: Option<String>,

    /// Column to sort the table by
    #[arg(long, default_value = "apiname")]
    sort: String,

    /// Search text applied to the table
    #[arg(long)]
    search: Option<String>,

    #[arg(long, default_value = "0")]
    page: usize,

    #[arg(long, value_enum, default_value = "table")]
    format: OutputFormat,
}

#[derive(Clone, Copy, Default, ValueEnum)]
enum OutputFormat {
    #[default]
    Table,
    Json,
}

fn parse_selection(raw: &str) -> Selection {
    match raw.split_once(':') {
        Some((name, version)) => ApiSelection::new(name).with_version(version).into(),
        None if raw.eq_ignore_ascii_case("all") => Selection::all(),
        None => ApiSelection::new(raw).into(),
    }
}

fn runtime_config(cli: &Cli) -> Result<RuntimeConfig> {
    let mut runtime = RuntimeConfig::from_env()?;
    if let Some(dir) = &cli.config_dir {
        runtime = runtime.with_widget_config_dir(dir.clone());
    }
    Ok(runtime)
}

fn http_catalog(runtime: &RuntimeConfig) -> Result<HttpApiCatalogClient> {
    let Some(url) = &runtime.analytics_url else {
        bail!("APIM_ANALYTICS_URL is not set");
    };
    Ok(HttpApiCatalogClient::new(url)?)
}

async fn list_apis(runtime: &RuntimeConfig) -> Result<()> {
    let client = http_catalog(runtime)?;
    let apis = match client.list_apis().await {
        Ok(apis) => apis,
        Err(e) => bail!(e.display_message()),
    };
    let mut table = comfy_table::Table::new();
    table.set_header(vec!["Name", "Version", "Provider"]);
    for api in apis {
        table.add_row(vec![api.name, api.version, api.provider.unwrap_or_default()]);
    }
    println!("{}", table);
    Ok(())
}

async fn run(runtime: RuntimeConfig, args: RunArgs) -> Result<()> {
    let registry = WidgetRegistry::builtin();
    let Some(widget) = registry.get(&args.widget) else {
        bail!(
            "Unknown widget '{}'. Available: {}",
            args.widget,
            registry.names().collect::<Vec<_>>().join(", ")
        );
    };

    let fixture = Fixture::load(&args.data)?;
    let catalog: Arc<dyn ApiCatalogClient> = match &runtime.analytics_url {
        Some(_) if fixture.apis.is_empty() => Arc::new(http_catalog(&runtime)?),
        _ => Arc::new(fixture.catalog()),
    };
    let provider = Arc::new(fixture.provider());

    let configs = Arc::new(DirectoryConfigSource::new(runtime.widget_config_dir.clone()));
    let query_timeout = runtime.query_timeout;
    let services = WidgetServices::new(runtime, provider, catalog, configs);

    if let Some(input) = &args.limit {
        match widget.state_key() {
            Some(key) if key != ERROR_ANALYSIS_KEY => {
                LimitParams::store(&services.store, key, LimitParams::parse_input(input))?
            }
            _ => tracing::warn!("[cli] {} has no row limit; ignoring --limit", widget.name()),
        }
    }
    if let Some(resource) = &args.resource {
        ApiErrorAnalysis::update_selection(&services.store, |params| params.select_resource(resource.as_str()))?;
    }

    let to = args.to.unwrap_or_else(Utc::now);
    let from = args.from.unwrap_or(to - chrono::Duration::days(1));
    if from > to {
        bail!("--from {} is after --to {}", from, to);
    }
    let selections = if args.apis.is_empty() {
        vec![Selection::all()]
    } else {
        args.apis.iter().map(|raw| parse_selection(raw)).collect()
    };
    let message = ParameterMessage::selection(Dimension::Api, selections).with_time_range(
        from.timestamp_millis(),
        to.timestamp_millis(),
        Granularity::from_name(&args.granularity),
    );

    let mut shell = WidgetShell::mount(widget, &services).await;
    let mut views = shell.views();
    shell.publish(&message);

    // Widgets run up to three queries in sequence.
    let wait = query_timeout * 3 + Duration::from_secs(1);
    let view = tokio::time::timeout(wait, views.wait_for(|view| view.status != WidgetStatus::Loading))
        .await
        .context("Timed out waiting for the widget")??
        .clone();
    let name = shell.name();
    shell.unmount().await;

    match args.format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&view)?),
        OutputFormat::Table => {
            let mut state = TableViewState::new(args.sort);
            if let Some(search) = args.search {
                state.set_query(search);
            }
            state.set_page(args.page);
            println!("{}", render::view(name, &view, &state));
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| default_env_filter(cli.verbose));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let runtime = runtime_config(&cli)?;
    match cli.command {
        Commands::List => {
            for name in WidgetRegistry::builtin().names() {
                println!("{}", name);
            }
            Ok(())
        }
        Commands::Apis => list_apis(&runtime).await,
        Commands::Run(args) => run(runtime, args).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_selection() {
        assert_eq!(parse_selection("All"), Selection::all());
        assert_eq!(
            parse_selection("PizzaShack:1.0.0"),
            ApiSelection::new("PizzaShack").with_version("1.0.0").into()
        );
        assert_eq!(parse_selection("Weather"), ApiSelection::new("Weather").into());
    }

    #[test]
    fn test_cli_parses_run() {
        let cli = Cli::try_parse_from([
            "apim-widgets",
            "run",
            "APIMTopFaultyApis",
            "--data",
            "demos/data/APIMTopFaultyApis.json",
            "--api",
            "PizzaShack:1.0.0",
            "--from",
            "2024-01-01T00:00:00Z",
        ])
        .unwrap();
        let Commands::Run(args) = cli.command else {
            panic!("expected run");
        };
        assert_eq!(args.widget, "APIMTopFaultyApis");
        assert_eq!(args.apis, vec!["PizzaShack:1.0.0"]);
        assert_eq!(args.from.unwrap().timestamp_millis(), 1_704_067_200_000);
    }
}
