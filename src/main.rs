//! Warehouse Transfer CLI
//!
//! Thin command surface over [`TransferCoordinator`]:
//!
//! ```text
//! warehouse_transfer [--env dev] <command> [args]
//!
//!   demo                                      run one transfer end to end
//!   reference                                 print a fresh reference number
//!   create --from W1 --to W2 --item SKU:QTY.. create a DRAFT transfer
//!   show <id|reference>                       print a transfer as JSON
//!   list --status S | --source W | --destination W
//!   submit|approve|reject|start-picking|complete-picking|complete-packing
//!   |arrive|verify|complete|cancel|exception <id>
//!   pickup <id> <carrier> <tracking> [label_url]
//!   tracking <id> <carrier> <tracking> [label_url]
//!   item <id> <item_id> <status>
//!   status <id> <status>
//! ```
//!
//! Without `postgres_url` the store is in-memory, so only `demo` carries
//! state across steps.

use std::sync::Arc;

use anyhow::{Context, anyhow, bail};
use tracing::info;

use warehouse_transfer::config::{AppConfig, EventSinkKind};
use warehouse_transfer::transfer::{
    BasicTransferValidator, InMemoryTransferStore, ItemId, ItemStatus, LogEventSink, NewTransferItem,
    NewTransferRequest, NoopEventSink, PgTransferStore, TransferCoordinator, TransferEventSink,
    TransferId, TransferRequest, TransferStatus, TransferStore, WebhookEventSink,
};

// ============================================================
// ARGUMENTS
// ============================================================

fn get_env(args: &[String]) -> String {
    for i in 0..args.len() {
        if (args[i] == "--env" || args[i] == "-e") && i + 1 < args.len() {
            return args[i + 1].clone();
        }
    }
    "dev".to_string()
}

/// Positional arguments with `--env <name>` removed
fn positional(args: &[String]) -> Vec<String> {
    let mut out = Vec::new();
    let mut skip = false;
    for arg in args.iter().skip(1) {
        if skip {
            skip = false;
            continue;
        }
        if arg == "--env" || arg == "-e" {
            skip = true;
            continue;
        }
        out.push(arg.clone());
    }
    out
}

fn flag_values<'a>(args: &'a [String], flag: &str) -> Vec<&'a str> {
    args.windows(2)
        .filter(|pair| pair[0] == flag)
        .map(|pair| pair[1].as_str())
        .collect()
}

fn flag_value<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    flag_values(args, flag).into_iter().next()
}

fn arg<'a>(args: &'a [String], index: usize, name: &str) -> anyhow::Result<&'a str> {
    args.get(index)
        .map(String::as_str)
        .ok_or_else(|| anyhow!("missing argument <{}>", name))
}

fn parse_id(value: &str) -> anyhow::Result<TransferId> {
    value
        .parse()
        .with_context(|| format!("invalid transfer id: {}", value))
}

fn parse_item(value: &str) -> anyhow::Result<NewTransferItem> {
    let (sku, qty) = value
        .split_once(':')
        .ok_or_else(|| anyhow!("item must be SKU:QTY, got {}", value))?;
    let qty: i32 = qty
        .parse()
        .with_context(|| format!("invalid quantity in {}", value))?;
    Ok(NewTransferItem::new(sku, qty))
}

// ============================================================
// WIRING
// ============================================================

async fn build_store(config: &AppConfig) -> anyhow::Result<Arc<dyn TransferStore>> {
    match &config.postgres_url {
        Some(url) => {
            let store = PgTransferStore::connect(url, config.postgres_max_connections)
                .await
                .context("Failed to connect to PostgreSQL")?;
            store.health_check().await?;
            Ok(Arc::new(store))
        }
        None => {
            info!("No postgres_url configured, using in-memory store");
            Ok(Arc::new(InMemoryTransferStore::new()))
        }
    }
}

fn build_sink(config: &AppConfig) -> anyhow::Result<Arc<dyn TransferEventSink>> {
    let sink_config = &config.event_sink;
    let sink: Arc<dyn TransferEventSink> = match sink_config.kind {
        EventSinkKind::Log => Arc::new(LogEventSink),
        EventSinkKind::None => Arc::new(NoopEventSink),
        EventSinkKind::Webhook => {
            let url = sink_config
                .webhook_url
                .as_deref()
                .context("event_sink.webhook_url missing")?;
            Arc::new(WebhookEventSink::new(url, sink_config.timeout())?)
        }
    };
    info!(sink = sink.name(), "Event sink configured");
    Ok(sink)
}

fn print(transfer: &TransferRequest) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(transfer)?);
    Ok(())
}

// ============================================================
// COMMANDS
// ============================================================

async fn run_demo(coordinator: &TransferCoordinator) -> anyhow::Result<()> {
    let request = NewTransferRequest::new(
        "WH-EAST-01",
        "WH-WEST-02",
        vec![NewTransferItem::new("SKU-100", 12), NewTransferItem::new("SKU-200", 4)],
    )
    .with_requested_by("demo");

    let transfer = coordinator.create(request).await?;
    let id = transfer.id;
    println!("{}", transfer);

    coordinator.submit_for_approval(id).await?;
    coordinator.approve(id).await?;
    let mut transfer = coordinator.start_picking(id).await?;
    println!("{}", transfer);

    let item_ids: Vec<_> = transfer.items.iter().map(|item| item.id).collect();
    for status in [ItemStatus::Picked, ItemStatus::Packed] {
        for item_id in &item_ids {
            transfer = coordinator.update_item_status(id, *item_id, status).await?;
        }
        println!("{}", transfer);
    }

    println!("{}", coordinator.record_pickup(id, "DemoFreight", "DF-0001", None).await?);
    println!("{}", coordinator.record_arrival(id).await?);
    coordinator.verify(id).await?;
    let transfer = coordinator.complete(id).await?;
    print(&transfer)
}

async fn run_command(coordinator: &TransferCoordinator, args: &[String]) -> anyhow::Result<()> {
    let command = args.first().map(String::as_str).unwrap_or("demo");

    match command {
        "demo" => run_demo(coordinator).await,
        "reference" => {
            println!("{}", coordinator.generate_reference_number());
            Ok(())
        }
        "create" => {
            let from = flag_value(args, "--from").context("--from is required")?;
            let to = flag_value(args, "--to").context("--to is required")?;
            let items = flag_values(args, "--item")
                .into_iter()
                .map(parse_item)
                .collect::<anyhow::Result<Vec<_>>>()?;
            let mut request = NewTransferRequest::new(from, to, items);
            if let Some(reference) = flag_value(args, "--reference") {
                request = request.with_reference_number(reference);
            }
            if let Some(priority) = flag_value(args, "--priority") {
                request = request.with_priority(priority.parse().map_err(|e: String| anyhow!(e))?);
            }
            print(&coordinator.create(request).await?)
        }
        "show" => {
            let key = arg(args, 1, "id|reference")?;
            let transfer = match key.parse::<TransferId>() {
                Ok(id) => coordinator.get(id).await?,
                Err(_) => coordinator.get_by_reference_number(key).await?,
            };
            print(&transfer)
        }
        "list" => {
            let transfers = if let Some(status) = flag_value(args, "--status") {
                let status: TransferStatus = status.parse().map_err(|e: String| anyhow!(e))?;
                coordinator.list_by_status(status).await?
            } else if let Some(source) = flag_value(args, "--source") {
                coordinator.list_by_source_warehouse(&source.into()).await?
            } else if let Some(destination) = flag_value(args, "--destination") {
                coordinator
                    .list_by_destination_warehouse(&destination.into())
                    .await?
            } else {
                bail!("list needs --status, --source or --destination");
            };
            for transfer in &transfers {
                println!("{}", transfer);
            }
            Ok(())
        }
        "pickup" | "tracking" => {
            let id = parse_id(arg(args, 1, "id")?)?;
            let carrier = arg(args, 2, "carrier")?;
            let tracking = arg(args, 3, "tracking")?;
            let label = args.get(4).map(String::as_str);
            let transfer = if command == "pickup" {
                coordinator.record_pickup(id, carrier, tracking, label).await?
            } else {
                coordinator
                    .update_tracking_info(id, carrier, tracking, label)
                    .await?
            };
            print(&transfer)
        }
        "item" => {
            let id = parse_id(arg(args, 1, "id")?)?;
            let item_id: ItemId = arg(args, 2, "item_id")?
                .parse()
                .context("invalid item id")?;
            let status: ItemStatus = arg(args, 3, "status")?
                .parse()
                .map_err(|e: String| anyhow!(e))?;
            print(&coordinator.update_item_status(id, item_id, status).await?)
        }
        "status" => {
            let id = parse_id(arg(args, 1, "id")?)?;
            let status: TransferStatus = arg(args, 2, "status")?
                .parse()
                .map_err(|e: String| anyhow!(e))?;
            print(&coordinator.update_status(id, status).await?)
        }
        lifecycle => {
            let id = parse_id(arg(args, 1, "id")?)?;
            let transfer = match lifecycle {
                "submit" => coordinator.submit_for_approval(id).await?,
                "approve" => coordinator.approve(id).await?,
                "reject" => coordinator.reject(id).await?,
                "start-picking" => coordinator.start_picking(id).await?,
                "complete-picking" => coordinator.complete_picking(id).await?,
                "complete-packing" => coordinator.complete_packing(id).await?,
                "arrive" => coordinator.record_arrival(id).await?,
                "verify" => coordinator.verify(id).await?,
                "complete" => coordinator.complete(id).await?,
                "cancel" => coordinator.cancel(id).await?,
                "exception" => coordinator.flag_exception(id).await?,
                other => bail!("unknown command: {}", other),
            };
            print(&transfer)
        }
    }
}

// ============================================================
// MAIN
// ============================================================

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args: Vec<String> = std::env::args().collect();
    let env = get_env(&args);
    let app_config = AppConfig::load(&env)?;
    let _log_guards = warehouse_transfer::logging::init_logging(&app_config);

    info!("Starting warehouse_transfer in {} mode", env);

    let store = build_store(&app_config).await?;
    let sink = build_sink(&app_config)?;
    let coordinator =
        TransferCoordinator::new(store, Arc::new(BasicTransferValidator::new()), sink);

    let command_args = positional(&args);
    if let Err(e) = run_command(&coordinator, &command_args).await {
        // Surface the transfer error code when there is one
        if let Some(transfer_err) = e.downcast_ref::<warehouse_transfer::TransferError>() {
            eprintln!("error [{}]: {}", transfer_err.code(), transfer_err);
            std::process::exit(1);
        }
        return Err(e);
    }
    Ok(())
}
