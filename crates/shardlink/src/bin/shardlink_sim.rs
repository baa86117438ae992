//! # SHARDLINK Simulator
//!
//! Runs a receiver runtime and a sender bridge against one register block,
//! feeds the bridge a seeded random item stream and prints what came out
//! the other side.
//!
//! ```bash
//! # In-process block, 200 items
//! shardlink_sim --items 200
//!
//! # File-backed block, custom identifier layout, verbose
//! RUST_LOG=debug shardlink_sim --config link.toml --region /tmp/link.region
//! ```

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use clap::Parser;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use shardlink::bridge::{Bridge, BridgeDriver, BridgeError, BridgeResult, BridgeSummary, LocationCheck};
use shardlink::core::{
    LinkConfig, MailboxMessage, MappedRegion, RegisterRegion, RegisterSnapshot,
    SharedRegisterBlock,
};
use shardlink::{ReceiverRuntime, RuntimeStats};

#[derive(Parser, Debug)]
#[command(name = "shardlink_sim")]
#[command(about = "Drive a SHARDLINK receiver and bridge with a random item stream")]
struct Cli {
    /// Link configuration (TOML). Defaults apply when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Back the register block with this file instead of process memory.
    #[arg(short, long)]
    region: Option<PathBuf>,

    /// Receiver ticks to run before giving up.
    #[arg(short, long, default_value = "2000")]
    ticks: u32,

    /// Items to send.
    #[arg(short, long, default_value = "64")]
    items: u32,

    /// Seed for the item stream.
    #[arg(short, long, default_value = "1")]
    seed: u64,
}

/// Everything the two sides reported.
struct SimReport {
    receiver: RuntimeStats,
    bridge: BridgeSummary,
    checks: Vec<LocationCheck>,
    milestones: u32,
    counters: Vec<(String, u32)>,
    /// Every item landed before the tick limit.
    complete: bool,
}

/// True once the receiver has drained the last of `items` and the slot is
/// empty again.
fn all_items_landed(snapshot: &RegisterSnapshot, items: u32) -> bool {
    snapshot.diag_last_sender_ref == items && snapshot.mailbox_full == 0
}

fn item_stream(config: &LinkConfig, count: u32, seed: u64) -> Vec<MailboxMessage> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let counter_ids: Vec<u32> = config
        .counters
        .iter()
        .filter_map(|c| config.counter_item_id(&c.name))
        .collect();

    // sender_ref is 1-based so a fresh block never looks like the last item.
    (1..=count)
        .map(|sender_ref| {
            let roll = rng.gen_range(0..10);
            let item_id = if roll < 5 {
                config.milestone_item_id(rng.gen_range(0..config.milestone_count))
            } else if roll < 8 && !counter_ids.is_empty() {
                Some(counter_ids[rng.gen_range(0..counter_ids.len())])
            } else {
                None
            };
            let item_id = item_id.unwrap_or_else(|| rng.gen_range(1..config.item_base.max(2)));
            MailboxMessage::new(item_id, sender_ref)
        })
        .collect()
}

fn simulate<A, B>(
    receiver_region: Arc<A>,
    bridge_region: B,
    config: &LinkConfig,
    cli: &Cli,
) -> BridgeResult<SimReport>
where
    A: RegisterRegion + Send + Sync + 'static,
    B: RegisterRegion + Send + 'static,
{
    let runtime = ReceiverRuntime::from_config(Arc::clone(&receiver_region), config)?;
    let bridge = Bridge::from_config(bridge_region, config)?;

    let shutdown = Arc::new(AtomicBool::new(false));
    let (item_tx, item_rx) = crossbeam_channel::unbounded();
    let (check_tx, check_rx) = crossbeam_channel::unbounded();

    let receiver_thread = runtime.spawn(Arc::clone(&shutdown))?;
    let bridge_thread = {
        let shutdown = Arc::clone(&shutdown);
        let driver = BridgeDriver::new(bridge, config.tick_interval());
        thread::Builder::new()
            .name("shardlink-bridge".to_string())
            .spawn(move || driver.run(&item_rx, &check_tx, &shutdown))
    };
    let bridge_thread = match bridge_thread {
        Ok(handle) => handle,
        Err(e) => {
            shutdown.store(true, Ordering::Release);
            if receiver_thread.join().is_err() {
                error!("receiver thread panicked during shutdown");
            }
            return Err(e.into());
        }
    };

    // The bridge holds the only receiver, so a send fails only if it is gone.
    let sent = item_stream(config, cli.items, cli.seed)
        .into_iter()
        .all(|message| item_tx.send(message).is_ok());
    drop(item_tx);

    let block = receiver_region.block();
    let mut complete = false;
    while sent {
        let snapshot = block.snapshot();
        if all_items_landed(&snapshot, cli.items) {
            complete = true;
            break;
        }
        if snapshot.diag_heartbeat >= cli.ticks {
            error!(ticks = snapshot.diag_heartbeat, "tick limit reached before all items landed");
            break;
        }
        thread::sleep(config.tick_interval());
    }
    // One more bridge tick to see the last publish.
    thread::sleep(config.tick_interval() * 2);
    shutdown.store(true, Ordering::Release);

    let receiver = receiver_thread
        .join()
        .map_err(|_| BridgeError::ThreadPanicked("receiver"))?;
    let (_, bridge) = bridge_thread
        .join()
        .map_err(|_| BridgeError::ThreadPanicked("bridge"))??;
    if !sent {
        return Err(BridgeError::Disconnected("item"));
    }

    let (milestones, counters) = runtime.with_state(|state| {
        let counters = state
            .counters
            .iter()
            .map(|(_, c)| (c.name().to_string(), c.value()))
            .collect();
        (state.progress.snapshot().count(), counters)
    });

    Ok(SimReport {
        receiver,
        bridge,
        checks: check_rx.try_iter().collect(),
        milestones,
        counters,
        complete,
    })
}

fn run(cli: &Cli) -> BridgeResult<SimReport> {
    let config = match &cli.config {
        Some(path) => LinkConfig::load(path)?,
        None => LinkConfig::default(),
    };
    info!(
        item_base = config.item_base,
        milestones = config.milestone_count,
        counters = config.counters.len(),
        "configuration loaded"
    );

    match &cli.region {
        Some(path) => {
            // Two independent mappings of one file, as two processes would have.
            let receiver_side = Arc::new(MappedRegion::create(path)?);
            let bridge_side = MappedRegion::open(path)?;
            info!(path = %path.display(), "file-backed register block");
            simulate(receiver_side, bridge_side, &config, cli)
        }
        None => {
            let block = SharedRegisterBlock::shared();
            simulate(Arc::clone(&block), block, &config, cli)
        }
    }
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    match run(&cli) {
        Ok(report) => {
            println!("═══════════════════════════════════════════════════════");
            println!("                 SHARDLINK SIMULATION");
            println!("═══════════════════════════════════════════════════════");
            println!("  Receiver ticks:     {}", report.receiver.ticks);
            println!("  Items drained:      {}", report.receiver.delivered);
            println!("  Mirror publishes:   {}", report.receiver.published);
            println!("  Tick overruns:      {}", report.receiver.overruns);
            println!("  Bridge ticks:       {}", report.bridge.ticks);
            println!("  Items posted:       {}", report.bridge.delivered);
            println!("  Location checks:    {}", report.checks.len());
            println!("  Milestones reached: {}", report.milestones);
            for (name, value) in &report.counters {
                println!("  Counter {name}: {value}");
            }
            if report.complete {
                ExitCode::SUCCESS
            } else {
                error!(items = cli.items, "simulation incomplete");
                ExitCode::FAILURE
            }
        }
        Err(e) => {
            error!(error = %e, "simulation failed");
            ExitCode::FAILURE
        }
    }
}
