//! Bridge and receiver driven in lockstep over one register block.
//!
//! Tick order between the two sides is randomized from a fixed seed.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use shardlink_bridge::{Bridge, LocationCheck};
use shardlink_core::{
    LinkConfig, MailboxMessage, PollLoop, ProgressMask, SharedRegisterBlock,
};

fn item_stream(rng: &mut ChaCha8Rng, config: &LinkConfig, len: usize) -> Vec<MailboxMessage> {
    let extra_life = config.counter_item_id("extra_lives").unwrap();
    (0..len)
        .map(|i| {
            let item_id = match rng.gen_range(0..3) {
                0 => config.milestone_item_id(rng.gen_range(0..8)).unwrap(),
                1 => extra_life,
                _ => rng.gen_range(1..1_000),
            };
            MailboxMessage::new(item_id, u32::try_from(i).unwrap())
        })
        .collect()
}

#[test]
fn test_every_item_applied_once_in_order() {
    let config = LinkConfig::default();
    let mut rng = ChaCha8Rng::seed_from_u64(0x5EED);
    let stream = item_stream(&mut rng, &config, 400);

    let block = SharedRegisterBlock::new();
    let mut bridge = Bridge::from_config(&block, &config).unwrap();
    let mut receiver = PollLoop::from_config(&block, &config).unwrap();

    // Baseline on an empty mirror.
    assert!(bridge.tick().checks.is_empty());

    // The controller's list grows in bursts and is replayed each time.
    let mut revealed = 0;
    let mut applied = Vec::new();
    let mut checks: Vec<LocationCheck> = Vec::new();
    while applied.len() < stream.len() {
        if revealed < stream.len() && rng.gen_bool(0.2) {
            revealed = (revealed + rng.gen_range(1..20)).min(stream.len());
            bridge.queue_mut().sync_received(&stream[..revealed]);
        }
        if rng.gen_bool(0.5) {
            checks.extend(bridge.tick().checks);
        } else if let Some(delivery) = receiver.poll_once().delivered {
            applied.push(delivery.message);
        }
    }
    checks.extend(bridge.tick().checks);

    assert_eq!(applied, stream);
    assert_eq!(bridge.queue().delivered_count(), stream.len() as u64);

    // Each reached milestone was reported exactly once.
    let reached = receiver.state().progress.snapshot();
    let mut reported = ProgressMask::EMPTY;
    for check in &checks {
        assert!(!reported.contains(check.bit), "bit {} reported twice", check.bit);
        reported = reported.with(check.bit);
        assert_eq!(Some(check.location_id), config.location_id(u32::try_from(check.bit).unwrap()));
    }
    assert_eq!(reported, reached);
}

#[test]
fn test_restarted_bridge_does_not_report_old_progress() {
    let config = LinkConfig::default();
    let block = SharedRegisterBlock::new();
    let mut receiver = PollLoop::from_config(&block, &config).unwrap();

    receiver.mark_reached(1);
    receiver.mark_reached(4);
    receiver.poll_once();

    let mut bridge = Bridge::from_config(&block, &config).unwrap();
    let report = bridge.tick();
    assert!(report.checks.is_empty());
    assert_eq!(report.heartbeat, 1);

    receiver.mark_reached(6);
    receiver.poll_once();
    let report = bridge.tick();
    assert_eq!(report.checks.len(), 1);
    assert_eq!(report.checks[0].bit, 6);
    assert_eq!(report.heartbeat, 2);
}
