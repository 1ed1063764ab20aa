/*!
 * refcore stress driver
 *
 * Runs a synthetic provider against the substrate the way a monitoring
 * front end would: the provider keeps process records as pooled objects in a
 * hashtable and publishes add/modify/remove notifications on a callback bus,
 * while subscriber threads come and go.
 *
 * Usage: refcore-stress [rounds] [subscribers]
 */

use anyhow::{Context, Result};
use parking_lot::Mutex;
use refcore::callback::Callback;
use refcore::collections::SimpleHashtable;
use refcore::monitoring::span_operation;
use refcore::object::{DeleteFlags, Object, ObjectManager, ObjectType};
use refcore::{init_tracing, RuntimeConfig};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use tracing::{debug, info};

#[derive(Debug)]
struct ProcessItem {
    pid: usize,
    name: String,
    cycles: AtomicU64,
}

#[derive(Debug, Clone, Copy)]
enum ChangeKind {
    Added,
    Modified,
    Removed,
    Refresh,
}

struct ProcessChange {
    kind: ChangeKind,
    item: Option<Object<ProcessItem>>,
}

struct Provider {
    process_type: Arc<ObjectType<ProcessItem>>,
    items: Mutex<SimpleHashtable<Object<ProcessItem>>>,
    changed: Callback<ProcessChange>,
}

impl Provider {
    fn new(manager: &ObjectManager, process_type: Arc<ObjectType<ProcessItem>>) -> Self {
        Self {
            process_type,
            items: Mutex::new(SimpleHashtable::new(manager.config().hashtable_capacity)),
            changed: Callback::new(),
        }
    }

    /// One refresh pass over a synthetic process snapshot
    fn update(&self, round: usize) {
        let live: Vec<usize> = (0..64).filter(|pid| (pid + round) % 5 != 0).collect();
        let mut changes = Vec::new();

        {
            let mut items = self.items.lock();
            for &pid in &live {
                match items.find(pid) {
                    Some(item) => {
                        item.cycles.fetch_add(1, Ordering::Relaxed);
                        changes.push((ChangeKind::Modified, item.reference()));
                    }
                    None => {
                        let item = self.process_type.create_object(ProcessItem {
                            pid,
                            name: format!("process-{}", pid),
                            cycles: AtomicU64::new(0),
                        });
                        changes.push((ChangeKind::Added, item.reference()));
                        items.add(pid, item);
                    }
                }
            }

            let stale: Vec<usize> = items
                .iter()
                .map(|(pid, _)| pid)
                .filter(|pid| !live.contains(pid))
                .collect();
            for pid in stale {
                if let Some(item) = items.remove(pid) {
                    changes.push((ChangeKind::Removed, item));
                }
            }
        }

        for (kind, item) in changes {
            self.changed.invoke(&ProcessChange {
                kind,
                item: Some(item),
            });
        }
        self.changed.invoke(&ProcessChange {
            kind: ChangeKind::Refresh,
            item: None,
        });
    }
}

fn parse_arg(index: usize, default: usize) -> Result<usize> {
    match std::env::args().nth(index) {
        Some(value) => value
            .parse()
            .with_context(|| format!("argument {} must be a number, got '{}'", index, value)),
        None => Ok(default),
    }
}

fn main() -> Result<()> {
    init_tracing();

    let rounds = parse_arg(1, 200)?;
    let subscribers = parse_arg(2, 4)?;
    let config = RuntimeConfig::from_env().context("loading REFCORE_* configuration")?;

    info!(rounds, subscribers, ?config, "refcore stress starting");

    let deleted = Arc::new(AtomicU64::new(0));
    let deleted_sink = deleted.clone();
    let (manager, process_type) = ObjectManager::initialize(config, |m| {
        m.object_type::<ProcessItem>("Process")
            .with_delete_procedure(move |item, flags: DeleteFlags| {
                debug!(pid = item.pid, name = %item.name, deferred = flags.deferred, "process item deleted");
                deleted_sink.fetch_add(1, Ordering::Relaxed);
            })
            .default_pool()
            .register()
    })?;

    let provider = Arc::new(Provider::new(&manager, process_type.clone()));
    let running = Arc::new(AtomicBool::new(true));
    let received = Arc::new(AtomicU64::new(0));

    let _run = span_operation("stress");

    let workers: Vec<_> = (0..subscribers)
        .map(|worker| {
            let provider = provider.clone();
            let running = running.clone();
            let received = received.clone();
            thread::Builder::new()
                .name(format!("subscriber-{}", worker))
                .spawn(move || {
                    let mut cycles = 0u64;
                    while running.load(Ordering::Relaxed) {
                        let received = received.clone();
                        let registration = provider.changed.register(move |change: &ProcessChange| {
                            if let (ChangeKind::Added | ChangeKind::Modified, Some(item)) =
                                (change.kind, &change.item)
                            {
                                debug_assert!(item.reference_count() > 0);
                            }
                            received.fetch_add(1, Ordering::Relaxed);
                        });
                        thread::yield_now();
                        provider.changed.unregister(registration);
                        cycles += 1;
                    }
                    cycles
                })
                .context("spawning subscriber thread")
        })
        .collect::<Result<_>>()?;

    for round in 0..rounds {
        provider.update(round);
    }

    running.store(false, Ordering::Relaxed);
    let mut subscription_cycles = 0;
    for worker in workers {
        subscription_cycles += worker
            .join()
            .map_err(|_| anyhow::anyhow!("subscriber thread panicked"))?;
    }

    provider.items.lock().clear();
    manager.flush_deferred()?;

    let bus = provider.changed.stats();
    info!(
        notifications = received.load(Ordering::Relaxed),
        subscription_cycles,
        invocations = bus.invocations,
        skipped = bus.skipped,
        drain_waits = bus.drain_waits,
        "callback bus"
    );

    for info in manager.types() {
        info!(
            object_type = %info.name,
            live = info.live_objects,
            created = info.total_created,
            deleted = deleted.load(Ordering::Relaxed),
            pool_hit_rate = info.pool.map(|p| p.hit_rate()).unwrap_or(0.0),
            "object type"
        );
    }

    Ok(())
}
