use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::sleep;

use crate::points::PointsStore;
use crate::twitch::HelixClient;

pub const POINTS_PER_TICK: i64 = 5;
pub const TICK_INTERVAL: Duration = Duration::from_secs(60);

/// Periodic watch-time rewards. Each tick snapshots the chatter set and
/// credits everyone present on both this tick and the previous one, so a
/// drive-by appearance on a single tick earns nothing.
pub async fn run(api: HelixClient, points: Arc<Mutex<PointsStore>>) {
    let mut previous: HashSet<String> = HashSet::new();

    loop {
        sleep(TICK_INTERVAL).await;

        match api.get_chatters().await {
            Ok(current) => {
                let rewarded = {
                    let mut store = points.lock().await;
                    award_sustained(&previous, &current, &mut store)
                };
                if rewarded > 0 {
                    log::info!("{} chatters earned {} points", rewarded, POINTS_PER_TICK);
                }
                previous = current;
            }
            Err(e) => {
                // keep the previous snapshot and try again next tick
                log::warn!("Chatter fetch failed, skipping tick: {}", e);
            }
        }
    }
}

/// Credit everyone present on both consecutive ticks. Returns how many were
/// rewarded.
pub fn award_sustained(
    previous: &HashSet<String>,
    current: &HashSet<String>,
    store: &mut PointsStore,
) -> usize {
    let mut rewarded = 0;
    for user in previous.intersection(current) {
        store.credit(user, POINTS_PER_TICK);
        rewarded += 1;
    }
    rewarded
}
