//! Simulated award source for demos.
//!
//! Each session can own one simulator. It emits a random award on a fixed
//! interval into the session's event channel, where it takes the same path
//! as a client `add_points` message.

use ledger::{AwardEvent, Category};
use rand::seq::SliceRandom;
use rand::Rng;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::debug;

/// Award names a simulated event can carry, per category.
fn names(category: Category) -> &'static [&'static str] {
    match category {
        Category::DailyLogin => &["Daily Check-in", "Morning Bonus", "Login Streak"],
        Category::Referral => &["Friend Signup", "Referral Bonus", "Share Reward"],
        Category::Task => &["Complete Survey", "Watch Video", "Rate App"],
        Category::Achievement => &["Level Up", "First Week", "Milestone Reached"],
    }
}

/// Award amounts a simulated event can carry, per category.
fn amounts(category: Category) -> &'static [u64] {
    match category {
        Category::DailyLogin => &[25, 50, 75],
        Category::Referral => &[200, 300, 500],
        Category::Task => &[100, 150, 200],
        Category::Achievement => &[250, 500, 1000],
    }
}

/// Draw a random award.
pub fn random_award<R: Rng + ?Sized>(rng: &mut R) -> AwardEvent {
    let category = *Category::ALL
        .choose(rng)
        .unwrap_or(&Category::DailyLogin);
    let name = names(category).choose(rng).copied().unwrap_or("Bonus");
    let amount = amounts(category).choose(rng).copied().unwrap_or(1);

    AwardEvent::new(category, name, amount)
}

/// Spawns simulators.
pub struct SimulatedEventSource;

impl SimulatedEventSource {
    /// Start emitting a random award every `period` into `tx`.
    ///
    /// The first award is sent one full period after spawning. The task ends
    /// on its own if the receiver is dropped.
    pub fn spawn(period: Duration, tx: mpsc::Sender<AwardEvent>) -> SimulatorHandle {
        let task = tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                ticker.tick().await;
                let event = random_award(&mut rand::thread_rng());
                debug!(
                    "Simulated award: {} {} ({})",
                    event.amount, event.category, event.name
                );
                if tx.send(event).await.is_err() {
                    break;
                }
            }
        });

        SimulatorHandle { task }
    }
}

/// Owning handle to a running simulator.
#[derive(Debug)]
pub struct SimulatorHandle {
    task: JoinHandle<()>,
}

impl SimulatorHandle {
    /// Stop the simulator and wait until its task is gone.
    pub async fn cancel(self) {
        self.task.abort();
        // Cancelled is the expected outcome
        let _ = self.task.await;
    }
}
