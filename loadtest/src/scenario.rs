use std::future::Future;
use std::io;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use rand::distr::weighted::WeightedIndex;
use rand::distr::Distribution;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::client::{HttpClient, Transport, UserClient};
use crate::config::{ConfigError, LoadTestConfig};
use crate::statistics::Statistics;
use crate::user::ProductUser;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Task {
    GetProduct,
    CreateProduct,
}

impl Task {
    pub const ALL: [Task; 2] = [Task::GetProduct, Task::CreateProduct];

    #[must_use]
    pub fn weight(self) -> u32 {
        match self {
            Task::GetProduct => 9,
            Task::CreateProduct => 1,
        }
    }

    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Task::GetProduct => "get_product",
            Task::CreateProduct => "create_product",
        }
    }
}

/// Picks tasks with probability proportional to their weight.
#[derive(Debug, Clone)]
pub struct TaskSet {
    tasks: Vec<Task>,
    index: WeightedIndex<u32>,
}

impl TaskSet {
    pub fn new(tasks: &[Task]) -> Result<Self, ConfigError> {
        let index = WeightedIndex::new(tasks.iter().map(|t| t.weight()))
            .map_err(|e| ConfigError::InvalidWeights(e.to_string()))?;
        Ok(Self {
            tasks: tasks.to_vec(),
            index,
        })
    }

    pub fn product_user() -> Result<Self, ConfigError> {
        Self::new(&Task::ALL)
    }

    pub fn pick<R: Rng>(&self, rng: &mut R) -> Task {
        self.tasks[self.index.sample(rng)]
    }
}

/// Uniform pause between two consecutive tasks of one user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitTime {
    min: Duration,
    max: Duration,
}

impl WaitTime {
    /// Bounds in seconds. Rejects bounds that are not representable as a
    /// [`Duration`] and `min > max`.
    pub fn between(min_secs: f64, max_secs: f64) -> Result<Self, ConfigError> {
        let invalid = || ConfigError::InvalidWaitTime {
            min: min_secs,
            max: max_secs,
        };
        let min = Duration::try_from_secs_f64(min_secs).map_err(|_| invalid())?;
        let max = Duration::try_from_secs_f64(max_secs).map_err(|_| invalid())?;
        if min > max {
            return Err(invalid());
        }
        Ok(Self { min, max })
    }

    pub fn sample<R: Rng>(&self, rng: &mut R) -> Duration {
        if self.min == self.max {
            return self.min;
        }
        rng.random_range(self.min..=self.max)
    }
}

fn user_rng(seed: Option<u64>, user: usize) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed.wrapping_add(user as u64)),
        None => StdRng::from_os_rng(),
    }
}

/// Runs the product user scenario against `config.host` over HTTP.
pub async fn run(config: &LoadTestConfig) -> anyhow::Result<Statistics> {
    let transport = HttpClient::new(config.request_timeout);
    run_with(config, transport).await
}

/// Spawns `config.users` users sharing `transport`, stops them after
/// `config.run_time` or on Ctrl-C, and merges their statistics.
pub async fn run_with<T>(config: &LoadTestConfig, transport: T) -> anyhow::Result<Statistics>
where
    T: Transport + Clone + 'static,
{
    let tasks = Arc::new(TaskSet::product_user()?);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let run_time = config.run_time;
    let timer = tokio::spawn(async move {
        stop_after(run_time, tokio::signal::ctrl_c()).await;
        let _ = shutdown_tx.send(true);
    });

    let mut shutdown = shutdown_rx.clone();
    let mut users: Vec<JoinHandle<Statistics>> = Vec::with_capacity(config.users);
    for n in 0..config.users {
        if *shutdown.borrow() {
            break;
        }
        let client = UserClient::new(&config.host, transport.clone());
        let user = ProductUser::new(client, user_rng(config.seed, n));
        users.push(tokio::spawn(run_user(
            user,
            tasks.clone(),
            config.wait_time,
            shutdown_rx.clone(),
        )));
        tracing::debug!("Spawned user {}", n + 1);
        if let Some(interval) = config.spawn_interval {
            if n + 1 < config.users {
                tokio::select! {
                    () = tokio::time::sleep(interval) => {}
                    _ = shutdown.changed() => {}
                }
            }
        }
    }
    tracing::info!("All {} users spawned", users.len());

    let mut stats = Statistics::default();
    for user in users {
        let user_stats = user.await.context("Failed to join user")?;
        stats.merge(&user_stats);
    }
    timer.abort();
    Ok(stats)
}

/// Resolves after `run_time`, or earlier once `interrupt` fires.
///
/// A failing interrupt listener only loses early stopping.
async fn stop_after<F>(run_time: Duration, interrupt: F)
where
    F: Future<Output = io::Result<()>>,
{
    let interrupt = async {
        match interrupt.await {
            Ok(()) => tracing::info!("Interrupted, stopping users"),
            Err(e) => {
                tracing::warn!("Failed to listen for Ctrl-C: {e}");
                std::future::pending::<()>().await;
            }
        }
    };
    tokio::select! {
        () = tokio::time::sleep(run_time) => {
            tracing::info!("Run time of {run_time:?} elapsed, stopping users");
        }
        () = interrupt => {}
    }
}

async fn run_user<T: Transport>(
    mut user: ProductUser<T>,
    tasks: Arc<TaskSet>,
    wait: WaitTime,
    mut shutdown: watch::Receiver<bool>,
) -> Statistics {
    loop {
        if *shutdown.borrow() {
            break;
        }
        let task = tasks.pick(user.rng());
        tokio::select! {
            res = user.execute(task) => {
                if let Err(e) = res {
                    tracing::debug!("{} failed: {e:#}", task.name());
                }
            }
            _ = shutdown.changed() => break,
        }
        let pause = wait.sample(user.rng());
        tokio::select! {
            () = tokio::time::sleep(pause) => {}
            _ = shutdown.changed() => break,
        }
    }
    user.into_statistics()
}
