pub mod config;
pub mod datastore;
pub mod filter;
pub mod identity;
pub mod store;
pub mod task;
pub mod views;

use std::path::Path;

use anyhow::anyhow;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use crate::datastore::{AUTH_KEY, FileStorage, StorageBackend, TASK_KEY};
use crate::identity::IdentityStore;
use crate::store::TaskStore;

/// Callback handed to a store's `subscribe`; invoked synchronously with the
/// owning record after each successful mutation.
pub type Subscriber<R> = Box<dyn Fn(&R)>;

/// The application core: both stores, explicitly constructed and wired to
/// persistence. Single-threaded by design; callers hold it by reference.
pub struct App {
    pub identity: IdentityStore,
    pub tasks: TaskStore,
}

impl App {
    /// Opens file-backed stores under `data_dir`, loading persisted state
    /// (fail-open) and registering the save-on-change hooks.
    #[tracing::instrument(skip(data_dir))]
    pub fn open(data_dir: &Path) -> anyhow::Result<Self> {
        let storage = FileStorage::open(data_dir)?;
        Ok(Self::with_storage(storage))
    }

    /// Opens the app at the configured location: rc-file `data.location`,
    /// overridable by `data_override`.
    pub fn open_default(
        rc_override: Option<&Path>,
        data_override: Option<&Path>,
    ) -> anyhow::Result<Self> {
        let cfg = config::Config::load(rc_override)?;
        let data_dir = config::resolve_data_dir(&cfg, data_override)?;
        Self::open(&data_dir)
    }

    /// Wires both stores over any backend. Persistence is a post-mutation
    /// subscriber, so the stores themselves stay free of durability concerns;
    /// a failed write is logged and dropped, never fatal.
    pub fn with_storage<S>(storage: S) -> Self
    where
        S: StorageBackend + Clone + 'static,
    {
        let mut identity =
            IdentityStore::from_record(datastore::load_record(&storage, AUTH_KEY));
        let identity_storage = storage.clone();
        identity.subscribe(Box::new(move |record| {
            if let Err(err) = datastore::save_record(&identity_storage, AUTH_KEY, record) {
                warn!(error = %err, "failed to persist identity record");
            }
        }));

        let mut tasks = TaskStore::from_record(datastore::load_record(&storage, TASK_KEY));
        let task_storage = storage;
        tasks.subscribe(Box::new(move |record| {
            if let Err(err) = datastore::save_record(&task_storage, TASK_KEY, record) {
                warn!(error = %err, "failed to persist task record");
            }
        }));

        info!(
            authenticated = identity.is_authenticated(),
            tasks = tasks.tasks().len(),
            "app opened"
        );
        Self { identity, tasks }
    }
}

/// Installs the global tracing subscriber. `RUST_LOG` wins over the
/// verbosity flags when set.
pub fn init_tracing(verbose: u8, quiet: bool) -> anyhow::Result<()> {
    let default_level = if quiet {
        "error"
    } else if verbose >= 2 {
        "trace"
    } else if verbose == 1 {
        "debug"
    } else {
        "warn"
    };

    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_level))
        .map_err(|e| anyhow!("invalid RUST_LOG / log filter: {e}"))?;

    let init_result = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(true)
        .with_level(true)
        .try_init();

    if let Err(err) = init_result {
        debug!(error = %err, "tracing subscriber already set, continuing");
    }

    Ok(())
}
