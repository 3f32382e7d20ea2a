use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use repocache::config::Config;
use repocache::models::{NewUser, User};
use repocache::storage::{CachedRepository, InMemoryRepository};
use repocache_core::cache::{Cache, CacheService};
use repocache_core::storage::{Attributes, Condition, Repository};

/// repocache - Inspect and manage the repository cache
#[derive(Parser, Debug)]
#[command(name = "repocache")]
#[command(version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Evict every entry cached under a tag
    Flush {
        /// Tag to flush, e.g. "InMemoryRepository<User>"
        #[arg(long, short)]
        tag: String,
    },
    /// Evict a single cache key (without the configured prefix)
    Forget {
        #[arg(long, short)]
        key: String,
    },
    /// Run a cached repository against the configured backend
    Demo,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing subscriber
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "repocache=debug,repocache_core=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env();
    let store = connect(&config).await?;
    let cache = Arc::new(CacheService::new(store, config.cache_settings()));

    match cli.command {
        Command::Flush { tag } => {
            cache.flush_tag(&tag).await?;
            tracing::info!(tag = %tag, backend = cache.backend(), "Tag flushed");
        }
        Command::Forget { key } => {
            cache.forget(&key).await?;
            tracing::info!(key = %key, backend = cache.backend(), "Key forgotten");
        }
        Command::Demo => demo(cache).await?,
    }

    Ok(())
}

#[cfg(feature = "memory")]
async fn connect(config: &Config) -> Result<Arc<dyn Cache>> {
    tracing::debug!(
        max_entries = config.cache_max_entries,
        "Using in-memory cache; entries live only as long as this process"
    );
    Ok(Arc::new(repocache::cache::MemoryCache::new(
        config.cache_max_entries,
    )))
}

#[cfg(feature = "redis")]
async fn connect(config: &Config) -> Result<Arc<dyn Cache>> {
    let cache = repocache::cache::RedisCache::new(&config.redis_url).await?;
    Ok(Arc::new(cache))
}

/// Seeds an in-memory repository and exercises it through the cache.
async fn demo(cache: Arc<CacheService>) -> Result<()> {
    let repo = InMemoryRepository::<User>::new().with_relations(&["roles"]);
    let users = CachedRepository::new(repo.clone(), cache);

    for user in [
        NewUser::new("Ada", "ada@example.com").age(36),
        NewUser::new("Grace", "grace@example.com").age(45),
        NewUser::new("Linus", "linus@example.com").status("banned"),
    ] {
        users.create(&user.attributes()).await?;
    }

    let active = [Condition::eq("status", "active")];

    let count = users.count(&active).await?;
    tracing::info!(count, queries = repo.query_count(), "Counted active users (miss)");
    let count = users.count(&active).await?;
    tracing::info!(count, queries = repo.query_count(), "Counted active users (hit)");

    let mut unchanged = Attributes::new();
    unchanged.insert("name".into(), "Ada".into());
    let outcome = users.update(1, &unchanged).await?;
    tracing::info!(
        changed = outcome.is_changed(),
        "Updated Ada with identical data, cache kept"
    );
    users.count(&active).await?;
    tracing::info!(queries = repo.query_count(), "Counted again (hit)");

    users.delete_where(&active).await?;
    let count = users.count(&active).await?;
    tracing::info!(
        count,
        queries = repo.query_count(),
        tag = users.tag(),
        "Deleted active users, tag flushed (miss)"
    );

    let names = users.pluck("name", None, false).await?;
    tracing::info!(%names, queries = repo.query_count(), "Plucked names, cache bypassed");

    Ok(())
}
