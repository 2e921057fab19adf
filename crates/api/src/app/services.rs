use std::sync::Arc;

use thiserror::Error;
use tracing::{info, warn};

use storefront_addresses::{BillingAddress, ShippingAddress};
use storefront_core::Entity;
use storefront_infra::record_store::{InMemoryRecordStore, RecordStore, RecordStoreError};
use storefront_infra::search_index::{InMemorySearchIndex, SearchIndex, SearchIndexError};
use storefront_infra::sync::{
    EntitySynchronizer, IndexRetryWorker, ReconcileWorker, RetryPolicy, SyncTarget, UpdatePolicy,
    WorkerHandle,
};
use storefront_products::{Product, ProductList, ProductListProduct, Wishlist};
use storefront_sales::{Cart, CartProduct, Order, OrderProduct};

#[cfg(feature = "postgres")]
use sqlx::PgPool;
#[cfg(feature = "postgres")]
use storefront_infra::record_store::PostgresRecordStore;
#[cfg(feature = "elasticsearch")]
use storefront_infra::search_index::{ElasticsearchClient, ElasticsearchIndex, build_client};

use crate::config::AppConfig;

/// Synchronizer with its stores erased, so every backend combination shares one type.
pub type Synchronizer<E> =
    EntitySynchronizer<E, Arc<dyn RecordStore<E>>, Arc<dyn SearchIndex<E>>>;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("failed to connect to Postgres: {0}")]
    Database(String),

    #[error(transparent)]
    RecordStore(#[from] RecordStoreError),

    #[error(transparent)]
    SearchIndex(#[from] SearchIndexError),
}

enum RecordBackend {
    InMemory,
    #[cfg(feature = "postgres")]
    Postgres(Arc<PgPool>),
}

impl RecordBackend {
    fn store<E: Entity>(&self) -> Arc<dyn RecordStore<E>> {
        match self {
            Self::InMemory => Arc::new(InMemoryRecordStore::<E>::new()),
            #[cfg(feature = "postgres")]
            Self::Postgres(pool) => Arc::new(PostgresRecordStore::<E>::new(pool.clone())),
        }
    }
}

enum IndexBackend {
    InMemory,
    #[cfg(feature = "elasticsearch")]
    Elasticsearch {
        client: ElasticsearchClient,
        prefix: String,
    },
}

impl IndexBackend {
    fn index<E: Entity>(&self) -> Arc<dyn SearchIndex<E>> {
        match self {
            Self::InMemory => Arc::new(InMemorySearchIndex::<E>::new()),
            #[cfg(feature = "elasticsearch")]
            Self::Elasticsearch { client, prefix } => {
                Arc::new(ElasticsearchIndex::<E>::with_client(client.clone(), prefix))
            }
        }
    }
}

struct Wiring {
    records: RecordBackend,
    index: IndexBackend,
    update_policy: UpdatePolicy,
    retry_policy: RetryPolicy,
}

impl Wiring {
    fn synchronizer<E: Entity>(&self) -> Arc<Synchronizer<E>> {
        Arc::new(
            EntitySynchronizer::new(self.records.store::<E>(), self.index.index::<E>())
                .with_update_policy(self.update_policy)
                .with_retry_policy(self.retry_policy.clone()),
        )
    }
}

/// One synchronizer per entity kind.
#[derive(Clone)]
pub struct AppServices {
    pub billing_addresses: Arc<Synchronizer<BillingAddress>>,
    pub shipping_addresses: Arc<Synchronizer<ShippingAddress>>,
    pub carts: Arc<Synchronizer<Cart>>,
    pub cart_products: Arc<Synchronizer<CartProduct>>,
    pub orders: Arc<Synchronizer<Order>>,
    pub order_products: Arc<Synchronizer<OrderProduct>>,
    pub products: Arc<Synchronizer<Product>>,
    pub product_lists: Arc<Synchronizer<ProductList>>,
    pub product_list_products: Arc<Synchronizer<ProductListProduct>>,
    pub wishlists: Arc<Synchronizer<Wishlist>>,
}

impl AppServices {
    /// In-memory wiring (dev/test).
    pub fn in_memory(update_policy: UpdatePolicy, retry_policy: RetryPolicy) -> Self {
        Self::wire(&Wiring {
            records: RecordBackend::InMemory,
            index: IndexBackend::InMemory,
            update_policy,
            retry_policy,
        })
    }

    /// Wire the stores selected by `config`, falling back to in-memory ones
    /// when the backing feature is not compiled in.
    pub async fn build(config: &AppConfig) -> Result<Self, ServiceError> {
        let wiring = Wiring {
            records: record_backend(config).await?,
            index: index_backend(config)?,
            update_policy: config.update_policy,
            retry_policy: config.retry_policy.clone(),
        };
        Ok(Self::wire(&wiring))
    }

    fn wire(w: &Wiring) -> Self {
        Self {
            billing_addresses: w.synchronizer(),
            shipping_addresses: w.synchronizer(),
            carts: w.synchronizer(),
            cart_products: w.synchronizer(),
            orders: w.synchronizer(),
            order_products: w.synchronizer(),
            products: w.synchronizer(),
            product_lists: w.synchronizer(),
            product_list_products: w.synchronizer(),
            wishlists: w.synchronizer(),
        }
    }

    pub fn sync_targets(&self) -> Vec<Arc<dyn SyncTarget>> {
        let targets: [Arc<dyn SyncTarget>; 10] = [
            self.billing_addresses.clone(),
            self.shipping_addresses.clone(),
            self.carts.clone(),
            self.cart_products.clone(),
            self.orders.clone(),
            self.order_products.clone(),
            self.products.clone(),
            self.product_lists.clone(),
            self.product_list_products.clone(),
            self.wishlists.clone(),
        ];
        targets.into()
    }

    /// Start the index retry worker and, when configured, the reconcile worker.
    pub fn spawn_workers(&self, config: &AppConfig) -> Vec<WorkerHandle> {
        let mut workers = vec![IndexRetryWorker::spawn(
            self.sync_targets(),
            config.retry_interval,
        )];
        if let Some(interval) = config.reconcile_interval {
            workers.push(ReconcileWorker::spawn(self.sync_targets(), interval));
        }
        workers
    }
}

async fn record_backend(config: &AppConfig) -> Result<RecordBackend, ServiceError> {
    if !config.use_persistent_stores {
        return Ok(RecordBackend::InMemory);
    }

    #[cfg(feature = "postgres")]
    {
        let url = config.database_url.as_deref().unwrap_or_default();
        let pool = PgPool::connect(url)
            .await
            .map_err(|e| ServiceError::Database(e.to_string()))?;
        PostgresRecordStore::<Cart>::ensure_schema(&pool).await?;
        info!("using Postgres record stores");
        Ok(RecordBackend::Postgres(Arc::new(pool)))
    }
    #[cfg(not(feature = "postgres"))]
    {
        warn!("USE_PERSISTENT_STORES=true but postgres feature not enabled, falling back to in-memory");
        Ok(RecordBackend::InMemory)
    }
}

fn index_backend(config: &AppConfig) -> Result<IndexBackend, ServiceError> {
    let Some(url) = config.elasticsearch_url.as_deref() else {
        return Ok(IndexBackend::InMemory);
    };

    #[cfg(feature = "elasticsearch")]
    {
        let client = build_client(url)?;
        info!(url, prefix = %config.elasticsearch_index_prefix, "using Elasticsearch search indexes");
        Ok(IndexBackend::Elasticsearch {
            client,
            prefix: config.elasticsearch_index_prefix.clone(),
        })
    }
    #[cfg(not(feature = "elasticsearch"))]
    {
        warn!(url, "ELASTICSEARCH_URL set but elasticsearch feature not enabled, falling back to in-memory");
        Ok(IndexBackend::InMemory)
    }
}
