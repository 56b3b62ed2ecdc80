use chrono::{NaiveTime, Utc};
use tokio::sync::broadcast;

use crate::config::Config;
use crate::models::event::DispatchEvent;
use crate::observability::metrics::Metrics;
use crate::store::drivers::DriverDirectory;
use crate::store::offers::OfferLedger;
use crate::store::pricing::PricingStore;
use crate::store::rides::RideStore;

/// Every service the dispatch coordinator depends on, constructed once at
/// process start and passed in explicitly.
pub struct AppState {
    pub config: Config,
    pub rides: RideStore,
    pub offers: OfferLedger,
    pub drivers: DriverDirectory,
    pub pricing: PricingStore,
    pub events_tx: broadcast::Sender<DispatchEvent>,
    pub metrics: Metrics,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        let (events_tx, _unused_rx) = broadcast::channel(config.event_buffer_size);

        Self {
            config,
            rides: RideStore::new(),
            offers: OfferLedger::new(),
            drivers: DriverDirectory::new(),
            pricing: PricingStore::new(),
            events_tx,
            metrics: Metrics::new(),
        }
    }

    /// Wall-clock time in the pricing timezone; what the time rules match
    /// against.
    pub fn pricing_local_time(&self) -> NaiveTime {
        Utc::now()
            .with_timezone(&self.config.pricing_utc_offset)
            .time()
    }

    /// Fan-out to live subscribers. Nobody listening is fine.
    pub fn publish(&self, event: DispatchEvent) {
        let _ = self.events_tx.send(event);
    }
}
