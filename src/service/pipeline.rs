//! # Loot Pipeline
//!
//! Synchronous decode-and-correlate path for one raw UDP payload:
//! `FrameDecoder` -> `EventRouter` -> `LootCorrelator` -> `WorldState`.
//!
//! The pipeline owns all per-session mutable state (fragments and world) and
//! never blocks. Callers share it behind a single lock.

use std::sync::Arc;

use tracing::{debug, info, instrument, trace};

use crate::catalog::ItemCatalog;
use crate::config::SessionConfig;
use crate::core::frame::FrameDecoder;
use crate::core::message::DecodedMessage;
use crate::error::Miss;
use crate::protocol::{EventCodes, EventRouter, LootCorrelator};
use crate::utils::metrics::Metrics;
use crate::world::{LootEvent, WorldState};

#[derive(Debug)]
pub struct LootPipeline {
    decoder: FrameDecoder,
    router: EventRouter,
    correlator: LootCorrelator,
    world: WorldState,
    metrics: Arc<Metrics>,
}

impl LootPipeline {
    pub fn new(config: &SessionConfig, codes: EventCodes, catalog: Arc<dyn ItemCatalog>) -> Self {
        Self::with_metrics(config, codes, catalog, Arc::new(Metrics::new()))
    }

    pub fn with_metrics(
        config: &SessionConfig,
        codes: EventCodes,
        catalog: Arc<dyn ItemCatalog>,
        metrics: Arc<Metrics>,
    ) -> Self {
        let decoder = FrameDecoder::new(
            config.decoder.fragment_limits(),
            config.decoder.max_value_depth,
        )
        .with_metrics(Arc::clone(&metrics));
        Self {
            decoder,
            router: EventRouter::new(codes),
            correlator: LootCorrelator::new(catalog, config.catalog.locale.clone()),
            world: WorldState::new(),
            metrics,
        }
    }

    /// Decode one raw payload and return the loot events it completes.
    #[instrument(skip_all, level = "trace", fields(len = data.len()))]
    pub fn process_packet(&mut self, data: &[u8]) -> Vec<LootEvent> {
        let messages = self.decoder.handle_packet(data);
        messages
            .iter()
            .filter_map(|message| self.process_message(message))
            .collect()
    }

    /// Route and apply one decoded message.
    pub fn process_message(&mut self, message: &DecodedMessage) -> Option<LootEvent> {
        let route = self.router.route(message)?;
        match self.correlator.handle(&mut self.world, route, message) {
            Ok(Some(event)) => {
                self.metrics.loot_event();
                info!(
                    looted_by = %event.looted_by,
                    looted_from = %event.looted_from,
                    item = %event.item_id,
                    quantity = event.quantity,
                    "Loot"
                );
                Some(event)
            }
            Ok(None) => None,
            Err(miss) => {
                self.metrics.correlation_miss();
                match miss {
                    Miss::SelfUnknown | Miss::JoinFailed(_) => {
                        debug!(route = route.name(), reason = %miss, "Handler skipped")
                    }
                    _ => trace!(route = route.name(), reason = %miss, "Handler skipped"),
                }
                None
            }
        }
    }

    pub fn world(&self) -> &WorldState {
        &self.world
    }

    pub fn world_mut(&mut self) -> &mut WorldState {
        &mut self.world
    }

    pub fn decoder(&self) -> &FrameDecoder {
        &self.decoder
    }

    pub fn metrics(&self) -> &Arc<Metrics> {
        &self.metrics
    }

    /// Drop partially reassembled fragments.
    pub fn reset_fragments(&mut self) {
        self.decoder.reset();
    }
}
