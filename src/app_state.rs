//! Application State Management
//!
//! Builds every collaborator from configuration and hands them to the
//! retrieval coordinator and the HTTP handlers (dependency injection).

use log::info;
use std::path::Path;
use std::sync::Arc;

use crate::chain::{local_store::LocalMetadataStore, mock_store::MockMetadataStore, MetadataProvider};
use crate::config::{AppConfig, MetadataBackend};
use crate::error::{GatewayError, Result};
use crate::peer::{local_transport::LocalPeerTransport, peer_book::PeerBook, AddressBook, Transport};
use crate::retrieve::codec::{ErasureCodec, ReedSolomonCodec};
use crate::retrieve::scratch;
use crate::retrieve::RetrievalCoordinator;
use crate::track::TrackFileStore;

/// Application state shared by all workers
#[derive(Clone)]
pub struct AppState {
    pub coordinator: Arc<RetrievalCoordinator>,
    pub track_store: Arc<TrackFileStore>,
    pub config: AppConfig,
}

impl AppState {
    /// Create application state with backends chosen by configuration
    pub fn from_config(config: AppConfig) -> Result<Self> {
        info!("Initializing application state with configuration");

        let metadata: Arc<dyn MetadataProvider> = match config.metadata.backend {
            MetadataBackend::Local => {
                info!("Using local metadata backend at {}", config.metadata.dir.display());
                Arc::new(LocalMetadataStore::new(&config.metadata.dir))
            }
            MetadataBackend::Mock => {
                info!("Using mock metadata backend");
                Arc::new(MockMetadataStore::new())
            }
        };

        let book = PeerBook::load(&config.peers.book_file)?;
        let transport = LocalPeerTransport::new(&config.peers.transport_root);

        Self::with_collaborators(config, metadata, Arc::new(book), Arc::new(transport))
    }

    /// Create application state around externally supplied collaborators
    pub fn with_collaborators(
        config: AppConfig,
        metadata: Arc<dyn MetadataProvider>,
        address_book: Arc<dyn AddressBook>,
        transport: Arc<dyn Transport>,
    ) -> Result<Self> {
        let codec: Arc<dyn ErasureCodec> = Arc::new(ReedSolomonCodec::new(config.erasure_params())?);
        let coordinator = RetrievalCoordinator::new(metadata, address_book, transport, codec, config.fetch_timeout());
        let track_store = TrackFileStore::new(&config.track.dir)?;

        prepare_workspace(&config.retrieval.file_dir)?;

        info!("Application state initialized successfully");
        Ok(Self {
            coordinator: Arc::new(coordinator),
            track_store: Arc::new(track_store),
            config,
        })
    }

    pub fn file_dir(&self) -> &Path {
        &self.config.retrieval.file_dir
    }
}

/// Create the output directory and drop scratch space left by a crash
fn prepare_workspace(file_dir: &Path) -> Result<()> {
    std::fs::create_dir_all(file_dir).map_err(GatewayError::io(format!("create {}", file_dir.display())))?;
    let purged = scratch::purge_stale(file_dir)?;
    if purged > 0 {
        info!("Removed {} stale retrieval directories from {}", purged, file_dir.display());
    }
    Ok(())
}
