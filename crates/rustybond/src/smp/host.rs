//! Event delivery and session registry
//!
//! [`SecurityHost`] owns the bond database and one [`SecurityManager`] per
//! connected peer, and routes driver events to them. [`EventLoop`] runs
//! the host on a dedicated thread, handling events strictly in the order
//! the transport produced them.

use super::bond_db::{BondDatabase, BondDbLoader, BondRecord};
use super::events::DriverEvent;
use super::manager::{PeerInfo, SecurityContext, SecurityManager};
use super::transport::SmpTransport;
use super::types::{SecurityParameters, TimeoutSource};
use crate::error::{SmpError, SmpResult};
use crate::event::EventSource;
use crate::gap::PeerAddress;
use crate::scan::ScanReport;
use crate::waitable::ScanFinishedWaitable;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::mpsc::Receiver;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::{debug, info, warn};

/// Security state shared by all connections of one local device
pub struct SecurityHost {
    context: SecurityContext,
    default_params: Mutex<SecurityParameters>,
    sessions: Mutex<HashMap<u16, Arc<SecurityManager>>>,
    on_timeout: EventSource<TimeoutSource>,
    scan_report: Arc<Mutex<ScanReport>>,
}

impl SecurityHost {
    /// Create a host, loading the bond database through `bond_loader`
    pub fn new(
        transport: Arc<dyn SmpTransport>,
        bond_loader: Arc<dyn BondDbLoader>,
        default_params: SecurityParameters,
    ) -> SmpResult<Self> {
        let db = bond_loader.load()?;
        info!(records = db.len(), "Loaded bond database");

        Ok(Self {
            context: SecurityContext {
                transport,
                bond_db: Arc::new(Mutex::new(db)),
                bond_loader,
            },
            default_params: Mutex::new(default_params),
            sessions: Mutex::new(HashMap::new()),
            on_timeout: EventSource::new("On Timeout"),
            scan_report: Arc::new(Mutex::new(ScanReport::new())),
        })
    }

    /// Parameters given to sessions created from now on
    pub fn set_default_security_params(&self, params: SecurityParameters) {
        *self.default_params.lock() = params;
    }

    pub fn default_security_params(&self) -> SecurityParameters {
        *self.default_params.lock()
    }

    pub fn session(&self, conn_handle: u16) -> Option<Arc<SecurityManager>> {
        self.sessions.lock().get(&conn_handle).cloned()
    }

    pub fn session_count(&self) -> usize {
        self.sessions.lock().len()
    }

    /// Shared handle to the bond database
    pub fn bond_db(&self) -> Arc<Mutex<BondDatabase>> {
        Arc::clone(&self.context.bond_db)
    }

    pub fn find_record(&self, peer_address: &PeerAddress, peer_is_client: bool) -> Option<BondRecord> {
        self.context
            .bond_db
            .lock()
            .find_record(peer_address, peer_is_client)
            .cloned()
    }

    /// Persist the bond database through the loader
    pub fn save_bond_db(&self) -> SmpResult<()> {
        let db = self.context.bond_db.lock();
        self.context.bond_loader.save(&db)
    }

    /// Fires for every controller timeout, whatever its source
    pub fn on_timeout(&self) -> &EventSource<TimeoutSource> {
        &self.on_timeout
    }

    /// Clear the scan report and wait for the next scan timeout
    pub fn scan_finished(&self) -> ScanFinishedWaitable {
        self.scan_report.lock().clear();
        ScanFinishedWaitable::new(&self.on_timeout, Arc::clone(&self.scan_report))
    }

    pub fn scan_report(&self) -> ScanReport {
        self.scan_report.lock().clone()
    }

    /// Route one driver event. Called from the delivery thread only.
    pub fn dispatch(&self, event: DriverEvent) {
        match &event {
            DriverEvent::Connected {
                conn_handle,
                peer_address,
                role,
            } => {
                let peer = PeerInfo {
                    conn_handle: *conn_handle,
                    peer_address: *peer_address,
                    role: *role,
                };
                info!(conn_handle, peer = %peer_address, ?role, "Peer connected");
                let session = Arc::new(SecurityManager::new(
                    peer,
                    self.default_security_params(),
                    self.context.clone(),
                ));
                if let Some(stale) = self.sessions.lock().insert(*conn_handle, session) {
                    warn!(conn_handle, "Replacing session of a connection that never disconnected");
                    stale.close();
                }
            }
            DriverEvent::Disconnected {
                conn_handle,
                reason,
            } => {
                info!(conn_handle, reason, "Peer disconnected");
                if let Some(session) = self.sessions.lock().remove(conn_handle) {
                    session.close();
                }
            }
            DriverEvent::Timeout { conn_handle, src } => {
                self.on_timeout.notify(src);
                if let Some(session) = conn_handle.and_then(|h| self.session(h)) {
                    session.handle_event(&event);
                }
            }
            DriverEvent::AdvertisingReport {
                peer_address,
                rssi,
                data,
            } => {
                self.scan_report.lock().add_report(*peer_address, *rssi, data);
            }
            _ => match event.conn_handle().and_then(|h| self.session(h)) {
                Some(session) => session.handle_event(&event),
                None => debug!(?event, "Dropping event for unknown connection"),
            },
        }
    }
}

/// Dedicated thread draining driver events into a [`SecurityHost`]
#[derive(Debug)]
pub struct EventLoop {
    handle: JoinHandle<()>,
}

impl EventLoop {
    /// Start delivering events. The loop ends once every sender of `events` is dropped.
    pub fn spawn(host: Arc<SecurityHost>, events: Receiver<DriverEvent>) -> SmpResult<Self> {
        let handle = thread::Builder::new()
            .name("smp-event-loop".into())
            .spawn(move || {
                for event in events {
                    host.dispatch(event);
                }
                debug!("Driver event channel closed");
            })
            .map_err(|e| SmpError::Thread(format!("Failed to spawn event loop: {}", e)))?;
        Ok(Self { handle })
    }

    pub fn join(self) -> SmpResult<()> {
        self.handle
            .join()
            .map_err(|_| SmpError::Thread("Event loop panicked".into()))
    }
}
