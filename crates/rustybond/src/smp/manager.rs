//! Per-connection security manager
//!
//! A [`SecurityManager`] drives the security procedures of one connected
//! peer. Driver events are fed to [`SecurityManager::handle_event`] from the
//! single delivery thread; [`SecurityManager::pair`] and
//! [`SecurityManager::set_security_params`] may be called from any thread.
//!
//! Lock order is session state first, then the session guard, then the
//! bond database. No lock is held while listeners run.

use super::bond_db::{BondDatabase, BondDbLoader, BondRecord, BondRecordId};
use super::events::DriverEvent;
use super::keys::{BondingData, KeySet, MasterId};
use super::transport::SmpTransport;
use super::types::*;
use crate::error::{SmpError, SmpResult};
use crate::event::EventSource;
use crate::gap::{PeerAddress, Role};
use crate::waitable::Waitable;
use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;
use std::thread;
use tracing::{debug, error, info, warn};

/// Collaborators shared by every session of a host
#[derive(Clone)]
pub struct SecurityContext {
    pub transport: Arc<dyn SmpTransport>,
    pub bond_db: Arc<Mutex<BondDatabase>>,
    pub bond_loader: Arc<dyn BondDbLoader>,
}

/// The connected peer a session belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PeerInfo {
    pub conn_handle: u16,
    pub peer_address: PeerAddress,
    /// Our role on the connection
    pub role: Role,
}

impl PeerInfo {
    pub fn peer_is_client(&self) -> bool {
        self.role.peer_is_client()
    }
}

#[derive(Debug)]
struct GuardState {
    /// Cleared when the connection goes away
    alive: bool,
    busy: bool,
    /// Bumped every time a pairing procedure starts
    generation: u64,
    phase: PairingState,
    last_status: Option<SecurityStatus>,
}

/// Busy flag and session identity, shared with passkey resolvers
#[derive(Debug)]
struct SessionGuard {
    state: Mutex<GuardState>,
}

impl SessionGuard {
    fn new() -> Self {
        Self {
            state: Mutex::new(GuardState {
                alive: true,
                busy: false,
                generation: 0,
                phase: PairingState::Idle,
                last_status: None,
            }),
        }
    }
}

impl GuardState {
    fn begin(&mut self) {
        if !self.busy {
            self.busy = true;
            self.generation += 1;
        }
    }

    fn is_current(&self, generation: u64) -> bool {
        self.alive && self.busy && self.generation == generation
    }

    /// End the running procedure. Returns the generation it belonged to.
    fn finish(&mut self, status: SecurityStatus) -> u64 {
        self.busy = false;
        self.phase = PairingState::Complete(status);
        self.last_status = Some(status);
        self.generation
    }

    /// Back to idle, unless a listener already started the next procedure
    fn settle(&mut self, generation: u64) {
        if self.generation == generation && matches!(self.phase, PairingState::Complete(_)) {
            self.phase = PairingState::Idle;
        }
    }
}

/// Sends the user's passkey or OOB key back to the controller.
///
/// Resolving after the pairing procedure ended, after another procedure
/// started, or after the peer disconnected does nothing.
#[derive(Clone)]
pub struct PasskeyResolver {
    transport: Arc<dyn SmpTransport>,
    guard: Arc<SessionGuard>,
    conn_handle: u16,
    key_type: AuthKeyType,
    generation: u64,
}

impl fmt::Debug for PasskeyResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PasskeyResolver")
            .field("conn_handle", &self.conn_handle)
            .field("key_type", &self.key_type)
            .field("generation", &self.generation)
            .finish()
    }
}

impl PasskeyResolver {
    pub fn key_type(&self) -> AuthKeyType {
        self.key_type
    }

    /// Whether a resolution would still reach the controller
    pub fn is_current(&self) -> bool {
        self.guard.state.lock().is_current(self.generation)
    }

    /// Send `key` to the controller. It must be of the requested key type.
    pub fn resolve(&self, key: AuthKey) -> SmpResult<()> {
        key.validate()?;
        if key.key_type() != self.key_type {
            return Err(SmpError::InvalidInput(format!(
                "Expected a {:?} key, got {:?}",
                self.key_type,
                key.key_type()
            )));
        }

        // Hold the guard across the send so teardown cannot interleave
        let mut state = self.guard.state.lock();
        if !state.is_current(self.generation) {
            debug!(conn_handle = self.conn_handle, "Ignoring stale auth key resolution");
            return Ok(());
        }
        self.transport
            .auth_key_reply(self.conn_handle, self.key_type, &key.to_bytes())?;
        if state.phase == PairingState::AwaitingAuthKey {
            state.phase = PairingState::Negotiating;
        }
        Ok(())
    }

    pub fn resolve_passkey(&self, passkey: u32) -> SmpResult<()> {
        self.resolve(AuthKey::Passkey(passkey))
    }

    pub fn resolve_oob(&self, key: [u8; 16]) -> SmpResult<()> {
        self.resolve(AuthKey::Oob(key))
    }
}

/// Payload of the passkey-entry notification
#[derive(Debug, Clone)]
pub struct PasskeyEntryEventArgs {
    pub conn_handle: u16,
    pub key_type: AuthKeyType,
    pub resolver: PasskeyResolver,
}

impl PasskeyEntryEventArgs {
    pub fn resolve(&self, key: AuthKey) -> SmpResult<()> {
        self.resolver.resolve(key)
    }
}

#[derive(Debug)]
struct SessionState {
    params: SecurityParameters,
    /// Parameters the peer offered in its last pairing request
    peer_params: Option<SecParams>,
    keyset: KeySet,
    bond_record: Option<BondRecordId>,
}

/// Drives pairing and bonding with one connected peer
pub struct SecurityManager {
    peer: PeerInfo,
    context: SecurityContext,
    guard: Arc<SessionGuard>,
    session: Mutex<SessionState>,
    on_pairing_complete: EventSource<PairingCompleteEventArgs>,
    on_passkey_display: EventSource<PasskeyDisplayEventArgs>,
    on_passkey_required: EventSource<PasskeyEntryEventArgs>,
}

impl fmt::Debug for SecurityManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecurityManager")
            .field("peer", &self.peer)
            .field("state", &self.state())
            .field("busy", &self.is_busy())
            .finish()
    }
}

impl SecurityManager {
    /// Create the session for a newly connected peer and look the peer up
    /// in the bond database
    pub fn new(peer: PeerInfo, params: SecurityParameters, context: SecurityContext) -> Self {
        let bond_record = context
            .bond_db
            .lock()
            .find_record(&peer.peer_address, peer.peer_is_client())
            .map(|record| {
                info!(
                    conn_handle = peer.conn_handle,
                    identity = %record.peer_addr,
                    "Connected to previously bonded device"
                );
                record.id()
            });

        Self {
            peer,
            context,
            guard: Arc::new(SessionGuard::new()),
            session: Mutex::new(SessionState {
                params,
                peer_params: None,
                keyset: KeySet::default(),
                bond_record,
            }),
            on_pairing_complete: EventSource::new("On Pairing Complete"),
            on_passkey_display: EventSource::new("On Passkey Display"),
            on_passkey_required: EventSource::new("On Passkey Entry"),
        }
    }

    pub fn peer(&self) -> &PeerInfo {
        &self.peer
    }

    pub fn conn_handle(&self) -> u16 {
        self.peer.conn_handle
    }

    pub fn is_busy(&self) -> bool {
        self.guard.state.lock().busy
    }

    /// Current phase. A finished procedure is reported as `Complete` while
    /// its pairing-complete listeners run, and as `Idle` afterwards.
    pub fn state(&self) -> PairingState {
        self.guard.state.lock().phase
    }

    /// Outcome of the most recent pairing procedure on this connection
    pub fn last_status(&self) -> Option<SecurityStatus> {
        self.guard.state.lock().last_status
    }

    pub fn security_params(&self) -> SecurityParameters {
        self.session.lock().params
    }

    /// Parameters the peer sent with its last pairing request, if the
    /// controller reported them
    pub fn peer_security_params(&self) -> Option<SecParams> {
        self.session.lock().peer_params
    }

    /// Key set from the last bonded pairing on this connection
    pub fn keyset(&self) -> KeySet {
        self.session.lock().keyset
    }

    /// The bond record this peer is associated with, if any
    pub fn bond_record(&self) -> Option<BondRecord> {
        let id = self.session.lock().bond_record?;
        self.context.bond_db.lock().get(id).cloned()
    }

    pub fn security_level(&self) -> SecurityLevel {
        self.bond_record()
            .map(|record| record.bonding_data.security_level())
            .unwrap_or(SecurityLevel::None)
    }

    /// Fires when a pairing procedure ends, successfully or not
    pub fn on_pairing_complete(&self) -> &EventSource<PairingCompleteEventArgs> {
        &self.on_pairing_complete
    }

    /// Fires when a passkey must be shown to the user
    pub fn on_passkey_display_required(&self) -> &EventSource<PasskeyDisplayEventArgs> {
        &self.on_passkey_display
    }

    /// Fires, on its own thread, when the user must enter a passkey or OOB key
    pub fn on_passkey_required(&self) -> &EventSource<PasskeyEntryEventArgs> {
        &self.on_passkey_required
    }

    /// Replace the security parameters used with this peer
    pub fn set_security_params(&self, params: SecurityParameters) -> SmpResult<()> {
        let mut session = self.session.lock();
        if self.guard.state.lock().busy {
            return Err(SmpError::InvalidOperation(
                "Cannot change security parameters while pairing".into(),
            ));
        }
        session.params = params;
        Ok(())
    }

    /// Start pairing with the peer.
    ///
    /// The returned waitable resolves when the procedure ends, whatever the
    /// outcome; inspect its status.
    pub fn pair(&self) -> SmpResult<Waitable<PairingCompleteEventArgs>> {
        let sec_params = {
            let mut session = self.session.lock();
            let mut guard = self.guard.state.lock();
            if guard.busy {
                return Err(SmpError::InvalidState("Security manager busy".into()));
            }
            if session.params.reject_pairing_requests {
                return Err(SmpError::InvalidOperation(
                    "Cannot initiate pairing while rejecting pairing requests".into(),
                ));
            }
            guard.begin();
            guard.phase = PairingState::Negotiating;
            session.params.to_sec_params()
        };

        // Listen before sending so a fast completion is not missed
        let waitable = Waitable::from_event(&self.on_pairing_complete);

        info!(conn_handle = self.peer.conn_handle, "Starting pairing");
        if let Err(e) = self
            .context
            .transport
            .authenticate(self.peer.conn_handle, &sec_params)
        {
            let mut guard = self.guard.state.lock();
            guard.busy = false;
            guard.phase = PairingState::Idle;
            return Err(e);
        }
        Ok(waitable)
    }

    /// Handle a driver event addressed to this connection.
    ///
    /// Failures are logged; the delivery thread keeps going.
    pub fn handle_event(&self, event: &DriverEvent) {
        let result = match event {
            DriverEvent::SecParamsRequest { peer_params, .. } => self.on_sec_params_request(*peer_params),
            DriverEvent::SecInfoRequest { master_id, .. } => self.on_sec_info_request(master_id),
            DriverEvent::AuthKeyRequest { key_type, .. } => self.on_auth_key_request(*key_type),
            DriverEvent::PasskeyDisplay {
                passkey,
                match_request,
                ..
            } => {
                self.on_passkey_display(*passkey, *match_request);
                Ok(())
            }
            DriverEvent::AuthStatus { status, bonded, .. } => {
                self.on_authentication_status(*status, *bonded);
                Ok(())
            }
            DriverEvent::Timeout { src, .. } => {
                self.on_timeout(*src);
                Ok(())
            }
            _ => Ok(()),
        };

        if let Err(e) = result {
            error!(conn_handle = self.peer.conn_handle, error = %e, "Failed to handle security event");
        }
    }

    /// Invalidate the session once the peer has disconnected
    pub fn close(&self) {
        let mut guard = self.guard.state.lock();
        guard.alive = false;
        guard.busy = false;
        guard.phase = PairingState::Idle;
    }

    fn on_sec_params_request(&self, peer_params: Option<SecParams>) -> SmpResult<()> {
        let (status, sec_params, keyset, reject) = {
            let mut session = self.session.lock();
            session.peer_params = peer_params;
            let reject = session.params.reject_pairing_requests;
            // Only the peripheral supplies parameters here; the central
            // already sent its own with the authenticate command
            let sec_params = if self.peer.peer_is_client() {
                Some(session.params.to_sec_params())
            } else {
                None
            };
            let mut guard = self.guard.state.lock();
            let status = if reject {
                SecurityStatus::PairingNotSupported
            } else {
                guard.begin();
                SecurityStatus::Success
            };
            guard.phase = PairingState::AwaitingSecurityParamsReply;
            (status, sec_params, session.keyset, reject)
        };

        debug!(conn_handle = self.peer.conn_handle, %status, "Replying to security params request");
        let result = self.context.transport.sec_params_reply(
            self.peer.conn_handle,
            status,
            sec_params.as_ref(),
            &keyset,
        );

        let mut guard = self.guard.state.lock();
        if reject || result.is_err() {
            if !reject {
                guard.busy = false;
            }
            guard.phase = PairingState::Idle;
        } else {
            guard.phase = PairingState::Negotiating;
        }
        result
    }

    fn on_sec_info_request(&self, master_id: &MasterId) -> SmpResult<()> {
        let (found, previous) = {
            let mut session = self.session.lock();
            let found = self
                .context
                .bond_db
                .lock()
                .find_record_by_master_id(master_id, self.peer.peer_is_client())
                .map(|(record, reason)| {
                    info!(
                        conn_handle = self.peer.conn_handle,
                        peer = %self.peer.peer_address,
                        identity = %record.peer_addr,
                        ?reason,
                        "Found bond record for security info request"
                    );
                    (record.id(), record.bonding_data.own_ltk.enc_info)
                });
            if let Some((id, _)) = found {
                session.bond_record = Some(id);
            }
            let mut guard = self.guard.state.lock();
            let previous = guard.phase;
            guard.phase = PairingState::AwaitingKeyInfo;
            (found, previous)
        };

        let result = match &found {
            Some((_, enc_info)) => self.context.transport.sec_info_reply(
                self.peer.conn_handle,
                Some(enc_info),
                None,
                None,
            ),
            None => {
                debug!(conn_handle = self.peer.conn_handle, "No stored keys for security info request");
                self.context
                    .transport
                    .sec_info_reply(self.peer.conn_handle, None, None, None)
            }
        };

        self.guard.state.lock().phase = previous;
        result
    }

    fn on_auth_key_request(&self, key_type: AuthKeyType) -> SmpResult<()> {
        let generation = {
            let mut guard = self.guard.state.lock();
            guard.phase = PairingState::AwaitingAuthKey;
            guard.generation
        };

        let args = PasskeyEntryEventArgs {
            conn_handle: self.peer.conn_handle,
            key_type,
            resolver: PasskeyResolver {
                transport: Arc::clone(&self.context.transport),
                guard: Arc::clone(&self.guard),
                conn_handle: self.peer.conn_handle,
                key_type,
                generation,
            },
        };

        // Listeners may block on user input, keep them off the delivery thread
        let source = self.on_passkey_required.clone();
        thread::Builder::new()
            .name(format!("{} Passkey Entry", self.peer.conn_handle))
            .spawn(move || source.notify(&args))
            .map(|_| ())
            .map_err(|e| SmpError::Thread(format!("Failed to spawn passkey entry thread: {}", e)))
    }

    fn on_passkey_display(&self, passkey: u32, match_request: bool) {
        self.on_passkey_display.notify(&PasskeyDisplayEventArgs {
            conn_handle: self.peer.conn_handle,
            passkey,
            match_request,
        });
    }

    fn on_authentication_status(&self, status: SecurityStatus, bonded: bool) {
        let generation = self.guard.state.lock().finish(status);
        info!(conn_handle = self.peer.conn_handle, %status, bonded, "Authentication complete");

        if status.is_success() && bonded {
            if let Err(e) = self.store_bond() {
                error!(conn_handle = self.peer.conn_handle, error = %e, "Failed to store bond");
            }
        }

        self.on_pairing_complete.notify(&PairingCompleteEventArgs {
            conn_handle: self.peer.conn_handle,
            status,
        });
        self.guard.state.lock().settle(generation);
    }

    fn on_timeout(&self, src: TimeoutSource) {
        if src != TimeoutSource::SecurityRequest {
            return;
        }
        let generation = self.guard.state.lock().finish(SecurityStatus::Timeout);
        warn!(conn_handle = self.peer.conn_handle, "Security request timed out");
        self.on_pairing_complete.notify(&PairingCompleteEventArgs {
            conn_handle: self.peer.conn_handle,
            status: SecurityStatus::Timeout,
        });
        self.guard.state.lock().settle(generation);
    }

    /// Create or update the bond record for this peer and persist the database.
    ///
    /// The record found at connect time (or by master id) is preferred; if
    /// there is none the peer's identity address is looked up. Any other
    /// record left with the same identity address and role is removed.
    fn store_bond(&self) -> SmpResult<()> {
        let keyset = self.context.transport.load_keyset(self.peer.conn_handle)?;
        let bonding_data = BondingData::from_keyset(&keyset);
        let peer_is_client = self.peer.peer_is_client();
        let identity_key = keyset.peer_keys.id_key;
        let identity_addr = identity_key
            .map(|id| id.peer_addr)
            .unwrap_or(self.peer.peer_address);

        let mut session = self.session.lock();
        session.keyset = keyset;

        let mut db = self.context.bond_db.lock();
        let existing = session
            .bond_record
            .filter(|id| db.get(*id).is_some())
            .or_else(|| db.find_record(&identity_addr, peer_is_client).map(|r| r.id()));

        let id = match existing.and_then(|id| db.get_mut(id)) {
            Some(record) => {
                debug!(record = ?record.id(), "Updating bond record");
                record.bonding_data = bonding_data;
                if identity_key.is_some() {
                    record.peer_addr = identity_addr;
                }
                record.id()
            }
            None => {
                info!(conn_handle = self.peer.conn_handle, identity = %identity_addr, "New bonded device, creating a DB entry");
                let record = db.create(identity_addr, peer_is_client, bonding_data);
                db.add(record)
            }
        };

        let removed = db.dedupe_identity(id);
        if removed > 0 {
            info!(record = ?id, removed, "Merged duplicate bond records");
        }
        session.bond_record = Some(id);

        if let Some(id_key) = &identity_key {
            debug!(irk = %hex::encode(id_key.irk), "Stored peer IRK");
        }
        self.context.bond_loader.save(&db)
    }
}
