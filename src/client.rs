//! Client registry
//!
//! Protocol clients are the sub-devices hanging off one controller: the
//! audio glue, diagnostics harnesses, and whatever else wants to exchange
//! IPC traffic. The registry hands out monotonically increasing ids, keeps
//! clients in registration order for deterministic broadcast, and owns the
//! device-naming convention the enumeration layer matches drivers against.
//!
//! A client never holds a reference back to its controller; the handle is
//! an id looked up in the controller's table, so unregistration from any
//! context stays safe.

use bitflags::bitflags;
use log::debug;

use crate::dev::DspDev;
use crate::lock;

/// Name prefix for client devices on the enumeration bus.
pub const DEV_NAME_PREFIX: &str = "adspd";

bitflags! {
    /// Client capabilities.
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct ClientFlags: u32 {
        /// Audio client: receives stream-class notifications.
        const AUDIO = 1 << 0;
        /// May receive asynchronous notifications at all.
        const NOTIFY = 1 << 1;
    }
}

/// Notification callback, handed the raw command word to interpret against
/// the client's own stream map.
pub type RxCallback = Box<dyn Fn(u32) + Send + Sync>;

/// Opaque client identity within one controller.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ClientHandle(pub(crate) u32);

pub(crate) struct Client {
    id: u32,
    name: String,
    flags: ClientFlags,
    rx: Option<RxCallback>,
}

impl Client {
    /// Bus device name: `<prefix>.<name>.<id>`. The id suffix keeps
    /// same-named clients unique per controller.
    fn dev_name(&self) -> String {
        format!("{}.{}.{}", DEV_NAME_PREFIX, self.name, self.id)
    }
}

/// Registration-ordered client table.
pub(crate) struct ClientRegistry {
    next_id: u32,
    clients: Vec<Client>,
}

impl ClientRegistry {
    pub fn new() -> Self {
        Self { next_id: 0, clients: Vec::new() }
    }
}

impl DspDev {
    /// Register a protocol client. A callback is only ever invoked when
    /// [`ClientFlags::NOTIFY`] is set; registering without one clears the
    /// flag.
    pub fn client_register(
        &self,
        name: &str,
        mut flags: ClientFlags,
        rx: Option<RxCallback>,
    ) -> ClientHandle {
        if rx.is_none() {
            flags.remove(ClientFlags::NOTIFY);
        }

        let mut reg = lock(&self.clients);
        let id = reg.next_id;
        reg.next_id += 1;

        let client = Client { id, name: name.to_string(), flags, rx };
        debug!(target: "client", "registered {} flags {:#x}", client.dev_name(), flags.bits());
        reg.clients.push(client);

        ClientHandle(id)
    }

    /// Remove a client. Returns false if the handle no longer resolves.
    pub fn client_unregister(&self, handle: ClientHandle) -> bool {
        let mut reg = lock(&self.clients);
        let before = reg.clients.len();
        reg.clients.retain(|c| c.id != handle.0);
        let removed = reg.clients.len() != before;
        if removed {
            debug!(target: "client", "unregistered client {}", handle.0);
        }
        removed
    }

    pub fn client_count(&self) -> usize {
        lock(&self.clients).clients.len()
    }

    /// Bus device name for a registered client.
    pub fn client_dev_name(&self, handle: ClientHandle) -> Option<String> {
        let reg = lock(&self.clients);
        reg.clients.iter().find(|c| c.id == handle.0).map(Client::dev_name)
    }

    /// Deliver a stream-class notification to every audio-capable client,
    /// in registration order. Callbacks run with the registry held and must
    /// not call back into it.
    pub(crate) fn stream_broadcast(&self, cmd: u32) {
        let reg = lock(&self.clients);
        for client in &reg.clients {
            if !client.flags.contains(ClientFlags::AUDIO | ClientFlags::NOTIFY) {
                continue;
            }
            if let Some(rx) = &client.rx {
                rx(cmd);
            }
        }
    }
}

/// Match a bus device name against a driver id pattern: everything before
/// the final `.<id>` suffix must equal the pattern.
pub fn id_match(dev_name: &str, id_name: &str) -> bool {
    match dev_name.rfind('.') {
        Some(pos) => &dev_name[..pos] == id_name,
        None => false,
    }
}

// ============================================================================
// Tests
// ============================================================================
