use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::watch;

/// Single authoritative projection of the endpoint's observable state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlStatus {
    Disconnected,
    Locked,
    Restricted,
    Controlled,
    Free,
}

impl ControlStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Locked => "locked",
            Self::Restricted => "restricted",
            Self::Controlled => "controlled",
            Self::Free => "free",
        }
    }
}

/// Independent facts the projection is computed from. The flags are not
/// mutually exclusive in storage; precedence lives in [`project`] alone.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EndpointFlags {
    pub connected: bool,
    pub screen_locked: bool,
    pub apps_restricted: bool,
    pub remote_controlled: bool,
}

/// Strict precedence: disconnected over locked over restricted over
/// controlled, else free.
pub fn project(flags: EndpointFlags) -> ControlStatus {
    if !flags.connected {
        ControlStatus::Disconnected
    } else if flags.screen_locked {
        ControlStatus::Locked
    } else if flags.apps_restricted {
        ControlStatus::Restricted
    } else if flags.remote_controlled {
        ControlStatus::Controlled
    } else {
        ControlStatus::Free
    }
}

/// Shared flag store that publishes every projection change over a watch
/// channel. All mutations go through [`StatusBoard::update`] so the projected
/// status can never drift from the flags.
pub struct StatusBoard {
    flags: Mutex<EndpointFlags>,
    tx: watch::Sender<ControlStatus>,
}

impl StatusBoard {
    pub fn new() -> (Arc<Self>, watch::Receiver<ControlStatus>) {
        let (tx, rx) = watch::channel(ControlStatus::Disconnected);
        (
            Arc::new(Self {
                flags: Mutex::new(EndpointFlags::default()),
                tx,
            }),
            rx,
        )
    }

    pub fn update(&self, apply: impl FnOnce(&mut EndpointFlags)) -> ControlStatus {
        let mut flags = self.flags.lock();
        apply(&mut flags);
        let status = project(*flags);
        self.tx.send_if_modified(|current| {
            if *current == status {
                false
            } else {
                *current = status;
                true
            }
        });
        status
    }

    pub fn flags(&self) -> EndpointFlags {
        *self.flags.lock()
    }

    pub fn current(&self) -> ControlStatus {
        *self.tx.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<ControlStatus> {
        self.tx.subscribe()
    }
}
