use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::{sleep_until, Instant};
use tracing::{debug, info};

use crate::bbr::Manager;
use crate::protocol::{Message, MessageInfo};

/// Idle wake-up used when the expiry timer is stopped
const IDLE_WAKEUP: Duration = Duration::from_secs(3600);

/// Inputs to the manager's event loop
#[derive(Debug, Clone)]
pub enum Event {
    /// Inbound TMF request from the mesh
    Request {
        /// Decoded request
        message: Message,
        /// Where it came from
        info: MessageInfo,
    },
    /// The local Backbone Router role may have changed
    RoleChanged,
}

/// Runs a manager on one task, one event at a time
pub struct Driver {
    manager: Manager,
    events: mpsc::Receiver<Event>,
}

impl Driver {
    /// Creates a driver consuming `events`
    pub fn new(manager: Manager, events: mpsc::Receiver<Event>) -> Self {
        Driver { manager, events }
    }

    /// Processes events until every sender is dropped, then returns the manager
    pub async fn run(mut self) -> Manager {
        self.manager.handle_state_changed();
        info!(role = self.manager.state().label(), "backbone router manager running");

        loop {
            let deadline = self.manager.timer_deadline();
            let wake = deadline.map_or_else(|| Instant::now() + IDLE_WAKEUP, Instant::from_std);

            tokio::select! {
                event = self.events.recv() => match event {
                    Some(Event::Request { message, info }) => {
                        if !self.manager.handle_request(&message, &info) {
                            debug!(path = ?message.uri_path, peer = %info.peer_addr, "request not handled");
                        }
                    }
                    Some(Event::RoleChanged) => self.manager.handle_state_changed(),
                    None => break,
                },
                _ = sleep_until(wake), if deadline.is_some() => self.manager.handle_timer(),
            }
        }

        info!("event channel closed, manager stopped");
        self.manager
    }
}
