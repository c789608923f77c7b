//! Inbound topic routing.
//!
//! Maps `<prefix>/output/<name>/<suffix>` onto the output controller:
//! `set` is queued on the owning module, `set_on_ms` and `set_off_ms`
//! start a pulse. Everything else is ignored.

use std::sync::Arc;
use tracing::{debug, error, warn};

use crate::output::OutputController;
use crate::topics::{OutputRequest, output_name_from_topic};

pub struct Router {
    prefix: String,
    controller: Arc<OutputController>,
}

impl Router {
    pub fn new(prefix: impl Into<String>, controller: Arc<OutputController>) -> Self {
        Self {
            prefix: prefix.into(),
            controller,
        }
    }

    /// Handle one decoded inbound message. Never fails: malformed requests
    /// are logged and dropped.
    pub fn handle(&self, topic: &str, payload: &str) {
        let Some(request) = OutputRequest::from_topic(topic) else {
            debug!("Ignoring message to topic {topic:?} which doesn't end with '/set' etc.");
            return;
        };

        let name = match output_name_from_topic(topic, &self.prefix) {
            Ok(name) => name,
            Err(e) => {
                warn!("Unable to parse topic: {e}");
                return;
            }
        };

        let Some(output) = self.controller.output(name) else {
            warn!("No digital output named '{name}' (topic {topic:?})");
            return;
        };

        match request {
            OutputRequest::Set => {
                if let Err(e) = self.controller.enqueue_set(output, payload) {
                    error!("Unable to queue {payload:?} for output '{name}': {e}");
                }
            }
            OutputRequest::SetOnMs => self.controller.pulse(output, true, payload),
            OutputRequest::SetOffMs => self.controller.pulse(output, false, payload),
        }
    }
}
