//! Digital output controller.
//!
//! Every GPIO module that owns at least one output gets exactly one FIFO
//! queue and one worker draining it, so pin writes on one module never
//! interleave while different modules proceed independently.
//!
//! ```text
//! router ──set──────► queue[module] ──► worker ──► set_pin ──► publish P/output/<name>
//!        ──pulse──► pulse task ──drive(on)──┘  ▲
//!                        │ sleep(d)            │
//!                        └──drive(off)─────────┘
//! ```
//!
//! A pulse is its own tracked task. Its two writes go through the module
//! queue and are awaited there, while the hold time is spent outside it.

use mqio_common::hal::driver::GpioModule;
use mqio_common::io::config::DigitalOutputConfig;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tracing::{error, info, warn};

use crate::bridge::MqttClient;
use crate::error::GatewayError;
use crate::supervisor::{TaskResult, TaskSupervisor};
use crate::topics;

/// What a worker does with one output.
#[derive(Debug)]
pub enum OutputAction {
    /// Raw `set` payload; validated against the on/off payloads by the worker.
    Set(String),
    /// Drive to a logical value and acknowledge once written and published.
    Drive {
        value: bool,
        done: oneshot::Sender<()>,
    },
}

/// One queued unit of work for a module worker.
#[derive(Debug)]
pub struct OutputCommand {
    pub output: Arc<DigitalOutputConfig>,
    pub action: OutputAction,
}

/// Shared state of every worker.
struct WorkerContext {
    prefix: String,
    client: Arc<dyn MqttClient>,
}

/// Owner of the per-module output queues.
pub struct OutputController {
    supervisor: Arc<TaskSupervisor>,
    outputs: HashMap<String, Arc<DigitalOutputConfig>>,
    queues: HashMap<String, mpsc::UnboundedSender<OutputCommand>>,
}

impl OutputController {
    /// Create the queues and start one worker per module referenced by an
    /// output.
    ///
    /// # Errors
    /// `GatewayError::UnknownModule` if an output references a module that
    /// is not in `modules`.
    pub fn start(
        outputs: &[DigitalOutputConfig],
        modules: &HashMap<String, Arc<dyn GpioModule>>,
        client: Arc<dyn MqttClient>,
        prefix: &str,
        supervisor: Arc<TaskSupervisor>,
    ) -> Result<Self, GatewayError> {
        let context = Arc::new(WorkerContext {
            prefix: prefix.to_string(),
            client,
        });
        let mut controller = Self {
            supervisor,
            outputs: HashMap::new(),
            queues: HashMap::new(),
        };

        for output in outputs {
            let module = modules
                .get(&output.module)
                .ok_or_else(|| GatewayError::UnknownModule(output.module.clone()))?;

            if !controller.queues.contains_key(&output.module) {
                let (tx, rx) = mpsc::unbounded_channel();
                controller.supervisor.spawn(
                    format!("output-worker:{}", output.module),
                    output_worker(output.module.clone(), module.clone(), rx, context.clone()),
                );
                controller.queues.insert(output.module.clone(), tx);
            }
            controller
                .outputs
                .insert(output.name.clone(), Arc::new(output.clone()));
        }

        Ok(controller)
    }

    /// Look up a configured output by name.
    pub fn output(&self, name: &str) -> Option<&Arc<DigitalOutputConfig>> {
        self.outputs.get(name)
    }

    fn enqueue(&self, command: OutputCommand) -> Result<(), GatewayError> {
        let module = &command.output.module;
        self.queues
            .get(module)
            .ok_or_else(|| GatewayError::UnknownModule(module.clone()))?
            .send(command)
            .map_err(|e| GatewayError::QueueClosed(e.0.output.module.clone()))
    }

    /// Queue a raw `set` payload for `output`.
    pub fn enqueue_set(
        &self,
        output: &Arc<DigitalOutputConfig>,
        payload: impl Into<String>,
    ) -> Result<(), GatewayError> {
        self.enqueue(OutputCommand {
            output: output.clone(),
            action: OutputAction::Set(payload.into()),
        })
    }

    /// Drive `output` to `value` through its module queue and wait until
    /// the write and its status publish are done.
    pub async fn drive(
        &self,
        output: &Arc<DigitalOutputConfig>,
        value: bool,
    ) -> Result<(), GatewayError> {
        let (done, ack) = oneshot::channel();
        self.enqueue(OutputCommand {
            output: output.clone(),
            action: OutputAction::Drive { value, done },
        })?;
        ack.await
            .map_err(|_| GatewayError::QueueClosed(output.module.clone()))
    }

    /// Start a timed pulse on `output`: drive to `value`, hold for the
    /// duration in `payload` (milliseconds), then drive to `!value`.
    ///
    /// An unparsable duration is logged and ignored.
    pub fn pulse(self: &Arc<Self>, output: &Arc<DigitalOutputConfig>, value: bool, payload: &str) {
        let Some(hold) = parse_duration_ms(payload) else {
            warn!(
                "Unable to parse ms value from payload {payload:?} for output '{}'",
                output.name
            );
            return;
        };

        let controller = self.clone();
        let output = output.clone();
        self.supervisor.spawn(
            format!("pulse:{}", output.name),
            async move { controller.run_pulse(output, value, hold).await },
        );
    }

    async fn run_pulse(
        &self,
        output: Arc<DigitalOutputConfig>,
        value: bool,
        hold: Duration,
    ) -> TaskResult {
        info!(
            "Turning output '{}' {} for {:?}",
            output.name,
            on_off(value),
            hold
        );
        self.drive(&output, value).await?;
        tokio::time::sleep(hold).await;
        info!(
            "Turning output '{}' {} after {:?} elapsed",
            output.name,
            on_off(!value),
            hold
        );
        self.drive(&output, !value).await
    }
}

/// Parse a pulse duration given in (possibly fractional) milliseconds.
///
/// Returns `None` for anything that is not a finite, non-negative number.
pub fn parse_duration_ms(payload: &str) -> Option<Duration> {
    let ms: f64 = payload.trim().parse().ok()?;
    if !ms.is_finite() || ms < 0.0 {
        return None;
    }
    Duration::try_from_secs_f64(ms / 1000.0).ok()
}

fn on_off(value: bool) -> &'static str {
    if value { "on" } else { "off" }
}

async fn output_worker(
    module_name: String,
    module: Arc<dyn GpioModule>,
    mut queue: mpsc::UnboundedReceiver<OutputCommand>,
    context: Arc<WorkerContext>,
) -> TaskResult {
    while let Some(OutputCommand { output, action }) = queue.recv().await {
        match action {
            OutputAction::Set(payload) => match output.value_for_payload(&payload) {
                Some(value) => apply(module.as_ref(), &output, value, &context).await,
                None => warn!(
                    "{payload:?} is not a valid payload for output '{}'. Only {:?} and {:?} are allowed",
                    output.name, output.on_payload, output.off_payload
                ),
            },
            OutputAction::Drive { value, done } => {
                apply(module.as_ref(), &output, value, &context).await;
                // The pulse task may have been cancelled meanwhile.
                let _ = done.send(());
            }
        }
    }
    info!("Output queue of module '{module_name}' closed");
    Ok(())
}

/// One hardware write followed by one status publish.
async fn apply(
    module: &dyn GpioModule,
    output: &DigitalOutputConfig,
    value: bool,
    context: &WorkerContext,
) {
    let level = output.pin_level(value);
    if let Err(e) = module.set_pin(output.pin, level).await {
        error!("Failed to set digital output '{}': {e}", output.name);
        return;
    }
    info!(
        "Digital output '{}' set to {level} ({})",
        output.name,
        on_off(value)
    );

    let topic = topics::output_topic(&context.prefix, &output.name);
    if let Err(e) = context
        .client
        .publish(&topic, output.payload(value), output.retain)
        .await
    {
        error!("Failed to publish state of output '{}': {e}", output.name);
    }
}
