use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use clap::{Args, ValueEnum};
use guibridge_bridge::{
    Bridge, BridgeConfig, CorruptFramePolicy, DialogPolicy, HeadlessConfig, HeadlessToolkit,
    DEFAULT_EVENT_QUEUE_CAPACITY,
};
use guibridge_frame::{FrameConfig, FrameReader, LineReader, ReadFrame, DEFAULT_MAX_PAYLOAD};
use guibridge_schema::{RegistryConfig, VerbSchemaRegistry};

use crate::exit::{bridge_error, session_exit_code, CliError, CliResult, DATA_INVALID, INTERNAL, USAGE};

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum InboundMode {
    /// Length-prefixed, CRC-checked frames.
    Framed,
    /// One JSON command per line.
    Lines,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum CorruptArg {
    Close,
    Skip,
}

impl From<CorruptArg> for CorruptFramePolicy {
    fn from(arg: CorruptArg) -> Self {
        match arg {
            CorruptArg::Close => CorruptFramePolicy::Close,
            CorruptArg::Skip => CorruptFramePolicy::Skip,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum DialogArg {
    Hold,
    Confirm,
    Dismiss,
}

impl From<DialogArg> for DialogPolicy {
    fn from(arg: DialogArg) -> Self {
        match arg {
            DialogArg::Hold => DialogPolicy::Hold,
            DialogArg::Confirm => DialogPolicy::Confirm,
            DialogArg::Dismiss => DialogPolicy::Dismiss,
        }
    }
}

#[derive(Args, Debug)]
pub struct ServeArgs {
    /// Framing of commands on stdin.
    #[arg(long, value_enum, default_value = "framed")]
    pub inbound: InboundMode,

    /// Maximum payload size in bytes, both directions.
    #[arg(long, value_name = "BYTES", default_value_t = DEFAULT_MAX_PAYLOAD)]
    pub max_payload: usize,

    /// Events that may queue before emitters block.
    #[arg(long, value_name = "N", default_value_t = DEFAULT_EVENT_QUEUE_CAPACITY)]
    pub event_queue: usize,

    /// What to do with an inbound frame that fails its checksum.
    #[arg(long, value_enum, default_value = "close")]
    pub on_corrupt: CorruptArg,

    /// How dialogs that expect an answer are answered.
    #[arg(long, value_enum, default_value = "hold")]
    pub dialogs: DialogArg,

    /// Path that accepted file and folder dialogs choose (default: temp dir).
    #[arg(long, value_name = "PATH")]
    pub pick_path: Option<PathBuf>,

    /// Keep running after stdin closes, until a quit command or SIGINT.
    #[arg(long)]
    pub keep_alive: bool,

    /// Do not announce readiness with a `ready` response.
    #[arg(long)]
    pub no_ready: bool,

    /// Validate payloads against `<verb>.schema.json` files in DIR.
    #[arg(long, value_name = "DIR")]
    pub validate: Option<PathBuf>,

    /// Reject payload properties the schema does not declare.
    #[arg(long, requires = "validate")]
    pub strict_schemas: bool,

    /// Accepted for host compatibility; the toolkit is always headless.
    #[arg(long, hide = true)]
    pub headless: bool,
}

impl ServeArgs {
    fn bridge_config(&self) -> CliResult<BridgeConfig> {
        if self.max_payload == 0 {
            return Err(CliError::new(USAGE, "--max-payload must be greater than 0"));
        }
        if self.event_queue == 0 {
            return Err(CliError::new(USAGE, "--event-queue must be greater than 0"));
        }

        Ok(BridgeConfig {
            frame: FrameConfig {
                max_payload_size: self.max_payload,
            },
            event_queue_capacity: self.event_queue,
            corrupt_policy: self.on_corrupt.into(),
            exit_on_inbound_close: !self.keep_alive,
            announce_ready: !self.no_ready,
        })
    }

    fn schemas(&self) -> CliResult<Option<VerbSchemaRegistry>> {
        let Some(dir) = &self.validate else {
            return Ok(None);
        };
        let config = RegistryConfig::default().with_strict(self.strict_schemas);
        let registry = VerbSchemaRegistry::from_directory_with_config(dir, config).map_err(|err| {
            CliError::new(
                DATA_INVALID,
                format!("schema directory rejected: {err}"),
            )
        })?;
        tracing::info!(dir = %dir.display(), verbs = registry.verbs().len(), "payload schemas loaded");
        Ok(Some(registry))
    }
}

pub fn run(args: ServeArgs) -> CliResult<i32> {
    if args.headless {
        tracing::debug!("--headless given; toolkit is headless regardless");
    }
    let config = args.bridge_config()?;

    let mut toolkit_config = HeadlessConfig {
        dialog_policy: args.dialogs.into(),
        ..HeadlessConfig::default()
    };
    if let Some(path) = &args.pick_path {
        toolkit_config.picked_path = path.clone();
    }
    let toolkit = Arc::new(HeadlessToolkit::with_config(toolkit_config));
    let mut builder = Bridge::builder(toolkit).config(config);
    if let Some(schemas) = args.schemas()? {
        builder = builder.schemas(schemas);
    }
    let bridge = builder
        .build(Box::new(io::stdout()))
        .map_err(|err| bridge_error("bridge setup failed", err))?;

    install_ctrlc_handler(Arc::clone(&bridge))?;

    let stdin = io::stdin();
    let inbound: Box<dyn ReadFrame + Send> = match args.inbound {
        InboundMode::Framed => Box::new(FrameReader::with_config(stdin, config.frame)),
        InboundMode::Lines => Box::new(LineReader::with_config(stdin, config.frame)),
    };

    let summary = bridge
        .start(inbound)
        .map_err(|err| bridge_error("bridge failed", err))?;
    if summary.send_failures > 0 {
        tracing::warn!(failures = summary.send_failures, "some outbound messages were not delivered");
    }
    Ok(session_exit_code(&summary.exit))
}

fn install_ctrlc_handler(bridge: Arc<Bridge>) -> CliResult<()> {
    ctrlc::set_handler(move || bridge.request_quit()).map_err(|err| {
        CliError::new(INTERNAL, format!("signal handler setup failed: {err}"))
    })
}
