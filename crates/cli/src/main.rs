//! Terminal front end for the chat widget: drives the same widget state
//! machine as the browser build against a real backend.

use std::cell::RefCell;
use std::env;
use std::path::PathBuf;

use chatdock_core::bridge::{BridgeError, BridgeResult};
use chatdock_core::session::FileStore;
use chatdock_core::{
    ConfigResolver, HostChannel, HostMessage, HttpTransport, Message, Role, Size, ToggleSource,
    TransportError, Widget, deliver,
};
use figment::Figment;
use figment::providers::{Format, Json};
use serde_json::{Map, Value, json};
use snafu::{OptionExt, ResultExt, Snafu};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

const STORE_FILE_NAME: &str = "storage.json";
const CLI_VIEWPORT: Size = Size::new(1280.0, 800.0);

#[derive(Debug, Snafu)]
enum CliError {
    #[snafu(display("missing value for argument '{arg}'"))]
    MissingArgumentValue {
        stage: &'static str,
        arg: &'static str,
    },
    #[snafu(display("unknown argument '{raw}'"))]
    UnknownArgument { stage: &'static str, raw: String },
    #[snafu(display("failed to read widget config file: {source}"))]
    ConfigFile {
        stage: &'static str,
        source: Box<figment::Error>,
    },
    #[snafu(display("no data directory available for session storage"))]
    NoDataDir { stage: &'static str },
    #[snafu(display("failed to build chat transport: {source}"))]
    Transport {
        stage: &'static str,
        source: TransportError,
    },
    #[snafu(display("failed to read terminal input: {source}"))]
    ReadInput {
        stage: &'static str,
        source: std::io::Error,
    },
}

type CliResult<T> = Result<T, CliError>;

#[derive(Debug, Clone, Default, PartialEq)]
struct CliArgs {
    config_file: Option<PathBuf>,
    store_file: Option<PathBuf>,
    base_url: Option<String>,
    api_key: Option<String>,
    workspace_id: Option<String>,
    hosted: bool,
}

impl CliArgs {
    /// Config file contents with command-line values layered on top.
    fn overrides(&self) -> CliResult<Value> {
        let mut fields = match &self.config_file {
            Some(path) => Figment::new()
                .merge(Json::file(path))
                .extract::<Map<String, Value>>()
                .map_err(Box::new)
                .context(ConfigFileSnafu {
                    stage: "extract-config-file",
                })?,
            None => Map::new(),
        };

        for (key, value) in [
            ("baseUrl", &self.base_url),
            ("apiKey", &self.api_key),
            ("workspaceId", &self.workspace_id),
        ] {
            if let Some(value) = value {
                fields.insert(key.to_string(), Value::String(value.clone()));
            }
        }
        Ok(Value::Object(fields))
    }

    fn store_path(&self) -> CliResult<PathBuf> {
        if let Some(path) = &self.store_file {
            return Ok(path.clone());
        }
        let data_dir = dirs::data_dir().context(NoDataDirSnafu {
            stage: "resolve-store-path",
        })?;
        Ok(data_dir.join("chatdock").join(STORE_FILE_NAME))
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Command {
    Open,
    Close,
    Toggle,
    Context(String),
    Help,
    Quit,
    Say(String),
}

impl Command {
    fn parse(line: &str) -> Option<Self> {
        let line = line.trim_end_matches(['\r', '\n']);
        let Some(command) = line.strip_prefix('/') else {
            return Some(Self::Say(line.to_string()));
        };

        let (name, rest) = command.split_once(' ').unwrap_or((command, ""));
        match name {
            "open" => Some(Self::Open),
            "close" => Some(Self::Close),
            "toggle" => Some(Self::Toggle),
            "context" => Some(Self::Context(rest.trim().to_string())),
            "help" => Some(Self::Help),
            "quit" | "exit" => Some(Self::Quit),
            _ => None,
        }
    }
}

/// Prints what the widget would post to its parent page.
struct StderrChannel;

impl HostChannel for StderrChannel {
    fn post(&self, message: &HostMessage, target_origin: &str) -> BridgeResult<()> {
        let encoded = serde_json::to_string(message).map_err(|source| BridgeError::Encode {
            stage: "encode-host-message",
            source,
        })?;
        eprintln!("host <- {encoded} (origin {target_origin})");
        Ok(())
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    if let Err(error) = run().await {
        eprintln!("chatdock: {error}");
        std::process::exit(1);
    }
}

async fn run() -> CliResult<()> {
    let args = parse_args(env::args().skip(1))?;
    let resolver = ConfigResolver::new().with_local_override(&args.overrides()?);
    let transport = HttpTransport::new(&resolver.local_config()).context(TransportSnafu {
        stage: "build-config-transport",
    })?;
    let config = resolver.resolve(Some(&transport)).await;
    let transport = HttpTransport::new(&config).context(TransportSnafu {
        stage: "build-chat-transport",
    })?;

    let store = Box::new(FileStore::new(args.store_path()?));
    let widget = RefCell::new(if args.hosted {
        Widget::<()>::hosted(config, store, Box::new(StderrChannel))
    } else {
        Widget::<()>::inline(config, store, CLI_VIEWPORT)
    });
    tracing::debug!(session_id = %widget.borrow().session_id(), "session ready");

    let mut printed = print_new_messages(widget.borrow().messages(), 0);
    println!("type a message, or /help for commands");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await.context(ReadInputSnafu {
        stage: "read-stdin-line",
    })? {
        let Some(command) = Command::parse(&line) else {
            println!("unknown command: {line}");
            continue;
        };

        match command {
            Command::Quit => break,
            Command::Help => print_help(),
            Command::Open => {
                widget.borrow_mut().open();
            }
            Command::Close => {
                widget.borrow_mut().close();
            }
            Command::Toggle => {
                widget.borrow_mut().toggle(ToggleSource::Launcher);
            }
            Command::Context(title) => {
                let mut widget = widget.borrow_mut();
                let origin = widget.config().origin_policy().target_origin().to_string();
                if widget.bridge().is_none() {
                    println!("page context is only used in --hosted mode");
                } else {
                    widget.handle_host_message(&origin, &json!({ "type": "CONTEXT", "title": title }));
                }
            }
            Command::Say(text) => {
                let pending = {
                    let mut widget = widget.borrow_mut();
                    widget.set_draft(text);
                    widget.submit()
                };
                if let Some(pending) = pending {
                    printed = print_new_messages(widget.borrow().messages(), printed);
                    deliver(&widget, &transport, pending).await;
                }
            }
        }

        let widget = widget.borrow();
        printed = print_new_messages(widget.messages(), printed);
        let state = widget.ui_state();
        if state.unread > 0 {
            println!("({} unread while closed)", state.unread);
        }
    }
    Ok(())
}

fn parse_args(args: impl IntoIterator<Item = String>) -> CliResult<CliArgs> {
    let mut parsed = CliArgs::default();
    let mut pending = args.into_iter();

    while let Some(argument) = pending.next() {
        let mut value = |arg: &'static str, stage: &'static str| {
            pending
                .next()
                .context(MissingArgumentValueSnafu { stage, arg })
        };
        match argument.as_str() {
            "--config" => parsed.config_file = Some(value("--config", "parse-args-config")?.into()),
            "--store" => parsed.store_file = Some(value("--store", "parse-args-store")?.into()),
            "--base-url" => parsed.base_url = Some(value("--base-url", "parse-args-base-url")?),
            "--api-key" => parsed.api_key = Some(value("--api-key", "parse-args-api-key")?),
            "--workspace" => {
                parsed.workspace_id = Some(value("--workspace", "parse-args-workspace")?);
            }
            "--hosted" => parsed.hosted = true,
            _ => {
                return UnknownArgumentSnafu {
                    stage: "parse-args",
                    raw: argument,
                }
                .fail();
            }
        }
    }
    Ok(parsed)
}

fn print_new_messages(messages: &[Message], printed: usize) -> usize {
    for message in messages.iter().skip(printed) {
        println!("{}", format_message(message));
    }
    messages.len().max(printed)
}

fn format_message(message: &Message) -> String {
    let speaker = match message.role {
        Role::User => "you",
        Role::Bot => "bot",
        Role::System => "system",
    };
    let mut line = format!("[{speaker}] {}", message.content);

    if let Some(card) = &message.card {
        let details = [card.description.as_deref(), card.price.as_deref(), card.url.as_deref()];
        for detail in details.into_iter().flatten() {
            line.push_str("\n    ");
            line.push_str(detail);
        }
    }
    line
}

fn print_help() {
    println!("/open /close /toggle    change widget visibility");
    println!("/context <title>        simulate a CONTEXT message from the host page");
    println!("/quit                   exit");
}
