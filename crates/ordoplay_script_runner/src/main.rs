// SPDX-License-Identifier: MIT OR Apache-2.0
//! Headless script runner.
//!
//! Loads a script document, runs its start entries once and then ticks it a
//! fixed number of times, raising events on the requested ticks.

use clap::Parser;
use ordoplay_script::nodes::data::TEMPLATE_SETTING;
use ordoplay_script::nodes::entries::EVENT_SETTING;
use ordoplay_script::document::SCRIPT_EXTENSION;
use ordoplay_script::nodes::ids;
use ordoplay_script::{
    create_script_registry, BindError, ConnectionError, DocumentError, Graph, PortValue,
    ProcessError, ScriptDocument, ScriptMessage,
};
use std::path::{Path, PathBuf};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Script document (RON)
    document: PathBuf,

    /// Number of update ticks to run
    #[arg(short, long, default_value_t = 60)]
    ticks: u64,

    /// Seconds per tick
    #[arg(short, long, default_value_t = 0.016)]
    delta: f32,

    /// Raise an event before a tick, as `name@tick` or `name@tick=value`
    #[arg(short, long = "event", value_parser = parse_event)]
    events: Vec<ScheduledEvent>,

    /// Write a sample script to the document path and exit
    #[arg(long)]
    write_sample: bool,
}

/// Event raised before a given tick
#[derive(Debug, Clone, PartialEq)]
struct ScheduledEvent {
    name: String,
    tick: u64,
    payload: Option<PortValue>,
}

fn parse_event(arg: &str) -> Result<ScheduledEvent, String> {
    let (name, rest) = arg
        .split_once('@')
        .ok_or_else(|| format!("expected name@tick, got '{arg}'"))?;
    if name.is_empty() {
        return Err("event name is empty".to_string());
    }

    let (tick, payload) = match rest.split_once('=') {
        Some((tick, value)) => {
            let payload = value
                .parse::<f32>()
                .map_or_else(|_| PortValue::String(value.to_string()), PortValue::Float);
            (tick, Some(payload))
        }
        None => (rest, None),
    };
    let tick = tick
        .parse()
        .map_err(|e| format!("invalid tick '{tick}': {e}"))?;

    Ok(ScheduledEvent {
        name: name.to_string(),
        tick,
        payload,
    })
}

#[derive(Debug, thiserror::Error)]
enum RunnerError {
    #[error(transparent)]
    Document(#[from] DocumentError),

    #[error(transparent)]
    Bind(#[from] BindError),

    #[error(transparent)]
    Process(#[from] ProcessError),

    #[error("Failed to build sample script: {0}")]
    Sample(#[from] ConnectionError),

    #[error("Node type '{0}' is not registered")]
    UnknownNodeType(String),
}

/// Prints on start, once per second and whenever `ping` is raised
fn sample_graph() -> Result<Graph, RunnerError> {
    let registry = create_script_registry();
    let mut graph = Graph::new("Sample");
    let create = |type_id: &str| {
        registry
            .create_node(type_id)
            .ok_or_else(|| RunnerError::UnknownNodeType(type_id.to_string()))
    };

    let start = graph.add_node(create(ids::ON_START)?);
    let hello = graph.add_node(
        create(ids::LOG)?.with_input_default("Text", PortValue::String("Script started".to_string())),
    );
    graph.connect_by_name(start, "Exec", hello, "Exec")?;

    let update = graph.add_node(create(ids::ON_UPDATE)?.with_position(0.0, 100.0));
    let wait = graph.add_node(create(ids::WAIT)?);
    let second = graph.add_node(
        create(ids::LOG)?.with_input_default("Text", PortValue::String("One second passed".to_string())),
    );
    graph.connect_by_name(update, "Exec", wait, "Exec")?;
    graph.connect_by_name(wait, "Exec", second, "Exec")?;

    let ping = graph.add_node(
        create(ids::ON_EVENT)?
            .with_position(0.0, 200.0)
            .with_setting(EVENT_SETTING, PortValue::String("ping".to_string())),
    );
    let format = graph.add_node(
        create(ids::FORMAT)?.with_setting(TEMPLATE_SETTING, PortValue::String("ping: {}".to_string())),
    );
    let pong = graph.add_node(create(ids::LOG)?);
    graph.connect_by_name(ping, "Exec", pong, "Exec")?;
    graph.connect_by_name(ping, "Payload", format, "Value")?;
    graph.connect_by_name(format, "Text", pong, "Text")?;

    Ok(graph)
}

fn has_script_extension(path: &Path) -> bool {
    path.file_name()
        .and_then(|name| name.to_str())
        .is_some_and(|name| name.ends_with(&format!(".{SCRIPT_EXTENSION}")))
}

fn run(cli: &Cli) -> Result<(), RunnerError> {
    if !has_script_extension(&cli.document) {
        tracing::warn!(
            "'{}' does not end in .{}",
            cli.document.display(),
            SCRIPT_EXTENSION
        );
    }

    if cli.write_sample {
        ScriptDocument::new(sample_graph()?).save(&cli.document)?;
        return Ok(());
    }

    let document = ScriptDocument::load(&cli.document)?;
    let mut instance = document.instantiate(create_script_registry())?;
    instance.init()?;
    instance.run_start()?;

    for tick in 0..cli.ticks {
        for event in cli.events.iter().filter(|e| e.tick == tick) {
            tracing::debug!("Raising '{}' before tick {}", event.name, tick);
            instance.deliver(ScriptMessage::Event {
                name: event.name.clone(),
                payload: event.payload.clone(),
            })?;
        }
        instance.run_update(cli.delta)?;
    }

    let processor = instance.processor();
    tracing::info!(
        "Ran {} ticks ({:.2}s simulated), {} walks still paused",
        cli.ticks,
        processor.time().elapsed,
        processor.paused_count()
    );
    Ok(())
}

fn main() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("ordoplay_script=info,ordoplay_run=info"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    tracing::info!("OrdoPlay script runner v{}", env!("CARGO_PKG_VERSION"));

    if let Err(e) = run(&cli) {
        tracing::error!("Script run failed: {e}");
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_event() {
        assert_eq!(
            parse_event("ping@3").unwrap(),
            ScheduledEvent {
                name: "ping".to_string(),
                tick: 3,
                payload: None,
            }
        );
        assert_eq!(parse_event("ping@0=2.5").unwrap().payload, Some(PortValue::Float(2.5)));
        assert_eq!(
            parse_event("ping@0=door").unwrap().payload,
            Some(PortValue::String("door".to_string()))
        );
        assert!(parse_event("ping").is_err());
        assert!(parse_event("@1").is_err());
        assert!(parse_event("ping@soon").is_err());
    }

    #[test]
    fn test_script_extension() {
        assert!(has_script_extension(Path::new("levels/door.script.ron")));
        assert!(!has_script_extension(Path::new("levels/door.ron")));
        assert!(!has_script_extension(Path::new("levels")));
    }

    #[test]
    fn test_sample_script_runs() {
        let document = ScriptDocument::new(sample_graph().unwrap());
        let text = document.to_ron_string().unwrap();
        let mut instance = ScriptDocument::from_ron_str(&text)
            .unwrap()
            .instantiate(create_script_registry())
            .unwrap();
        instance.init().unwrap();
        assert!(instance.processor().schedule_report().is_clean());
        instance.run_start().unwrap();
        for _ in 0..3 {
            instance.run_update(0.5).unwrap();
        }
        let status = instance
            .deliver(ScriptMessage::Event {
                name: "ping".to_string(),
                payload: Some(PortValue::Int(1)),
            })
            .unwrap();
        assert!(status.is_finished());
    }
}
