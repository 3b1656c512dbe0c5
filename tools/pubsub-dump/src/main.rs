// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! pubsub-dump - Decode and print captured OPC UA PubSub frames
//!
//! Each input file holds one transport frame. Files are decoded in order as a
//! single stream, so UADP chunk trains split across files are reassembled.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::Local;
use clap::Parser;
use colored::*;
use opcua_pubsub::json::value::{variant_to_json, ValueOptions};
use opcua_pubsub::uadp::DiscoveryPayload;
use opcua_pubsub::{
    decode_stream, encode, CodecContext, DataSetMessage, EncoderConfig, JsonMetaDataMessage, MessageCodec,
    MetaDataStore, PubSubMessage,
};
use serde_json::{json, Map, Value};
use std::collections::VecDeque;
use std::path::{Path, PathBuf};

/// Decode and print captured OPC UA PubSub frames
#[derive(Parser, Debug)]
#[command(name = "pubsub-dump")]
#[command(version = "0.1.0")]
#[command(about = "Decode captured OPC UA PubSub frames (UADP, JSON, Avro)")]
struct Args {
    /// Frame files, decoded in the given order
    #[arg(required = true)]
    frames: Vec<PathBuf>,

    /// Transport content type (auto = guess from the first frame)
    #[arg(short = 't', long, default_value = "auto")]
    content_type: String,

    /// Output format: pretty, json, compact
    #[arg(short, long, default_value = "pretty")]
    format: OutputFormat,

    /// JSON ua-metadata message files used to decode RawData payloads
    #[arg(short, long)]
    metadata: Vec<PathBuf>,

    /// Avro schema file (JSON text) for avro/* content types
    #[arg(long)]
    schema: Option<PathBuf>,

    /// Encoder configuration (YAML or JSON) used by --reencode
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Re-encode every decoded data message with --config
    #[arg(long, requires = "config")]
    reencode: bool,

    /// Disable colored output
    #[arg(long)]
    no_color: bool,
}

#[derive(Clone, Debug, PartialEq)]
enum OutputFormat {
    Pretty,
    Json,
    Compact,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pretty" | "p" => Ok(OutputFormat::Pretty),
            "json" | "j" => Ok(OutputFormat::Json),
            "compact" | "c" => Ok(OutputFormat::Compact),
            _ => Err(format!("Unknown format: {}", s)),
        }
    }
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let args = Args::parse();

    if args.no_color || !is_tty() {
        colored::control::set_override(false);
    }

    if let Err(e) = run_dump(&args) {
        eprintln!("{}: {}", "Error".red().bold(), e);
        std::process::exit(1);
    }
}

fn run_dump(args: &Args) -> Result<(), Box<dyn std::error::Error>> {
    let ctx = CodecContext::default();
    let store = MetaDataStore::new();
    for path in &args.metadata {
        load_metadata(path, &ctx, &store)?;
    }

    let config = match &args.config {
        Some(path) => Some(EncoderConfig::from_file(path)?),
        None => None,
    };

    let frames = args
        .frames
        .iter()
        .map(std::fs::read)
        .collect::<Result<Vec<_>, _>>()?;
    let content_type = if args.content_type.eq_ignore_ascii_case("auto") {
        guess_content_type(frames.first().map(Vec::as_slice).unwrap_or_default()).to_string()
    } else {
        args.content_type.clone()
    };
    let schema = match &args.schema {
        Some(path) => Some(std::fs::read_to_string(path)?),
        None => None,
    };

    if args.format == OutputFormat::Pretty {
        eprintln!(
            "{} {} {} frame(s) as {}",
            ">>>".green().bold(),
            "Decoding".bold(),
            frames.len(),
            content_type.cyan()
        );
        eprintln!();
    }

    let total = frames.len();
    let mut stream = decode_stream(frames, &content_type, &ctx, Some(&store));
    if let Some(schema) = &schema {
        stream = stream.with_message_schema(schema);
    }

    let mut count = 0u64;
    for mut msg in stream.by_ref() {
        count += 1;
        register(&msg, &store);
        print_message(&msg, &args.format, &ctx, count);
        if let (true, Some(config)) = (args.reencode, &config) {
            reencode(&mut msg, config, &ctx, &store, &args.format);
        }
    }

    let pending = stream.reassembler().pending_count();
    eprintln!(
        "\n{} Decoded {} message(s) from {} frame(s){}",
        "---".dimmed(),
        count,
        total,
        if pending > 0 {
            format!(", {} unfinished chunk train(s)", pending)
        } else {
            String::new()
        }
    );
    Ok(())
}

fn load_metadata(path: &Path, ctx: &CodecContext, store: &MetaDataStore) -> Result<(), Box<dyn std::error::Error>> {
    let mut frames: VecDeque<Vec<u8>> = vec![std::fs::read(path)?].into();
    let mut msg = JsonMetaDataMessage::default();
    msg.try_decode(ctx, &mut frames, None)?;
    if msg.register(store).is_none() {
        return Err(format!("{}: no metadata in message", path.display()).into());
    }
    log::info!("loaded metadata for writer {} from {}", msg.data_set_writer_id, path.display());
    Ok(())
}

fn guess_content_type(frame: &[u8]) -> &'static str {
    match frame {
        [0x1F, 0x8B, ..] => "application/json;gzip",
        [b'{' | b'[', ..] => "application/json",
        _ => "application/octet-stream",
    }
}

/// Announced metadata becomes available to later frames.
fn register(msg: &PubSubMessage, store: &MetaDataStore) {
    match msg {
        PubSubMessage::UadpDiscovery(d) => {
            d.register(store);
        }
        PubSubMessage::JsonMetaData(m) => {
            m.register(store);
        }
        _ => {}
    }
}

// ============================================================================
// Output
// ============================================================================

fn fields_json(ds: &DataSetMessage, ctx: &CodecContext) -> Value {
    let opts = ValueOptions {
        ctx,
        reversible: false,
        advanced: false,
    };
    let mut fields = Map::new();
    for (name, dv) in ds.payload.iter() {
        let value = dv
            .and_then(|dv| variant_to_json(&dv.value, &opts).ok())
            .unwrap_or(Value::Null);
        fields.insert(name.to_string(), value);
    }
    Value::Object(fields)
}

fn summary(msg: &PubSubMessage, ctx: &CodecContext, seq: u64) -> Value {
    let mut obj = json!({
        "seq": seq,
        "kind": msg.kind(),
        "content_type": msg.content_type(),
    });
    match msg {
        PubSubMessage::UadpDiscovery(d) => {
            obj["publisher_id"] = json!(d.publisher_id);
            match &d.payload {
                DiscoveryPayload::Probe { writer_ids } => obj["probe"] = json!(writer_ids),
                DiscoveryPayload::MetaData {
                    writer_id,
                    metadata,
                    status,
                    ..
                } => {
                    obj["writer_id"] = json!(writer_id);
                    obj["status"] = json!(status.to_string());
                    obj["metadata"] = json!(metadata);
                }
            }
        }
        PubSubMessage::JsonMetaData(m) => {
            obj["publisher_id"] = json!(m.publisher_id);
            obj["writer_id"] = json!(m.data_set_writer_id);
            obj["metadata"] = json!(m.metadata);
        }
        _ => {
            if let Some(network) = msg.network() {
                obj["publisher_id"] = json!(network.publisher_id);
                obj["messages"] = network
                    .messages
                    .iter()
                    .map(|ds| {
                        json!({
                            "writer_id": ds.writer_id,
                            "sequence_number": ds.sequence_number,
                            "message_type": ds.message_type.as_str(),
                            "status": ds.effective_status().to_string(),
                            "fields": fields_json(ds, ctx),
                        })
                    })
                    .collect();
            }
        }
    }
    obj
}

fn print_message(msg: &PubSubMessage, format: &OutputFormat, ctx: &CodecContext, seq: u64) {
    match format {
        OutputFormat::Pretty => print_pretty(msg, ctx, seq),
        OutputFormat::Json => println!("{}", summary(msg, ctx, seq)),
        OutputFormat::Compact => print_compact(msg, seq),
    }
}

fn print_pretty(msg: &PubSubMessage, ctx: &CodecContext, seq: u64) {
    let timestamp = Local::now().format("%H:%M:%S%.3f");
    let publisher = match msg {
        PubSubMessage::UadpDiscovery(d) => d.publisher_id.clone(),
        PubSubMessage::JsonMetaData(m) => m.publisher_id.clone(),
        _ => msg.network().and_then(|n| n.publisher_id.clone()),
    };
    println!(
        "{} {} {} publisher={}",
        format!("[{}]", timestamp).dimmed(),
        format!("#{}", seq).yellow(),
        msg.kind().cyan().bold(),
        publisher.as_deref().unwrap_or("-")
    );

    match msg {
        PubSubMessage::UadpDiscovery(d) => match &d.payload {
            DiscoveryPayload::Probe { writer_ids } => {
                println!("  {}: {:?}", "probe".cyan(), writer_ids);
            }
            DiscoveryPayload::MetaData {
                writer_id,
                metadata,
                status,
                ..
            } => print_metadata(*writer_id, metadata.as_ref(), &status.to_string()),
        },
        PubSubMessage::JsonMetaData(m) => print_metadata(m.data_set_writer_id, m.metadata.as_ref(), "Good"),
        _ => {
            for ds in msg.network().map(|n| n.messages.as_slice()).unwrap_or_default() {
                println!(
                    "  {} writer={} seq={} type={} status={}",
                    "dataset".green(),
                    ds.writer_id,
                    ds.sequence_number,
                    ds.message_type.as_str(),
                    ds.effective_status()
                );
                if let Value::Object(fields) = fields_json(ds, ctx) {
                    for (name, value) in fields {
                        println!("    {}: {}", name.cyan(), value);
                    }
                }
            }
        }
    }
    println!();
}

fn print_metadata(writer_id: u16, metadata: Option<&opcua_pubsub::DataSetMetaData>, status: &str) {
    let Some(md) = metadata else {
        println!("  {} writer={} status={}", "metadata".green(), writer_id, status);
        return;
    };
    println!(
        "  {} writer={} name={} version={}.{} status={}",
        "metadata".green(),
        writer_id,
        md.name,
        md.configuration_version.major_version,
        md.configuration_version.minor_version,
        status
    );
    for f in &md.fields {
        println!("    {}: {:?} rank={}", f.name.cyan(), f.built_in_type, f.value_rank);
    }
}

fn print_compact(msg: &PubSubMessage, seq: u64) {
    let datasets = msg.network().map_or(0, |n| n.messages.len());
    let writers: Vec<String> = msg
        .network()
        .map(|n| n.messages.iter().map(|d| d.writer_id.to_string()).collect())
        .unwrap_or_default();
    println!(
        "#{}: {} datasets={} writers=[{}]",
        seq,
        msg.kind(),
        datasets,
        writers.join(",")
    );
}

fn reencode(
    msg: &mut PubSubMessage,
    config: &EncoderConfig,
    ctx: &CodecContext,
    store: &MetaDataStore,
    format: &OutputFormat,
) {
    let Some(base) = msg.network_mut().map(std::mem::take) else {
        return;
    };
    let result = PubSubMessage::from_config(config, base)
        .map_err(|e| e.to_string())
        .and_then(|mut out| {
            encode(&mut out, ctx, config.max_chunk_size, Some(store)).map_err(|e| e.to_string())
        });
    match result {
        Ok(frames) => match format {
            OutputFormat::Json => {
                let frames: Vec<String> = frames.iter().map(|f| STANDARD.encode(f)).collect();
                println!(
                    "{}",
                    json!({"reencoded": {"content_type": config.content_type(), "frames": frames}})
                );
            }
            _ => {
                let sizes: Vec<String> = frames.iter().map(|f| f.len().to_string()).collect();
                println!(
                    "  {} {} frame(s) as {} [{}]",
                    "reencoded".magenta(),
                    frames.len(),
                    config.content_type(),
                    sizes.join(", ")
                );
            }
        },
        Err(e) => eprintln!("{}: re-encode failed: {}", "Warning".yellow(), e),
    }
}

fn is_tty() -> bool {
    #[cfg(unix)]
    unsafe {
        libc::isatty(libc::STDOUT_FILENO) != 0
    }
    #[cfg(not(unix))]
    true
}
