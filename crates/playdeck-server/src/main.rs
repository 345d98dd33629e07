// crates/playdeck-server/src/main.rs
//
// Console playout server: one or more channels, consumers chosen on the
// command line, commands read line-by-line from stdin.

use std::io::{BufRead, Write};
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Parser;
use log::info;

use playdeck_core::consumer::BoxedConsumer;
use playdeck_core::format::VideoFormat;
use playdeck_engine::channel::Channel;
use playdeck_engine::consumers::{RecordConsumer, WavAudioConsumer};
use playdeck_media::registry::ProducerRegistry;
use playdeck_server::command::Command;
use playdeck_server::config::Paths;
use playdeck_server::handler::Server;

#[derive(Parser, Debug)]
#[command(name = "playdeck", about = "Real-time playout channel engine")]
struct Args {
    /// Display format for every channel (PAL, NTSC, 720p5000, 1080i5000, ...).
    #[arg(long, default_value = "720p5000")]
    format: String,

    /// Number of output channels.
    #[arg(long, default_value_t = 1)]
    channels: usize,

    /// Root folder holding media/, templates/, data/ and log/.
    #[arg(long, default_value = ".")]
    root: PathBuf,

    /// Record each channel's output to <PATH>-<n>.pdr.
    #[arg(long)]
    record: Option<PathBuf>,

    /// Write each channel's mixed audio to <PATH>-<n>.wav.
    #[arg(long)]
    wav: Option<PathBuf>,
}

fn suffixed(path: &std::path::Path, channel: usize) -> PathBuf {
    let stem = path.file_stem().map(|s| s.to_string_lossy()).unwrap_or_default();
    let ext = path.extension().map(|e| e.to_string_lossy()).unwrap_or_default();
    let name = if ext.is_empty() {
        format!("{stem}-{channel}")
    } else {
        format!("{stem}-{channel}.{ext}")
    };
    path.with_file_name(name)
}

fn build_consumers(args: &Args, channel: usize) -> Vec<BoxedConsumer> {
    let mut consumers: Vec<BoxedConsumer> = Vec::new();
    if let Some(record) = &args.record {
        consumers.push(Box::new(RecordConsumer::to_file(suffixed(record, channel))));
    }
    if let Some(wav) = &args.wav {
        consumers.push(Box::new(WavAudioConsumer::new(suffixed(wav, channel))));
    }
    consumers
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let format = VideoFormat::from_name(&args.format)
        .with_context(|| format!("unknown format {}", args.format))?;
    let paths = Paths::under_root(&args.root);

    let mut channels = Vec::new();
    for index in 1..=args.channels {
        let consumers = build_consumers(&args, index);
        if consumers.is_empty() {
            bail!("no consumers configured; pass --record and/or --wav");
        }
        channels.push(
            Channel::new(format, consumers)
                .map_err(|e| anyhow::anyhow!("channel {index}: {e}"))?,
        );
    }
    info!("{} channel(s) up in {}", channels.len(), args.format);

    let registry = ProducerRegistry::new(&paths.media_dir);
    let server = Server::new(channels, registry);

    let stdin = std::io::stdin();
    let mut stdout = std::io::stdout();
    for line in stdin.lock().lines() {
        let line = line.context("read console input")?;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        if trimmed.eq_ignore_ascii_case("EXIT") || trimmed.eq_ignore_ascii_case("BYE") {
            break;
        }

        let reply = match Command::parse(trimmed) {
            Ok(command) => server.execute(command),
            Err(e) => playdeck_server::Reply { code: 400, text: format!("400 ERROR {}", e.0) },
        };
        writeln!(stdout, "{}", reply.text)?;
        stdout.flush()?;
    }

    info!("shutting down");
    Ok(())
}
