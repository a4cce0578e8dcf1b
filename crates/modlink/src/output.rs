use std::io::{IsTerminal, Write};
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use modlink_channel::ThermalImage;
use modlink_thermal::DecoderStats;
use serde::Serialize;

#[derive(Clone, Debug, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
    Raw,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Table
        } else {
            Self::Json
        }
    }
}

#[derive(Serialize)]
struct ImageOutput<'a> {
    sequence: u64,
    width: usize,
    height: usize,
    min: u16,
    max: u16,
    saved: Option<String>,
    device: &'a str,
    timestamp: String,
}

/// Print one frame summary. `Raw` writes the RGBA bytes instead.
pub fn print_image(image: &ThermalImage, device: &str, saved: Option<&Path>, format: OutputFormat) {
    let saved = saved.map(|path| path.display().to_string());
    match format {
        OutputFormat::Json => {
            let out = ImageOutput {
                sequence: image.sequence,
                width: image.bitmap.width(),
                height: image.bitmap.height(),
                min: image.min,
                max: image.max,
                saved,
                device,
                timestamp: now_unix_seconds(),
            };
            println!(
                "{}",
                serde_json::to_string(&out).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["FRAME", "SIZE", "MIN", "MAX", "SAVED"])
                .add_row(vec![
                    image.sequence.to_string(),
                    format!("{}x{}", image.bitmap.width(), image.bitmap.height()),
                    image.min.to_string(),
                    image.max.to_string(),
                    saved.unwrap_or_else(|| "-".to_string()),
                ]);
            println!("{table}");
        }
        OutputFormat::Pretty => {
            println!(
                "frame={} size={}x{} min={} max={} device={}{}",
                image.sequence,
                image.bitmap.width(),
                image.bitmap.height(),
                image.min,
                image.max,
                device,
                saved.map(|path| format!(" saved={path}")).unwrap_or_default()
            );
        }
        OutputFormat::Raw => print_raw(image.bitmap.as_rgba()),
    }
}

#[derive(Serialize)]
struct DataOutput<'a> {
    size: usize,
    data: String,
    device: &'a str,
    timestamp: String,
}

/// Print bytes from one read on a raw channel.
pub fn print_data(data: &[u8], device: &str, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            let out = DataOutput {
                size: data.len(),
                data: payload_preview(data),
                device,
                timestamp: now_unix_seconds(),
            };
            println!(
                "{}",
                serde_json::to_string(&out).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["SIZE", "DEVICE", "DATA"])
                .add_row(vec![
                    data.len().to_string(),
                    device.to_string(),
                    payload_preview(data),
                ]);
            println!("{table}");
        }
        OutputFormat::Pretty => {
            println!(
                "size={} device={} data={}",
                data.len(),
                device,
                payload_preview(data)
            );
        }
        OutputFormat::Raw => print_raw(data),
    }
}

#[derive(Serialize)]
struct StatsOutput {
    frames: u64,
    desyncs: u64,
    bytes: u64,
}

/// Print decoder counters. `Raw` prints nothing.
pub fn print_stats(stats: DecoderStats, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            let out = StatsOutput {
                frames: stats.frames,
                desyncs: stats.desyncs,
                bytes: stats.bytes,
            };
            println!(
                "{}",
                serde_json::to_string(&out).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["FRAMES", "DESYNCS", "BYTES"])
                .add_row(vec![
                    stats.frames.to_string(),
                    stats.desyncs.to_string(),
                    stats.bytes.to_string(),
                ]);
            println!("{table}");
        }
        OutputFormat::Pretty => {
            println!(
                "frames={} desyncs={} bytes={}",
                stats.frames, stats.desyncs, stats.bytes
            );
        }
        OutputFormat::Raw => {}
    }
}

pub fn print_raw(data: &[u8]) {
    let mut out = std::io::stdout();
    let _ = out.write_all(data);
    let _ = out.flush();
}

fn payload_preview(payload: &[u8]) -> String {
    match std::str::from_utf8(payload) {
        Ok(text) => text.to_string(),
        Err(_) => format!("<binary {} bytes>", payload.len()),
    }
}

fn now_unix_seconds() -> String {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs().to_string())
        .unwrap_or_else(|_| "0".to_string())
}
