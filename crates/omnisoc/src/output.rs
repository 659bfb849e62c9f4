use std::io::IsTerminal;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use omnisoc_frame::Frame;
use serde::Serialize;

#[derive(Clone, Debug, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
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
struct FrameOutput<'a> {
    event: &'static str,
    header: u16,
    count: usize,
    values: &'a [f32],
    endpoint: &'a str,
    timestamp: String,
}

#[derive(Serialize)]
struct LivenessOutput<'a> {
    event: &'static str,
    live: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    since_last_live_ms: Option<u128>,
    endpoint: &'a str,
    timestamp: String,
}

pub fn print_frame(frame: &Frame, endpoint: &str, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            let out = FrameOutput {
                event: "frame",
                header: frame.header,
                count: frame.values.len(),
                values: &frame.values,
                endpoint,
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
                .set_header(vec!["HEADER", "COUNT", "ENDPOINT", "VALUES"])
                .add_row(vec![
                    frame.header.to_string(),
                    frame.values.len().to_string(),
                    endpoint.to_string(),
                    values_preview(&frame.values),
                ]);
            println!("{table}");
        }
        OutputFormat::Pretty => {
            println!(
                "header={} count={} endpoint={} values=[{}]",
                frame.header,
                frame.values.len(),
                endpoint,
                values_preview(&frame.values)
            );
        }
    }
}

/// Print a liveness transition. `since_last_live` is set when the link went
/// down.
pub fn print_liveness(
    live: bool,
    since_last_live: Option<Duration>,
    endpoint: &str,
    format: OutputFormat,
) {
    match format {
        OutputFormat::Json => {
            let out = LivenessOutput {
                event: "liveness",
                live,
                since_last_live_ms: since_last_live.map(|d| d.as_millis()),
                endpoint,
                timestamp: now_unix_seconds(),
            };
            println!(
                "{}",
                serde_json::to_string(&out).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table | OutputFormat::Pretty => match since_last_live {
            Some(idle) => println!("link {endpoint} down (no frame for {idle:?})"),
            None if live => println!("link {endpoint} live"),
            None => println!("link {endpoint} down"),
        },
    }
}

fn values_preview(values: &[f32]) -> String {
    values
        .iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

fn now_unix_seconds() -> String {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs().to_string())
        .unwrap_or_else(|_| "0".to_string())
}
