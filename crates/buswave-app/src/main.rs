use anyhow::{bail, Context, Result};
use buswave_core::{Capture, DecodeSession};
use std::env;

const USAGE: &str = "usage: buswave <capture.csv> [--hex] [--no-timestamps] [--json]";

struct Options {
    path: String,
    hex: bool,
    timestamps: bool,
    json: bool,
}

impl Options {
    fn parse(args: impl Iterator<Item = String>) -> Result<Self> {
        let mut path = None;
        let mut hex = false;
        let mut timestamps = true;
        let mut json = false;

        for arg in args {
            match arg.as_str() {
                "--hex" => hex = true,
                "--no-timestamps" => timestamps = false,
                "--json" => json = true,
                "--help" | "-h" => bail!("{USAGE}"),
                flag if flag.starts_with('-') => bail!("unknown flag {flag}\n{USAGE}"),
                p => {
                    if path.replace(p.to_string()).is_some() {
                        bail!("more than one capture file given\n{USAGE}");
                    }
                }
            }
        }

        let Some(path) = path else {
            bail!("no capture file given\n{USAGE}");
        };
        Ok(Self {
            path,
            hex,
            timestamps,
            json,
        })
    }
}

fn main() -> Result<()> {
    env_logger::init();

    let opts = Options::parse(env::args().skip(1))?;

    let capture = Capture::from_path(&opts.path)
        .with_context(|| format!("loading capture {}", opts.path))?;
    log::info!(
        "loaded {} samples, {} at or before the trigger",
        capture.len(),
        capture.trigger_index()
    );

    let session = DecodeSession::new(capture).context("setting up decode session")?;
    let output = session.run();

    if opts.json {
        println!("{}", serde_json::to_string_pretty(&output.merged())?);
    } else {
        print!("{}", output.to_text(opts.timestamps, opts.hex));
        let bytes: Vec<u8> = output.bytes.rows().iter().map(|r| r.value).collect();
        println!(
            "-- {} events, {} bytes ({})",
            output.events.len(),
            bytes.len(),
            hex::encode(&bytes)
        );
    }

    Ok(())
}
