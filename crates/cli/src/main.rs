//! freewheel CLI: change the wheel behaviour of Logitech's MX-Revolution
//! mouse.

mod diag;

use std::time::Duration;

use anyhow::Result;
use clap::{CommandFactory, Parser};
use freewheel_core::args::{self, Action};
use freewheel_core::channel::{HiddevChannel, ReportChannel};
use freewheel_core::device::{self, ProtocolVariant};
use freewheel_core::error::Error;
use freewheel_core::wheel;

const AFTER_HELP: &str = "\
Commands (applied in order):
  free                       free spinning mode
  click                      click-to-click mode
  manual[=button[,button]]   manual mode change via button
  auto[=speed[,speed]]       automatic mode change (up, down)
  soft-free[=b1[,b2]]        free spinning once the wheel moves
  soft-click[=b1[,b2]]       click-to-click once the wheel moves
  battery                    query battery status
  mode                       query scroll wheel mode
  reconnect                  initiate reconnection

Prefixing a mode with 'temp-' (i.e. temp-free) switches the mode
temporarily, otherwise it becomes the default mode after power up.

Button numbers:
  0 previously set button   7 wheel left tilt
  3 middle (wheel button)   8 wheel right tilt
  4 rear thumb button       9 thumb wheel forward
  5 front thumb button     11 thumb wheel backward
  6 find button            13 thumb wheel pressed

Debug commands:
  raw=id[,byte...]           send a raw report
  query[=id[,len]]           read a report back and hex-dump it
  dump[=timeout]             print incoming events (seconds, -1 = forever)
  sleep[=seconds]            pause between commands";

#[derive(Parser)]
#[command(
    name = "freewheel",
    version,
    about = "Change the wheel behaviour of Logitech's MX-Revolution mouse",
    after_help = AFTER_HELP
)]
struct Cli {
    /// Commands to apply in order (e.g. `free`, `temp-click`, `auto=10,20`).
    #[arg(value_name = "COMMAND")]
    tokens: Vec<String>,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    if cli.tokens.is_empty() {
        Cli::command().print_help()?;
        return Ok(());
    }

    let handle = match device::find_device() {
        Ok(handle) => handle,
        Err(Error::NotFound(reason)) => {
            eprintln!("{}", diag::troubleshooting(&reason));
            std::process::exit(1);
        }
        Err(e) => return Err(e.into()),
    };
    if handle.model().experimental() {
        eprintln!("note: support for the {} is experimental", handle.model().name());
    }

    let variant = handle.variant();
    let channel = HiddevChannel::new(&handle);

    for token in &cli.tokens {
        let action = args::parse_token(token)?;
        match run(&channel, variant, action) {
            Ok(()) => {}
            // The one recoverable category: print and keep going.
            Err(e @ Error::BadAnswer { .. }) => println!("{e}"),
            Err(e) => return Err(e.into()),
        }
    }

    Ok(())
}

fn run(
    channel: &HiddevChannel,
    variant: ProtocolVariant,
    action: Action,
) -> freewheel_core::error::Result<()> {
    match action {
        Action::Set { mode, permanence } => wheel::set_mode(channel, variant, mode, permanence),
        Action::QueryMode => {
            let report = wheel::query_mode(channel, variant)?;
            println!("{report}");
            Ok(())
        }
        Action::QueryBattery => {
            let report = wheel::query_battery(channel, variant)?;
            println!("{report}");
            Ok(())
        }
        Action::Reconnect => {
            wheel::reconnect(channel)?;
            println!("Reconnection initiated");
            println!(" - Turn off the mouse");
            println!(" - Press and hold the left mouse button");
            println!(" - Turn on the mouse");
            println!(" - Press the right button 5 times");
            println!(" - Release the left mouse button");
            channel.drain(wheel::RECONNECT_WAIT_MS);
            Ok(())
        }
        Action::Raw { report_id, data } => channel.send(report_id, &data),
        Action::QueryReport { report_id, len } => {
            let frame = channel.query(report_id, len)?;
            print!("report {report_id:02x}:");
            for byte in &frame {
                print!(" {byte:02x}");
            }
            println!();
            Ok(())
        }
        Action::Dump { timeout_ms } => {
            while let Some(ev) = channel.next_event(timeout_ms) {
                println!(
                    "read: type={}, id={}, field={:08x}, usage={:08x}, code={:08x}, value={}",
                    ev.report_type,
                    ev.report_id,
                    ev.field_index,
                    ev.usage_index,
                    ev.usage_code,
                    ev.value
                );
            }
            Ok(())
        }
        Action::Sleep { seconds } => {
            std::thread::sleep(Duration::from_secs(seconds));
            Ok(())
        }
    }
}
