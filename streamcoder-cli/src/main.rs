//! streamcoder - live audio capture to a streaming encoder
//!
//! Runs one stream session: capture from the selected device, encode, write
//! to a file or stdout until the input ends, `--duration` elapses, or the
//! process is killed.

mod cli;

use std::io::{self, Write};
use std::process::ExitCode;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use clap::Parser;
use log::{error, info};
use parking_lot::Mutex;
use streamcoder_core::{
    codec_is_available, device_is_available, CodecKind, DeviceKind, FileSink, SessionDelegate,
    SessionState, SessionSummary, StreamError, StreamSession, StreamSink, WriterSink,
};

/// Meter and housekeeping period.
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Collects errors reported from the session's background threads.
#[derive(Default)]
struct CliEvents {
    error: Mutex<Option<StreamError>>,
}

impl CliEvents {
    fn take_error(&self) -> Option<StreamError> {
        self.error.lock().take()
    }
}

impl SessionDelegate for CliEvents {
    fn on_state_changed(&self, state: &SessionState) {
        log::debug!("session state: {:?}", state);
    }

    fn on_error(&self, error: &StreamError) {
        self.error.lock().get_or_insert_with(|| error.clone());
    }

    fn on_session_finished(&self, summary: &SessionSummary) {
        if let Some(ref checksum) = summary.checksum {
            info!("sha256 {}", checksum);
        }
    }
}

fn main() -> ExitCode {
    let args = cli::Args::parse();
    cli::init_logging(&args);

    if args.list_codecs {
        list_codecs();
        return ExitCode::SUCCESS;
    }
    if args.list_devices {
        list_devices();
        return ExitCode::SUCCESS;
    }

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

fn list_codecs() {
    for kind in CodecKind::ALL {
        let status = if codec_is_available(kind) { "" } else { " (unavailable)" };
        println!("{:<8} {}{}", kind.keyword(), kind.description(), status);
    }
}

fn list_devices() {
    for kind in DeviceKind::ALL {
        let status = if device_is_available(kind) { "" } else { " (unavailable)" };
        println!("{:<8} {}{}", kind.keyword(), kind.description(), status);
    }
}

fn run(args: &cli::Args) -> Result<(), StreamError> {
    let config = args.stream_configuration()?;
    let sink: Box<dyn StreamSink> = if args.writes_to_stdout() {
        Box::new(WriterSink::new(io::stdout()))
    } else {
        Box::new(FileSink::create(&args.output)?)
    };

    let events = Arc::new(CliEvents::default());
    let mut session = StreamSession::new(config, sink);
    session.set_delegate(events.clone());
    session.configure()?;
    session.start()?;
    info!(
        "streaming {} from {} ({} Hz source)",
        session.config().codec.description(),
        session.config().device,
        session.source_samplerate()
    );

    let deadline = args
        .duration
        .map(|secs| Instant::now() + Duration::from_secs_f64(secs.max(0.0)));
    let mut failure = None;
    loop {
        thread::sleep(POLL_INTERVAL);
        if args.meter_data {
            print_meter(&session.levels());
        }
        if let Some(e) = events.take_error() {
            failure = Some(e);
            break;
        }
        if session.has_device_stopped() || deadline.is_some_and(|d| Instant::now() >= d) {
            break;
        }
    }

    let summary = session.stop()?;
    info!(
        "wrote {} bytes ({:.2} s of audio)",
        summary.bytes_written, summary.duration_secs
    );
    match failure {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

/// `ME LLLLRRRR`: one 4-digit hex level per side, mono repeated.
fn meter_line(levels: &[i32]) -> String {
    let left = levels.first().copied().unwrap_or(streamcoder_core::METER_SILENCE);
    let right = levels.get(1).copied().unwrap_or(left);
    format!("ME {:04X}{:04X}", left, right)
}

fn print_meter(levels: &[i32]) {
    let mut stderr = io::stderr().lock();
    let _ = writeln!(stderr, "{}", meter_line(levels));
}
