//! `testsrc-cli`: assembles a `FakeSrc`/`FileByteSrc`/`LiveSrc` into a
//! pipeline against a `FakeSink` and runs it to EOS, the way the
//! teacher's `video-source serve` subcommand assembles a source and runs
//! it against an RTSP sink.

use clap::{Parser, Subcommand};
use corestream::element::State;
use corestream::pad::Pad;
use corestream::Pipeline;
use std::time::Duration;
use testsrc::fake_sink::FakeSink;
use testsrc::fake_src::{FakeSrc, FillPattern};
use testsrc::file_byte_src::FileByteSrc;
use testsrc::live_src::LiveSrc;

#[derive(Parser)]
#[command(name = "testsrc-cli")]
#[command(about = "Run a synthetic source against a counting sink")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Push a fixed number of fixed-size buffers, then EOS.
    Fake {
        #[arg(long, default_value_t = 3)]
        num_buffers: i64,
        #[arg(long, default_value_t = 16)]
        blocksize: i64,
    },
    /// Read a synthetic in-memory byte blob through `FileByteSrc`.
    Bytes {
        #[arg(long, default_value_t = 64)]
        size: usize,
        #[arg(long, default_value_t = 16)]
        blocksize: i64,
    },
    /// Run a live source until `duration_ms` elapses.
    Live {
        #[arg(long, default_value_t = 200)]
        duration_ms: u64,
        #[arg(long, default_value_t = 20)]
        period_ms: u64,
    },
}

fn main() {
    let cli = Cli::parse();
    let level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    let pipeline = Pipeline::new("testsrc-pipeline");
    let sink = FakeSink::new("sink0");

    match cli.command {
        Commands::Fake { num_buffers, blocksize } => {
            let src = FakeSrc::element("src0", FillPattern::Counter, None);
            src.set_num_buffers(Some(num_buffers));
            src.set_blocksize(blocksize);
            run_to_eos(&pipeline, src.element().clone(), &sink, None);
        }
        Commands::Bytes { size, blocksize } => {
            let data: Vec<u8> = (0..size).map(|i| (i % 256) as u8).collect();
            let src = FileByteSrc::element("src0", data);
            src.set_blocksize(blocksize);
            run_to_eos(&pipeline, src.element().clone(), &sink, None);
        }
        Commands::Live { duration_ms, period_ms } => {
            let src = LiveSrc::element("src0", Duration::from_millis(period_ms), 32);
            run_to_eos(&pipeline, src.element().clone(), &sink, Some(Duration::from_millis(duration_ms)));
        }
    }

    log::info!(
        "received {} buffers ({} bytes) before EOS",
        sink.buffers_received(),
        sink.bytes_received()
    );
}

fn run_to_eos(pipeline: &Pipeline, src_element: corestream::Element, sink: &FakeSink, run_for: Option<Duration>) {
    let srcpad = src_element.get_pad("src").expect("BaseSource always adds a \"src\" pad");
    Pad::link(&srcpad, sink.sinkpad(), None).expect("fakesrc and fakesink caps are both Any");

    pipeline.add(src_element).expect("unique element name");
    pipeline.add(sink.element().clone()).expect("unique element name");

    pipeline.set_state(State::Playing).expect("state change should not error");

    match run_for {
        Some(duration) => std::thread::sleep(duration),
        None => {
            pipeline.wait_for_eos(Duration::from_secs(5));
        }
    }

    pipeline.set_state(State::Null).expect("state change should not error");
}
