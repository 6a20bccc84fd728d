// src/bin/eds.rs

//! Driver program _eds_ for _edslib_.
//!
//! Streams a database dump, classifies each image metadata record by its
//! likely EXIF producer, prints the sampled references to stdout, and
//! writes the aggregate side files on exit or interruption.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::RwLock;

use ::clap::{Parser, ValueEnum};
use ::const_format::concatcp;
use ::lazy_static::lazy_static;

use ::edslib::common::{Count, FPath, ResultS3};
use ::edslib::debug::printers::{e_err, e_wrn};
use ::edslib::printer::printers::{write_stdout, ColorChoice};
use ::edslib::printer::summary::{print_summary, SummaryWriter};
use ::edslib::readers::dumpreader::DumpReader;
use ::edslib::readers::sampler::{SampleEngine, SampleRef};
use ::si_trace_print::stack::stack_offset_set;
#[allow(unused_imports)]
use ::si_trace_print::{defn, defo, defx, defñ};

// --------------------
// command-line parsing

/// user-passed signifier that the dump stream is passed on STDIN
const PATH_STDIN: &str = "-";

/// default diagnostic heartbeat interval, in processed records
const HEARTBEAT_DEFAULT: Count = 50000;

/// CLI enum that maps to [`termcolor::ColorChoice`].
///
/// [`termcolor::ColorChoice`]: https://docs.rs/termcolor/1.1.3/termcolor/enum.ColorChoice.html
#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    ValueEnum, // from `clap`
)]
#[allow(non_camel_case_types)]
enum CLI_Color_Choice {
    always,
    auto,
    never,
}

/// `--help` _afterword_ message.
const CLI_HELP_AFTER: &str = concatcp!(
    "\
The dump stream is read from PATH, or from STDIN when PATH is \"",
    PATH_STDIN,
    "\".
Only lines beginning with the bulk-insert marker are processed; all other
lines are ignored without error.

One line is printed to stdout per emitted sample reference:
    <producer-key> <TAB> <count> <TAB> <content-url>
where <count> is the per-key record count at emission, or \"always\" for
error-classified records, which are emitted unconditionally.

On exit, including an interruption via SIGINT, aggregate side files are
written to OUT_DIR: makes.txt, models.txt, software.txt, all_fields.txt,
and sample_trace.txt. Each file is fully materialized before being made
visible.

---

Version: ",
    env!("CARGO_PKG_VERSION"),
    "
License: ",
    env!("CARGO_PKG_LICENSE"),
);

/// clap command-line arguments build-time definitions.
//
// Note:
// * the `about` is taken from `Cargo.toml:[package]:description`.
#[derive(Parser, Debug)]
#[clap(
    about = env!("CARGO_PKG_DESCRIPTION"),
    name = "eds",
    // write expanded information for the `--version` output
    version = concatcp!(
        "(exif dump sampler)\n",
        "Version: ",
        env!("CARGO_PKG_VERSION_MAJOR"), ".",
        env!("CARGO_PKG_VERSION_MINOR"), ".",
        env!("CARGO_PKG_VERSION_PATCH"), "\n",
        "License: ", env!("CARGO_PKG_LICENSE"), "\n",
    ),
    after_help = CLI_HELP_AFTER,
    verbatim_doc_comment,
)]
struct CLI_Args {
    /// Path of the dump stream to process. Pass "-" to read from STDIN.
    #[clap(required = true)]
    path: String,

    /// Directory for the aggregate side files.
    #[clap(
        short = 'o',
        long = "out-dir",
        default_value = ".",
    )]
    out_dir: PathBuf,

    /// Print a diagnostic heartbeat to stderr every HEARTBEAT processed
    /// records. Pass 0 to disable.
    #[clap(
        long = "heartbeat",
        default_value_t = HEARTBEAT_DEFAULT,
    )]
    heartbeat: Count,

    /// Choose to print the final summary using colors.
    #[clap(
        short = 'c',
        long = "color",
        value_enum,
        default_value_t = CLI_Color_Choice::auto,
    )]
    color: CLI_Color_Choice,
}

// --------------------
// signal handling

lazy_static! {
    /// flag to signal the processing loop should flush and return ASAP.
    /// Must be lazy static (global) so that it may be set from the
    /// `ctrlc::set_handler` signal handler.
    static ref EXIT_EARLY: RwLock<bool> = {
        defñ!("lazy_static! EXIT_EARLY");

        RwLock::new(false)
    };
}

/// set a process signal handler
pub fn set_signal_handler() -> anyhow::Result<(), ctrlc::Error> {
    defn!();

    ctrlc::set_handler(move || {
        defn!();
        // signal the processing loop to flush and return early
        match EXIT_EARLY.write() {
            Ok(mut exit_early) => {
                *exit_early = true;
            }
            Err(_err) => {
                e_err!("EXIT_EARLY.write() failed {}", _err);
            }
        }
        defx!();
    })?;

    defx!();

    Ok(())
}

/// was an early exit requested by the signal handler?
fn exit_early_requested() -> bool {
    match EXIT_EARLY.read() {
        Ok(exit_early) => *exit_early,
        Err(_err) => {
            e_err!("EXIT_EARLY.read() failed {}", _err);
            false
        }
    }
}

// --------------------
// processing

/// the main processing loop: extract, classify, sample, report.
///
/// Polls [`EXIT_EARLY`] between records; on interruption (or end-of-stream,
/// or a stream read error) the Reporter flush runs from the single exit
/// path below the loop.
fn processing_loop(
    reader: Box<dyn BufRead>,
    path: &FPath,
    out_dir: &PathBuf,
    heartbeat: Count,
    color_choice: ColorChoice,
) -> bool {
    defn!("({:?})", path);
    let mut dumpreader: DumpReader<Box<dyn BufRead>> = DumpReader::new(reader);
    let mut engine: SampleEngine = SampleEngine::new();
    let mut writer: SummaryWriter = SummaryWriter::new(out_dir);
    let mut ret: bool = true;
    let mut interrupted: bool = false;

    loop {
        if exit_early_requested() {
            interrupted = true;
            defo!("exit early requested");
            break;
        }
        match dumpreader.next_record() {
            ResultS3::Found(record) => {
                if let Some(sampleref) = engine.process(&record) {
                    print_sampleref(&sampleref);
                }
                if heartbeat != 0 && engine.stats.records % heartbeat == 0 {
                    eprintln!(
                        "processed {} records, {} producer keys, {} references emitted",
                        engine.stats.records,
                        engine.seen.len(),
                        engine.trace_lines.len(),
                    );
                }
            }
            ResultS3::Done => {
                defo!("dumpreader Done");
                break;
            }
            ResultS3::Err(err) => {
                e_err!("reading {:?}: {}", path, err);
                ret = false;
                break;
            }
        }
    }

    // the flush runs on every path out of the loop: end-of-stream,
    // interruption, and stream read error
    match writer.flush(&engine) {
        Ok(_) => {}
        Err(err) => {
            e_err!("writing side files to {:?}: {}", out_dir, err);
            ret = false;
        }
    }
    if interrupted {
        e_wrn!(
            "interrupted; summary reflects the {} records processed so far",
            engine.stats.records
        );
    }
    print_summary(&engine, &dumpreader.summary(), color_choice);
    defx!("return {:?}", ret);

    ret
}

/// print one emitted sample reference to the standard channel
fn print_sampleref(sampleref: &SampleRef) {
    write_stdout(sampleref.to_line().as_bytes());
}

// --------------------
// main

fn main() -> ExitCode {
    stack_offset_set(Some(0));
    defn!();
    let args = CLI_Args::parse();
    defo!("args {:?}", args);

    let color_choice: ColorChoice = match args.color {
        CLI_Color_Choice::always => ColorChoice::Always,
        CLI_Color_Choice::auto => ColorChoice::Auto,
        CLI_Color_Choice::never => ColorChoice::Never,
    };

    match set_signal_handler() {
        Ok(_) => {}
        Err(err) => {
            e_err!("set_signal_handler: {}", err);
            return ExitCode::FAILURE;
        }
    }

    let path: FPath = args.path.clone();
    let reader: Box<dyn BufRead> = if path == PATH_STDIN {
        Box::new(std::io::stdin().lock())
    } else {
        match File::open(&path) {
            Ok(file) => Box::new(BufReader::new(file)),
            Err(err) => {
                e_err!("File::open({:?}): {}", path, err);
                return ExitCode::FAILURE;
            }
        }
    };

    let ret: bool = processing_loop(reader, &path, &args.out_dir, args.heartbeat, color_choice);

    let exitcode = if ret { ExitCode::SUCCESS } else { ExitCode::FAILURE };
    defx!("exitcode {:?}", exitcode);

    exitcode
}
