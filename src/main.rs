use std::path::PathBuf;

use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser as ClapParser, Subcommand};
use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;

use subttl::{CueInfo, Precision, SampleBuffer, Session, SessionOptions, Timestamp};

fn main() {
    match run() {
        Ok(()) => (),
        Err(err) => {
            eprintln!("An error occurred: {}", err);
            for cause in err.chain().skip(1) {
                eprintln!("    {}", cause);
            }
            std::process::exit(1);
        }
    }
}

#[derive(ClapParser)]
#[command(about = "Mark subtitle boundaries on audio and keep them in an SRT file")]
struct Cli {
    #[arg(value_name = "AUDIO", help = "The WAV file the subtitles belong to.")]
    audio: PathBuf,
    #[arg(
        short,
        long,
        value_name = "FILE",
        help = "The subtitle file. If not supplied, '.srt' is appended to the audio path."
    )]
    srt: Option<PathBuf>,
    #[arg(
        long,
        help = "Write whole-second timestamps, like files produced by older versions."
    )]
    legacy_timestamps: bool,
    #[arg(
        long,
        value_name = "LEVEL",
        default_value = "info",
        help = "Log level (trace, debug, info, warn, error). RUST_LOG takes precedence."
    )]
    log_level: String,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print every cue with its time range and text.
    List,
    /// Start new cues at the given times, in seconds.
    Mark {
        #[arg(required = true, value_name = "SECONDS")]
        at: Vec<f64>,
    },
    /// Merge a cue into the cue before it.
    Join {
        #[arg(value_name = "SEQ")]
        seq: usize,
    },
    /// Replace the text of a cue.
    Text {
        #[arg(value_name = "SEQ")]
        seq: usize,
        text: String,
    },
    /// Play a cue through the playback engine and write what it produced to a WAV file.
    Render {
        #[arg(value_name = "SEQ")]
        seq: usize,
        #[arg(short, long, value_name = "FILE")]
        output: PathBuf,
        #[arg(long, default_value_t = 512, help = "Frames per audio callback.")]
        block: usize,
    },
    /// Print a peak envelope of the audio with cue boundaries marked.
    Waveform {
        #[arg(short, long, default_value_t = 72)]
        columns: usize,
        #[arg(short, long, default_value_t = 8)]
        rows: usize,
    },
}

fn init_tracing(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli.log_level);

    let buffer = SampleBuffer::from_wav(&cli.audio)?;
    let srt_path = cli
        .srt
        .clone()
        .unwrap_or_else(|| Session::default_srt_path(&cli.audio));
    let options = SessionOptions {
        precision: if cli.legacy_timestamps {
            Precision::WholeSecond
        } else {
            Precision::Millisecond
        },
        ..SessionOptions::default()
    };
    let session = Session::open(buffer, srt_path, options)?;

    match cli.command {
        Command::List => list(&session),
        Command::Mark { at } => {
            for seconds in at {
                session.seek_seconds(seconds);
                if !session.mark() {
                    warn!(seconds, "no new cue: already a cue start or past the end");
                }
            }
            save(&session)
        }
        Command::Join { seq } => {
            let cue = cue(&session, seq)?;
            session.seek(cue.start);
            if !session.join() {
                warn!(seq, "the first cue has nothing to merge into");
            }
            save(&session)
        }
        Command::Text { seq, text } => {
            let cue = cue(&session, seq)?;
            session.seek(cue.start);
            session.set_text(&text);
            save(&session)
        }
        Command::Render { seq, output, block } => render(&session, seq, output, block),
        Command::Waveform { columns, rows } => {
            waveform(&session, columns, rows);
            Ok(())
        }
    }
}

fn cue(session: &Session, seq: usize) -> Result<CueInfo> {
    let cues = session.cues();
    seq.checked_sub(1)
        .and_then(|index| cues.get(index).cloned())
        .ok_or_else(|| anyhow!("There is no cue {}; the file has {} cues", seq, cues.len()))
}

fn save(session: &Session) -> Result<()> {
    if !session.save() {
        bail!(
            "Subtitles were not saved to '{}'",
            session.srt_path().display()
        );
    }
    Ok(())
}

fn timestamp(session: &Session, frame: usize) -> Timestamp {
    Timestamp::from_frame(frame, session.sample_rate(), Precision::Millisecond)
}

fn list(session: &Session) -> Result<()> {
    for cue in session.cues() {
        println!("{}", cue.index + 1);
        println!(
            "{} --> {}",
            timestamp(session, cue.start),
            timestamp(session, cue.end)
        );
        for line in cue.text.lines() {
            println!("{}", line);
        }
        println!();
    }
    Ok(())
}

fn render(session: &Session, seq: usize, output: PathBuf, block: usize) -> Result<()> {
    if block == 0 {
        bail!("The callback block size must be at least one frame");
    }
    let cue = cue(session, seq)?;
    let channels = session.channels();
    let spec = hound::WavSpec {
        channels,
        sample_rate: session.sample_rate(),
        bits_per_sample: 32,
        sample_format: hound::SampleFormat::Float,
    };
    let mut writer = hound::WavWriter::create(&output, spec)
        .with_context(|| format!("Failed to create output file: '{}'", output.display()))?;

    session.seek(cue.start);
    let engine = session.engine();
    engine.play_segment();

    let mut out = vec![0.0f32; block * usize::from(channels)];
    let mut remaining = (cue.end - cue.start) * usize::from(channels);
    while engine.is_playing() && remaining > 0 {
        engine.render(&mut out);
        let audible = remaining.min(out.len());
        for &sample in &out[..audible] {
            writer.write_sample(sample)?;
        }
        remaining -= audible;
    }
    engine.stop();
    for event in session.drain_events() {
        debug!(?event, "playback event");
    }

    writer
        .finalize()
        .with_context(|| format!("Failed to write to output file: '{}'", output.display()))?;
    Ok(())
}

fn waveform(session: &Session, columns: usize, rows: usize) {
    let columns = columns.max(1);
    let frames = session.frames();
    let per_column = (frames + columns - 1) / columns;

    let mut peaks = Vec::with_capacity(columns);
    let mut boundaries = Vec::with_capacity(columns);
    for col in 0..columns {
        let offset = col * per_column;
        peaks.push(session.peak_amplitude(offset, per_column));
        boundaries.push(
            !session
                .segment_starts_in_range(offset, offset + per_column)
                .is_empty(),
        );
    }

    for row in (0..rows).rev() {
        let line: String = peaks
            .iter()
            .zip(&boundaries)
            .map(|(&peak, &boundary)| {
                let level = (peak * rows as f32).round() as usize;
                if level > row {
                    '#'
                } else if boundary {
                    ':'
                } else {
                    ' '
                }
            })
            .collect();
        println!("{}", line.trim_end());
    }
    let markers: String = boundaries
        .iter()
        .map(|&b| if b { '^' } else { '-' })
        .collect();
    println!("{}", markers);
}
