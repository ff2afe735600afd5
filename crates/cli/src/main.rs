use std::path::PathBuf;

use anyhow::{Context, bail};
use clap::{Args, Parser, Subcommand, ValueEnum};
use engine::{
    Command, Engine, Event, FrameRate, FsStorage, SubtitleFormat, build_subtitle_export,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "reel")]
#[command(about = "Inspect storyboard timelines and export subtitles", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: CliCommand,
}

#[derive(Subcommand, Debug)]
enum CliCommand {
    /// Print scene placements and the total length
    Timeline {
        #[command(flatten)]
        input: StoryboardArgs,
    },
    /// Export subtitle cues as SRT or WebVTT
    Subtitles {
        #[command(flatten)]
        input: StoryboardArgs,

        #[arg(short, long, value_enum, default_value_t = FormatArg::Srt)]
        format: FormatArg,

        /// Write to this file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Show what is visible at one global frame
    Frame {
        #[command(flatten)]
        input: StoryboardArgs,

        frame: i64,
    },
}

#[derive(Args, Debug)]
struct StoryboardArgs {
    /// Storyboard JSON document
    storyboard: PathBuf,

    /// Override the storyboard frame rate
    #[arg(long)]
    fps: Option<u32>,

    /// Override the cross-fade overlap, in frames
    #[arg(long)]
    overlap: Option<i64>,
}

#[derive(ValueEnum, Debug, Clone, Copy)]
enum FormatArg {
    Srt,
    Vtt,
}

impl From<FormatArg> for SubtitleFormat {
    fn from(value: FormatArg) -> Self {
        match value {
            FormatArg::Srt => Self::Srt,
            FormatArg::Vtt => Self::WebVtt,
        }
    }
}

fn main() -> anyhow::Result<()> {
    init_tracing();
    let cli = Cli::parse();

    match cli.command {
        CliCommand::Timeline { input } => {
            let engine = open(&input)?;
            print_timeline(&engine)
        }
        CliCommand::Subtitles {
            input,
            format,
            output,
        } => {
            let mut engine = open(&input)?;
            export_subtitles(&mut engine, format.into(), output)
        }
        CliCommand::Frame { input, frame } => {
            let mut engine = open(&input)?;
            print_frame(&mut engine, frame)
        }
    }
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn open(input: &StoryboardArgs) -> anyhow::Result<Engine<FsStorage>> {
    let mut engine = Engine::with_fs();
    engine
        .handle_command(Command::LoadStoryboard {
            path: input.storyboard.clone(),
        })
        .with_context(|| format!("failed to open {}", input.storyboard.display()))?;

    if input.fps.is_none() && input.overlap.is_none() {
        return Ok(engine);
    }

    let mut settings = engine
        .storyboard()
        .context("storyboard missing after load")?
        .settings
        .clone();
    if let Some(fps) = input.fps {
        settings.fps = FrameRate::new(fps)?;
    }
    if let Some(overlap) = input.overlap {
        settings.overlap_frames = overlap;
    }
    info!(fps = settings.fps.get(), overlap_frames = settings.overlap_frames, "settings overridden");
    engine.handle_command(Command::UpdateSettings { settings })?;

    Ok(engine)
}

fn print_timeline(engine: &Engine<FsStorage>) -> anyhow::Result<()> {
    let (Some(storyboard), Some(composition)) = (engine.storyboard(), engine.composition()) else {
        bail!("no storyboard loaded");
    };
    let fps = composition.fps();

    println!(
        "{} scenes, {} frames ({:.2}s at {} fps)",
        composition.scene_count(),
        composition.duration_frames(),
        fps.frames_to_seconds(composition.duration_frames() as f64),
        fps.get()
    );
    for (index, (scene, placement)) in storyboard
        .scenes
        .iter()
        .zip(composition.placements())
        .enumerate()
    {
        let chunks = composition.subtitles(index).map_or(0, |chunks| chunks.len());
        let audio = scene.audio_url.as_deref().unwrap_or("-");
        println!(
            "#{index:<3} {:>6}..{:<6} {:>5} frames  {chunks} subtitles  audio: {audio}",
            placement.start_frame,
            placement.end_frame(),
            placement.duration_in_frames
        );
    }

    Ok(())
}

fn export_subtitles(
    engine: &mut Engine<FsStorage>,
    format: SubtitleFormat,
    output: Option<PathBuf>,
) -> anyhow::Result<()> {
    let Some(path) = output else {
        let composition = engine.composition().context("no storyboard loaded")?;
        print!("{}", build_subtitle_export(composition).render(format));
        return Ok(());
    };

    let events = engine.handle_command(Command::ExportSubtitles { path, format })?;
    for event in events {
        if let Event::SubtitlesExported { path, cue_count } = event {
            eprintln!("wrote {cue_count} cues to {}", path.display());
        }
    }

    Ok(())
}

fn print_frame(engine: &mut Engine<FsStorage>, frame: i64) -> anyhow::Result<()> {
    let events = engine.handle_command(Command::SetPlayhead { frame })?;
    let Some(Event::FrameResolved(snapshot)) = events
        .into_iter()
        .find(|event| matches!(event, Event::FrameResolved(_)))
    else {
        bail!("frame {frame} could not be resolved");
    };

    println!("frame {}", snapshot.frame);
    for scene in snapshot.scenes {
        let playback = scene.playback;
        println!(
            "  scene #{} local {}  slide-in {:.3}  entrance {:.3}  progress {:.3}",
            scene.index, scene.local_frame, playback.slide_in, playback.entrance, playback.progress
        );
        if let Some(text) = scene.subtitle {
            println!("    subtitle: {text} (entrance {:.3})", scene.subtitle_entrance);
        }
    }

    Ok(())
}
