//! Offline rendering of a built-in patch to a WAV file.

use std::path::PathBuf;

use anyhow::{Context as _, bail};
use cadence_core::vector::ceil_to_vector;
use cadence_core::{Backend, Context, ContextConfig};
use cadence_io::{WavSpec, load_table_from_wav, write_wav_interleaved};
use clap::Args;
use indicatif::{ProgressBar, ProgressStyle};

use crate::patches::Patch;
use crate::session::{EventSpec, SessionConfig, check_receivers, parse_event, parse_table};

#[derive(Args)]
pub struct RenderArgs {
    /// Output WAV file
    #[arg(value_name = "OUTPUT")]
    output: PathBuf,

    /// Built-in patch to render
    #[arg(short, long, value_enum)]
    patch: Option<Patch>,

    /// Duration in seconds
    #[arg(short, long, default_value = "2.0")]
    duration: f64,

    /// Sample rate in Hz (overrides the session file)
    #[arg(long)]
    sample_rate: Option<f64>,

    /// Frames per process call
    #[arg(long, default_value = "256")]
    block_size: usize,

    /// Message pool size in KB (overrides the session file)
    #[arg(long)]
    pool_kb: Option<usize>,

    /// Vector backend (overrides the session file)
    #[arg(long, value_enum)]
    backend: Option<BackendArg>,

    /// Scheduled message: receiver:delay_ms:format[:arg,arg,...]
    #[arg(long = "send", value_parser = parse_event, number_of_values = 1)]
    events: Vec<EventSpec>,

    /// Preload a table: name=file.wav
    #[arg(long = "table", value_parser = parse_table, number_of_values = 1)]
    tables: Vec<(String, PathBuf)>,

    /// Session file (TOML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Output bit depth (16, 24, or 32)
    #[arg(long, default_value = "32")]
    bit_depth: u16,
}

#[derive(Clone, Copy, clap::ValueEnum)]
enum BackendArg {
    Scalar,
    Lanes4,
}

impl From<BackendArg> for Backend {
    fn from(arg: BackendArg) -> Self {
        match arg {
            BackendArg::Scalar => Backend::Scalar,
            BackendArg::Lanes4 => Backend::Lanes4,
        }
    }
}

pub fn run(args: RenderArgs) -> anyhow::Result<()> {
    if !matches!(args.bit_depth, 16 | 24 | 32) {
        bail!("unsupported bit depth {} (use 16, 24 or 32)", args.bit_depth);
    }
    if args.block_size == 0 {
        bail!("block size must be at least 1");
    }
    if !(args.duration.is_finite() && args.duration > 0.0) {
        bail!("duration must be positive");
    }

    let mut session = match &args.config {
        Some(path) => SessionConfig::load(path)?,
        None => SessionConfig::default(),
    };
    let Some(patch) = args.patch.or(session.patch) else {
        bail!("no patch given; use --patch or set `patch` in the session file");
    };

    let mut config: ContextConfig = session.context.clone();
    if let Some(sr) = args.sample_rate {
        config.sample_rate = sr;
    }
    if let Some(kb) = args.pool_kb {
        config.pool_kb = kb;
    }
    if let Some(backend) = args.backend {
        config.backend = backend.into();
    }
    if config.base_path.is_none()
        && let Some(dir) = args.config.as_ref().and_then(|p| p.parent())
    {
        config.base_path = Some(dir.to_string_lossy().into_owned());
    }
    config.name = patch.name().to_string();

    let mut cx = Context::with_config(config)?;
    patch.build(&mut cx)?;

    // session tables first, command-line tables override them
    let tables = std::mem::take(&mut session.tables).into_iter().chain(args.tables);
    for (name, path) in tables {
        let frames = load_table_from_wav(&mut cx, &name, &path)
            .with_context(|| format!("loading table '{name}' from {}", path.display()))?;
        println!("Loaded {frames} samples into '{name}'");
    }

    cx.set_print_hook(|ms, source, text| println!("[{ms:>10.3} ms] {source}: {text}"));
    cx.set_send_hook(|ms, receiver, message| {
        tracing::info!("send '{receiver}' at {ms:.3} ms: {message}");
    });

    let events: Vec<EventSpec> = session.events.into_iter().chain(args.events).collect();
    check_receivers(&cx, &events)?;
    for event in &events {
        event.schedule(&mut cx)?;
    }

    render(&mut cx, args.duration, args.block_size, &args.output, args.bit_depth)
}

fn render(
    cx: &mut Context,
    duration: f64,
    block_size: usize,
    output: &std::path::Path,
    bit_depth: u16,
) -> anyhow::Result<()> {
    let channels = cx.num_output_channels().max(1);
    let inputs = cx.num_input_channels();
    let total = (duration * cx.sample_rate()) as usize;
    println!(
        "Rendering '{}': {total} frames, {} Hz, {channels} channel(s), {} pending event(s)",
        cx.name(),
        cx.sample_rate(),
        cx.pending_events()
    );

    let pb = ProgressBar::new(total as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta})")?
            .progress_chars("##-"),
    );

    // whole vectors per call, so every call advances time by exactly block_size
    let block_size = ceil_to_vector(block_size);
    let silence = vec![0.0f32; block_size * inputs];
    let mut block = vec![0.0f32; block_size * channels];
    let mut interleaved = Vec::with_capacity(total * channels);
    let mut done = 0;
    while done < total {
        let n = block_size.min(total - done);
        cx.process_inline(&silence, &mut block, block_size)?;
        for i in 0..n {
            for ch in 0..channels {
                interleaved.push(block[ch * block_size + i]);
            }
        }
        done += n;
        pb.set_position(done as u64);
    }
    pb.finish_with_message("done");

    let peak = interleaved.iter().fold(0.0f32, |m, s| m.max(s.abs()));
    let spec = WavSpec {
        channels: channels as u16,
        sample_rate: cx.sample_rate() as u32,
        bits_per_sample: bit_depth,
    };
    write_wav_interleaved(output, &interleaved, spec)
        .with_context(|| format!("writing {}", output.display()))?;
    println!(
        "Wrote {} ({} frames, peak {:.3})",
        output.display(),
        interleaved.len() / channels,
        peak
    );
    Ok(())
}
