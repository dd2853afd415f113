//! Built-in patches.
//!
//! Each patch wires objects, tables and receivers into a fresh [`Context`] and
//! compiles it. Tables are filled with generated defaults; `--table` options
//! replace them after the patch is built.

use cadence_core::objects::{Binop, BinopKind, Convolution, Phasor, Tabread, TabreadMode, Var};
use cadence_core::{Context, ContextError, NodeId, Route};
use clap::ValueEnum;
use serde::Deserialize;

/// A built-in patch.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Patch {
    /// Three detuned sawtooth oscillators.
    Osc,
    /// Sawtooth through a convolution kernel.
    Conv,
    /// One-shot sample player.
    Player,
}

impl Patch {
    pub const ALL: [Patch; 3] = [Patch::Osc, Patch::Conv, Patch::Player];

    pub fn name(self) -> &'static str {
        match self {
            Patch::Osc => "osc",
            Patch::Conv => "conv",
            Patch::Player => "player",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            Patch::Osc => "three detuned phasors with a master gain",
            Patch::Conv => "phasor filtered by the convolution kernel in table 'ir'",
            Patch::Player => "plays table 'sample' once per bang",
        }
    }

    /// `(receiver, what it does)` pairs.
    pub fn receivers(self) -> &'static [(&'static str, &'static str)] {
        match self {
            Patch::Osc => &[
                ("freq", "float: oscillator frequency in Hz, echoed to send 'freq_out'"),
                ("gain", "float: master gain, printed"),
            ],
            Patch::Conv => &[
                ("freq", "float: oscillator frequency in Hz"),
                ("ir", "table control: resize <n>, clear"),
            ],
            Patch::Player => &[
                ("play", "bang: start, float: start at sample, stop"),
                ("sample", "table control: resize <n>, clear"),
            ],
        }
    }

    pub fn tables(self) -> &'static [&'static str] {
        match self {
            Patch::Osc => &[],
            Patch::Conv => &["ir"],
            Patch::Player => &["sample"],
        }
    }

    /// Wires the patch into `cx` and compiles it.
    pub fn build(self, cx: &mut Context) -> Result<(), ContextError> {
        let last = match self {
            Patch::Osc => build_osc(cx)?,
            Patch::Conv => build_conv(cx)?,
            Patch::Player => build_player(cx)?,
        };
        for channel in 0..cx.num_output_channels() {
            let out = cx.add_output(channel)?;
            cx.connect(last, out, 0)?;
        }
        cx.compile()?;
        tracing::debug!("patch '{}' built", self.name());
        Ok(())
    }
}

/// Centers a 0..1 phasor around zero.
fn centered(cx: &mut Context, source: NodeId, offset: f32) -> Result<NodeId, ContextError> {
    let sub = cx.add_object(Box::new(Binop::new(BinopKind::Sub, offset)));
    cx.connect(source, sub, 0)?;
    Ok(sub)
}

fn build_osc(cx: &mut Context) -> Result<NodeId, ContextError> {
    let freq = cx.add_object(Box::new(Var::new(220.0)));
    let mix = cx.add_object(Box::new(Binop::new(BinopKind::Add, 0.0)));
    for detune in [0.995, 1.0, 1.005] {
        let scaled = cx.add_object(Box::new(Binop::new(BinopKind::Mul, detune)));
        let osc = cx.add_object(Box::new(Phasor::signal()));
        cx.connect(freq, scaled, 0)?;
        cx.connect(scaled, osc, 0)?;
        cx.connect(osc, mix, 0)?;
    }
    let centered = centered(cx, mix, 1.5)?;
    let gain = cx.add_object(Box::new(Binop::new(BinopKind::Mul, 0.2)));
    cx.connect(centered, gain, 0)?;

    cx.add_route("freq", Route::inlet(freq, 0))?;
    cx.add_route("freq", Route::send("freq_out"))?;
    cx.add_route("gain", Route::inlet(gain, 1))?;
    cx.add_route("gain", Route::print("gain"))?;
    Ok(gain)
}

fn build_conv(cx: &mut Context) -> Result<NodeId, ContextError> {
    // one-pole style decay, normalized to unit sum
    let len = 64;
    let decay: Vec<f32> = (0..len).map(|i| (-(i as f32) / 8.0).exp()).collect();
    let sum: f32 = decay.iter().sum();
    let ir = cx.add_table("ir", len)?;
    if let Some(table) = cx.table_mut("ir") {
        for (dst, &s) in table.samples_mut().iter_mut().zip(&decay) {
            *dst = s / sum;
        }
    }

    let osc = cx.add_object(Box::new(Phasor::new(110.0)));
    let centered = centered(cx, osc, 0.5)?;
    let conv = cx.add_object(Box::new(Convolution::new(ir)));
    cx.connect(centered, conv, 0)?;

    cx.add_route("freq", Route::inlet(osc, 0))?;
    cx.add_route("ir", Route::Table(ir))?;
    Ok(conv)
}

fn build_player(cx: &mut Context) -> Result<NodeId, ContextError> {
    // quarter-second decaying 440 Hz blip
    let sr = cx.sample_rate();
    let len = (sr / 4.0) as usize;
    let sample = cx.add_table("sample", len.max(1))?;
    if let Some(table) = cx.table_mut("sample") {
        for (i, dst) in table.samples_mut().iter_mut().enumerate() {
            let t = i as f64 / sr;
            *dst = ((std::f64::consts::TAU * 440.0 * t).sin() * (-t * 12.0).exp() * 0.5) as f32;
        }
    }

    let player = cx.add_object(Box::new(Tabread::new(sample, TabreadMode::Stoppable)));
    cx.add_route("play", Route::inlet(player, 0))?;
    cx.add_route("sample", Route::Table(sample))?;
    Ok(player)
}
