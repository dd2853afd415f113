//! Session file format and `--send` event parsing.
//!
//! A session is a TOML file holding the context configuration, an optional
//! patch, table files and a list of scheduled events:
//!
//! ```toml
//! patch = "osc"
//!
//! [context]
//! sample_rate = 44100.0
//! pool_kb = 4
//!
//! [tables]
//! ir = "impulse.wav"
//!
//! [[events]]
//! receiver = "freq"
//! delay_ms = 500.0
//! format = "f"
//! args = [330.0]
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context as _, bail};
use cadence_core::{Context, ContextConfig, FormatArg, MessageHandle};
use serde::Deserialize;

use crate::patches::Patch;

/// Session file contents.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SessionConfig {
    /// Patch to render when `--patch` is not given.
    #[serde(default)]
    pub patch: Option<Patch>,
    /// Context construction parameters.
    #[serde(default)]
    pub context: ContextConfig,
    /// Table name to WAV file.
    #[serde(default)]
    pub tables: BTreeMap<String, PathBuf>,
    /// Events scheduled before rendering starts.
    #[serde(default)]
    pub events: Vec<EventSpec>,
}

impl SessionConfig {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading session {}", path.display()))?;
        toml::from_str(&text).with_context(|| format!("parsing session {}", path.display()))
    }
}

/// One formatted message argument.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum ArgValue {
    Float(f32),
    Symbol(String),
}

impl ArgValue {
    fn as_format_arg(&self) -> FormatArg<'_> {
        match self {
            ArgValue::Float(f) => FormatArg::Float(*f),
            ArgValue::Symbol(s) => FormatArg::Symbol(s),
        }
    }
}

/// A message to schedule: `receiver:delay_ms:format:args` on the command line.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct EventSpec {
    pub receiver: String,
    #[serde(default)]
    pub delay_ms: f64,
    pub format: String,
    #[serde(default)]
    pub args: Vec<ArgValue>,
}

impl EventSpec {
    /// Schedules the event. Returns `None` if the patch has no such receiver.
    pub fn schedule(&self, cx: &mut Context) -> anyhow::Result<Option<MessageHandle>> {
        let args: Vec<FormatArg<'_>> = self.args.iter().map(ArgValue::as_format_arg).collect();
        cx.schedule_formatted(&self.receiver, self.delay_ms, &self.format, &args)
            .with_context(|| format!("scheduling {self}"))
    }
}

impl std::fmt::Display for EventSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}:{}", self.receiver, self.delay_ms, self.format)?;
        for (i, arg) in self.args.iter().enumerate() {
            f.write_str(if i == 0 { ":" } else { "," })?;
            match arg {
                ArgValue::Float(v) => write!(f, "{v}")?,
                ArgValue::Symbol(s) => f.write_str(s)?,
            }
        }
        Ok(())
    }
}

/// Parses `receiver:delay_ms:format[:arg,arg,...]`.
///
/// Arguments are matched to the format codes: `f` parses a float, `s` and
/// `h` take the text as is, `b` consumes nothing.
pub fn parse_event(s: &str) -> Result<EventSpec, String> {
    let mut parts = s.splitn(4, ':');
    let (Some(receiver), Some(delay), Some(format)) = (parts.next(), parts.next(), parts.next())
    else {
        return Err(format!(
            "invalid event '{s}' (expected receiver:delay_ms:format[:args])"
        ));
    };
    if receiver.is_empty() {
        return Err(format!("invalid event '{s}': empty receiver"));
    }
    let delay_ms: f64 = delay
        .parse()
        .map_err(|_| format!("invalid event '{s}': bad delay '{delay}'"))?;

    let mut raw = parts
        .next()
        .filter(|a| !a.is_empty())
        .map(|a| a.split(','))
        .into_iter()
        .flatten();
    let mut args = Vec::new();
    for code in format.chars() {
        match code {
            'b' => {}
            'f' => {
                let text = raw
                    .next()
                    .ok_or_else(|| format!("invalid event '{s}': missing float argument"))?;
                let value = text
                    .parse()
                    .map_err(|_| format!("invalid event '{s}': bad float '{text}'"))?;
                args.push(ArgValue::Float(value));
            }
            's' | 'h' => {
                let text = raw
                    .next()
                    .ok_or_else(|| format!("invalid event '{s}': missing symbol argument"))?;
                args.push(ArgValue::Symbol(text.to_string()));
            }
            other => return Err(format!("invalid event '{s}': unknown format code '{other}'")),
        }
    }
    if raw.next().is_some() {
        return Err(format!("invalid event '{s}': more arguments than format codes"));
    }

    Ok(EventSpec {
        receiver: receiver.to_string(),
        delay_ms,
        format: format.to_string(),
        args,
    })
}

/// Parses `name=path`.
pub fn parse_table(s: &str) -> Result<(String, PathBuf), String> {
    match s.split_once('=') {
        Some((name, path)) if !name.is_empty() && !path.is_empty() => {
            Ok((name.to_string(), PathBuf::from(path)))
        }
        _ => Err(format!("invalid table '{s}' (expected name=file.wav)")),
    }
}

/// Fails early on events the patch can never deliver.
pub fn check_receivers(cx: &Context, events: &[EventSpec]) -> anyhow::Result<()> {
    for event in events {
        if cx.receiver_id(&event.receiver).is_none() {
            let known: Vec<&str> = cx.receiver_names().collect();
            bail!(
                "no receiver '{}' in this patch (receivers: {})",
                event.receiver,
                known.join(", ")
            );
        }
    }
    Ok(())
}
