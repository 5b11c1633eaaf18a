// ============================================================
// Layer 5 — Text-to-Speech
// ============================================================
// Runs an espeak-compatible program to turn an answer into a WAV
// file:
//
//   espeak-ng -s <wpm> -a <amplitude> [-v <voice>] -w <out.wav> --stdin
//
// The text goes in on stdin so answers never hit the argument
// list. Amplitude is espeak's 0–200 scale; volume 1.0 maps to 100.

use std::ffi::OsString;
use std::io::Write;
use std::path::Path;
use std::process::{Command, Stdio};

use anyhow::{Context, Result};

use crate::domain::traits::SpeechSynthesizer;
use crate::infra::config::SpeechConfig;

#[derive(Debug, Clone)]
pub struct CommandSynthesizer {
    program:  String,
    rate_wpm: u32,
    volume:   f32,
    voice:    Option<String>,
}

impl CommandSynthesizer {
    pub fn new(program: impl Into<String>, rate_wpm: u32, volume: f32, voice: Option<String>) -> Self {
        Self { program: program.into(), rate_wpm, volume, voice }
    }

    pub fn from_config(cfg: &SpeechConfig) -> Self {
        Self::new(cfg.program.clone(), cfg.rate_wpm, cfg.volume, cfg.voice.clone())
    }

    fn build_args(&self, out: &Path) -> Vec<OsString> {
        let amplitude = (self.volume.clamp(0.0, 1.0) * 100.0).round() as u32;

        let mut args: Vec<OsString> = vec![
            "-s".into(),
            self.rate_wpm.to_string().into(),
            "-a".into(),
            amplitude.to_string().into(),
        ];
        if let Some(voice) = &self.voice {
            args.push("-v".into());
            args.push(voice.into());
        }
        args.push("-w".into());
        args.push(out.as_os_str().to_owned());
        args.push("--stdin".into());
        args
    }
}

impl SpeechSynthesizer for CommandSynthesizer {
    fn synthesize(&self, text: &str, out: &Path) -> Result<()> {
        let mut child = Command::new(&self.program)
            .args(self.build_args(out))
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .with_context(|| format!("failed to run '{}' (is it installed?)", self.program))?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(text.as_bytes())
                .with_context(|| format!("failed to send text to '{}'", self.program))?;
        }

        let output = child
            .wait_with_output()
            .with_context(|| format!("'{}' did not finish", self.program))?;
        anyhow::ensure!(
            output.status.success(),
            "'{}' exited with {}: {}",
            self.program,
            output.status,
            String::from_utf8_lossy(&output.stderr).trim()
        );

        tracing::debug!("Synthesized {} chars to '{}'", text.len(), out.display());
        Ok(())
    }
}
