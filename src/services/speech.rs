use std::time::Duration;

use anyhow::{bail, Context, Result};

use crate::config;

const TIMEOUT_SECS: u64 = 30;
const LANG_PLACEHOLDER: &str = "{lang}";

/// An external speech recognizer that prints the transcript on stdout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DictationCommand {
    program: String,
    args: Vec<String>,
}

impl DictationCommand {
    /// Build from a whitespace separated template such as
    /// `vosk-transcriber --lang {lang}`.
    pub fn parse(template: &str, language: &str) -> Option<Self> {
        let mut parts = template
            .split_whitespace()
            .map(|part| part.replace(LANG_PLACEHOLDER, language));
        let program = parts.next()?;
        Some(Self {
            program,
            args: parts.collect(),
        })
    }

    pub fn from_env(language: &str) -> Option<Self> {
        let template = std::env::var(config::DICTATION_CMD_ENV).ok()?;
        Self::parse(&template, language)
    }

    pub async fn run(&self) -> Result<String> {
        tracing::debug!("Running dictation command {} {:?}", self.program, self.args);

        let output = tokio::time::timeout(
            Duration::from_secs(TIMEOUT_SECS),
            tokio::process::Command::new(&self.program)
                .args(&self.args)
                .kill_on_drop(true)
                .output(),
        )
        .await
        .with_context(|| format!("Speech recognition timed out after {}s", TIMEOUT_SECS))?
        .with_context(|| format!("Failed to start {}", self.program))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            bail!(
                "Speech recognizer exited with code {}: {}",
                output.status.code().unwrap_or(-1),
                stderr.trim()
            );
        }

        let transcript = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if transcript.is_empty() {
            bail!("No speech was recognized");
        }
        Ok(transcript)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_substitutes_language() {
        let cmd = DictationCommand::parse("recognize --lang={lang} -q", "fr-FR").unwrap();
        assert_eq!(cmd.program, "recognize");
        assert_eq!(cmd.args, vec!["--lang=fr-FR".to_string(), "-q".to_string()]);
    }

    #[test]
    fn blank_template_is_unconfigured() {
        assert_eq!(DictationCommand::parse("   ", "en-US"), None);
    }

    #[tokio::test]
    async fn run_returns_trimmed_stdout() {
        let cmd = DictationCommand::parse("echo  bonjour {lang}", "fr-FR").unwrap();
        assert_eq!(cmd.run().await.unwrap(), "bonjour fr-FR");
    }

    #[tokio::test]
    async fn run_reports_failures() {
        let cmd = DictationCommand::parse("false", "en-US").unwrap();
        assert!(cmd.run().await.is_err());

        let cmd = DictationCommand::parse("true", "en-US").unwrap();
        let err = cmd.run().await.unwrap_err();
        assert_eq!(err.to_string(), "No speech was recognized");
    }
}
