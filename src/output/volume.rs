use std::process::Command;

use anyhow::{Result, anyhow};

use super::VolumeControl;
use crate::error::ControlError;

/// Output volume through the platform's command-line mixer: `osascript` on
/// macOS, `pactl` on other unix systems.
#[derive(Debug, Default)]
pub struct SystemVolume;

impl VolumeControl for SystemVolume {
    fn volume_percent(&mut self) -> Result<u8> {
        let (program, args) = get_command()?;
        let stdout = run(program, &args)?;
        parse_volume(&stdout)
    }

    fn set_volume_percent(&mut self, percent: u8) -> Result<()> {
        let (program, args) = set_command(percent.min(100))?;
        run(program, &args).map(|_| ())
    }
}

#[cfg(target_os = "macos")]
fn get_command() -> Result<(&'static str, Vec<String>)> {
    Ok((
        "osascript",
        vec![
            "-e".into(),
            "output volume of (get volume settings)".into(),
        ],
    ))
}

#[cfg(target_os = "macos")]
fn set_command(percent: u8) -> Result<(&'static str, Vec<String>)> {
    Ok((
        "osascript",
        vec!["-e".into(), format!("set volume output volume {percent}")],
    ))
}

#[cfg(all(unix, not(target_os = "macos")))]
fn get_command() -> Result<(&'static str, Vec<String>)> {
    Ok((
        "pactl",
        vec!["get-sink-volume".into(), "@DEFAULT_SINK@".into()],
    ))
}

#[cfg(all(unix, not(target_os = "macos")))]
fn set_command(percent: u8) -> Result<(&'static str, Vec<String>)> {
    Ok((
        "pactl",
        vec![
            "set-sink-volume".into(),
            "@DEFAULT_SINK@".into(),
            format!("{percent}%"),
        ],
    ))
}

#[cfg(not(unix))]
fn get_command() -> Result<(&'static str, Vec<String>)> {
    Err(unsupported())
}

#[cfg(not(unix))]
fn set_command(_percent: u8) -> Result<(&'static str, Vec<String>)> {
    Err(unsupported())
}

#[cfg(not(unix))]
fn unsupported() -> anyhow::Error {
    ControlError::VolumeCommand {
        command: "volume".into(),
        reason: "no volume backend for this platform".into(),
    }
    .into()
}

fn run(program: &str, args: &[String]) -> Result<String> {
    let command = format!("{program} {}", args.join(" "));
    let output = Command::new(program)
        .args(args)
        .output()
        .map_err(|err| ControlError::VolumeCommand {
            command: command.clone(),
            reason: err.to_string(),
        })?;

    if !output.status.success() {
        return Err(ControlError::VolumeCommand {
            command,
            reason: format!(
                "{}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            ),
        }
        .into());
    }

    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

/// Accepts both a bare number (`osascript`) and `pactl`'s
/// `Volume: front-left: 32768 /  50% / ...` report; the first percentage wins.
fn parse_volume(output: &str) -> Result<u8> {
    let trimmed = output.trim();
    let value = match trimmed.parse::<u32>() {
        Ok(value) => value,
        Err(_) => trimmed
            .split_whitespace()
            .find_map(|token| token.strip_suffix('%'))
            .ok_or_else(|| anyhow!("no volume percentage in `{trimmed}`"))?
            .parse::<u32>()
            .map_err(|err| anyhow!("bad volume percentage in `{trimmed}`: {err}"))?,
    };
    Ok(value.min(100) as u8)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_bare_number() {
        assert_eq!(parse_volume("42\n").unwrap(), 42);
    }

    #[test]
    fn parses_pactl_report() {
        let report = "Volume: front-left: 32768 /  50% / -18.06 dB,   \
                      front-right: 32768 /  50% / -18.06 dB\n        balance 0.00\n";
        assert_eq!(parse_volume(report).unwrap(), 50);
    }

    #[test]
    fn caps_boosted_volume_at_100() {
        assert_eq!(parse_volume("Volume: mono: 98304 / 150% / 10.57 dB").unwrap(), 100);
    }

    #[test]
    fn rejects_output_without_percentage() {
        assert!(parse_volume("missing value").is_err());
        assert!(parse_volume("").is_err());
    }
}
