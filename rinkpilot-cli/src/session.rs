// Recorded sessions: one JSON frame record per line

use anyhow::{bail, Context, Result};
use rinkpilot_core::{AimPoint, VehicleTelemetry};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct FrameRecord {
    #[serde(default)]
    pub image: Option<PathBuf>,
    #[serde(default)]
    pub aim_point: Option<AimPoint>,
    pub telemetry: VehicleTelemetry,
}

/// Where a frame's aim point comes from.
#[derive(Debug, Clone, PartialEq)]
pub enum FrameSource {
    /// Run perception on this image
    Image(PathBuf),
    /// Recorded aim point, perception skipped
    AimPoint(AimPoint),
}

#[derive(Debug, Clone, PartialEq)]
pub struct SessionFrame {
    /// 1-based line in the session file
    pub line: usize,
    pub source: FrameSource,
    pub telemetry: VehicleTelemetry,
}

/// Parse session text. Relative image paths are resolved against `base`.
/// A recorded aim point wins over an image on the same line.
pub fn parse_session(content: &str, base: &Path) -> Result<Vec<SessionFrame>> {
    let mut frames = Vec::new();

    for (index, raw) in content.lines().enumerate() {
        let line = index + 1;
        if raw.trim().is_empty() {
            continue;
        }

        let record: FrameRecord = serde_json::from_str(raw)
            .with_context(|| format!("line {}: invalid frame record", line))?;

        let source = match (record.aim_point, record.image) {
            (Some(aim), _) => FrameSource::AimPoint(aim),
            (None, Some(image)) if image.is_absolute() => FrameSource::Image(image),
            (None, Some(image)) => FrameSource::Image(base.join(image)),
            (None, None) => bail!("line {}: record needs an image or an aim_point", line),
        };

        frames.push(SessionFrame {
            line,
            source,
            telemetry: record.telemetry,
        });
    }

    Ok(frames)
}

pub fn read_session(path: &Path) -> Result<Vec<SessionFrame>> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read session {}", path.display()))?;
    let base = path.parent().unwrap_or_else(|| Path::new("."));
    parse_session(&content, base)
}
