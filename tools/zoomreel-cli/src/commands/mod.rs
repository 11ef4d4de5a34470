pub mod check;
pub mod export;
pub mod inspect;
pub mod plan;

use std::path::Path;

use zoomreel_common::config::AppConfig;
use zoomreel_project_model::{CropRegion, DeletePolicy, RecordingMetadata, Timeline};

/// Parse `x,y,width,height`.
pub fn parse_crop(raw: &str) -> Result<CropRegion, String> {
    let parts: Vec<f64> = raw
        .split(',')
        .map(|p| p.trim().parse::<f64>())
        .collect::<Result<_, _>>()
        .map_err(|e| format!("invalid crop '{raw}': {e}"))?;
    let [x, y, width, height] = parts[..] else {
        return Err(format!("crop must be x,y,width,height, got '{raw}'"));
    };
    if !(width > 0.0 && height > 0.0) {
        return Err(format!("crop size {width}x{height} must be positive"));
    }
    Ok(CropRegion::new(x, y, width, height))
}

fn delete_policy(config: &AppConfig) -> DeletePolicy {
    if config.recording.protect_anchor {
        DeletePolicy::ProtectAnchor
    } else {
        DeletePolicy::AllowAny
    }
}

/// Load a metadata file and rebuild its timeline.
pub fn load_timeline(
    path: &Path,
    crop: Option<CropRegion>,
    config: &AppConfig,
) -> anyhow::Result<(RecordingMetadata, Timeline)> {
    let metadata = RecordingMetadata::load(path)
        .map_err(|e| anyhow::anyhow!("Failed to load metadata: {e}"))?;
    let timeline = metadata
        .to_timeline(crop, delete_policy(config))
        .map_err(|e| anyhow::anyhow!("{e}"))?
        .with_coalesce_window(config.recording.coalesce_window_ms);
    Ok((metadata, timeline))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_crop() {
        let crop = parse_crop("100, 50,800,600").unwrap();
        assert_eq!(crop, CropRegion::new(100.0, 50.0, 800.0, 600.0));
    }

    #[test]
    fn test_parse_crop_rejects_bad_input() {
        assert!(parse_crop("1,2,3").is_err());
        assert!(parse_crop("a,b,c,d").is_err());
        assert!(parse_crop("0,0,0,10").is_err());
    }

    #[test]
    fn test_load_timeline_uses_crop_override() {
        let dir = std::env::temp_dir().join("zoomreel_test_cli_load");
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("meta.json");
        std::fs::write(
            &path,
            r#"{"startTime": 1, "duration": 1000, "events": [
                {"time_ms": 0, "center": {"x": 400, "y": 300}, "scale": 1.0, "type": "zoom"}
            ]}"#,
        )
        .unwrap();

        let config = AppConfig::default();
        assert!(load_timeline(&path, None, &config).is_err());

        let crop = CropRegion::new(100.0, 50.0, 800.0, 600.0);
        let (meta, timeline) = load_timeline(&path, Some(crop), &config).unwrap();
        assert_eq!(meta.duration, 1000);
        assert_eq!(timeline.len(), 1);

        std::fs::remove_dir_all(&dir).ok();
    }
}
