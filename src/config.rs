//! Matching configuration.

use serde::{Deserialize, Serialize};

use crate::aoi::{parse_aoi, AreaOfInterest};
use crate::curves::ThresholdRange;
use crate::geodetic::GeodeticConverter;
use crate::overlap::AcceptancePolicy;
use crate::track::Frame;
use crate::{Error, Result};

/// How many strong frames a pair needs before it is committed.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum MinFramesPolicy {
    /// At least this many strong frames.
    Absolute(usize),
    /// At least this percentage (0-100) of the ground-truth track's in-AOI frames.
    Percentage(f64),
}

impl Default for MinFramesPolicy {
    fn default() -> Self {
        MinFramesPolicy::Absolute(1)
    }
}

impl MinFramesPolicy {
    /// Parse `"N"` (absolute) or `"N%"` (percentage).
    pub fn parse(spec: &str) -> Result<Self> {
        let spec = spec.trim();
        if let Some(pct) = spec.strip_suffix('%') {
            let value: f64 = pct.trim().parse().map_err(|e| {
                Error::InvalidConfig(format!("min frames percentage '{}': {}", spec, e))
            })?;
            let policy = MinFramesPolicy::Percentage(value);
            policy.validate()?;
            Ok(policy)
        } else {
            let value: usize = spec.parse().map_err(|e| {
                Error::InvalidConfig(format!("min frames count '{}': {}", spec, e))
            })?;
            Ok(MinFramesPolicy::Absolute(value))
        }
    }

    fn validate(&self) -> Result<()> {
        match *self {
            MinFramesPolicy::Percentage(p) if !(0.0..=100.0).contains(&p) => Err(
                Error::InvalidConfig(format!("min frames percentage {} not in [0, 100]", p)),
            ),
            _ => Ok(()),
        }
    }

    /// Strong frames required for a ground-truth track with `truth_frames` frames.
    ///
    /// A percentage floor is never below 1 for a non-empty truth track.
    pub fn required_frames(&self, truth_frames: usize) -> usize {
        match *self {
            MinFramesPolicy::Absolute(n) => n,
            MinFramesPolicy::Percentage(p) => {
                let floor = (p / 100.0 * truth_frames as f64).floor() as usize;
                if truth_frames > 0 {
                    floor.max(1)
                } else {
                    floor
                }
            }
        }
    }
}

/// Inclusive range of frame numbers that take part in scoring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameWindow {
    pub first: u32,
    pub last: u32,
}

impl FrameWindow {
    pub fn new(first: u32, last: u32) -> Result<Self> {
        if first > last {
            return Err(Error::InvalidConfig(format!(
                "frame window start {} is after end {}",
                first, last
            )));
        }
        Ok(Self { first, last })
    }

    /// Parse `"f0:f1"`.
    pub fn parse(spec: &str) -> Result<Self> {
        let (first, last) = spec.trim().split_once(':').ok_or_else(|| {
            Error::InvalidConfig(format!("frame window '{}' must look like f0:f1", spec))
        })?;
        let parse = |s: &str| -> Result<u32> {
            s.trim().parse().map_err(|e| {
                Error::InvalidConfig(format!("frame window '{}': {}", spec, e))
            })
        };
        Self::new(parse(first)?, parse(last)?)
    }

    /// Frames without a frame number are not subject to the window.
    pub fn contains(&self, frame: &Frame) -> bool {
        frame
            .frame_number
            .map_or(true, |n| (self.first..=self.last).contains(&n))
    }
}

/// Minimum overlap, as a percentage of each side's box area.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PercentOverlap {
    pub truth: Option<f64>,
    pub computed: Option<f64>,
}

/// Configuration for matching computed tracks against ground truth.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchingParams {
    /// Geodetic match radius in meters. Negative disables geodetic (radial) mode.
    pub radial_overlap: f64,

    /// Minimum overlap area (pixels²) for a strong frame under the area policy.
    pub min_bound_matching_area: f64,

    /// Percentage overlap policy.
    pub min_pcent_overlap: Option<PercentOverlap>,

    /// IoU policy threshold in [0, 1].
    pub iou_threshold: Option<f64>,

    /// Minimum number of strong frames for a pair to be committed.
    pub min_frames: MinFramesPolicy,

    /// Maximum timestamp gap for two frames to be aligned.
    pub alignment_window_usecs: u64,

    /// Pixels added to each side of every box before overlap tests.
    pub bbox_expansion: Option<f64>,

    /// Commit every non-empty overlap instead of only strong ones.
    pub pass_all_nonzero_overlaps: bool,

    /// AOI as given by the user; see [`parse_aoi`].
    pub aoi_spec: Option<String>,

    /// Parsed AOI. Rebuilt from `aoi_spec` when loading from JSON.
    #[serde(skip)]
    pub aoi: Option<AreaOfInterest>,

    /// Keep what is inside the AOI (true) or outside it (false).
    pub aoi_inclusive: bool,

    pub frame_window: Option<FrameWindow>,

    /// Fail when truth and computed timestamps do not overlap at all.
    pub sanity_check: bool,

    /// Threshold budget for ROC generation.
    pub n_roc_points: usize,

    /// Explicit ROC thresholds; replaces generated ones.
    pub roc_thresholds: Option<ThresholdRange>,
}

impl Default for MatchingParams {
    fn default() -> Self {
        Self {
            radial_overlap: -1.0,
            min_bound_matching_area: 0.0,
            min_pcent_overlap: None,
            iou_threshold: None,
            min_frames: MinFramesPolicy::default(),
            alignment_window_usecs: 500_000,
            bbox_expansion: None,
            pass_all_nonzero_overlaps: false,
            aoi_spec: None,
            aoi: None,
            aoi_inclusive: true,
            frame_window: None,
            sanity_check: true,
            n_roc_points: 100,
            roc_thresholds: None,
        }
    }
}

impl MatchingParams {
    /// Load parameters from JSON, parsing `aoi_spec` if present.
    pub fn from_json_str(json: &str, converter: &dyn GeodeticConverter) -> Result<Self> {
        let mut params: MatchingParams = serde_json::from_str(json)?;
        if let Some(spec) = params.aoi_spec.clone() {
            params.aoi = Some(parse_aoi(&spec, converter)?);
        }
        params.validate()?;
        Ok(params)
    }

    /// Parse and install an AOI.
    pub fn with_aoi(
        mut self,
        spec: &str,
        inclusive: bool,
        converter: &dyn GeodeticConverter,
    ) -> Result<Self> {
        self.aoi = Some(parse_aoi(spec, converter)?);
        self.aoi_spec = Some(spec.to_string());
        self.aoi_inclusive = inclusive;
        Ok(self)
    }

    pub fn use_radial(&self) -> bool {
        self.radial_overlap >= 0.0
    }

    /// Reject contradictory settings before any scoring starts.
    pub fn validate(&self) -> Result<()> {
        if self.use_radial() && self.pass_all_nonzero_overlaps {
            return Err(Error::InvalidConfig(
                "radial overlap cannot be combined with pass_all_nonzero_overlaps".to_string(),
            ));
        }

        if self.use_radial() && matches!(self.aoi, Some(AreaOfInterest::Pixel(_))) {
            return Err(Error::InvalidConfig(
                "radial overlap needs a geodetic AOI, got a pixel AOI".to_string(),
            ));
        }

        if self.iou_threshold.is_some() && self.min_pcent_overlap.is_some() {
            return Err(Error::InvalidConfig(
                "only one of iou_threshold and min_pcent_overlap may be set".to_string(),
            ));
        }

        if let Some(iou) = self.iou_threshold {
            if !(0.0..=1.0).contains(&iou) {
                return Err(Error::InvalidConfig(format!(
                    "iou_threshold {} not in [0, 1]",
                    iou
                )));
            }
        }

        if let Some(pct) = self.min_pcent_overlap {
            if pct.truth.is_none() && pct.computed.is_none() {
                return Err(Error::InvalidConfig(
                    "min_pcent_overlap needs a truth or computed percentage".to_string(),
                ));
            }
            for value in [pct.truth, pct.computed].into_iter().flatten() {
                if !(0.0..=100.0).contains(&value) {
                    return Err(Error::InvalidConfig(format!(
                        "overlap percentage {} not in [0, 100]",
                        value
                    )));
                }
            }
        }

        if self.aoi_spec.is_some() && self.aoi.is_none() {
            return Err(Error::InvalidConfig(
                "aoi_spec is set but was never parsed".to_string(),
            ));
        }

        if let Some(window) = self.frame_window {
            FrameWindow::new(window.first, window.last)?;
        }

        if let Some(range) = &self.roc_thresholds {
            range.validate()?;
        }

        self.min_frames.validate()
    }

    /// The single acceptance policy implied by these parameters.
    pub fn acceptance_policy(&self) -> AcceptancePolicy {
        if self.use_radial() {
            AcceptancePolicy::Radial {
                radius: self.radial_overlap,
            }
        } else if let Some(iou) = self.iou_threshold {
            AcceptancePolicy::Iou(iou)
        } else if let Some(pct) = self.min_pcent_overlap {
            AcceptancePolicy::PercentOverlap(pct)
        } else {
            AcceptancePolicy::MinArea(self.min_bound_matching_area)
        }
    }

    pub fn frame_in_window(&self, frame: &Frame) -> bool {
        self.frame_window.map_or(true, |w| w.contains(frame))
    }

    /// Canonical AOI test: a geometric result counts when it equals the inclusive flag.
    pub fn aoi_accepts(&self, geometrically_inside: bool) -> bool {
        geometrically_inside == self.aoi_inclusive
    }

    /// True when neither an AOI nor a frame window restricts scoring.
    pub fn is_unrestricted(&self) -> bool {
        self.aoi.is_none() && self.frame_window.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geodetic::WgsUtmConverter;

    #[test]
    fn test_min_frames_parse() {
        assert_eq!(MinFramesPolicy::parse("5").unwrap(), MinFramesPolicy::Absolute(5));
        assert_eq!(
            MinFramesPolicy::parse(" 25% ").unwrap(),
            MinFramesPolicy::Percentage(25.0)
        );
        assert!(MinFramesPolicy::parse("150%").is_err());
        assert!(MinFramesPolicy::parse("five").is_err());
    }

    #[test]
    fn test_percentage_floor_never_below_one() {
        let policy = MinFramesPolicy::Percentage(10.0);
        assert_eq!(policy.required_frames(3), 1);
        assert_eq!(policy.required_frames(25), 2);
        assert_eq!(policy.required_frames(0), 0);
        assert_eq!(MinFramesPolicy::Percentage(0.0).required_frames(10), 1);
    }

    #[test]
    fn test_frame_window_parse_and_contains() {
        let window = FrameWindow::parse("10:20").unwrap();
        assert!(window.contains(&Frame::new(0).with_frame_number(10)));
        assert!(window.contains(&Frame::new(0).with_frame_number(20)));
        assert!(!window.contains(&Frame::new(0).with_frame_number(21)));
        assert!(window.contains(&Frame::new(0)));
        assert!(FrameWindow::parse("20:10").is_err());
        assert!(FrameWindow::parse("20").is_err());
    }

    #[test]
    fn test_radial_with_pass_all_is_rejected() {
        let params = MatchingParams {
            radial_overlap: 5.0,
            pass_all_nonzero_overlaps: true,
            ..Default::default()
        };
        assert!(matches!(params.validate(), Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn test_iou_and_percentage_are_exclusive() {
        let params = MatchingParams {
            iou_threshold: Some(0.5),
            min_pcent_overlap: Some(PercentOverlap {
                truth: Some(50.0),
                computed: None,
            }),
            ..Default::default()
        };
        assert!(params.validate().is_err());
    }

    #[test]
    fn test_acceptance_policy_selection() {
        let params = MatchingParams::default();
        assert_eq!(params.acceptance_policy(), AcceptancePolicy::MinArea(0.0));

        let params = MatchingParams {
            iou_threshold: Some(0.3),
            ..Default::default()
        };
        assert_eq!(params.acceptance_policy(), AcceptancePolicy::Iou(0.3));

        let params = MatchingParams {
            radial_overlap: 2.0,
            ..Default::default()
        };
        assert_eq!(
            params.acceptance_policy(),
            AcceptancePolicy::Radial { radius: 2.0 }
        );
    }

    #[test]
    fn test_from_json_parses_aoi() {
        let json = r#"{
            "iou_threshold": 0.5,
            "aoi_spec": "100x50+10+20",
            "aoi_inclusive": false,
            "min_frames": {"kind": "percentage", "value": 20.0}
        }"#;
        let params = MatchingParams::from_json_str(json, &WgsUtmConverter::default()).unwrap();
        assert_eq!(params.iou_threshold, Some(0.5));
        assert!(!params.aoi_inclusive);
        assert_eq!(params.min_frames, MinFramesPolicy::Percentage(20.0));
        assert!(matches!(params.aoi, Some(AreaOfInterest::Pixel(_))));
        assert_eq!(params.alignment_window_usecs, 500_000);
    }

    #[test]
    fn test_unparsed_aoi_spec_is_rejected() {
        let params = MatchingParams {
            aoi_spec: Some("10x10+0+0".to_string()),
            ..Default::default()
        };
        assert!(params.validate().is_err());
    }

    #[test]
    fn test_oversized_threshold_range_is_rejected() {
        let json = r#"{ "roc_thresholds": { "min": 0.0, "max": 1e18, "step": 1e-9 } }"#;
        let result = MatchingParams::from_json_str(json, &WgsUtmConverter::default());
        assert!(matches!(result, Err(Error::InvalidConfig(_))));

        let params = MatchingParams {
            roc_thresholds: Some(ThresholdRange::parse("0:1:0.1").unwrap()),
            ..Default::default()
        };
        assert!(params.validate().is_ok());
    }
}
