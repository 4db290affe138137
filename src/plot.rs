//! Whitespace-separated timeline files for external plotting scripts.
//!
//! - `<prefix>_gt.dat`: `y start_usecs end_usecs truth_id`
//! - `<prefix>_matched.dat`: `y start_usecs end_usecs computed_id truth_id`
//! - `<prefix>_unmatched.dat`: `y start_usecs end_usecs computed_id`
//!
//! Ground-truth tracks take y = 1, 2, ... in set order. A matched computed
//! track is drawn on the row of its dominant truth track, one line per pair.
//! Unmatched computed tracks take y = -1, -2, ...

use std::collections::BTreeMap;
use std::ffi::OsString;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use log::info;

use crate::matrix::AssociationMatrix;
use crate::metrics::Associations;
use crate::track::TrackSet;
use crate::Result;

/// Files written by [`write_plot_dump`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlotDumpPaths {
    pub ground_truth: PathBuf,
    pub matched: PathBuf,
    pub unmatched: PathBuf,
}

impl PlotDumpPaths {
    pub fn for_prefix(prefix: &Path) -> Self {
        let with_suffix = |suffix: &str| {
            let mut name: OsString = prefix.as_os_str().to_os_string();
            name.push(suffix);
            PathBuf::from(name)
        };
        Self {
            ground_truth: with_suffix("_gt.dat"),
            matched: with_suffix("_matched.dat"),
            unmatched: with_suffix("_unmatched.dat"),
        }
    }
}

/// Write the three plot files next to `prefix`.
pub fn write_plot_dump<P: AsRef<Path>>(
    prefix: P,
    matrix: &AssociationMatrix,
    truth: TrackSet<'_>,
    computed: TrackSet<'_>,
) -> Result<PlotDumpPaths> {
    let paths = PlotDumpPaths::for_prefix(prefix.as_ref());
    let associations = Associations::collect(matrix, truth, computed);

    let mut y_of_truth: BTreeMap<usize, i64> = BTreeMap::new();
    let mut gt = BufWriter::new(File::create(&paths.ground_truth)?);
    for (row, (i, track)) in truth.iter().enumerate() {
        let y = row as i64 + 1;
        y_of_truth.insert(i, y);
        if let Some(range) = track.time_range() {
            writeln!(gt, "{} {} {} {}", y, range.start, range.end, track.label(i))?;
        }
    }
    gt.flush()?;

    let mut matched = BufWriter::new(File::create(&paths.matched)?);
    let mut unmatched = BufWriter::new(File::create(&paths.unmatched)?);
    let mut next_unmatched_y = -1i64;
    for (c, track) in computed.iter() {
        let partners = associations.of_computed(c);

        // Most overlap frames; lowest truth index on a tie.
        let dominant = partners
            .iter()
            .max_by(|(ta, sa), (tb, sb)| {
                sa.accepted_frames()
                    .cmp(&sb.accepted_frames())
                    .then_with(|| tb.cmp(ta))
            })
            .map(|(t, _)| *t);

        match dominant {
            Some(dominant) => {
                let y = y_of_truth.get(&dominant).copied().unwrap_or(0);
                for (t, score) in partners {
                    let range = score.time_range();
                    let truth_label = truth.get(*t).map_or(*t as u64, |tt| tt.label(*t));
                    writeln!(
                        matched,
                        "{} {} {} {} {}",
                        y,
                        range.start,
                        range.end,
                        track.label(c),
                        truth_label
                    )?;
                }
            }
            None => {
                if let Some(range) = track.time_range() {
                    writeln!(
                        unmatched,
                        "{} {} {} {}",
                        next_unmatched_y,
                        range.start,
                        range.end,
                        track.label(c)
                    )?;
                    next_unmatched_y -= 1;
                }
            }
        }
    }
    matched.flush()?;
    unmatched.flush()?;

    info!("Wrote plot dump to {}", paths.ground_truth.display());
    Ok(paths)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matrix::PairKey;
    use crate::overlap::FrameOverlapRecord;
    use crate::pair::PairScore;
    use crate::track::{Frame, Track};
    use std::fs;

    fn score(frames: &[u64]) -> PairScore {
        PairScore::from_overlaps(
            frames
                .iter()
                .map(|&t| FrameOverlapRecord {
                    truth_frame: 0,
                    computed_frame: 0,
                    truth_frame_number: None,
                    computed_frame_number: None,
                    truth_timestamp: t,
                    computed_timestamp: t,
                    truth_area: Some(1.0),
                    computed_area: Some(1.0),
                    overlap_area: 1.0,
                    centroid_distance: Some(0.0),
                    bottom_distance: Some(0.0),
                    in_aoi: true,
                })
                .collect(),
        )
        .unwrap()
    }

    #[test]
    fn test_plot_dump_layout() {
        let dir = tempfile::tempdir().unwrap();
        let prefix = dir.path().join("run");

        let truth = vec![
            Track::ground_truth(Some(7), vec![Frame::new(0), Frame::new(100)]),
            Track::ground_truth(Some(8), vec![Frame::new(50), Frame::new(150)]),
        ];
        let computed = vec![
            Track::computed(Some(20), 0.9, vec![Frame::new(0), Frame::new(150)]),
            Track::computed(Some(21), 0.4, vec![Frame::new(300), Frame::new(400)]),
            Track::computed(None, 0.2, vec![Frame::new(500)]),
        ];
        let mut matrix = AssociationMatrix::new();
        matrix.insert(PairKey::new(0, 0), score(&[0]));
        matrix.insert(PairKey::new(1, 0), score(&[50, 100, 150]));

        let paths = write_plot_dump(
            &prefix,
            &matrix,
            TrackSet::all(&truth),
            TrackSet::all(&computed),
        )
        .unwrap();

        let gt = fs::read_to_string(&paths.ground_truth).unwrap();
        assert_eq!(gt, "1 0 100 7\n2 50 150 8\n");

        let matched = fs::read_to_string(&paths.matched).unwrap();
        assert_eq!(matched, "2 0 0 20 7\n2 50 150 20 8\n");

        let unmatched = fs::read_to_string(&paths.unmatched).unwrap();
        assert_eq!(unmatched, "-1 300 400 21\n-2 500 500 2\n");

        assert!(paths.ground_truth.ends_with("run_gt.dat"));
    }
}
