use std::path::Path;
use std::str::FromStr;

use hifitime::Epoch;
use sunview_core::{diag, Resolved};

/// One attitude sample: sun direction in the body frame and whether the
/// satellite is in sunlight at that instant.
#[derive(Clone, Debug)]
pub struct AttitudeSample {
    /// Raw timestamp text, carried verbatim into the output files
    pub timestamp: String,
    pub azimuth_deg: f32,
    pub elevation_deg: f32,
    /// Sun-nadir angle from the propagator, degrees
    pub eclipse_deg: f64,
    /// 1.0 in sunlight, 0.0 in Earth's shadow
    pub illuminated: f32,
}

/// The attitude history with a single cursor. The cursor is only moved
/// through the methods below and always satisfies `0 <= cursor <= len`;
/// `cursor == len` means the run is finished.
#[derive(Debug)]
pub struct AttitudeTimeline {
    samples: Vec<AttitudeSample>,
    cursor: usize,
    time_step_s: f64,
    epoch0: Option<Epoch>,
}

impl AttitudeTimeline {
    /// Load the sun-angle CSV. Rows are `timestamp,azimuth,elevation,eclipse`;
    /// blank rows and rows starting with `"` are headers and skipped. The
    /// first row with the wrong field count or an unparseable number ends
    /// parsing and whatever was read so far is kept (degrade, not abort).
    /// A missing file yields an empty timeline the same way.
    pub fn load(path: &Path, resolved: &Resolved) -> Self {
        let mut samples = Vec::new();
        let reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .quoting(false)
            .comment(Some(b'"'))
            .trim(csv::Trim::All)
            .from_path(path);
        let reader = match reader {
            Ok(r) => r,
            Err(e) => {
                diag::report(&format!(
                    "attitude file {} unreadable: {}",
                    path.display(),
                    e
                ));
                return Self::from_samples(samples, resolved.scenario.time_step_s);
            }
        };

        for row in reader.into_records() {
            let record = match row {
                Ok(r) => r,
                Err(e) => {
                    diag::report(&format!(
                        "attitude row {} unreadable, keeping {} samples: {}",
                        samples.len() + 1,
                        samples.len(),
                        e
                    ));
                    break;
                }
            };
            // exactly 4 fields per data row, too many is as fatal as too few
            if record.len() != 4 {
                diag::report(&format!(
                    "attitude row {} has {} fields, keeping {} samples",
                    samples.len() + 1,
                    record.len(),
                    samples.len()
                ));
                break;
            }
            let numbers = (
                record[1].parse::<f32>(),
                record[2].parse::<f32>(),
                record[3].parse::<f64>(),
            );
            let (Ok(azimuth_deg), Ok(elevation_deg), Ok(eclipse_deg)) = numbers else {
                diag::report(&format!(
                    "attitude row {} malformed, keeping {} samples",
                    samples.len() + 1,
                    samples.len()
                ));
                break;
            };
            let illuminated = if eclipse_deg.abs() < resolved.eclipse_threshold_deg {
                0.0
            } else {
                1.0
            };
            samples.push(AttitudeSample {
                timestamp: record[0].to_string(),
                azimuth_deg,
                elevation_deg,
                eclipse_deg,
                illuminated,
            });
        }

        tracing::info!(
            "loaded {} attitude samples from {}",
            samples.len(),
            path.display()
        );
        Self::from_samples(samples, resolved.scenario.time_step_s)
    }

    pub fn from_samples(samples: Vec<AttitudeSample>, time_step_s: f64) -> Self {
        let epoch0 = samples.first().and_then(|s| parse_epoch(&s.timestamp));
        Self {
            samples,
            cursor: 0,
            time_step_s,
            epoch0,
        }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn samples(&self) -> &[AttitudeSample] {
        &self.samples
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Sample under the cursor, `None` once the run is finished
    pub fn current(&self) -> Option<&AttitudeSample> {
        self.samples.get(self.cursor)
    }

    /// Move one step forward, stopping at `len`
    pub fn advance(&mut self) {
        if self.cursor < self.samples.len() {
            self.cursor += 1;
        }
    }

    /// Move one step back, stopping at 0
    pub fn retreat(&mut self) {
        if self.cursor > 0 {
            self.cursor -= 1;
        }
    }

    pub fn set_cursor(&mut self, index: usize) {
        self.cursor = index.min(self.samples.len());
    }

    pub fn is_finished(&self) -> bool {
        self.cursor >= self.samples.len()
    }

    /// Sample index a timestamp falls into, `floor((t - t0) / step)`.
    /// Negative for times before the first sample. `None` when either
    /// timestamp fails to parse or the timeline is empty.
    pub fn index_for(&self, timestamp: &str) -> Option<i64> {
        if self.time_step_s <= 0.0 {
            return None;
        }
        let epoch0 = self.epoch0?;
        let epoch = parse_epoch(timestamp)?;
        Some(((epoch - epoch0).to_seconds() / self.time_step_s).floor() as i64)
    }
}

/// Parse a timestamp as `hifitime` knows it (ISO 8601 and friends) or as
/// the STK report form `1 Jul 2017 12:00:00.000`.
fn parse_epoch(text: &str) -> Option<Epoch> {
    if let Ok(epoch) = Epoch::from_str(text) {
        return Some(epoch);
    }
    let mut fields = text.split_whitespace();
    let day: u8 = fields.next()?.parse().ok()?;
    let month = month_number(fields.next()?)?;
    let year: i32 = fields.next()?.parse().ok()?;
    let mut clock = fields.next()?.split(':');
    let hour: u8 = clock.next()?.parse().ok()?;
    let minute: u8 = clock.next()?.parse().ok()?;
    let seconds: f64 = clock.next()?.parse().ok()?;
    let whole = seconds.floor();
    let nanos = ((seconds - whole) * 1e9).round() as u32;
    Epoch::maybe_from_gregorian_utc(year, month, day, hour, minute, whole as u8, nanos).ok()
}

fn month_number(name: &str) -> Option<u8> {
    const MONTHS: [&str; 12] = [
        "jan", "feb", "mar", "apr", "may", "jun", "jul", "aug", "sep", "oct",
        "nov", "dec",
    ];
    let lower = name.to_ascii_lowercase();
    MONTHS
        .iter()
        .position(|m| lower.starts_with(m))
        .map(|i| i as u8 + 1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use sunview_core::Scenario;

    fn resolved() -> Resolved {
        Scenario::default().resolve()
    }

    fn write_csv(contents: &str) -> (tempfile::TempDir, std::path::PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("angles.csv");
        std::fs::write(&path, contents).unwrap();
        (dir, path)
    }

    #[test]
    fn test_load_skips_headers_and_blank_lines() {
        let (_dir, path) = write_csv(
            "\"Time (UTCG),Azimuth (deg),Elevation (deg),Eclipse (deg)\n\
             \n\
             1 Jul 2017 12:00:00.000,10.0,20.0,150.0\n\
             1 Jul 2017 12:00:01.000,11.0,21.0,150.0\n",
        );
        let timeline = AttitudeTimeline::load(&path, &resolved());
        assert_eq!(timeline.len(), 2);
        assert_eq!(timeline.samples()[0].timestamp, "1 Jul 2017 12:00:00.000");
        assert!((timeline.samples()[1].azimuth_deg - 11.0).abs() < 1e-6);
    }

    #[test]
    fn test_malformed_row_keeps_prefix() {
        // Row 3 has only three fields: parsing stops, two samples survive.
        let (_dir, path) = write_csv(
            "1 Jul 2017 12:00:00.000,10.0,20.0,150.0\n\
             1 Jul 2017 12:00:01.000,11.0,21.0,150.0\n\
             1 Jul 2017 12:00:02.000,12.0,22.0\n\
             1 Jul 2017 12:00:03.000,13.0,23.0,150.0\n",
        );
        let before = diag::count();
        let timeline = AttitudeTimeline::load(&path, &resolved());
        assert_eq!(timeline.len(), 2);
        assert!(diag::count() > before);
    }

    #[test]
    fn test_extra_field_row_keeps_prefix() {
        // Row 2 has five fields: as fatal as a short row, one sample survives.
        let (_dir, path) = write_csv(
            "1 Jul 2017 12:00:00.000,10.0,20.0,150.0\n\
             1 Jul 2017 12:00:01.000,11.0,21.0,150.0,999.0\n\
             1 Jul 2017 12:00:02.000,12.0,22.0,150.0\n",
        );
        let before = diag::count();
        let timeline = AttitudeTimeline::load(&path, &resolved());
        assert_eq!(timeline.len(), 1);
        assert!(diag::count() > before);
    }

    #[test]
    fn test_unparseable_number_keeps_prefix() {
        let (_dir, path) = write_csv(
            "1 Jul 2017 12:00:00.000,10.0,20.0,150.0\n\
             1 Jul 2017 12:00:01.000,bad,21.0,150.0\n",
        );
        let timeline = AttitudeTimeline::load(&path, &resolved());
        assert_eq!(timeline.len(), 1);
    }

    #[test]
    fn test_missing_file_degrades_to_empty() {
        let before = diag::count();
        let timeline =
            AttitudeTimeline::load(Path::new("/nonexistent/angles.csv"), &resolved());
        assert!(timeline.is_empty());
        assert!(timeline.is_finished());
        assert!(diag::count() > before);
    }

    #[test]
    fn test_eclipse_gate() {
        // 500 km orbit puts the threshold at ~111.99 deg.
        let (_dir, path) = write_csv(
            "1 Jul 2017 12:00:00.000,0.0,0.0,0.0\n\
             1 Jul 2017 12:00:01.000,0.0,0.0,111.0\n\
             1 Jul 2017 12:00:02.000,0.0,0.0,112.5\n\
             1 Jul 2017 12:00:03.000,0.0,0.0,-150.0\n",
        );
        let timeline = AttitudeTimeline::load(&path, &resolved());
        let lit: Vec<f32> = timeline.samples().iter().map(|s| s.illuminated).collect();
        assert_eq!(lit, vec![0.0, 0.0, 1.0, 1.0]);
    }

    #[test]
    fn test_cursor_stays_in_bounds() {
        let samples = vec![
            AttitudeSample {
                timestamp: "t0".into(),
                azimuth_deg: 0.0,
                elevation_deg: 0.0,
                eclipse_deg: 150.0,
                illuminated: 1.0,
            },
            AttitudeSample {
                timestamp: "t1".into(),
                azimuth_deg: 1.0,
                elevation_deg: 0.0,
                eclipse_deg: 150.0,
                illuminated: 1.0,
            },
        ];
        let mut timeline = AttitudeTimeline::from_samples(samples, 1.0);

        timeline.retreat();
        assert_eq!(timeline.cursor(), 0);

        timeline.advance();
        timeline.advance();
        assert_eq!(timeline.cursor(), 2);
        assert!(timeline.is_finished());
        assert!(timeline.current().is_none());

        // advancing past the end stays put
        timeline.advance();
        assert_eq!(timeline.cursor(), 2);

        timeline.retreat();
        assert_eq!(timeline.cursor(), 1);
        assert_eq!(timeline.current().map(|s| s.timestamp.as_str()), Some("t1"));

        timeline.set_cursor(99);
        assert_eq!(timeline.cursor(), 2);
    }

    #[test]
    fn test_index_for_stk_timestamps() {
        let (_dir, path) = write_csv(
            "1 Jul 2017 12:00:00.000,0.0,0.0,150.0\n\
             1 Jul 2017 12:00:10.000,0.0,0.0,150.0\n",
        );
        let mut scenario = Scenario::default();
        scenario.time_step_s = 10.0;
        let timeline = AttitudeTimeline::load(&path, &scenario.resolve());

        assert_eq!(timeline.index_for("1 Jul 2017 12:00:00.000"), Some(0));
        assert_eq!(timeline.index_for("1 Jul 2017 12:00:10.000"), Some(1));
        assert_eq!(timeline.index_for("1 Jul 2017 12:00:35.000"), Some(3));
        assert_eq!(timeline.index_for("1 Jul 2017 11:59:50.000"), Some(-1));
        assert_eq!(timeline.index_for("not a date"), None);
    }

    #[test]
    fn test_parse_epoch_iso_and_stk_agree() {
        let stk = parse_epoch("1 Jul 2017 12:00:00.000").unwrap();
        let iso = parse_epoch("2017-07-01T12:00:00 UTC").unwrap();
        assert!((stk - iso).to_seconds().abs() < 1e-6);
    }
}
