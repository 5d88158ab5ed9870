/*!
 * Capture Name Grammar
 *
 * Parses raw fragment and metadata filenames into a [`CaptureDescriptor`].
 * Total, side-effect-free: a name that matches neither grammar simply
 * yields `None` and the caller must not treat that as an error — it is
 * merely a file that doesn't contribute to capture completion tracking.
 */

use once_cell::sync::Lazy;
use regex::Regex;

/// Producer-side quality flag carried in raw/metadata filenames.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataType {
    /// `Lvl00` — verified.
    Lvl00,
    /// `Lvl0X` — unverified.
    Lvl0X,
    /// `EAD` — control-unit metadata.
    Ead,
}

impl DataType {
    fn is_verified(self) -> bool {
        matches!(self, DataType::Lvl00 | DataType::Ead)
    }
}

/// Parsed identity of one capture-contributing file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureDescriptor {
    pub data_type: DataType,
    /// Fixed-width decimal identity of the capture, e.g. "00001".
    pub capture_number: String,
    /// True iff the name carries the `T-` marker (raw files only).
    pub is_test: bool,
    pub project_name: String,
    /// `DD-DD` form; present on raw descriptors only.
    pub sensor_code: Option<String>,
    /// Uppercase hex groups separated by `_`.
    pub session_id: String,
}

impl CaptureDescriptor {
    pub fn is_verified(&self) -> bool {
        self.data_type.is_verified()
    }
}

// Raw: `Lvl\d{2}X?-\d+(-T)?-<project>-DD-DD-<SESSION>.raw`
// The project name is everything between the optional `T-` marker and the
// sensor-code group; it is matched non-greedily because it may itself
// contain hyphens and the sensor-code/session groups anchor the match
// from the right.
static RAW_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?x)
        ^(Lvl\d{2}X?)       # data type
        -(\d+)              # capture number
        (?:-(T))?           # optional test marker
        -(.+)               # project name (non-greedy handled via anchors below)
        -(\d+-\d+)          # sensor code DD-DD
        -([A-F0-9_]+)       # session id
        \.raw$
        ",
    )
    .expect("raw capture grammar is a valid regex")
});

static METADATA_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?x)
        ^EAD
        -(\d+)              # capture number
        -([^-]+)            # project name
        -([A-F0-9_]+)       # session id
        \.xml$
        ",
    )
    .expect("metadata capture grammar is a valid regex")
});

/// Parse a filename into a [`CaptureDescriptor`], or `None` if it matches
/// neither the raw nor the metadata grammar. Matching is case-sensitive.
pub fn parse(filename: &str) -> Option<CaptureDescriptor> {
    parse_raw(filename).or_else(|| parse_metadata(filename))
}

fn parse_raw(filename: &str) -> Option<CaptureDescriptor> {
    let caps = RAW_RE.captures(filename)?;

    let data_type = match &caps[1] {
        "Lvl00" => DataType::Lvl00,
        "Lvl0X" => DataType::Lvl0X,
        _ => return None,
    };

    let capture_number = caps[2].to_string();
    let is_test = caps.get(3).is_some();
    let project_name = caps[4].to_string();
    let sensor_code = Some(caps[5].to_string());
    let session_id = caps[6].to_string();

    Some(CaptureDescriptor {
        data_type,
        capture_number,
        is_test,
        project_name,
        sensor_code,
        session_id,
    })
}

fn parse_metadata(filename: &str) -> Option<CaptureDescriptor> {
    let caps = METADATA_RE.captures(filename)?;

    Some(CaptureDescriptor {
        data_type: DataType::Ead,
        capture_number: caps[1].to_string(),
        is_test: false,
        project_name: caps[2].to_string(),
        sensor_code: None,
        session_id: caps[3].to_string(),
    })
}
