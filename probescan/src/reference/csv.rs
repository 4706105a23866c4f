//! CSV reading and writing for reference clouds.
//!
//! The accepted layout is a header naming the three coordinate columns
//! followed by one point per row:
//!
//! ```text
//! x_mm,y_mm,z_mm
//! 0.000,500.000,0.000
//! 0.000,499.901,9.948
//! ```
//!
//! The short aliases `x,y,z` are accepted as well. Columns are located by
//! name, so their order does not matter and extra columns are ignored.

use std::fs;
use std::io::Write;
use std::path::Path;

use super::error::{ReferenceError, ReferenceResult};
use super::ReferencePoint;

/// Column names written by [`write_points`].
pub const CANONICAL_COLUMNS: [&str; 3] = ["x_mm", "y_mm", "z_mm"];

/// Short column names accepted on input.
pub const ALIAS_COLUMNS: [&str; 3] = ["x", "y", "z"];

/// Reads points from a CSV file.
pub fn read_points(path: &Path) -> ReferenceResult<Vec<ReferencePoint>> {
    let is_csv = path
        .extension()
        .map(|ext| ext.eq_ignore_ascii_case("csv"))
        .unwrap_or(false);
    if !is_csv {
        return Err(ReferenceError::UnsupportedFormat(path.to_path_buf()));
    }

    let contents = fs::read_to_string(path).map_err(|source| ReferenceError::ReadFailed {
        path: path.to_path_buf(),
        source,
    })?;

    parse_points(&contents)
}

/// Parses points from CSV text.
pub fn parse_points(contents: &str) -> ReferenceResult<Vec<ReferencePoint>> {
    let mut lines = contents
        .lines()
        .enumerate()
        .map(|(i, line)| (i + 1, line.trim()))
        .filter(|(_, line)| !line.is_empty());

    let (_, header) = lines.next().ok_or(ReferenceError::Empty)?;
    let columns = locate_columns(header)?;
    let width = columns.iter().copied().max().unwrap_or(0) + 1;

    let mut points = Vec::new();
    for (line_no, line) in lines {
        let fields: Vec<&str> = line.split(',').map(str::trim).collect();
        if fields.len() < width {
            return Err(ReferenceError::InvalidRow {
                line: line_no,
                reason: format!("expected at least {} fields, found {}", width, fields.len()),
            });
        }

        let mut coords = [0.0_f64; 3];
        for (slot, &column) in coords.iter_mut().zip(columns.iter()) {
            let raw = fields[column];
            *slot = raw.parse().map_err(|_| ReferenceError::InvalidRow {
                line: line_no,
                reason: format!("'{}' is not a number", raw),
            })?;
        }

        points.push(ReferencePoint::new(coords[0], coords[1], coords[2]));
    }

    Ok(points)
}

/// Writes points to a CSV file using the canonical header.
pub fn write_points(path: &Path, points: &[ReferencePoint]) -> ReferenceResult<()> {
    let write_failed = |source| ReferenceError::WriteFailed {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(write_failed)?;
    }

    let mut out = String::with_capacity(points.len() * 28 + 16);
    out.push_str(&CANONICAL_COLUMNS.join(","));
    out.push('\n');
    for point in points {
        out.push_str(&format!("{:.3},{:.3},{:.3}\n", point.x, point.y, point.z));
    }

    let mut file = fs::File::create(path).map_err(write_failed)?;
    file.write_all(out.as_bytes()).map_err(write_failed)?;
    Ok(())
}

/// Finds the x/y/z column positions in a header line.
fn locate_columns(header: &str) -> ReferenceResult<[usize; 3]> {
    let names: Vec<String> = header
        .split(',')
        .map(|name| name.trim().trim_start_matches('\u{feff}').to_lowercase())
        .collect();

    let find = |wanted: &[&str; 3]| -> Option<[usize; 3]> {
        let mut found = [0usize; 3];
        for (slot, want) in found.iter_mut().zip(wanted.iter()) {
            *slot = names.iter().position(|name| name == want)?;
        }
        Some(found)
    };

    find(&CANONICAL_COLUMNS)
        .or_else(|| find(&ALIAS_COLUMNS))
        .ok_or_else(|| ReferenceError::MissingColumns {
            found: names.join(","),
        })
}
