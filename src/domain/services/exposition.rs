//! Exposition Renderer
//!
//! Serializes a metric's measurements into the pull-based text
//! exposition format. Pure domain logic, no I/O.

use crate::domain::entities::Measurement;
use crate::domain::value_objects::NULL_SENTINEL;
use std::fmt::Write;

/// Label appended to every series, naming the source database.
pub const DATABASE_LABEL: &str = "database";

/// Renderer for the text exposition format.
///
/// Output for one metric:
/// ```text
/// # TYPE <name> gauge
/// <name>{<k1>="<v1>",...,database="<db>"} <value>
/// ```
/// Labels come out in the order the measurement carries them, followed by
/// `database`. Label values are escaped, a NULL label is written as `\N`.
/// Values are written verbatim.
pub struct Exposition;

impl Exposition {
    /// Render one metric block.
    pub fn render_metric(name: &str, measurements: &[Measurement], database: &str) -> String {
        let mut out = String::new();
        Self::write_metric(&mut out, name, measurements, database);
        out
    }

    /// Append one metric block to `out`.
    pub fn write_metric(out: &mut String, name: &str, measurements: &[Measurement], database: &str) {
        // Writing to a String cannot fail
        let _ = writeln!(out, "# TYPE {} gauge", name);
        for m in measurements {
            out.push_str(name);
            out.push('{');
            for (label, value) in m.labels.cells() {
                out.push_str(label);
                out.push_str("=\"");
                match value {
                    Some(v) => push_escaped(out, v),
                    None => out.push_str(NULL_SENTINEL),
                }
                out.push_str("\",");
            }
            out.push_str(DATABASE_LABEL);
            out.push_str("=\"");
            push_escaped(out, database);
            out.push_str("\"} ");
            out.push_str(&m.value);
            out.push('\n');
        }
    }
}

/// Escape backslashes, quotes and newlines. NULL labels are written
/// unescaped by the caller so the sentinel stays `\N`.
fn push_escaped(out: &mut String, value: &str) {
    for c in value.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            c => out.push(c),
        }
    }
}
