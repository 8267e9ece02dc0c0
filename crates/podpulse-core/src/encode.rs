//! Prometheus text exposition format (version 0.0.4).

use std::fmt::Write;

use crate::metric::MetricFamily;

/// Content type of the rendered document.
pub const CONTENT_TYPE: &str = "text/plain; version=0.0.4";

/// A fully rendered scrape.
#[derive(Debug, Clone)]
pub struct Exposition {
    pub body: String,
    pub content_type: &'static str,
}

/// Helper to escape label values.
fn escape_label(v: &str) -> String {
    v.replace('\\', "\\\\").replace('"', "\\\"").replace('\n', "\\n")
}

fn escape_help(v: &str) -> String {
    v.replace('\\', "\\\\").replace('\n', "\\n")
}

/// Shortest decimal form for finite values; `NaN`, `+Inf`, `-Inf` otherwise.
pub fn format_value(v: f64) -> String {
    if v.is_nan() {
        "NaN".to_string()
    } else if v == f64::INFINITY {
        "+Inf".to_string()
    } else if v == f64::NEG_INFINITY {
        "-Inf".to_string()
    } else if v.fract() == 0.0 && v.abs() < 1e15 {
        // integral: no trailing ".0"
        v.to_string()
    } else {
        // shortest round-trip form, exponent for very large or small values
        format!("{:?}", v)
    }
}

/// Append every family to `out`, in the given order.
pub fn encode(families: &[MetricFamily], out: &mut String) -> std::fmt::Result {
    for f in families {
        writeln!(out, "# HELP {} {}", f.name, escape_help(&f.help))?;
        writeln!(out, "# TYPE {} {}", f.name, f.kind)?;
        for s in &f.samples {
            out.push_str(&f.name);
            out.push_str(s.suffix);
            if !s.labels.is_empty() {
                let label_str = s.labels.iter()
                    .map(|(k, v)| format!("{}=\"{}\"", k, escape_label(v)))
                    .collect::<Vec<_>>().join(",");
                write!(out, "{{{}}}", label_str)?;
            }
            write!(out, " {}", format_value(s.value))?;
            if let Some(ts) = s.timestamp_ms {
                write!(out, " {}", ts)?;
            }
            out.push('\n');
        }
    }
    Ok(())
}
