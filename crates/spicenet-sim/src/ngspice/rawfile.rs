//! Reader for the rawfiles ngspice writes with `-r`.
//!
//! A rawfile is a sequence of plots. Each plot opens with `Key: value`
//! header lines and a tab-indented variable list, closed by `Values:`
//! (ASCII data follows) or `Binary:` (little-endian doubles follow,
//! point-major, real and imaginary parts interleaved for complex plots).

use std::borrow::Cow;
use std::mem;

use crate::error::{Error, Result};
use crate::ngspice::types::{RawVariable, RawfileData, RawfileHeader};

/// Read the first plot of a rawfile.
pub fn parse_rawfile(data: &[u8]) -> Result<RawfileData> {
    PlotReader::new(data)
        .next()
        .unwrap_or_else(|| Err(malformed("rawfile holds no plot")))
}

/// Read every plot of a rawfile in file order.
pub fn parse_rawfile_plots(data: &[u8]) -> Result<Vec<RawfileData>> {
    PlotReader::new(data).collect()
}

fn malformed(message: impl Into<String>) -> Error {
    Error::RawfileParseError(message.into())
}

fn count(value: &str, what: &str) -> Result<usize> {
    value
        .parse()
        .map_err(|_| malformed(format!("invalid {}: {}", what, value)))
}

/// Rows read for one plot; `imag` stays empty for real plots.
#[derive(Default)]
struct Points {
    real: Vec<Vec<f64>>,
    imag: Vec<Vec<f64>>,
}

/// Walks a rawfile plot by plot.
struct PlotReader<'a> {
    data: &'a [u8],
    pos: usize,
    failed: bool,
}

impl<'a> PlotReader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            pos: 0,
            failed: false,
        }
    }

    /// Next text line without its terminator.
    fn line(&mut self) -> Option<Cow<'a, str>> {
        let data = self.data;
        let rest = data.get(self.pos..).filter(|r| !r.is_empty())?;
        let len = rest.iter().position(|&b| b == b'\n').unwrap_or(rest.len());
        self.pos += (len + 1).min(rest.len());
        let line = &rest[..len];
        Some(String::from_utf8_lossy(line.strip_suffix(b"\r").unwrap_or(line)))
    }

    fn peek_line(&mut self) -> Option<Cow<'a, str>> {
        let pos = self.pos;
        let line = self.line();
        self.pos = pos;
        line
    }

    fn plot(&mut self) -> Result<Option<RawfileData>> {
        let Some(header) = self.header()? else {
            return Ok(None);
        };
        let points = if header.is_binary {
            self.binary(&header)
        } else {
            self.ascii(&header)?
        };

        if points.real.len() < header.num_points {
            log::warn!(
                "plot '{}' declares {} points but holds {}",
                header.plotname,
                header.num_points,
                points.real.len()
            );
        }
        let imag_data = header.is_complex.then_some(points.imag);
        Ok(Some(RawfileData {
            header,
            real_data: points.real,
            imag_data,
        }))
    }

    /// Header lines up to the data marker, `None` at the end of the file.
    fn header(&mut self) -> Result<Option<RawfileHeader>> {
        let mut header = RawfileHeader::default();
        let mut started = false;
        let mut in_variables = false;

        while let Some(line) = self.line() {
            if line.trim().is_empty() {
                continue;
            }
            started = true;
            if in_variables && line.starts_with(char::is_whitespace) {
                header.variables.push(variable(&line)?);
                continue;
            }
            in_variables = false;

            let Some((key, value)) = line.split_once(':') else {
                return Err(malformed(format!("unexpected header line '{}'", line.trim())));
            };
            let value = value.trim();
            match key.trim() {
                "Title" => header.title = value.to_string(),
                "Plotname" => header.plotname = value.to_string(),
                "Flags" => {
                    header.is_complex = value.to_lowercase().contains("complex");
                    header.flags = value.to_string();
                }
                "No. Variables" => header.num_variables = count(value, "No. Variables")?,
                "No. Points" => header.num_points = count(value, "No. Points")?,
                "Variables" => in_variables = true,
                marker @ ("Values" | "Binary") => {
                    header.is_binary = marker == "Binary";
                    return checked(header).map(Some);
                }
                // Date, Command, Option and other informational lines.
                _ => {}
            }
        }

        if started {
            Err(malformed("Values: or Binary: marker not found"))
        } else {
            Ok(None)
        }
    }

    /// Binary data: as many whole points as the file holds, at most the
    /// declared count.
    fn binary(&mut self, header: &RawfileHeader) -> Points {
        let width = if header.is_complex { 16 } else { 8 };
        let point_len = header.num_variables * width;
        let data = self.data;
        let rest = &data[self.pos.min(data.len())..];
        let available = rest.len() / point_len;
        let taken = header.num_points.min(available);

        // A short section is the end of the file.
        self.pos = if taken < header.num_points {
            data.len()
        } else {
            self.pos + taken * point_len
        };

        let mut points = Points {
            real: Vec::with_capacity(taken),
            imag: Vec::new(),
        };
        for chunk in rest.chunks_exact(point_len).take(taken) {
            let values: Vec<f64> = chunk.chunks_exact(8).map(read_f64_le).collect();
            if header.is_complex {
                points.real.push(values.iter().step_by(2).copied().collect());
                points.imag.push(values.iter().skip(1).step_by(2).copied().collect());
            } else {
                points.real.push(values);
            }
        }
        points
    }

    /// ASCII data: each point is its index and first value on one line,
    /// then one line per remaining variable.
    fn ascii(&mut self, header: &RawfileHeader) -> Result<Points> {
        let mut points = Points::default();
        let mut real = Vec::new();
        let mut imag = Vec::new();

        while points.real.len() < header.num_points {
            let Some(line) = self.peek_line() else {
                break;
            };
            let text = line.trim();
            if starts_plot(text) {
                break;
            }
            self.line();
            if text.is_empty() {
                continue;
            }

            let value = if real.is_empty() {
                match text.split_once(char::is_whitespace) {
                    Some((_, value)) => value.trim(),
                    None => return Err(malformed(format!("point '{}' has no value", text))),
                }
            } else {
                text
            };
            let (re, im) = parse_complex_value(value)
                .ok_or_else(|| malformed(format!("invalid value '{}'", value)))?;
            real.push(re);
            imag.push(im);

            if real.len() == header.num_variables {
                points.real.push(mem::take(&mut real));
                let point_imag = mem::take(&mut imag);
                if header.is_complex {
                    points.imag.push(point_imag);
                }
            }
        }
        Ok(points)
    }
}

impl Iterator for PlotReader<'_> {
    type Item = Result<RawfileData>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        let plot = self.plot().transpose();
        self.failed = matches!(plot, Some(Err(_)));
        plot
    }
}

/// `index name type [attributes]`
fn variable(line: &str) -> Result<RawVariable> {
    let mut parts = line.split_whitespace();
    match (parts.next(), parts.next(), parts.next()) {
        (Some(index), Some(name), Some(var_type)) => Ok(RawVariable {
            index: count(index, "variable index")?,
            name: name.to_string(),
            var_type: var_type.to_string(),
        }),
        _ => Err(malformed(format!("bad variable line '{}'", line.trim()))),
    }
}

fn checked(header: RawfileHeader) -> Result<RawfileHeader> {
    if header.num_variables == 0 {
        return Err(malformed(format!("plot '{}' has no variables", header.plotname)));
    }
    if header.variables.len() != header.num_variables {
        return Err(malformed(format!(
            "header declares {} variables but lists {}",
            header.num_variables,
            header.variables.len()
        )));
    }
    if let Some(var) = header
        .variables
        .iter()
        .find(|v| v.index >= header.num_variables)
    {
        return Err(malformed(format!(
            "variable {} has index {} out of range",
            var.name, var.index
        )));
    }
    Ok(header)
}

/// Header lines start with a word and a colon; data lines never do.
fn starts_plot(text: &str) -> bool {
    text.starts_with(char::is_alphabetic) && text.contains(':')
}

/// `re` or `re,im`.
fn parse_complex_value(s: &str) -> Option<(f64, f64)> {
    match s.split_once(',') {
        Some((re, im)) => Some((re.trim().parse().ok()?, im.trim().parse().ok()?)),
        None => Some((s.trim().parse().ok()?, 0.0)),
    }
}

fn read_f64_le(bytes: &[u8]) -> f64 {
    let mut buf = [0u8; 8];
    buf.copy_from_slice(bytes);
    f64::from_le_bytes(buf)
}
