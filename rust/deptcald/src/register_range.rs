use std::fmt;
use std::str::FromStr;

/// Register numbers are fixed-width, zero-padded digit strings.
pub const REGISTER_NO_LEN: usize = 9;

pub fn is_valid_register_no(s: &str) -> bool {
    s.len() == REGISTER_NO_LEN && s.bytes().all(|b| b.is_ascii_digit())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RangeError {
    pub part: String,
    pub reason: &'static str,
}

impl fmt::Display for RangeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid register range part {:?}: {}", self.part, self.reason)
    }
}

impl std::error::Error for RangeError {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RangePart {
    Span { start: String, end: String },
    Single(String),
}

impl RangePart {
    fn bounds(&self) -> (&str, &str) {
        match self {
            RangePart::Span { start, end } => (start, end),
            RangePart::Single(v) => (v, v),
        }
    }

    /// Equal widths make string order the same as numeric order, so a register
    /// number of any other width is never contained.
    pub fn contains(&self, register_no: &str) -> bool {
        let (lo, hi) = self.bounds();
        register_no.len() == lo.len() && lo <= register_no && register_no <= hi
    }
}

/// Parsed `registerRange` of an exam room: `230601001-230601030`,
/// `230601001,230601005`, `230601001-230601010, 230601020`, ...
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisterRange {
    parts: Vec<RangePart>,
}

fn check_endpoint(part: &str, v: &str) -> Result<(), RangeError> {
    if v.is_empty() {
        return Err(RangeError {
            part: part.to_string(),
            reason: "empty endpoint",
        });
    }
    if !v.bytes().all(|b| b.is_ascii_digit()) {
        return Err(RangeError {
            part: part.to_string(),
            reason: "endpoints must be digits",
        });
    }
    Ok(())
}

impl RegisterRange {
    pub fn parse(text: &str) -> Result<Self, RangeError> {
        let mut parts = Vec::new();
        for raw in text.split(',') {
            let part = raw.trim();
            if part.is_empty() {
                return Err(RangeError {
                    part: raw.to_string(),
                    reason: "empty part",
                });
            }
            match part.split_once('-') {
                Some((start, end)) => {
                    let (start, end) = (start.trim(), end.trim());
                    check_endpoint(part, start)?;
                    check_endpoint(part, end)?;
                    if start.len() != end.len() {
                        return Err(RangeError {
                            part: part.to_string(),
                            reason: "endpoints differ in width",
                        });
                    }
                    if start > end {
                        return Err(RangeError {
                            part: part.to_string(),
                            reason: "start is after end",
                        });
                    }
                    parts.push(RangePart::Span {
                        start: start.to_string(),
                        end: end.to_string(),
                    });
                }
                None => {
                    check_endpoint(part, part)?;
                    parts.push(RangePart::Single(part.to_string()));
                }
            }
        }
        Ok(Self { parts })
    }

    pub fn contains(&self, register_no: &str) -> bool {
        let register_no = register_no.trim();
        self.parts.iter().any(|p| p.contains(register_no))
    }

    /// True when some register number falls in both ranges.
    pub fn overlaps(&self, other: &RegisterRange) -> bool {
        self.parts.iter().any(|a| {
            let (a_lo, a_hi) = a.bounds();
            other.parts.iter().any(|b| {
                let (b_lo, b_hi) = b.bounds();
                a_lo.len() == b_lo.len() && a_lo <= b_hi && b_lo <= a_hi
            })
        })
    }
}

impl FromStr for RegisterRange {
    type Err = RangeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for RegisterRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, p) in self.parts.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            match p {
                RangePart::Span { start, end } => write!(f, "{start}-{end}")?,
                RangePart::Single(v) => f.write_str(v)?,
            }
        }
        Ok(())
    }
}

/// Lenient membership used by the room lookups: a malformed range matches nobody.
pub fn is_in_register_range(register_no: &str, text: &str) -> bool {
    RegisterRange::parse(text)
        .map(|r| r.contains(register_no))
        .unwrap_or(false)
}
