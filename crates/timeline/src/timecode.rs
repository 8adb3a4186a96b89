/// Clock-style timecode for the editor cursor and clip positions (MM:SS.t)
use crate::Seconds;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timecode {
    pub minutes: u32,
    pub seconds: u32,
    pub tenths: u32,
}

impl Timecode {
    /// Negative and non-finite inputs render as zero.
    pub fn from_seconds(value: Seconds) -> Self {
        let value = if value.is_finite() { value.max(0.0) } else { 0.0 };
        let total_tenths = (value * 10.0).round() as u64;
        Self {
            minutes: (total_tenths / 600) as u32,
            seconds: ((total_tenths / 10) % 60) as u32,
            tenths: (total_tenths % 10) as u32,
        }
    }

    pub fn to_seconds(&self) -> Seconds {
        self.minutes as f64 * 60.0 + self.seconds as f64 + self.tenths as f64 / 10.0
    }

    /// Accepts `SS`, `SS.t`, `MM:SS` and `MM:SS.t`.
    pub fn parse(s: &str) -> Result<Self, String> {
        let s = s.trim();
        if s.is_empty() {
            return Err("empty timecode".to_string());
        }
        let (minutes, rest) = match s.split_once(':') {
            Some((m, rest)) => {
                let minutes = m
                    .parse::<u32>()
                    .map_err(|_| format!("invalid minutes in '{s}'"))?;
                (minutes, rest)
            }
            None => (0, s),
        };
        let secs: f64 = rest
            .parse()
            .map_err(|_| format!("invalid seconds in '{s}'"))?;
        if !(0.0..f64::MAX).contains(&secs) {
            return Err(format!("invalid seconds in '{s}'"));
        }
        if s.contains(':') && secs >= 60.0 {
            return Err(format!("seconds out of range in '{s}'"));
        }
        Ok(Self::from_seconds(minutes as f64 * 60.0 + secs))
    }
}

impl fmt::Display for Timecode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}.{}", self.minutes, self.seconds, self.tenths)
    }
}
