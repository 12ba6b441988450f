//! Inline hex annotation for displayed lines: ICAO registration country,
//! downlink format names, ADS-B type codes. Pure formatting, consumed only
//! when decode mode is on.

use regex::Regex;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IcaoInfo {
    pub country: &'static str,
    pub military: bool,
}

/// Registration country by ICAO address prefix. Coarse single-nibble
/// blocks, refined by a few well-known two-character ranges.
pub fn icao_info(icao: &str) -> Option<IcaoInfo> {
    let hex = icao.trim().trim_start_matches("0x").to_ascii_lowercase();
    let first = hex.chars().next()?;

    let mut country = match first {
        'a' => "USA",
        'c' => "Canada",
        '4' => "Mexico",
        'e' => "Venezuela/Argentina",
        '0' => "Various",
        '7' => "Australia",
        '8' => "Japan/Korea",
        '3' => "France/Italy/Spain",
        '2' => "Various EU",
        _ => return None,
    };

    for (prefix, refined) in [
        ("7c", "Australia"),
        ("c0", "Canada"),
        ("a0", "USA"),
        ("4b", "Switzerland"),
        ("40", "UK"),
        ("3c", "Germany"),
        ("38", "France"),
        ("48", "Netherlands"),
    ] {
        if hex.starts_with(prefix) {
            country = refined;
        }
    }

    Some(IcaoInfo {
        country,
        military: hex.starts_with("adf"),
    })
}

/// Downlink format name, already shortened for inline display.
pub fn df_name(code: u32) -> Option<&'static str> {
    Some(match code {
        0 => "Short ACAS",
        4 => "Surv. altitude reply",
        5 => "Surv. identity reply",
        11 => "All-call",
        16 => "Long air-air surveillance (ACAS)",
        17 | 18 => "ADS-B",
        19 => "Military extended squitter",
        20 => "Comm-B altitude reply",
        21 => "Comm-B identity reply",
        24 => "Comm-D (ELM)",
        1..=31 => "Reserved",
        _ => return None,
    })
}

/// ADS-B type code name (DF17/18 extended squitter payloads).
pub fn typecode_name(code: u32) -> Option<&'static str> {
    Some(match code {
        0 => "No position information",
        1..=4 => "Aircraft identification (callsign)",
        5..=8 => "Surface position",
        9..=18 => "Airborne position (w/ Baro Alt)",
        19 => "Airborne velocity",
        20..=22 => "Airborne position (w/ GNSS Alt)",
        23 => "Test message",
        24 => "Surface system status",
        28 => "Extended squitter AC status",
        29 => "Target state and status",
        31 => "Aircraft operation status",
        25..=27 | 30 => "Reserved",
        _ => return None,
    })
}

pub struct Annotator {
    icao: Regex,
    typecode: Regex,
    df: Regex,
}

impl Default for Annotator {
    fn default() -> Self {
        Self::new()
    }
}

impl Annotator {
    pub fn new() -> Self {
        Self {
            icao: Regex::new(r"(?i)icao[=:]\s*0x([a-f0-9]{6})").expect("valid regex"),
            typecode: Regex::new(r"(?i)typecode\s+(\d+)").expect("valid regex"),
            df: Regex::new(r"(?i)df[=:]?(\d{1,2})\b").expect("valid regex"),
        }
    }

    /// Append bracketed decodes after each recognized hex field. Unknown
    /// values leave the line untouched.
    pub fn annotate(&self, line: &str) -> String {
        // (insert position in the original line, text to insert)
        let mut inserts: Vec<(usize, String)> = Vec::new();

        for capture in self.icao.captures_iter(line) {
            if let Some(info) = icao_info(&capture[1]) {
                let mut decoded = format!(" [{}", info.country);
                if info.military {
                    decoded.push_str(" MIL");
                }
                decoded.push(']');
                if let Some(m) = capture.get(0) {
                    inserts.push((m.end(), decoded));
                }
            }
        }

        for capture in self.typecode.captures_iter(line) {
            if let Some(name) = capture[1].parse::<u32>().ok().and_then(typecode_name) {
                if let Some(m) = capture.get(0) {
                    inserts.push((m.end(), format!(" [{name}]")));
                }
            }
        }

        for capture in self.df.captures_iter(line) {
            if let Some(name) = capture[1].parse::<u32>().ok().and_then(df_name) {
                if let Some(m) = capture.get(0) {
                    inserts.push((m.end(), format!(" [{name}]")));
                }
            }
        }

        if inserts.is_empty() {
            return line.to_string();
        }

        // Apply back to front so earlier offsets stay valid.
        inserts.sort_by_key(|(pos, _)| *pos);
        let mut out = line.to_string();
        for (pos, text) in inserts.into_iter().rev() {
            out.insert_str(pos, &text);
        }
        out
    }
}
