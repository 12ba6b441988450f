//! Tab-completion candidates, ranked, capped at ten. Pure function of the
//! input buffer plus the console state it completes against.

use crate::state::{CommandHistory, SUGGESTION_LIMIT};

/// Filter patterns worth typing often, offered after `/f `.
const COMMON_PATTERNS: [&str; 13] = [
    "MQTT",
    "mqtt",
    "Feed",
    "feed",
    "ERROR",
    "WARNING",
    "INFO",
    "Failed",
    "Skipped",
    "duplicate",
    "decode",
    "Aircraft",
    "protocol",
];

/// Device command templates, most useful first.
const AT_COMMANDS: [&str; 12] = [
    "AT+FEED?",
    "AT+FEEDPROTOCOL?",
    "AT+LOG_LEVEL=INFO",
    "AT+NETWORK_INFO?",
    "AT+SETTINGS?",
    "AT+FEEDEN?",
    "AT+FEEDPROTOCOL=0,MQTT",
    "AT+FEED=0,mqtt://broker.hivemq.com,1883,1,MQTT",
    "AT+MQTTFMT=0,JSON",
    "AT+MQTTFMT=0,BINARY",
    "AT+SETTINGS=SAVE",
    "AT+REBOOT",
];

const LOCAL_COMMAND_STEMS: [&str; 4] = ["/f ", "/rf ", "/lf", "/cf"];

pub fn suggestions(
    input: &str,
    filters: &[String],
    recent_icaos: &[String],
    history: &CommandHistory,
) -> Vec<String> {
    let mut out = Vec::new();

    if let Some(rest) = input.strip_prefix("/rf ") {
        let prefix = rest.trim().to_lowercase();
        for filter in filters {
            if prefix.is_empty() || filter.to_lowercase().starts_with(&prefix) {
                out.push(format!("/rf {filter}"));
            }
        }
    } else if let Some(rest) = input.strip_prefix("/f ") {
        let prefix = rest.trim().to_lowercase();
        for pattern in COMMON_PATTERNS {
            if prefix.is_empty() || pattern.to_lowercase().starts_with(&prefix) {
                out.push(format!("/f {pattern}"));
            }
        }
        for icao in recent_icaos {
            if prefix.is_empty() || icao.starts_with(&prefix) {
                out.push(format!("/f icao=0x{icao}"));
            }
        }
    } else if input.to_uppercase().starts_with("AT") {
        let upper = input.to_uppercase();
        for command in AT_COMMANDS {
            if command.starts_with(&upper) {
                out.push(command.to_string());
            }
        }
        // Parameterized templates expand to numbered feed/format slots.
        if upper.starts_with("AT+FEED") {
            if upper.contains("PROTOCOL") {
                for slot in 0..10 {
                    out.push(format!("AT+FEEDPROTOCOL={slot},MQTT"));
                    out.push(format!("AT+FEEDPROTOCOL?{slot}"));
                }
            } else {
                for slot in 0..10 {
                    out.push(format!("AT+FEED?{slot}"));
                    out.push(format!("AT+FEEDEN={slot},1"));
                    out.push(format!("AT+FEED={slot},mqtt://broker.hivemq.com,1883,1,MQTT"));
                }
            }
        } else if upper.starts_with("AT+MQTT") {
            for slot in 0..10 {
                out.push(format!("AT+MQTTFMT?{slot}"));
                out.push(format!("AT+MQTTFMT={slot},JSON"));
                out.push(format!("AT+MQTTFMT={slot},BINARY"));
            }
        }
    } else if input.starts_with('/') {
        for stem in LOCAL_COMMAND_STEMS {
            if stem.starts_with(input) {
                out.push(stem.to_string());
            }
        }
    } else if input.is_empty() {
        for stem in LOCAL_COMMAND_STEMS {
            out.push(stem.to_string());
        }
        out.push("AT+".to_string());
        for command in &AT_COMMANDS[..3] {
            out.push(command.to_string());
        }
    } else {
        for entry in history.iter() {
            if entry.starts_with(input) && entry != input {
                out.push(entry.clone());
            }
        }
    }

    out.truncate(SUGGESTION_LIMIT);
    out
}
