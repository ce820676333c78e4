//! Recorded sensor traces for offline replay.
//!
//! One row per tick. Expected headers:
//! freeze,reset,ch0,ch1,...
//!
//! Channels beyond the last column read as 0.0 during replay.
use keycal_traits::SwitchState;

#[derive(Debug, Clone, PartialEq)]
pub struct TraceRow {
    pub switches: SwitchState,
    pub raw: Vec<f32>,
}

fn parse_bool(s: &str) -> Option<bool> {
    match s.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "on" => Some(true),
        "0" | "false" | "off" | "" => Some(false),
        _ => None,
    }
}

/// Parse a trace from any reader. `max_channels` bounds the channel columns.
pub fn read_trace<R: std::io::Read>(reader: R, max_channels: usize) -> eyre::Result<Vec<TraceRow>> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers = rdr
        .headers()
        .map_err(|e| eyre::eyre!("read trace headers: {e}"))?
        .clone();
    if headers.len() < 2 || &headers[0] != "freeze" || &headers[1] != "reset" {
        eyre::bail!("trace CSV must start with headers 'freeze,reset'");
    }
    let channels = headers.len() - 2;
    if channels > max_channels {
        eyre::bail!("trace has {channels} channel columns, engine supports {max_channels}");
    }
    for (i, h) in headers.iter().skip(2).enumerate() {
        if h != format!("ch{i}") {
            eyre::bail!("trace column {} must be named 'ch{i}', got '{h}'", i + 2);
        }
    }

    let mut rows = Vec::new();
    for (idx, rec) in rdr.records().enumerate() {
        let line = idx + 2;
        let rec = rec.map_err(|e| eyre::eyre!("invalid trace row {line}: {e}"))?;
        let freeze = parse_bool(&rec[0])
            .ok_or_else(|| eyre::eyre!("trace row {line}: bad freeze value '{}'", &rec[0]))?;
        let reset = parse_bool(&rec[1])
            .ok_or_else(|| eyre::eyre!("trace row {line}: bad reset value '{}'", &rec[1]))?;
        let mut raw = Vec::with_capacity(channels);
        for (ch, field) in rec.iter().skip(2).enumerate() {
            let v: f32 = field
                .parse()
                .map_err(|e| eyre::eyre!("trace row {line}, ch{ch}: {e}"))?;
            raw.push(v);
        }
        rows.push(TraceRow {
            switches: SwitchState { freeze, reset },
            raw,
        });
    }
    Ok(rows)
}

pub fn load_trace_csv(path: &std::path::Path, max_channels: usize) -> eyre::Result<Vec<TraceRow>> {
    let file =
        std::fs::File::open(path).map_err(|e| eyre::eyre!("open trace CSV {:?}: {}", path, e))?;
    read_trace(file, max_channels)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_switches_and_channels() {
        let text = "freeze,reset,ch0,ch1\n0,0,100,5\n1,false,900,6\n";
        let rows = read_trace(text.as_bytes(), 4).unwrap();
        assert_eq!(rows.len(), 2);
        assert!(!rows[0].switches.freeze);
        assert!(rows[1].switches.freeze);
        assert_eq!(rows[1].raw, vec![900.0, 6.0]);
    }

    #[test]
    fn rejects_too_many_channels() {
        let text = "freeze,reset,ch0,ch1,ch2\n0,0,1,2,3\n";
        let err = read_trace(text.as_bytes(), 2).unwrap_err();
        assert!(err.to_string().contains("engine supports 2"));
    }

    #[test]
    fn rejects_misnamed_column() {
        let text = "freeze,reset,key0\n0,0,1\n";
        assert!(read_trace(text.as_bytes(), 8).is_err());
    }
}
