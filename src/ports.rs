use anyhow::{bail, Context, Result};
use std::collections::HashSet;
use std::fs;
use std::path::Path;

/// Ports the Client may listen on, in the order they are tried.
pub const CLIENT_PORTS: &[u16] = &[62485, 65425, 55428, 49452, 35452, 25152, 5152, 1234];

/// Parse a ports file content into a deduplicated list of candidate ports (1..=65535).
///
/// Supported formats per line:
/// - single port number: `62485`
/// - inclusive range: `8000-8010`
/// - comments: everything after `#` is ignored
/// - whitespace and blank lines are ignored
///
/// Order of first appearance is kept since it is the probing order.
pub fn parse_ports_str(s: &str) -> Result<Vec<u16>> {
    let mut out = PortList::default();

    for (idx, raw_line) in s.lines().enumerate() {
        let line_no = idx + 1;
        let line = raw_line.split('#').next().map(str::trim).unwrap_or("");
        if line.is_empty() {
            continue;
        }
        out.push_entry(line)
            .with_context(|| format!("line {line_no}: invalid entry: {line}"))?;
    }

    Ok(out.ports)
}

/// Parse a comma separated list such as `62485,1234,8000-8002`.
pub fn parse_ports_list(s: &str) -> Result<Vec<u16>> {
    let mut out = PortList::default();
    for item in s.split(',').map(str::trim).filter(|i| !i.is_empty()) {
        out.push_entry(item)
            .with_context(|| format!("invalid port entry: {item}"))?;
    }
    if out.ports.is_empty() {
        bail!("port list is empty");
    }
    Ok(out.ports)
}

/// Load a ports list from a file path. Errors if the file cannot be read or parsed.
pub fn load_ports_from_path(path: impl AsRef<Path>) -> Result<Vec<u16>> {
    let content = fs::read_to_string(path.as_ref())
        .with_context(|| format!("failed to read ports file: {}", path.as_ref().display()))?;
    parse_ports_str(&content)
}

/// Load a ports list from a file, or return the default Client ports if missing or empty.
///
/// A file that exists but does not parse also falls back, with a warning.
pub fn load_ports_or_default(path: impl AsRef<Path>) -> Vec<u16> {
    let path = path.as_ref();
    match load_ports_from_path(path) {
        Ok(v) if !v.is_empty() => v,
        Ok(_) => default_ports(),
        Err(e) if path.exists() => {
            tracing::warn!(
                path = %path.display(),
                error = %e,
                "invalid ports file, using default client ports"
            );
            default_ports()
        }
        Err(e) => {
            tracing::debug!(error = %e, "using default client ports");
            default_ports()
        }
    }
}

pub fn default_ports() -> Vec<u16> {
    CLIENT_PORTS.to_vec()
}

/// Drop repeated ports, keeping the first occurrence.
pub fn dedup_ports(ports: impl IntoIterator<Item = u16>) -> Vec<u16> {
    let mut out = PortList::default();
    for p in ports {
        out.push(p);
    }
    out.ports
}

#[derive(Default)]
struct PortList {
    ports: Vec<u16>,
    seen: HashSet<u16>,
}

impl PortList {
    fn push_entry(&mut self, entry: &str) -> Result<()> {
        if let Some((a, b)) = entry.split_once('-') {
            let start = parse_port_str(a.trim())
                .with_context(|| format!("invalid start in range: {a}"))?;
            let end =
                parse_port_str(b.trim()).with_context(|| format!("invalid end in range: {b}"))?;
            if start > end {
                bail!("invalid range {start}-{end} (start > end)");
            }
            for p in start..=end {
                self.push(p);
            }
            return Ok(());
        }
        let p = parse_port_str(entry)?;
        self.push(p);
        Ok(())
    }

    fn push(&mut self, p: u16) {
        if self.seen.insert(p) {
            self.ports.push(p);
        }
    }
}

fn parse_port_str(s: &str) -> Result<u16> {
    let val: u32 = s.parse::<u32>().map_err(|e| anyhow::anyhow!(e))?;
    if val == 0 || val > 65535 {
        bail!("port out of range: {val}");
    }
    Ok(val as u16)
}
