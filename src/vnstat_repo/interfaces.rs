// Interface discovery: parse `vnstat --iflist` and rank candidates.

/// Marker preceding the space-separated interface names in `--iflist` output.
pub const IFLIST_MARKER: &str = "Available interfaces:";

/// Loopback, container, bridge and hypervisor interfaces never count as the uplink.
const VIRTUAL_PREFIXES: [&str; 5] = ["lo", "docker", "br-", "veth", "virbr"];

/// Wired and wireless NIC naming schemes, preferred over anything else left.
const PHYSICAL_PREFIXES: [&str; 6] = ["eth", "ens", "enp", "en", "wlan", "wlp"];

/// Interface names listed after the marker, or `None` when the marker is absent.
pub fn parse_iflist(output: &str) -> Option<Vec<String>> {
    let (_, names) = output.split_once(IFLIST_MARKER)?;
    Some(names.split_whitespace().map(str::to_string).collect())
}

pub fn is_virtual(name: &str) -> bool {
    VIRTUAL_PREFIXES.iter().any(|p| name.starts_with(p))
}

pub fn is_physical(name: &str) -> bool {
    PHYSICAL_PREFIXES.iter().any(|p| name.starts_with(p))
}

/// Pick one interface to scope the traffic query to.
///
/// Virtual interfaces are dropped; the first physical-looking name wins, else the
/// first remaining name. `None` means no candidate is left and the query should
/// cover all interfaces.
pub fn choose_interface<S: AsRef<str>>(candidates: &[S]) -> Option<&str> {
    let remaining: Vec<&str> = candidates
        .iter()
        .map(|c| c.as_ref().trim())
        .filter(|c| !c.is_empty() && !is_virtual(c))
        .collect();

    remaining
        .iter()
        .find(|c| is_physical(c))
        .or_else(|| remaining.first())
        .copied()
}
