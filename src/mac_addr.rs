// mac_addr.rs (sysfs first, mac_address crate as fallback)
use std::fs;
use std::io;

/// Device id used when the configuration asks for "mac"
pub const MAC_DEVICE_ID: &str = "mac";

pub fn get_mac_addr_for(ifname: &str) -> io::Result<String> {
    let p = format!("/sys/class/net/{}/address", ifname);
    let s = fs::read_to_string(p)?;
    Ok(s.trim().to_ascii_lowercase())
}

pub fn get_mac_addr() -> io::Result<String> {
    use mac_address::get_mac_address;
    match get_mac_address() {
        Ok(Some(mac)) => Ok(mac.to_string().to_ascii_lowercase()),
        Ok(None) => Err(io::Error::new(io::ErrorKind::NotFound, "no network interface with a MAC address")),
        Err(e) => Err(io::Error::other(e.to_string())),
    }
}

/// Resolve the configured device id. "mac" is replaced by the interface
/// address without separators, e.g. `b827eb12ab34`.
pub fn resolve_device_id(configured: Option<&str>, ifname: Option<&str>) -> io::Result<Option<String>> {
    match configured.map(str::trim) {
        None | Some("") => Ok(None),
        Some(id) if id.eq_ignore_ascii_case(MAC_DEVICE_ID) => {
            let mac = match ifname {
                Some(name) => get_mac_addr_for(name)?,
                None => get_mac_addr()?,
            };
            Ok(Some(compact(&mac)))
        }
        Some(id) => Ok(Some(id.to_string())),
    }
}

fn compact(mac: &str) -> String {
    mac.chars().filter(|c| c.is_ascii_hexdigit()).collect::<String>().to_ascii_lowercase()
}
