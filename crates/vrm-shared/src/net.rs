/// Derive a MAC address by adding `increment` to `base` as a 48-bit integer.
///
/// Used for the VIF of a non source-NAT public IP on a tagged VLAN, so every
/// extra public interface gets a stable address next to the router's first
/// public NIC.
pub fn mac_on_increase(base: &str, increment: u64) -> Option<String> {
    let octets: Vec<u8> = base
        .split(':')
        .map(|part| u8::from_str_radix(part, 16))
        .collect::<Result<_, _>>()
        .ok()?;
    if octets.len() != 6 {
        return None;
    }

    let value = octets.iter().fold(0u64, |acc, b| (acc << 8) | u64::from(*b));
    let next = value.wrapping_add(increment) & 0xffff_ffff_ffff;
    let bytes = next.to_be_bytes();

    Some(
        bytes[2..]
            .iter()
            .map(|b| format!("{:02x}", b))
            .collect::<Vec<_>>()
            .join(":"),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mac_on_increase() {
        assert_eq!(
            mac_on_increase("06:00:0a:00:00:01", 5),
            Some("06:00:0a:00:00:06".to_string())
        );
        assert_eq!(
            mac_on_increase("06:00:0a:00:00:ff", 1),
            Some("06:00:0a:00:01:00".to_string())
        );
    }

    #[test]
    fn test_mac_on_increase_invalid() {
        assert_eq!(mac_on_increase("not-a-mac", 1), None);
        assert_eq!(mac_on_increase("06:00:0a", 1), None);
    }
}
