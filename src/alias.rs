//! MAC address aliasing for RuuviTag devices.
//!
//! This module provides functionality to map MAC addresses to human-readable names,
//! making it easier to identify individual RuuviTag sensors in output.

use crate::mac_address::MacAddress;
use std::collections::BTreeMap;

/// A type alias for MAC-to-name mappings.
pub type AliasMap = BTreeMap<MacAddress, String>;

/// A parsed alias mapping a MAC address to a human-readable name.
#[derive(Debug, Clone, PartialEq)]
pub struct Alias {
    /// The MAC address (e.g., "AA:BB:CC:DD:EE:FF")
    pub address: MacAddress,
    /// The human-readable name (e.g., "Sauna")
    pub name: String,
}

/// Parse an alias from a string in the format "MAC=NAME".
///
/// The address may be written with or without colons, in either case.
///
/// # Arguments
/// * `src` - A string in the format "AA:BB:CC:DD:EE:FF=Name"
///
/// # Returns
/// A Result containing the parsed Alias or an error message.
///
/// # Example
/// ```
/// use ruuvi_gateway::alias::parse_alias;
///
/// let alias = parse_alias("aa:bb:cc:dd:ee:ff=Kitchen").unwrap();
/// assert_eq!(alias.address.to_string(), "AA:BB:CC:DD:EE:FF");
/// assert_eq!(alias.name, "Kitchen");
/// ```
pub fn parse_alias(src: &str) -> Result<Alias, String> {
    let (address, name) = src
        .split_once('=')
        .ok_or_else(|| "invalid alias: expected format MAC=NAME".to_string())?;
    let address = address
        .parse::<MacAddress>()
        .map_err(|e| format!("invalid alias address {address:?}: {e}"))?;
    Ok(Alias {
        address,
        name: name.into(),
    })
}

/// Convert a slice of Alias values into an AliasMap.
///
/// Later entries win when an address appears twice.
///
/// # Arguments
/// * `aliases` - A slice of Alias structs
///
/// # Returns
/// A BTreeMap mapping MAC addresses to their human-readable names.
pub fn to_map(aliases: &[Alias]) -> AliasMap {
    aliases
        .iter()
        .map(|a| (a.address, a.name.clone()))
        .collect()
}

/// Pick the display name for a tag: its alias, else the name it advertises.
pub fn resolve_name(
    address: &MacAddress,
    aliases: &AliasMap,
    local_name: Option<&str>,
) -> Option<String> {
    aliases
        .get(address)
        .cloned()
        .or_else(|| local_name.map(str::to_string))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{OTHER_MAC, TEST_MAC};

    #[test]
    fn test_parse_alias_valid() {
        let result = parse_alias("AA:BB:CC:DD:EE:FF=Kitchen");
        assert!(result.is_ok());
        let alias = result.unwrap();
        assert_eq!(alias.address, TEST_MAC);
        assert_eq!(alias.name, "Kitchen");
    }

    #[test]
    fn test_parse_alias_with_spaces() {
        let result = parse_alias("AA:BB:CC:DD:EE:FF=Living Room");
        assert!(result.is_ok());
        let alias = result.unwrap();
        assert_eq!(alias.name, "Living Room");
    }

    #[test]
    fn test_parse_alias_compact_lowercase_address() {
        let alias = parse_alias("aabbccddeeff=Sauna").unwrap();
        assert_eq!(alias.address, TEST_MAC);
    }

    #[test]
    fn test_parse_alias_invalid() {
        assert!(parse_alias("no-equals-sign").is_err());
        assert!(parse_alias("not-a-mac=Kitchen").is_err());
    }

    #[test]
    fn test_to_map() {
        let aliases = vec![
            Alias {
                address: TEST_MAC,
                name: "Kitchen".to_string(),
            },
            Alias {
                address: OTHER_MAC,
                name: "Bedroom".to_string(),
            },
        ];
        let map = to_map(&aliases);
        assert_eq!(map.get(&TEST_MAC), Some(&"Kitchen".to_string()));
        assert_eq!(map.get(&OTHER_MAC), Some(&"Bedroom".to_string()));
        assert_eq!(map.get(&MacAddress([0; 6])), None);
    }

    #[test]
    fn test_resolve_name_prefers_alias() {
        let map = to_map(&[Alias {
            address: TEST_MAC,
            name: "Sauna".to_string(),
        }]);
        assert_eq!(
            resolve_name(&TEST_MAC, &map, Some("Ruuvi 1234")),
            Some("Sauna".to_string())
        );
        assert_eq!(
            resolve_name(&OTHER_MAC, &map, Some("Ruuvi 1234")),
            Some("Ruuvi 1234".to_string())
        );
        assert_eq!(resolve_name(&OTHER_MAC, &map, None), None);
    }
}
