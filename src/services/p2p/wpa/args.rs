//! Decoding of supplicant signal dictionaries.

use std::collections::HashMap;

use zbus::zvariant::{OwnedValue, Value};

use crate::services::p2p::GroupOwnerNegotiationResult;

/// Dictionary payload carried by supplicant signals.
pub(crate) type Dict = HashMap<String, OwnedValue>;

pub(crate) fn string(dict: &Dict, key: &str) -> Option<String> {
    match &**dict.get(key)? {
        Value::Str(s) => Some(s.to_string()),
        Value::ObjectPath(path) => Some(path.to_string()),
        _ => None,
    }
}

pub(crate) fn int(dict: &Dict, key: &str) -> Option<i32> {
    match &**dict.get(key)? {
        Value::I32(n) => Some(*n),
        Value::U32(n) => i32::try_from(*n).ok(),
        Value::I16(n) => Some(i32::from(*n)),
        Value::U16(n) => Some(i32::from(*n)),
        Value::U8(n) => Some(i32::from(*n)),
        _ => None,
    }
}

pub(crate) fn int_list(dict: &Dict, key: &str) -> Vec<i32> {
    let Some(Value::Array(array)) = dict.get(key).map(|value| &**value) else {
        return Vec::new();
    };

    array
        .iter()
        .filter_map(|value| match value {
            Value::I32(n) => Some(*n),
            _ => None,
        })
        .collect()
}

/// Peer path and result of a GO negotiation signal.
pub(crate) fn negotiation_result(info: &Dict) -> (String, GroupOwnerNegotiationResult) {
    let peer_path = string(info, "peer_object").unwrap_or_default();

    let result = GroupOwnerNegotiationResult {
        status: int(info, "status").unwrap_or_default(),
        oper_freq: int(info, "frequency").unwrap_or_default(),
        frequencies: int_list(info, "frequency_list"),
        wps_method: string(info, "wps_method").unwrap_or_default(),
    };

    (peer_path, result)
}

/// Group, interface path and role of a group lifecycle signal.
pub(crate) fn group_properties(properties: &Dict) -> (String, String, String) {
    (
        string(properties, "group_object").unwrap_or_default(),
        string(properties, "interface_object").unwrap_or_default(),
        string(properties, "role").unwrap_or_default(),
    )
}

/// Colon separated lowercase hex, as peers are addressed elsewhere.
pub(crate) fn format_address(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect::<Vec<_>>()
        .join(":")
}

#[cfg(test)]
mod tests {
    use zbus::zvariant::ObjectPath;

    use super::*;

    fn owned(value: Value<'_>) -> OwnedValue {
        OwnedValue::try_from(value).unwrap()
    }

    #[test]
    fn decodes_negotiation_result() {
        let mut info = Dict::new();
        info.insert(
            "peer_object".into(),
            owned(Value::from(
                ObjectPath::try_from("/fi/w1/wpa_supplicant1/Interfaces/1/Peers/aa").unwrap(),
            )),
        );
        info.insert("status".into(), owned(Value::from(0i32)));
        info.insert("frequency".into(), owned(Value::from(2437i32)));
        info.insert(
            "frequency_list".into(),
            owned(Value::from(vec![2412i32, 2437])),
        );
        info.insert("wps_method".into(), owned(Value::from("pbc")));

        let (peer, result) = negotiation_result(&info);

        assert_eq!(peer, "/fi/w1/wpa_supplicant1/Interfaces/1/Peers/aa");
        assert_eq!(result.oper_freq, 2437);
        assert_eq!(result.frequencies, vec![2412, 2437]);
        assert_eq!(result.wps_method, "pbc");
    }

    #[test]
    fn missing_keys_fall_back_to_defaults() {
        let (group, iface, role) = group_properties(&Dict::new());

        assert!(group.is_empty());
        assert!(iface.is_empty());
        assert!(role.is_empty());
    }

    #[test]
    fn formats_device_address() {
        assert_eq!(
            format_address(&[0x02, 0xab, 0x00, 0x10, 0xff, 0x01]),
            "02:ab:00:10:ff:01"
        );
    }
}
