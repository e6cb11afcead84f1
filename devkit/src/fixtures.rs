/*!
Topologies de démonstration

Réseau de référence utilisé par les tests et les scénarios :

```text
WAN_ROUTER_01 (L1, 2 PSU)
├── FW_01_PRIMARY   (L2, FW_HA)
│   └── CORE_SW_01  (L3)
│       ├── L2_SW_01 (L4) ── AP_01, AP_02, AP_03
│       └── L2_SW_02 (L4) ── AP_04
└── FW_01_SECONDARY (L2, FW_HA)
```
*/

use faultline_kernel::topology::Topology;
use serde_json::{json, Value};

pub const ROUTER: &str = "WAN_ROUTER_01";
pub const FW_PRIMARY: &str = "FW_01_PRIMARY";
pub const FW_SECONDARY: &str = "FW_01_SECONDARY";
pub const CORE_SWITCH: &str = "CORE_SW_01";
pub const L2_SWITCH: &str = "L2_SW_01";
pub const L2_SWITCH_B: &str = "L2_SW_02";
pub const ACCESS_POINTS: [&str; 3] = ["AP_01", "AP_02", "AP_03"];

pub fn demo_topology_json() -> Value {
    json!({
        "WAN_ROUTER_01": {
            "type": "ROUTER", "layer": 1,
            "metadata": {"vendor": "Cisco", "psu_count": 2, "mgmt_ip": "203.0.113.1"}
        },
        "FW_01_PRIMARY": {
            "type": "FIREWALL", "layer": 2, "parent_id": "WAN_ROUTER_01",
            "redundancy_group": "FW_HA", "metadata": {"vendor": "Fortinet"}
        },
        "FW_01_SECONDARY": {
            "type": "FIREWALL", "layer": 2, "parent_id": "WAN_ROUTER_01",
            "redundancy_group": "FW_HA", "metadata": {"vendor": "Fortinet"}
        },
        "CORE_SW_01": {"type": "SWITCH", "layer": 3, "parent_id": "FW_01_PRIMARY"},
        "L2_SW_01": {"type": "SWITCH", "layer": 4, "parent_id": "CORE_SW_01", "metadata": {"location": "Floor 1"}},
        "L2_SW_02": {"type": "SWITCH", "layer": 4, "parent_id": "CORE_SW_01", "metadata": {"location": "Floor 2"}},
        "AP_01": {"type": "ACCESS_POINT", "layer": 5, "parent_id": "L2_SW_01"},
        "AP_02": {"type": "ACCESS_POINT", "layer": 5, "parent_id": "L2_SW_01"},
        "AP_03": {"type": "ACCESS_POINT", "layer": 5, "parent_id": "L2_SW_01"},
        "AP_04": {"type": "AP", "layer": 5, "parent_id": "L2_SW_02"}
    })
}

pub fn demo_topology() -> Topology {
    // fixture statique, toujours valide
    Topology::from_value(demo_topology_json()).unwrap_or_default()
}

/// Un parent et `children` enfants directs : `<parent>_C1`, `<parent>_C2`...
pub fn star_topology(parent: &str, children: usize) -> Topology {
    let mut nodes = serde_json::Map::new();
    nodes.insert(parent.to_string(), json!({"type": "SWITCH", "layer": 4}));
    for i in 1..=children {
        nodes.insert(
            format!("{}_C{}", parent, i),
            json!({"type": "ACCESS_POINT", "layer": 5, "parent_id": parent}),
        );
    }
    Topology::from_value(Value::Object(nodes)).unwrap_or_default()
}
