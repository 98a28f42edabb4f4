//! Highway medicine pickup points
//!
//! A fixed catalog; no inventory backend.

use serde::Serialize;

use crate::capability::Coordinates;
use crate::map::Marker;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PickupLocation {
    pub name: &'static str,
    pub kind: &'static str,
    pub distance_km: u32,
    pub position: Coordinates,
    pub medicines: &'static [&'static str],
}

impl PickupLocation {
    /// Case-insensitive match on the location name or any medicine
    pub fn matches(&self, term: &str) -> bool {
        let term = term.trim().to_lowercase();
        if term.is_empty() {
            return true;
        }
        self.name.to_lowercase().contains(&term)
            || self
                .medicines
                .iter()
                .any(|m| m.to_lowercase().contains(&term))
    }

    pub fn summary(&self) -> String {
        format!("{} - Approx. {} km away", self.kind, self.distance_km)
    }

    pub fn marker(&self) -> Marker {
        Marker::new(self.name, self.position)
    }

    pub fn preorder_prompt(&self) -> String {
        format!(
            "This will place a pre-order at {}. You can pay at the pickup point. Are you sure?",
            self.name
        )
    }
}

pub const PICKUP_LOCATIONS: &[PickupLocation] = &[
    PickupLocation {
        name: "Toll Plaza KM 120",
        kind: "Toll Booth",
        distance_km: 5,
        position: Coordinates::new(28.4595, 77.0266),
        medicines: &["Painkillers", "Bandages"],
    },
    PickupLocation {
        name: "NHAI Highway Stop",
        kind: "Kiosk",
        distance_km: 8,
        position: Coordinates::new(28.4089, 77.0430),
        medicines: &["Antiseptics", "Gauze"],
    },
    PickupLocation {
        name: "Expressway Fuel Station",
        kind: "Petrol Pump",
        distance_km: 12,
        position: Coordinates::new(28.3670, 77.0711),
        medicines: &["Painkillers", "First-aid kits"],
    },
];

/// Catalog entries matching `term`, in catalog order
pub fn search(term: &str) -> Vec<&'static PickupLocation> {
    PICKUP_LOCATIONS.iter().filter(|l| l.matches(term)).collect()
}

/// Map markers for every pickup point
pub fn markers() -> Vec<Marker> {
    PICKUP_LOCATIONS.iter().map(PickupLocation::marker).collect()
}

/// Look up one location by exact name, ignoring case
pub fn find(name: &str) -> Option<&'static PickupLocation> {
    PICKUP_LOCATIONS
        .iter()
        .find(|l| l.name.eq_ignore_ascii_case(name.trim()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(found: &[&PickupLocation]) -> Vec<&'static str> {
        found.iter().map(|l| l.name).collect()
    }

    #[test]
    fn test_empty_search_lists_everything() {
        assert_eq!(search("").len(), 3);
        assert_eq!(search("   ").len(), 3);
    }

    #[test]
    fn test_search_by_medicine_ignores_case() {
        assert_eq!(
            names(&search("PAINKILL")),
            vec!["Toll Plaza KM 120", "Expressway Fuel Station"]
        );
        assert_eq!(names(&search("gauze")), vec!["NHAI Highway Stop"]);
    }

    #[test]
    fn test_search_by_name() {
        assert_eq!(names(&search("nhai")), vec!["NHAI Highway Stop"]);
        assert!(search("hospital").is_empty());
    }

    #[test]
    fn test_find_and_prompt() {
        let loc = find("toll plaza km 120").unwrap();
        assert_eq!(loc.summary(), "Toll Booth - Approx. 5 km away");
        assert!(loc.preorder_prompt().contains("Toll Plaza KM 120"));
        assert!(find("Toll Plaza").is_none());
    }

    #[test]
    fn test_every_pickup_point_has_a_marker() {
        let markers = markers();
        assert_eq!(markers.len(), PICKUP_LOCATIONS.len());
        assert_eq!(markers[1].name, "NHAI Highway Stop");
        assert_eq!(markers[1].position, PICKUP_LOCATIONS[1].position);
    }
}
