//! US state identifiers as used by the Census files.

use map_common::{MapError, MapResult};

/// FIPS code, postal abbreviation and name of one state or equivalent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StateInfo {
    pub fips: &'static str,
    pub usps: &'static str,
    pub name: &'static str,
}

const STATES: &[StateInfo] = &[
    StateInfo { fips: "01", usps: "AL", name: "Alabama" },
    StateInfo { fips: "02", usps: "AK", name: "Alaska" },
    StateInfo { fips: "04", usps: "AZ", name: "Arizona" },
    StateInfo { fips: "05", usps: "AR", name: "Arkansas" },
    StateInfo { fips: "06", usps: "CA", name: "California" },
    StateInfo { fips: "08", usps: "CO", name: "Colorado" },
    StateInfo { fips: "09", usps: "CT", name: "Connecticut" },
    StateInfo { fips: "10", usps: "DE", name: "Delaware" },
    StateInfo { fips: "11", usps: "DC", name: "District of Columbia" },
    StateInfo { fips: "12", usps: "FL", name: "Florida" },
    StateInfo { fips: "13", usps: "GA", name: "Georgia" },
    StateInfo { fips: "15", usps: "HI", name: "Hawaii" },
    StateInfo { fips: "16", usps: "ID", name: "Idaho" },
    StateInfo { fips: "17", usps: "IL", name: "Illinois" },
    StateInfo { fips: "18", usps: "IN", name: "Indiana" },
    StateInfo { fips: "19", usps: "IA", name: "Iowa" },
    StateInfo { fips: "20", usps: "KS", name: "Kansas" },
    StateInfo { fips: "21", usps: "KY", name: "Kentucky" },
    StateInfo { fips: "22", usps: "LA", name: "Louisiana" },
    StateInfo { fips: "23", usps: "ME", name: "Maine" },
    StateInfo { fips: "24", usps: "MD", name: "Maryland" },
    StateInfo { fips: "25", usps: "MA", name: "Massachusetts" },
    StateInfo { fips: "26", usps: "MI", name: "Michigan" },
    StateInfo { fips: "27", usps: "MN", name: "Minnesota" },
    StateInfo { fips: "28", usps: "MS", name: "Mississippi" },
    StateInfo { fips: "29", usps: "MO", name: "Missouri" },
    StateInfo { fips: "30", usps: "MT", name: "Montana" },
    StateInfo { fips: "31", usps: "NE", name: "Nebraska" },
    StateInfo { fips: "32", usps: "NV", name: "Nevada" },
    StateInfo { fips: "33", usps: "NH", name: "New Hampshire" },
    StateInfo { fips: "34", usps: "NJ", name: "New Jersey" },
    StateInfo { fips: "35", usps: "NM", name: "New Mexico" },
    StateInfo { fips: "36", usps: "NY", name: "New York" },
    StateInfo { fips: "37", usps: "NC", name: "North Carolina" },
    StateInfo { fips: "38", usps: "ND", name: "North Dakota" },
    StateInfo { fips: "39", usps: "OH", name: "Ohio" },
    StateInfo { fips: "40", usps: "OK", name: "Oklahoma" },
    StateInfo { fips: "41", usps: "OR", name: "Oregon" },
    StateInfo { fips: "42", usps: "PA", name: "Pennsylvania" },
    StateInfo { fips: "44", usps: "RI", name: "Rhode Island" },
    StateInfo { fips: "45", usps: "SC", name: "South Carolina" },
    StateInfo { fips: "46", usps: "SD", name: "South Dakota" },
    StateInfo { fips: "47", usps: "TN", name: "Tennessee" },
    StateInfo { fips: "48", usps: "TX", name: "Texas" },
    StateInfo { fips: "49", usps: "UT", name: "Utah" },
    StateInfo { fips: "50", usps: "VT", name: "Vermont" },
    StateInfo { fips: "51", usps: "VA", name: "Virginia" },
    StateInfo { fips: "53", usps: "WA", name: "Washington" },
    StateInfo { fips: "54", usps: "WV", name: "West Virginia" },
    StateInfo { fips: "55", usps: "WI", name: "Wisconsin" },
    StateInfo { fips: "56", usps: "WY", name: "Wyoming" },
    StateInfo { fips: "60", usps: "AS", name: "American Samoa" },
    StateInfo { fips: "66", usps: "GU", name: "Guam" },
    StateInfo { fips: "69", usps: "MP", name: "Northern Mariana Islands" },
    StateInfo { fips: "72", usps: "PR", name: "Puerto Rico" },
    StateInfo { fips: "78", usps: "VI", name: "U.S. Virgin Islands" },
];

/// Look up a state by FIPS code, postal abbreviation or full name.
///
/// Single-digit FIPS codes are zero-padded, so `"6"` finds California.
pub fn resolve_state(identifier: &str) -> MapResult<&'static StateInfo> {
    let id = identifier.trim();
    let padded = if id.len() == 1 && id.chars().all(|c| c.is_ascii_digit()) {
        format!("0{}", id)
    } else {
        id.to_string()
    };

    STATES
        .iter()
        .find(|s| {
            s.fips == padded || s.usps.eq_ignore_ascii_case(id) || s.name.eq_ignore_ascii_case(id)
        })
        .ok_or_else(|| {
            MapError::data_source("states", "resolve state", format!("unknown state '{}'", identifier))
        })
}

/// Every known state, in FIPS order.
pub fn all_states() -> &'static [StateInfo] {
    STATES
}
