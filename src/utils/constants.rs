/// Regional network definitions used for the synthetic day load

/// Receiving facilities in the network
pub const FACILITY_POOL: &[&str] = &[
    "NEIGRIHMS",
    "Civil Hospital Shillong",
    "Nazareth Hospital",
    "Ganesh Das MCH",
    "Sohra Civil Hospital",
    "Shillong Polyclinic & Trauma",
];

/// Facility selected when nothing is configured
pub const DEFAULT_FACILITY: &str = "Civil Hospital Shillong";

/// Referring clinicians
pub const REFERRER_NAMES: &[&str] = &[
    "Dr. Rai",
    "Dr. Khonglah",
    "ANM Pynsuk",
    "Dr. Sharma",
    "Dr. Singh",
];

/// Referring (sending) facilities
pub const REFERRING_FACILITIES: &[&str] = &[
    "PHC Mawlai",
    "CHC Smit",
    "CHC Pynursla",
    "District Hospital Shillong",
    "PHC Nongpoh",
    "CHC Jowai",
];

pub const REFERRER_ROLES: &[&str] = &["Doctor/Physician", "ANM/ASHA/EMT"];

/// Referrals generated per synthetic day
pub const DEFAULT_DAY_SIZE: usize = 140;

/// Seed used for the first day load
pub const DEFAULT_SEED: u64 = 2025;

/// ICU bed input bounds
pub const MAX_ICU_BEDS: u32 = 50;

/// Fallback acceptance rate for facilities without resource data
pub const DEFAULT_ACCEPTANCE_RATE: f64 = 0.75;

/// Event log page size
pub const DEFAULT_EVENT_LIMIT: i64 = 200;

/// Environment variable holding the API bearer token
pub const WEB_TOKEN_ENV: &str = "RECEIVING_WEB_TOKEN";
