/// Column names of the listings export.
/// These are the only columns the pipeline reads or rewrites; every other column
/// passes through as text.
pub const REGION_COLUMN: &str = "state";
pub const POSTAL_CODE_COLUMN: &str = "zipcode";
pub const LATITUDE_COLUMN: &str = "latitude";
pub const LONGITUDE_COLUMN: &str = "longitude";
pub const LICENSE_COLUMN: &str = "license";
pub const GUEST_COUNT_COLUMN: &str = "guests_included";

pub const CURRENCY_COLUMNS: [&str; 5] = [
    "price",
    "weekly_price",
    "monthly_price",
    "security_deposit",
    "extra_people",
];

// Fee columns default to zero when absent
pub const FEE_COLUMNS: [&str; 1] = ["cleaning_fee"];

pub const DATE_COLUMNS: [&str; 5] = [
    "last_scraped",
    "host_since",
    "calendar_last_scraped",
    "first_review",
    "last_review",
];

/// Columns kept verbatim, blanks included, so leading zeros are never lost.
pub const TEXT_COLUMNS: [&str; 2] = [LICENSE_COLUMN, POSTAL_CODE_COLUMN];

pub const POSTAL_CODE_LEN: usize = 5;
pub const PRIMARY_DATE_FORMAT: &str = "%Y/%m/%d";
pub const FALLBACK_DATE_FORMAT: &str = "%m/%d/%y";

// Run defaults
pub const DEFAULT_REGION: &str = "NY";
pub const DEFAULT_MIN_ZONE_RECORDS: usize = 50;
pub const DEFAULT_PARTITIONS: usize = 10;
pub const PARTITIONS_PER_WORKER: usize = 4;
pub const DEFAULT_INPUT_DIR: &str = "DA-master";
pub const DEFAULT_OUTPUT_DIR: &str = "Cleaned_AirBnB";
pub const DEFAULT_INVENTORY_FILE: &str = "Inventory.csv";
pub const DEFAULT_FAILURE_REPORT_FILE: &str = "Enrichment_Failures.csv";
pub const CONFIG_FILE: &str = "config.toml";
pub const LOG_DIR: &str = "logs";

// Geocoding defaults (public Nominatim allows one request per second)
pub const DEFAULT_GEOCODER_URL: &str = "https://nominatim.openstreetmap.org/reverse";
pub const DEFAULT_USER_AGENT: &str = "rental_zones";
pub const DEFAULT_GEOCODER_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_GEOCODER_REQUESTS_PER_MIN: u64 = 60;
pub const DEFAULT_GEOCODER_MAX_RETRIES: u32 = 2;
pub const DEFAULT_GEOCODER_RETRY_BACKOFF_MS: u64 = 1_000;

// Environment overrides
pub const ENV_GEOCODER_URL: &str = "RENTAL_ZONES_GEOCODER_URL";
pub const ENV_USER_AGENT: &str = "RENTAL_ZONES_USER_AGENT";
pub const ENV_PUSHGATEWAY_URL: &str = "RENTAL_ZONES_PUSHGATEWAY_URL";

/// The four export parts, in read order. Only the first carries a header row.
pub fn default_input_files() -> Vec<String> {
    (1..=4).map(|k| format!("listings file {k} of 4.csv")).collect()
}

pub fn zone_file_name(postal_code: &str) -> String {
    format!("Zip_{postal_code}.json")
}
