use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::error::DomainError;

/// Upper bound of the price slider; prices are whole currency units.
pub const MAX_PRICE: u32 = 260_000;
/// Page size of the laptops listing endpoint.
pub const DEFAULT_PAGE_SIZE: u32 = 20;

macro_rules! id_newtype {
    ($name:ident) => {
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }
    };
}

id_newtype!(LaptopId);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserId(pub i64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FacetGroup {
    Brand,
    Category,
    Storage,
    Performance,
    ScreenSize,
}

impl FacetGroup {
    pub const ALL: [FacetGroup; 5] = [
        FacetGroup::Brand,
        FacetGroup::Category,
        FacetGroup::Storage,
        FacetGroup::Performance,
        FacetGroup::ScreenSize,
    ];

    /// Name of the query parameter carrying this facet, both in the
    /// shareable URL and in the outbound listing request.
    pub fn query_key(self) -> &'static str {
        match self {
            FacetGroup::Brand => "brand",
            FacetGroup::Category => "category",
            FacetGroup::Storage => "storage",
            FacetGroup::Performance => "performance",
            FacetGroup::ScreenSize => "screen_size",
        }
    }

    pub fn from_query_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|group| group.query_key() == key)
    }

    pub fn options(self) -> &'static [FacetOption] {
        match self {
            FacetGroup::Brand => BRAND_OPTIONS,
            FacetGroup::Category => CATEGORY_OPTIONS,
            FacetGroup::Storage => STORAGE_OPTIONS,
            FacetGroup::Performance => PERFORMANCE_OPTIONS,
            FacetGroup::ScreenSize => SCREEN_SIZE_OPTIONS,
        }
    }
}

impl fmt::Display for FacetGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.query_key())
    }
}

impl FromStr for FacetGroup {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_ascii_lowercase().replace('-', "_");
        Self::from_query_key(&normalized)
            .ok_or_else(|| DomainError::UnknownFacetGroup(value.to_string()))
    }
}

/// A selectable facet value. Bucket ids join several raw values with commas,
/// e.g. the "-256 GB" storage bucket covers five discrete sizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FacetOption {
    pub id: &'static str,
    pub label: &'static str,
}

const fn option(id: &'static str, label: &'static str) -> FacetOption {
    FacetOption { id, label }
}

pub const BRAND_OPTIONS: &[FacetOption] = &[
    option("HP", "HP"),
    option("Asus", "ASUS"),
    option("Dell", "Dell"),
    option("Lenovo", "Lenovo"),
    option("Apple", "Apple"),
    option("MSI", "MSI"),
    option("Acer", "Acer"),
    option("ACEMAGIC", "ACEMAGIC"),
];

pub const CATEGORY_OPTIONS: &[FacetOption] = &[
    option("Gaming", "Gaming"),
    option("Study", "Study"),
    option("Business", "Business"),
    option("Work", "Work"),
    option("Standard", "Standard"),
    option("UltraBook", "Ultrabook"),
    option("2-in-1", "2-in-1"),
];

pub const STORAGE_OPTIONS: &[FacetOption] = &[
    option("64,128,192,160,256", "-256 GB"),
    option("512", "512 GB"),
    option("960,1024,1120,1256,1500", "1-1.5 TB"),
    option("2048", "2 TB"),
    option("4096", "4 TB"),
    option("8192", "8 TB"),
];

pub const PERFORMANCE_OPTIONS: &[FacetOption] = &[
    option("high", "High"),
    option("moderate", "Moderate"),
    option("basic", "Basic"),
];

pub const SCREEN_SIZE_OPTIONS: &[FacetOption] = &[
    option("7,10,11,12,13", "-13 inch"),
    option("14", "14 inch"),
    option("15.6,15", "15 inch"),
    option("16", "16 inch"),
    option("17,18", "17+ inch"),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    #[default]
    Default,
    PriceAscending,
    PriceDescending,
}

impl SortOrder {
    /// Value of the `ordering` parameter; `None` for server-determined order.
    pub fn ordering_param(self) -> Option<&'static str> {
        match self {
            SortOrder::Default => None,
            SortOrder::PriceAscending => Some("price"),
            SortOrder::PriceDescending => Some("-price"),
        }
    }

    pub fn from_ordering_param(value: &str) -> Option<Self> {
        match value.trim() {
            "" => Some(SortOrder::Default),
            "price" => Some(SortOrder::PriceAscending),
            "-price" => Some(SortOrder::PriceDescending),
            _ => None,
        }
    }
}

impl FromStr for SortOrder {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "default" | "" => Ok(SortOrder::Default),
            "price" | "asc" | "price-asc" => Ok(SortOrder::PriceAscending),
            "-price" | "desc" | "price-desc" => Ok(SortOrder::PriceDescending),
            _ => Err(DomainError::UnknownSortOrder(value.to_string())),
        }
    }
}

/// Inclusive price bounds within `[0, MAX_PRICE]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceRange {
    lower: u32,
    upper: u32,
}

impl PriceRange {
    pub const FULL: PriceRange = PriceRange {
        lower: 0,
        upper: MAX_PRICE,
    };

    pub fn new(lower: u32, upper: u32) -> Result<Self, DomainError> {
        if lower > upper || upper > MAX_PRICE {
            return Err(DomainError::InvalidPriceRange {
                lower: i64::from(lower),
                upper: i64::from(upper),
                max: MAX_PRICE,
            });
        }
        Ok(Self { lower, upper })
    }

    /// Builds a range from untrusted input: clamps both bounds into the
    /// domain and swaps them when inverted.
    pub fn clamped(lower: i64, upper: i64) -> Self {
        let clamp = |value: i64| value.clamp(0, i64::from(MAX_PRICE)) as u32;
        let (lower, upper) = (clamp(lower), clamp(upper));
        if lower <= upper {
            Self { lower, upper }
        } else {
            Self {
                lower: upper,
                upper: lower,
            }
        }
    }

    pub fn lower(self) -> u32 {
        self.lower
    }

    pub fn upper(self) -> u32 {
        self.upper
    }

    pub fn is_full(self) -> bool {
        self == Self::FULL
    }
}

impl Default for PriceRange {
    fn default() -> Self {
        Self::FULL
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ListingMode {
    #[default]
    Filtered,
    ChatbotResult,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn price_range_rejects_inverted_and_out_of_domain_bounds() {
        assert!(PriceRange::new(10, 5).is_err());
        assert!(PriceRange::new(0, MAX_PRICE + 1).is_err());
        assert_eq!(PriceRange::new(0, MAX_PRICE).expect("full"), PriceRange::FULL);
    }

    #[test]
    fn clamped_price_range_swaps_and_clamps() {
        let range = PriceRange::clamped(400_000, -5);
        assert_eq!(range.lower(), 0);
        assert_eq!(range.upper(), MAX_PRICE);

        let range = PriceRange::clamped(90_000, 30_000);
        assert_eq!((range.lower(), range.upper()), (30_000, 90_000));
    }

    #[test]
    fn sort_order_maps_to_ordering_param() {
        assert_eq!(SortOrder::Default.ordering_param(), None);
        assert_eq!(
            SortOrder::from_ordering_param("-price"),
            Some(SortOrder::PriceDescending)
        );
        assert_eq!(SortOrder::from_ordering_param("rating"), None);
        assert_eq!(
            "desc".parse::<SortOrder>().expect("parse"),
            SortOrder::PriceDescending
        );
    }

    #[test]
    fn facet_group_parses_query_keys() {
        assert_eq!(
            "screen-size".parse::<FacetGroup>().expect("parse"),
            FacetGroup::ScreenSize
        );
        assert!("environment".parse::<FacetGroup>().is_err());
        assert!(FacetGroup::Storage
            .options()
            .iter()
            .any(|option| option.id.contains(',')));
    }
}
