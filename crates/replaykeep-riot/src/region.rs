//! Platform region codes and the regional hosts that serve match data.

use std::fmt;
use std::str::FromStr;

use crate::error::ApiError;

/// A platform region as stored on tracked accounts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Region {
    Na,
    Br,
    Lan,
    Las,
    Euw,
    Eune,
    Ru,
    Tr,
    Kr,
    Jp,
    Oce,
}

/// Regional routing value used in match API hostnames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RegionalRoute {
    Americas,
    Europe,
    Asia,
    Sea,
}

impl Region {
    pub const ALL: [Region; 11] = [
        Region::Na,
        Region::Br,
        Region::Lan,
        Region::Las,
        Region::Euw,
        Region::Eune,
        Region::Ru,
        Region::Tr,
        Region::Kr,
        Region::Jp,
        Region::Oce,
    ];

    pub fn code(self) -> &'static str {
        match self {
            Region::Na => "NA",
            Region::Br => "BR",
            Region::Lan => "LAN",
            Region::Las => "LAS",
            Region::Euw => "EUW",
            Region::Eune => "EUNE",
            Region::Ru => "RU",
            Region::Tr => "TR",
            Region::Kr => "KR",
            Region::Jp => "JP",
            Region::Oce => "OCE",
        }
    }

    pub fn route(self) -> RegionalRoute {
        match self {
            Region::Na | Region::Br | Region::Lan | Region::Las => RegionalRoute::Americas,
            Region::Euw | Region::Eune | Region::Ru | Region::Tr => RegionalRoute::Europe,
            Region::Kr | Region::Jp => RegionalRoute::Asia,
            Region::Oce => RegionalRoute::Sea,
        }
    }
}

impl RegionalRoute {
    pub fn host_label(self) -> &'static str {
        match self {
            RegionalRoute::Americas => "americas",
            RegionalRoute::Europe => "europe",
            RegionalRoute::Asia => "asia",
            RegionalRoute::Sea => "sea",
        }
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl fmt::Display for RegionalRoute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.host_label())
    }
}

impl FromStr for Region {
    type Err = ApiError;

    /// Accepts the platform code in any case, e.g. `"euw"` or `"EUW"`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let code = s.trim();
        Region::ALL
            .into_iter()
            .find(|region| region.code().eq_ignore_ascii_case(code))
            .ok_or_else(|| ApiError::UnsupportedRegion(s.to_string()))
    }
}
