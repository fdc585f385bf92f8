#[cfg(feature = "sea-orm")]
use sea_orm::prelude::StringLen;

use serde::{Deserialize, Serialize};
use std::fmt;

/// Console video standard a run was played on.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, utoipa::ToSchema)]
#[cfg_attr(
    feature = "sea-orm",
    derive(sea_orm::DeriveActiveEnum, sea_orm::EnumIter),
    sea_orm(rs_type = "String", db_type = "String(StringLen::None)")
)]
pub enum Region {
    #[serde(rename = "PAL")]
    #[cfg_attr(feature = "sea-orm", sea_orm(string_value = "PAL"))]
    Pal,
    #[serde(rename = "NTSC")]
    #[cfg_attr(feature = "sea-orm", sea_orm(string_value = "NTSC"))]
    Ntsc,
}

impl Region {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pal => "PAL",
            Self::Ntsc => "NTSC",
        }
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which regions an event accepts runs from.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize, utoipa::ToSchema,
)]
#[cfg_attr(
    feature = "sea-orm",
    derive(sea_orm::DeriveActiveEnum, sea_orm::EnumIter),
    sea_orm(rs_type = "String", db_type = "String(StringLen::None)")
)]
pub enum RegionConstraint {
    #[serde(rename = "PAL")]
    #[cfg_attr(feature = "sea-orm", sea_orm(string_value = "PAL"))]
    Pal,
    #[serde(rename = "NTSC")]
    #[cfg_attr(feature = "sea-orm", sea_orm(string_value = "NTSC"))]
    Ntsc,
    #[default]
    #[cfg_attr(feature = "sea-orm", sea_orm(string_value = "Both"))]
    Both,
}

impl RegionConstraint {
    pub fn allows(&self, region: Region) -> bool {
        match self {
            Self::Both => true,
            Self::Pal => region == Region::Pal,
            Self::Ntsc => region == Region::Ntsc,
        }
    }
}
