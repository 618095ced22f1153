//! Display density buckets.
//!
//! Icons in the bucket are stored once per density, in folders named after
//! the Android drawable qualifiers (`drawable-mdpi`, `drawable-hdpi`, ...).
//! The bucket for a display is picked from its DPI.

use std::fmt;
use std::str::FromStr;

/// Root folder of the icon set inside the bucket.
pub const DEFAULT_ROOT_FOLDER: &str = "google_icons";

/// Density bucket of a display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DensityBucket {
    /// Up to 160 dpi.
    Mdpi,
    /// 161 to 240 dpi.
    Hdpi,
    /// 241 to 320 dpi.
    Xhdpi,
    /// 321 to 480 dpi.
    Xxhdpi,
    /// Above 480 dpi.
    Xxxhdpi,
}

impl DensityBucket {
    /// All buckets, lowest density first.
    pub const ALL: [DensityBucket; 5] = [
        DensityBucket::Mdpi,
        DensityBucket::Hdpi,
        DensityBucket::Xhdpi,
        DensityBucket::Xxhdpi,
        DensityBucket::Xxxhdpi,
    ];

    /// Classify a display by its DPI.
    pub fn from_dpi(dpi: u32) -> Self {
        match dpi {
            0..=160 => DensityBucket::Mdpi,
            161..=240 => DensityBucket::Hdpi,
            241..=320 => DensityBucket::Xhdpi,
            321..=480 => DensityBucket::Xxhdpi,
            _ => DensityBucket::Xxxhdpi,
        }
    }

    /// Qualifier used in folder names.
    pub fn as_str(&self) -> &'static str {
        match self {
            DensityBucket::Mdpi => "mdpi",
            DensityBucket::Hdpi => "hdpi",
            DensityBucket::Xhdpi => "xhdpi",
            DensityBucket::Xxhdpi => "xxhdpi",
            DensityBucket::Xxxhdpi => "xxxhdpi",
        }
    }

    /// Folder holding this bucket's icons, with a trailing slash.
    ///
    /// ```
    /// use iconsearch::density::DensityBucket;
    ///
    /// let path = DensityBucket::from_dpi(420).folder_path("google_icons");
    /// assert_eq!(path, "google_icons/drawable-xxhdpi/");
    /// ```
    pub fn folder_path(&self, root: &str) -> String {
        let root = root.trim_end_matches('/');
        if root.is_empty() {
            format!("drawable-{}/", self.as_str())
        } else {
            format!("{}/drawable-{}/", root, self.as_str())
        }
    }
}

impl fmt::Display for DensityBucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DensityBucket {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        DensityBucket::ALL
            .into_iter()
            .find(|bucket| bucket.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown density bucket: {}", s))
    }
}
