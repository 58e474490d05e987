//! Photo and user records decoded from the photo API
//!
//! Records are immutable once decoded. The wire format is mapped through
//! private `Wire*` structs so that URL maps, colours and timestamps are
//! validated in one place.

use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use url::Url;

/// Wire format of `created_at`
const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%z";

/// Size variants a photo is published in
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UrlKind {
    /// Original upload
    Raw,
    /// Full resolution JPEG
    Full,
    /// 1080px wide
    Regular,
    /// 400px wide
    Small,
    /// 200px wide
    Thumb,
}

impl UrlKind {
    /// Order in which [`PhotoRecord::best_url`] falls back
    const FALLBACK: [UrlKind; 5] = [
        UrlKind::Regular,
        UrlKind::Small,
        UrlKind::Thumb,
        UrlKind::Full,
        UrlKind::Raw,
    ];

    fn from_key(key: &str) -> Option<Self> {
        match key {
            "raw" => Some(UrlKind::Raw),
            "full" => Some(UrlKind::Full),
            "regular" => Some(UrlKind::Regular),
            "small" => Some(UrlKind::Small),
            "thumb" => Some(UrlKind::Thumb),
            _ => None,
        }
    }

    fn as_key(&self) -> &'static str {
        match self {
            UrlKind::Raw => "raw",
            UrlKind::Full => "full",
            UrlKind::Regular => "regular",
            UrlKind::Small => "small",
            UrlKind::Thumb => "thumb",
        }
    }
}

/// Avatar size variants of a user's profile image
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AvatarSize {
    /// 32px
    Small,
    /// 64px
    Medium,
    /// 128px
    Large,
}

impl AvatarSize {
    fn from_key(key: &str) -> Option<Self> {
        match key {
            "small" => Some(AvatarSize::Small),
            "medium" => Some(AvatarSize::Medium),
            "large" => Some(AvatarSize::Large),
            _ => None,
        }
    }

    fn as_key(&self) -> &'static str {
        match self {
            AvatarSize::Small => "small",
            AvatarSize::Medium => "medium",
            AvatarSize::Large => "large",
        }
    }
}

/// ARGB colour parsed from a hex string
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct HexColor {
    /// Alpha channel
    pub alpha: u8,
    /// Red channel
    pub red: u8,
    /// Green channel
    pub green: u8,
    /// Blue channel
    pub blue: u8,
}

impl HexColor {
    /// Parse `#RGB`, `#RRGGBB` or `#AARRGGBB` (the `#` is optional)
    ///
    /// Never fails: strings of any other length yield fully transparent
    /// black, and a channel whose digits are not hex reads its valid leading
    /// digit, or 0 if there is none.
    ///
    /// # Examples
    ///
    /// ```
    /// use photo_feed::models::HexColor;
    ///
    /// let color = HexColor::from_hex("#0C0");
    /// assert_eq!((color.alpha, color.red, color.green, color.blue), (255, 0, 204, 0));
    ///
    /// let garbled = HexColor::from_hex("#GG8000");
    /// assert_eq!((garbled.alpha, garbled.red, garbled.green), (255, 0, 128));
    /// ```
    pub fn from_hex(hex: &str) -> Self {
        let digits: Vec<char> = hex.strip_prefix('#').unwrap_or(hex).chars().collect();

        let argb: Vec<char> = match digits.len() {
            3 => std::iter::repeat_n('F', 2)
                .chain(digits.iter().flat_map(|&c| [c, c]))
                .collect(),
            6 => std::iter::repeat_n('F', 2).chain(digits).collect(),
            8 => digits,
            _ => {
                return Self {
                    alpha: 0,
                    red: 0,
                    green: 0,
                    blue: 0,
                };
            }
        };

        Self {
            alpha: hex_channel(&argb[0..2]),
            red: hex_channel(&argb[2..4]),
            green: hex_channel(&argb[4..6]),
            blue: hex_channel(&argb[6..8]),
        }
    }

    /// Render as `RRGGBBAA`
    pub fn to_hex(&self) -> String {
        format!(
            "{:02X}{:02X}{:02X}{:02X}",
            self.red, self.green, self.blue, self.alpha
        )
    }

    /// Render as `#RRGGBB`, dropping alpha (the form the API sends)
    pub fn to_rgb_hex(&self) -> String {
        format!("#{:02X}{:02X}{:02X}", self.red, self.green, self.blue)
    }
}

/// Value of a two-digit channel, reading hex digits up to the first invalid one
fn hex_channel(pair: &[char]) -> u8 {
    pair.iter()
        .map_while(|c| c.to_digit(16))
        .fold(0u8, |acc, digit| acc.wrapping_mul(16).wrapping_add(digit as u8))
}

/// Author of a photo
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "WireUser", into = "WireUser")]
pub struct UserRecord {
    /// Unique user identifier
    pub id: String,
    /// Login name
    pub username: String,
    /// Display name, if the user set one
    pub display_name: Option<String>,
    /// Profile image URLs by size
    pub avatar_urls: BTreeMap<AvatarSize, Url>,
}

impl UserRecord {
    /// Profile image URL of the given size
    pub fn avatar_url(&self, size: AvatarSize) -> Option<&Url> {
        self.avatar_urls.get(&size)
    }

    /// Display name, falling back to the username
    pub fn name_or_username(&self) -> &str {
        self.display_name.as_deref().unwrap_or(&self.username)
    }
}

/// Photo metadata as returned by the collection endpoints
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "WirePhoto", into = "WirePhoto")]
pub struct PhotoRecord {
    /// Unique photo identifier
    pub id: String,
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
    /// Dominant colour, used as a placeholder while the image loads
    pub background_color: Option<HexColor>,
    /// Photo author
    pub owner: UserRecord,
    /// Image URLs by size variant
    pub urls: BTreeMap<UrlKind, Url>,
    /// Upload time
    pub created_at: Option<DateTime<Utc>>,
}

impl PhotoRecord {
    /// Image URL for the given size variant
    pub fn url(&self, kind: UrlKind) -> Option<&Url> {
        self.urls.get(&kind)
    }

    /// The preferred URL, or the closest available size
    ///
    /// Falls back through regular, small, thumb, full and raw.
    pub fn best_url(&self, preferred: UrlKind) -> Option<&Url> {
        self.url(preferred).or_else(|| {
            UrlKind::FALLBACK
                .iter()
                .find_map(|kind| self.urls.get(kind))
        })
    }

    /// Width divided by height, if the height is non-zero
    pub fn aspect_ratio(&self) -> Option<f64> {
        if self.height == 0 {
            None
        } else {
            Some(f64::from(self.width) / f64::from(self.height))
        }
    }
}

/// Append CDN resize hints (`max-w`, `max-h`) to an image URL
///
/// # Examples
///
/// ```
/// use photo_feed::models::sized_url;
/// use url::Url;
///
/// let url = Url::parse("https://images.example.com/photo-1?ixid=abc").unwrap();
/// let sized = sized_url(&url, 400, 300);
/// assert_eq!(sized.as_str(), "https://images.example.com/photo-1?ixid=abc&max-w=400&max-h=300");
/// ```
pub fn sized_url(url: &Url, width: u32, height: u32) -> Url {
    let mut sized = url.clone();
    sized
        .query_pairs_mut()
        .append_pair("max-w", &width.to_string())
        .append_pair("max-h", &height.to_string());
    sized
}

/// Parse a `created_at` timestamp
///
/// Accepts RFC 3339 (`Z` or `±hh:mm`) as well as `±hhmm` offsets.
pub fn parse_timestamp(value: &str) -> Result<DateTime<Utc>> {
    parse_wire_timestamp(value).map_err(|message| Error::Decode { message })
}

fn parse_wire_timestamp(value: &str) -> std::result::Result<DateTime<Utc>, String> {
    DateTime::parse_from_rfc3339(value)
        .or_else(|_| DateTime::parse_from_str(value, TIMESTAMP_FORMAT))
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| format!("invalid timestamp '{}': {}", value, e))
}

/// Decode a JSON array of photo records
pub fn decode_photos(body: &[u8]) -> Result<Vec<PhotoRecord>> {
    Ok(serde_json::from_slice(body)?)
}

#[derive(Serialize, Deserialize)]
struct WireUser {
    id: String,
    username: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    profile_image: HashMap<String, Option<String>>,
}

impl TryFrom<WireUser> for UserRecord {
    type Error = String;

    fn try_from(wire: WireUser) -> std::result::Result<Self, String> {
        let avatar_urls = wire
            .profile_image
            .iter()
            .filter_map(|(key, value)| {
                let size = AvatarSize::from_key(key)?;
                let url = Url::parse(value.as_deref()?).ok()?;
                Some((size, url))
            })
            .collect();

        Ok(Self {
            id: wire.id,
            username: wire.username,
            display_name: wire.name,
            avatar_urls,
        })
    }
}

impl From<UserRecord> for WireUser {
    fn from(user: UserRecord) -> Self {
        Self {
            id: user.id,
            username: user.username,
            name: user.display_name,
            profile_image: user
                .avatar_urls
                .into_iter()
                .map(|(size, url)| (size.as_key().to_string(), Some(url.to_string())))
                .collect(),
        }
    }
}

#[derive(Serialize, Deserialize)]
struct WirePhoto {
    id: String,
    width: u32,
    height: u32,
    #[serde(default)]
    color: Option<String>,
    user: UserRecord,
    #[serde(default)]
    urls: HashMap<String, Option<String>>,
    #[serde(default)]
    created_at: Option<String>,
}

// Conversion errors are plain messages; serde attaches the position and
// `From<serde_json::Error>` turns the result into `Error::Decode`
impl TryFrom<WirePhoto> for PhotoRecord {
    type Error = String;

    fn try_from(wire: WirePhoto) -> std::result::Result<Self, String> {
        let background_color = wire.color.as_deref().map(HexColor::from_hex);
        let created_at = wire
            .created_at
            .as_deref()
            .map(parse_wire_timestamp)
            .transpose()?;

        // Unknown size keys and unparsable URLs are skipped
        let urls = wire
            .urls
            .iter()
            .filter_map(|(key, value)| {
                let kind = UrlKind::from_key(key)?;
                let url = Url::parse(value.as_deref()?).ok()?;
                Some((kind, url))
            })
            .collect();

        Ok(Self {
            id: wire.id,
            width: wire.width,
            height: wire.height,
            background_color,
            owner: wire.user,
            urls,
            created_at,
        })
    }
}

impl From<PhotoRecord> for WirePhoto {
    fn from(photo: PhotoRecord) -> Self {
        Self {
            id: photo.id,
            width: photo.width,
            height: photo.height,
            color: photo.background_color.map(|c| c.to_rgb_hex()),
            user: photo.owner,
            urls: photo
                .urls
                .into_iter()
                .map(|(kind, url)| (kind.as_key().to_string(), Some(url.to_string())))
                .collect(),
            created_at: photo.created_at.map(|dt| dt.to_rfc3339()),
        }
    }
}
