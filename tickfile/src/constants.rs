// Doing bit reads/writes/shifts with u32 is more performant than u64/u8.
pub type Bitlen = u32;

/// Magic value stamped into every v2 header, in host-native byte order.
pub const MAGIC: i64 = 0x0D0E0A0402080502;
/// Magic value of the legacy v1 format. Detected but not migrated by this crate.
pub const MAGIC_V1: i64 = 0x0D0E0A0402080500;

pub const ITEM_SECTION_ID: i32 = 0x0A;
pub const CONTENT_DESCRIPTION_SECTION_ID: i32 = 0x80;
pub const NAME_VALUE_SECTION_ID: i32 = 0x81;
pub const TAGS_SECTION_ID: i32 = 0x82;

pub const NAME_VALUE_KIND_I32: i32 = 3;
pub const NAME_VALUE_KIND_U64: i32 = 5;
pub const NAME_VALUE_KIND_F64: i32 = 10;
pub const NAME_VALUE_KIND_BYTES: i32 = 11;
pub const NAME_VALUE_KIND_TEXT: i32 = 12;
pub const NAME_VALUE_KIND_UUID: i32 = 13;

/// The 5-bit pattern `11111` the tick codec emits to mark a clean end of stream.
pub const EOF_MARKER_BITS: Bitlen = 5;
pub const EOF_MARKER_VALUE: u64 = 0x1F;

/// `item_start` (and therefore every section table) is aligned to this many bytes.
pub const ITEM_START_ALIGNMENT: i64 = 8;
