//! Numbered server messages.
//!
//! The client owns the strings; the server speaks only ids. Named here so
//! call sites read as intent.

/// "Not enough HP."
pub const NOT_ENOUGH_HP: u16 = 278;
/// "Not enough MP."
pub const NOT_ENOUGH_MP: u16 = 279;
/// "You cannot carry any more items."
pub const BAG_FULL: u16 = 263;
/// "You are carrying too much weight."
pub const OVERWEIGHT: u16 = 110;
/// "Not enough gold."
pub const GOLD_SHORT: u16 = 189;
/// "You do not have the required material."
pub const MISSING_MATERIAL: u16 = 299;
/// "Nothing happened." (generic silent-ish failure)
pub const NOTHING_HAPPENED: u16 = 79;
/// "That shape cannot use this." (polymorph cast gate)
pub const POLY_FORBIDS: u16 = 285;
/// "The trade was cancelled."
pub const TRADE_CANCELLED: u16 = 448;
/// "The trade is complete."
pub const TRADE_DONE: u16 = 447;
/// "The party has been disbanded."
pub const PARTY_DISSOLVED: u16 = 418;
/// "You are already in a party."
pub const ALREADY_IN_PARTY: u16 = 416;
/// "The item has been enchanted." family base.
pub const ENCHANT_SUCCESS: u16 = 161;
/// "The item was destroyed."
pub const ENCHANT_DESTROYED: u16 = 164;
/// "The warehouse is in use."
pub const WAREHOUSE_IN_USE: u16 = 209;
/// "You have no authority." (clan rank refusals)
pub const NO_AUTHORITY: u16 = 518;
/// "You have gained a level."
pub const LEVEL_UP: u16 = 287;
