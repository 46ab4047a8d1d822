//! Status codes carried in `m_type` replies and returned by call-number dispatch.
//!
//! Error codes are negative, `OK` is zero.

pub const OK: i32 = 0;
pub const ESRCH: i32 = -3;
pub const EBUSY: i32 = -16;
pub const EINVAL: i32 = -22;
pub const ENOSYS: i32 = -71;
pub const ELOCKED: i32 = -101;
pub const EBADCALL: i32 = -102;
pub const EDEADSRCDST: i32 = -105;
pub const ENOTREADY: i32 = -106;
