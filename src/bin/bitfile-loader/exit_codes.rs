pub const EXIT_OK: i32 = 0;
pub const EXIT_NO_PORT: i32 = 10;
pub const EXIT_INVALID_INPUT: i32 = 11;
pub const EXIT_PROTOCOL: i32 = 12;
pub const EXIT_VERIFY_FAILED: i32 = 13;
pub const EXIT_ABORTED: i32 = 14;
pub const EXIT_UNEXPECTED: i32 = 20;
