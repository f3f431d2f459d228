use libduckdb_sys::duckdb_string_t;

/// Decode a DuckDB string value into a Rust-owned `String`.
///
/// # Safety
///
/// `s` must come from a non-NULL `duckdb_string_t` vector row provided by
/// DuckDB for the active scalar invocation. Callers must perform row null checks
/// before invoking this function.
pub unsafe fn decode_duckdb_string(s: &duckdb_string_t) -> String {
    // SAFETY: Reading the inlined union field is part of DuckDB's string layout.
    let len = unsafe { s.value.inlined.length } as usize;
    if len == 0 {
        return String::new();
    }

    let bytes = if len <= 12 {
        // SAFETY: `len <= 12` for inlined strings; `inlined` holds `len` initialized bytes.
        unsafe { std::slice::from_raw_parts(s.value.inlined.inlined.as_ptr() as *const u8, len) }
    } else {
        // SAFETY: DuckDB provides valid pointer storage of `len` bytes for
        // non-inlined strings.
        unsafe { std::slice::from_raw_parts(s.value.pointer.ptr as *const u8, len) }
    };
    String::from_utf8_lossy(bytes).into_owned()
}
